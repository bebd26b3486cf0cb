use std::sync::Arc;

use anyhow::Result;

/// A lightweight sink used to record lifecycle events emitted while running
/// commands. The `Event` type is generic so each crate can supply its own
/// event schema.
pub trait TelemetrySink<Event>: Send + Sync {
    /// Record an event produced by the component.
    fn record(&self, event: &Event) -> Result<()>;

    /// Flush any buffered telemetry data to its destination.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

impl<Event, T: TelemetrySink<Event> + ?Sized> TelemetrySink<Event> for Arc<T> {
    fn record(&self, event: &Event) -> Result<()> {
        (**self).record(event)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

/// A telemetry sink that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl<Event> TelemetrySink<Event> for NoopTelemetry {
    fn record(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}
