//! In-memory adapters for the commons traits, mostly used by tests that need
//! to assert on what a component reported.

use anyhow::{Error, Result};
use parking_lot::Mutex;

use crate::errors::ErrorReporter;
use crate::telemetry::TelemetrySink;

/// Keeps every recorded event in insertion order.
#[derive(Debug)]
pub struct MemoryTelemetry<Event> {
    events: Mutex<Vec<Event>>,
}

impl<Event> Default for MemoryTelemetry<Event> {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl<Event: Clone> MemoryTelemetry<Event> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl<Event: Clone + Send> TelemetrySink<Event> for MemoryTelemetry<Event> {
    fn record(&self, event: &Event) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Stores the display text of every captured error.
#[derive(Debug, Default)]
pub struct MemoryErrorReporter {
    messages: Mutex<Vec<String>>,
}

impl MemoryErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl ErrorReporter for MemoryErrorReporter {
    fn capture(&self, error: &Error) -> Result<()> {
        self.messages.lock().push(error.to_string());
        Ok(())
    }
}
