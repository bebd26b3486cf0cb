use std::borrow::Cow;
use std::sync::Arc;

use anyhow::{Error, Result};

/// Receives failures that were already returned to the caller, so they can
/// also be forwarded to a monitoring backend.
pub trait ErrorReporter: Send + Sync {
    /// Capture the provided error for later inspection.
    fn capture(&self, error: &Error) -> Result<()>;

    /// Convenience helper to capture a simple message.
    fn capture_message(&self, message: impl Into<Cow<'static, str>>) -> Result<()>
    where
        Self: Sized,
    {
        let message: Cow<'static, str> = message.into();
        self.capture(&Error::msg(message))
    }
}

impl<T: ErrorReporter + ?Sized> ErrorReporter for Arc<T> {
    fn capture(&self, error: &Error) -> Result<()> {
        (**self).capture(error)
    }
}

/// Drops every captured error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopErrorReporter;

impl ErrorReporter for NoopErrorReporter {
    fn capture(&self, _error: &Error) -> Result<()> {
        Ok(())
    }
}
