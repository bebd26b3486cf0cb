use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

/// Single-shot flag that can be awaited from blocking and async code alike.
///
/// Goes from unset to set exactly once and never resets.
#[derive(Debug, Default)]
pub(crate) struct CompletionSignal {
    is_set: Mutex<bool>,
    condvar: Condvar,
    notify: Notify,
}

impl CompletionSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self) {
        {
            let mut is_set = self.is_set.lock();
            if *is_set {
                return;
            }
            *is_set = true;
        }
        self.condvar.notify_all();
        self.notify.notify_waiters();
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.is_set.lock()
    }

    /// Block the current thread until the signal is set.
    pub(crate) fn wait(&self) {
        let mut is_set = self.is_set.lock();
        while !*is_set {
            self.condvar.wait(&mut is_set);
        }
    }

    /// Block until the signal is set or `deadline` passes. `None` waits
    /// forever. Returns whether the signal is set.
    pub(crate) fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let Some(deadline) = deadline else {
            self.wait();
            return true;
        };

        let mut is_set = self.is_set.lock();
        while !*is_set {
            if self.condvar.wait_until(&mut is_set, deadline).timed_out() {
                return *is_set;
            }
        }
        true
    }

    /// Wait without blocking a thread.
    pub(crate) async fn wait_async(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a `set` in between is not lost.
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

/// Sets the wrapped signal when dropped, so a reader that panics still
/// releases the completion barrier.
pub(crate) struct SetOnDrop<'a>(pub(crate) &'a CompletionSignal);

impl Drop for SetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set();
    }
}
