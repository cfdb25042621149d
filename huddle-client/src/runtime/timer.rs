use crate::runtime::SharedRuntime;
use futures::future::{AbortHandle, Abortable};
use std::time::Duration;

/// One-shot timer. Dropping it cancels the pending callback.
pub struct Timer {
    handle: AbortHandle,
}

impl Timer {
    pub fn start(runtime: &SharedRuntime, delay: Duration, fire: impl FnOnce() + 'static) -> Self {
        let (handle, registration) = AbortHandle::new_pair();
        let sleep = runtime.sleep(delay);
        let task = Abortable::new(
            async move {
                sleep.await;
                fire();
            },
            registration,
        );
        runtime.spawn(Box::pin(async move {
            let _ = task.await;
        }));
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("cancelled", &self.handle.is_aborted())
            .finish()
    }
}
