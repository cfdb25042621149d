use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Duration;

mod timer;
#[cfg(not(target_arch = "wasm32"))]
mod tokio_runtime;
#[cfg(target_arch = "wasm32")]
mod web_runtime;

pub use timer::*;
#[cfg(not(target_arch = "wasm32"))]
pub use tokio_runtime::*;
#[cfg(target_arch = "wasm32")]
pub use web_runtime::*;

/// Single-threaded executor the client schedules its tasks and timers on.
pub trait Runtime {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);

    /// The deadline is fixed when this is called, not when the future is first polled.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

pub type SharedRuntime = Rc<dyn Runtime>;
