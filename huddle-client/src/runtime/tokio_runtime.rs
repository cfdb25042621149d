use crate::runtime::{Runtime, SharedRuntime};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Duration;

/// Runs client tasks on the current `tokio::task::LocalSet`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRuntime;

impl TokioRuntime {
    pub fn shared() -> SharedRuntime {
        Rc::new(TokioRuntime)
    }
}

impl Runtime for TokioRuntime {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
