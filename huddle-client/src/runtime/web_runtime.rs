use crate::runtime::{Runtime, SharedRuntime};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Duration;

/// Browser event loop: `spawn_local` for tasks, `setTimeout` for sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRuntime;

impl WebRuntime {
    pub fn shared() -> SharedRuntime {
        Rc::new(WebRuntime)
    }
}

impl Runtime for WebRuntime {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;
        let promise = js_sys::Promise::new(&mut |resolve, _| {
            if let Some(window) = web_sys::window() {
                let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis);
            }
        });
        Box::pin(async move {
            let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
        })
    }
}
