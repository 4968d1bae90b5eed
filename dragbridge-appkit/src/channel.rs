use std::sync::Arc;

use dispatch2::DispatchQueue;
use dragbridge_core::channel::{ChannelEvent, EventChannel};
use objc2::MainThreadMarker;

/// Delivers events on the main thread.
///
/// Events raised on the main thread are forwarded immediately, others are queued on the main
/// dispatch queue.
#[derive(Debug)]
pub struct MainThreadChannel<C> {
    inner: Arc<C>,
}

impl<C: EventChannel + 'static> MainThreadChannel<C> {
    pub fn new(inner: C) -> Self {
        MainThreadChannel { inner: Arc::new(inner) }
    }

    pub fn get_ref(&self) -> &C {
        &self.inner
    }
}

impl<C: EventChannel + 'static> EventChannel for MainThreadChannel<C> {
    fn invoke(&self, event: ChannelEvent) {
        if MainThreadMarker::new().is_some() {
            self.inner.invoke(event);
        } else {
            let inner = Arc::clone(&self.inner);
            DispatchQueue::main().exec_async(move || inner.invoke(event));
        }
    }
}
