use std::sync::{Arc, Mutex};

type CancelHandler = Box<dyn FnOnce() + Send>;

/// A shared cancellation token propagated through a chain of promises.
///
/// Every promise derived from a common root holds a clone of the same
/// context. Triggering it runs the registered handlers exactly once, in
/// registration order; each pending promise in the chain registers a
/// handler that rejects it with [`Error::Cancelled`](crate::Error::Cancelled).
///
/// ```
/// use promisor::CancelContext;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let context = CancelContext::new();
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = runs.clone();
/// context.on_cancel(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
/// context.cancel();
/// context.cancel();
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct CancelContext {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    triggered: bool,
    handlers: Vec<CancelHandler>,
}

impl CancelContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers the context. Idempotent: handlers run on the first call
    /// only, in registration order, with the lock released first so a
    /// handler may re-enter this context.
    pub fn cancel(&self) {
        let handlers = {
            let mut inner = self.inner.lock().unwrap();
            if inner.triggered {
                return;
            }
            inner.triggered = true;
            std::mem::take(&mut inner.handlers)
        };
        for handler in handlers {
            handler();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().unwrap().triggered
    }

    /// Registers a handler to run on trigger. If the context is already
    /// triggered the handler runs immediately on the calling thread.
    pub fn on_cancel(&self, handler: impl FnOnce() + Send + 'static) {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.triggered {
                inner.handlers.push(Box::new(handler));
                return;
            }
        }
        handler();
    }
}
