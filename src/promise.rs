use crate::cancel::CancelContext;
use crate::context::{ContextDefaults, ExecutionContext};
use crate::handler::SettlementHandler;
use crate::state::State;
use crate::Error;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

struct Inner<T> {
    state: State<T>,
    handlers: Vec<SettlementHandler<T>>,
    wakers: Vec<Waker>,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Inner {
            state: State::Pending,
            handlers: Vec::new(),
            wakers: Vec::new(),
        }
    }
}

/// The eventual success or failure of an operation.
///
/// Cloning a promise clones the handle, not the result: all clones observe
/// the same settlement. Continuations attach through the `then` family and
/// run on the promise's continuation context unless an `_on` variant names
/// one explicitly.
pub struct Promise<T> {
    inner: Arc<Mutex<Inner<T>>>,
    defaults: ContextDefaults,
    cancel: CancelContext,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            inner: self.inner.clone(),
            defaults: self.defaults.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

/// The producer half of a promise: the only route to settlement.
///
/// Both entry points are silent no-ops once the promise is settled, so a
/// late reject (for example from cancellation) races harmlessly against a
/// normal resolve.
pub struct Settler<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Settler<T> {
    fn clone(&self) -> Self {
        Settler {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Settler<T> {
    /// Fulfills the promise, if it is still pending.
    pub fn resolve(&self, value: T) {
        self.settle(State::Fulfilled(value));
    }

    /// Rejects the promise, if it is still pending.
    pub fn reject(&self, reason: Error) {
        self.settle(State::Rejected(reason));
    }

    fn settle(&self, outcome: State<T>) {
        let (handlers, wakers, outcome) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state.is_settled() {
                return;
            }
            inner.state = outcome;
            (
                std::mem::take(&mut inner.handlers),
                std::mem::take(&mut inner.wakers),
                inner.state.clone(),
            )
        };
        // The lock is released before any user callback runs, so a
        // continuation may call back into this promise without deadlocking.
        for handler in handlers {
            handler.dispatch(&outcome);
        }
        for waker in wakers {
            waker.wake();
        }
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates a promise and hands its [`Settler`] to `executor` on the
    /// default construction context (a background worker).
    pub fn new(executor: impl FnOnce(Settler<T>) + Send + 'static) -> Self {
        Self::with(ContextDefaults::default(), executor)
    }

    /// Like [`new`](Promise::new) with explicit context defaults, inherited
    /// by every promise derived from this one. The executor runs exactly
    /// once on `defaults.construction`; if it panics the promise rejects
    /// with the panic message.
    pub fn with(
        defaults: ContextDefaults,
        executor: impl FnOnce(Settler<T>) + Send + 'static,
    ) -> Self {
        let (promise, settler) = Self::deferred(defaults);
        promise.defaults.construction.run({
            let on_panic = settler.clone();
            move || {
                if let Err(reason) = run_caught(move || executor(settler)) {
                    on_panic.reject(reason);
                }
            }
        });
        promise
    }

    /// Splits a fresh pending promise into its consumer and producer
    /// halves, for callers that settle from somewhere no executor closure
    /// reaches.
    pub fn deferred(defaults: ContextDefaults) -> (Self, Settler<T>) {
        let promise = Self::pending(defaults, CancelContext::new());
        let settler = promise.settler();
        (promise, settler)
    }

    pub(crate) fn pending(defaults: ContextDefaults, cancel: CancelContext) -> Self {
        let promise = Promise {
            inner: Arc::new(Mutex::new(Inner::new())),
            defaults,
            cancel: cancel.clone(),
        };
        let settler = promise.settler();
        cancel.on_cancel(move || settler.reject(Error::Cancelled));
        promise
    }

    pub(crate) fn settler(&self) -> Settler<T> {
        Settler {
            inner: self.inner.clone(),
        }
    }

    /// Attaches a continuation pair and returns a clone of this promise, so
    /// several independent subscribers can fan out from one result.
    /// Exactly one of the pair runs, exactly once, on the continuation
    /// context; if the promise is already settled the matching callback is
    /// scheduled immediately, so an attach can never miss the result.
    pub fn subscribe(
        &self,
        on_fulfilled: impl FnOnce(T) + Send + 'static,
        on_rejected: impl FnOnce(Error) + Send + 'static,
    ) -> Self {
        let cx = self.defaults.continuation.clone();
        self.subscribe_on(&cx, on_fulfilled, on_rejected)
    }

    /// [`subscribe`](Promise::subscribe) on an explicit context.
    pub fn subscribe_on(
        &self,
        cx: &ExecutionContext,
        on_fulfilled: impl FnOnce(T) + Send + 'static,
        on_rejected: impl FnOnce(Error) + Send + 'static,
    ) -> Self {
        let handler = SettlementHandler::new(cx.clone(), on_fulfilled, on_rejected);
        let mut inner = self.inner.lock().unwrap();
        if inner.state.is_pending() {
            inner.handlers.push(handler);
        } else {
            let settled = inner.state.clone();
            drop(inner);
            handler.dispatch(&settled);
        }
        self.clone()
    }

    /// Returns a promise fulfilled with `f` applied to this promise's
    /// value. Rejection passes through untransformed; a panicking `f`
    /// rejects the returned promise only.
    pub fn then<U: Clone + Send + 'static>(
        &self,
        f: impl FnOnce(T) -> U + Send + 'static,
    ) -> Promise<U> {
        let cx = self.defaults.continuation.clone();
        self.then_on(&cx, f)
    }

    /// [`then`](Promise::then) on an explicit context.
    pub fn then_on<U: Clone + Send + 'static>(
        &self,
        cx: &ExecutionContext,
        f: impl FnOnce(T) -> U + Send + 'static,
    ) -> Promise<U> {
        let next = Promise::pending(self.defaults.clone(), self.cancel.clone());
        let settler = next.settler();
        let on_rejected = settler.clone();
        self.subscribe_on(
            cx,
            move |value| match run_caught(move || f(value)) {
                Ok(mapped) => settler.resolve(mapped),
                Err(reason) => settler.reject(reason),
            },
            move |reason| on_rejected.reject(reason),
        );
        next
    }

    /// Chains a promise-returning continuation and flattens the result: the
    /// returned promise settles with the settlement of the promise `f`
    /// produces. The inner promise is pulled into this chain's cancellation
    /// scope.
    pub fn and_then<U: Clone + Send + 'static>(
        &self,
        f: impl FnOnce(T) -> Promise<U> + Send + 'static,
    ) -> Promise<U> {
        let cx = self.defaults.continuation.clone();
        self.and_then_on(&cx, f)
    }

    /// [`and_then`](Promise::and_then) on an explicit context.
    pub fn and_then_on<U: Clone + Send + 'static>(
        &self,
        cx: &ExecutionContext,
        f: impl FnOnce(T) -> Promise<U> + Send + 'static,
    ) -> Promise<U> {
        let next = Promise::pending(self.defaults.clone(), self.cancel.clone());
        let settler = next.settler();
        let on_rejected = settler.clone();
        let chain_cancel = self.cancel.clone();
        self.subscribe_on(
            cx,
            move |value| match run_caught(move || f(value)) {
                Ok(inner) => {
                    let inner_cancel = inner.cancel.clone();
                    chain_cancel.on_cancel(move || inner_cancel.cancel());
                    let resolve = settler.clone();
                    inner.subscribe_on(
                        &ExecutionContext::inline(),
                        move |value| resolve.resolve(value),
                        move |reason| settler.reject(reason),
                    );
                }
                Err(reason) => settler.reject(reason),
            },
            move |reason| on_rejected.reject(reason),
        );
        next
    }

    /// Observes rejection only; fulfillment passes through unobserved.
    /// Returns a clone of this promise, like [`subscribe`](Promise::subscribe).
    pub fn catch(&self, on_rejected: impl FnOnce(Error) + Send + 'static) -> Self {
        let cx = self.defaults.continuation.clone();
        self.catch_on(&cx, on_rejected)
    }

    /// [`catch`](Promise::catch) on an explicit context.
    pub fn catch_on(
        &self,
        cx: &ExecutionContext,
        on_rejected: impl FnOnce(Error) + Send + 'static,
    ) -> Self {
        self.subscribe_on(cx, |_| {}, on_rejected)
    }

    /// The rejection-side mirror of [`then`](Promise::then): turns a
    /// rejected chain back into a fulfilled one of the same value type.
    pub fn recover(&self, f: impl FnOnce(Error) -> T + Send + 'static) -> Promise<T> {
        let cx = self.defaults.continuation.clone();
        self.recover_on(&cx, f)
    }

    /// [`recover`](Promise::recover) on an explicit context.
    pub fn recover_on(
        &self,
        cx: &ExecutionContext,
        f: impl FnOnce(Error) -> T + Send + 'static,
    ) -> Promise<T> {
        let next = Promise::pending(self.defaults.clone(), self.cancel.clone());
        let settler = next.settler();
        let on_fulfilled = settler.clone();
        self.subscribe_on(
            cx,
            move |value| on_fulfilled.resolve(value),
            move |reason| match run_caught(move || f(reason)) {
                Ok(recovered) => settler.resolve(recovered),
                Err(reason) => settler.reject(reason),
            },
        );
        next
    }

    /// The rejection-side mirror of [`and_then`](Promise::and_then).
    pub fn recover_with(
        &self,
        f: impl FnOnce(Error) -> Promise<T> + Send + 'static,
    ) -> Promise<T> {
        let cx = self.defaults.continuation.clone();
        self.recover_with_on(&cx, f)
    }

    /// [`recover_with`](Promise::recover_with) on an explicit context.
    pub fn recover_with_on(
        &self,
        cx: &ExecutionContext,
        f: impl FnOnce(Error) -> Promise<T> + Send + 'static,
    ) -> Promise<T> {
        let next = Promise::pending(self.defaults.clone(), self.cancel.clone());
        let settler = next.settler();
        let on_fulfilled = settler.clone();
        let chain_cancel = self.cancel.clone();
        self.subscribe_on(
            cx,
            move |value| on_fulfilled.resolve(value),
            move |reason| match run_caught(move || f(reason)) {
                Ok(inner) => {
                    let inner_cancel = inner.cancel.clone();
                    chain_cancel.on_cancel(move || inner_cancel.cancel());
                    let resolve = settler.clone();
                    inner.subscribe_on(
                        &ExecutionContext::inline(),
                        move |value| resolve.resolve(value),
                        move |reason| settler.reject(reason),
                    );
                }
                Err(reason) => settler.reject(reason),
            },
        );
        next
    }

    /// Runs `f` exactly once on either outcome, then forwards the original
    /// outcome unchanged. The body is side-effect-only: a panic inside it
    /// is discarded rather than allowed to alter the settlement.
    pub fn finally(&self, f: impl FnOnce() + Send + 'static) -> Promise<T> {
        let cx = self.defaults.continuation.clone();
        self.finally_on(&cx, f)
    }

    /// [`finally`](Promise::finally) on an explicit context.
    pub fn finally_on(
        &self,
        cx: &ExecutionContext,
        f: impl FnOnce() + Send + 'static,
    ) -> Promise<T> {
        let next = Promise::pending(self.defaults.clone(), self.cancel.clone());
        let settler = next.settler();
        let on_rejected = settler.clone();
        // Only one side of the pair ever runs; the slot hands the body to
        // whichever that is.
        let body = Arc::new(Mutex::new(Some(f)));
        let body_on_reject = body.clone();
        self.subscribe_on(
            cx,
            move |value| {
                run_finally(&body);
                settler.resolve(value);
            },
            move |reason| {
                run_finally(&body_on_reject);
                on_rejected.reject(reason);
            },
        );
        next
    }

    /// Triggers the chain's [`CancelContext`]: every still-pending promise
    /// sharing it rejects with [`Error::Cancelled`]. No-op on settled
    /// chains.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_context(&self) -> &CancelContext {
        &self.cancel
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().unwrap().state.is_pending()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.inner.lock().unwrap().state.is_fulfilled()
    }

    pub fn is_rejected(&self) -> bool {
        self.inner.lock().unwrap().state.is_rejected()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.lock().unwrap().state.is_settled()
    }

    /// A snapshot of the current settlement state.
    pub fn state(&self) -> State<T> {
        self.inner.lock().unwrap().state.clone()
    }

    /// The fulfilled value, if settled that way.
    pub fn value(&self) -> Option<T> {
        self.inner.lock().unwrap().state.value().cloned()
    }

    /// The rejection reason, if settled that way.
    pub fn error(&self) -> Option<Error> {
        self.inner.lock().unwrap().state.error().cloned()
    }
}

impl<T: Clone> Future for Promise<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.lock().unwrap();
        match &inner.state {
            State::Fulfilled(value) => Poll::Ready(Ok(value.clone())),
            State::Rejected(reason) => Poll::Ready(Err(reason.clone())),
            State::Pending => {
                // Every poller registers its own waker; clones of the same
                // promise may be awaited from several tasks at once.
                inner.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.inner.lock().unwrap().state)
            .finish()
    }
}

fn run_finally<F: FnOnce()>(slot: &Mutex<Option<F>>) {
    if let Some(f) = slot.lock().unwrap().take() {
        let _ = run_caught(f);
    }
}

/// Runs `f`, converting a panic into the rejection it is equivalent to.
fn run_caught<U>(f: impl FnOnce() -> U) -> Result<U, Error> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            String::from("promise task panicked")
        };
        Error::Failure(message)
    })
}
