use crate::context::ExecutionContext;
use crate::state::State;
use crate::Error;

/// A continuation pair bound to an execution context, consumed exactly once
/// when the promise it is attached to settles.
pub(crate) struct SettlementHandler<T> {
    cx: ExecutionContext,
    on_fulfilled: Box<dyn FnOnce(T) + Send>,
    on_rejected: Box<dyn FnOnce(Error) + Send>,
}

impl<T: Clone + Send + 'static> SettlementHandler<T> {
    pub(crate) fn new(
        cx: ExecutionContext,
        on_fulfilled: impl FnOnce(T) + Send + 'static,
        on_rejected: impl FnOnce(Error) + Send + 'static,
    ) -> Self {
        SettlementHandler {
            cx,
            on_fulfilled: Box::new(on_fulfilled),
            on_rejected: Box::new(on_rejected),
        }
    }

    /// Submits exactly one of the pair to the bound context. Pending is not
    /// a dispatchable state; callers only dispatch after settlement.
    pub(crate) fn dispatch(self, state: &State<T>) {
        match state {
            State::Fulfilled(value) => {
                let value = value.clone();
                let on_fulfilled = self.on_fulfilled;
                self.cx.run(move || on_fulfilled(value));
            }
            State::Rejected(reason) => {
                let reason = reason.clone();
                let on_rejected = self.on_rejected;
                self.cx.run(move || on_rejected(reason));
            }
            State::Pending => {}
        }
    }
}
