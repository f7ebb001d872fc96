//! Execution contexts: where promise callbacks run.
//!
//! The promise core never schedules anything itself. Every executor and
//! every continuation is bound to an [`ExecutionContext`], which either runs
//! the task inline on the calling thread or hands it to a dedicated serial
//! worker queue. Tasks submitted to one context run in submission order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;

type Task = Box<dyn FnOnce() + Send>;

/// A cloneable handle to something that can run a zero-argument task.
#[derive(Clone)]
pub struct ExecutionContext {
    kind: Arc<Kind>,
}

enum Kind {
    Inline,
    Worker(Sender<Task>),
}

impl ExecutionContext {
    /// Runs tasks synchronously on whichever thread submits them.
    pub fn inline() -> Self {
        ExecutionContext {
            kind: Arc::new(Kind::Inline),
        }
    }

    /// A serial queue backed by a dedicated thread. Tasks run FIFO; a
    /// panicking task is contained so the queue stays alive. The thread
    /// exits once every handle to this context is dropped.
    pub fn worker() -> Self {
        let (tx, rx) = channel::<Task>();
        thread::spawn(move || {
            for task in rx {
                let _ = catch_unwind(AssertUnwindSafe(task));
            }
        });
        ExecutionContext {
            kind: Arc::new(Kind::Worker(tx)),
        }
    }

    /// Submits a task. Inline contexts run it before returning; worker
    /// contexts return immediately.
    pub fn run(&self, task: impl FnOnce() + Send + 'static) {
        match &*self.kind {
            Kind::Inline => task(),
            // The send only fails if the worker thread is gone, in which
            // case there is nobody left to run anything for.
            Kind::Worker(tx) => {
                let _ = tx.send(Box::new(task));
            }
        }
    }
}

/// The pair of default contexts a promise chain is built with.
///
/// `construction` runs executors, `continuation` runs callbacks attached
/// without an explicit context. The pair is injected once at the root and
/// inherited by every derived promise; there is no process-wide default.
#[derive(Clone)]
pub struct ContextDefaults {
    /// Where executors run. Defaults to a background worker so an executor
    /// never blocks the constructing thread.
    pub construction: ExecutionContext,
    /// Where continuations run when no context is given per call.
    /// Defaults to inline, i.e. the thread that settles the promise.
    pub continuation: ExecutionContext,
}

impl ContextDefaults {
    /// Everything synchronous on the calling thread. Settlement and
    /// handler dispatch become deterministic, which is what tests want.
    pub fn inline() -> Self {
        ContextDefaults {
            construction: ExecutionContext::inline(),
            continuation: ExecutionContext::inline(),
        }
    }
}

impl Default for ContextDefaults {
    fn default() -> Self {
        ContextDefaults {
            construction: ExecutionContext::worker(),
            continuation: ExecutionContext::inline(),
        }
    }
}
