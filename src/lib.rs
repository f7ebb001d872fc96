//! JavaScript-style promises for Rust.
//!
//! A [`Promise`] represents the eventual success or failure of an operation
//! and decouples the producer of that result from its consumers. The
//! producer settles it through a [`Settler`]; consumers attach continuations
//! with [`then`](Promise::then), [`catch`](Promise::catch),
//! [`recover`](Promise::recover) and [`finally`](Promise::finally), or
//! combine several promises with [`all`](Promise::all) and
//! [`race`](Promise::race). Callbacks run on an [`ExecutionContext`], either
//! inline on the settling thread or on a serial worker queue. A chain of
//! derived promises shares one [`CancelContext`], so cancelling any link
//! rejects every still-pending promise in the chain.
//!
//! A promise is also a [`Future`](std::future::Future), so a consumer that
//! does want to wait can simply `.await` it:
//!
//! ```
//! use promisor::{ContextDefaults, Promise};
//! use futures::executor::block_on;
//! use std::thread;
//!
//! let promise = Promise::with(ContextDefaults::inline(), |settler| {
//!     thread::spawn(move || settler.resolve(String::from("🍓")));
//! });
//! assert_eq!(block_on(promise), Ok(String::from("🍓")));
//! ```

mod cancel;
mod combine;
mod context;
mod handler;
mod promise;
mod state;

pub use cancel::CancelContext;
pub use context::{ContextDefaults, ExecutionContext};
pub use promise::{Promise, Settler};
pub use state::State;

use thiserror::Error as ThisError;

/// The rejection reason of a promise.
///
/// Cancellation is modelled as an ordinary rejection carrying the reserved
/// [`Cancelled`](Error::Cancelled) identity, so it composes with every
/// chaining operator without special cases.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The chain's [`CancelContext`] was triggered while this promise was
    /// still pending.
    #[error("promise was cancelled")]
    Cancelled,
    /// An explicit rejection, or the message of a captured executor or
    /// continuation panic.
    #[error("{0}")]
    Failure(String),
}

impl Error {
    /// A generic failure with the given message.
    pub fn failure(message: impl Into<String>) -> Self {
        Error::Failure(message.into())
    }
}
