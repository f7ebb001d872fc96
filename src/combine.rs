//! Combinators building one promise out of others, written entirely
//! against the public settlement contract.

use crate::context::{ContextDefaults, ExecutionContext};
use crate::{Error, Promise};
use std::sync::{Arc, Mutex};

impl<T: Clone + Send + 'static> Promise<T> {
    /// An already-fulfilled promise. Attaching to it replays the value
    /// exactly like a settlement that happened earlier.
    pub fn resolve(value: T) -> Promise<T> {
        Promise::with(ContextDefaults::inline(), move |settler| {
            settler.resolve(value)
        })
    }

    /// An already-rejected promise.
    pub fn reject(reason: Error) -> Promise<T> {
        Promise::with(ContextDefaults::inline(), move |settler| {
            settler.reject(reason)
        })
    }

    pub fn from_result(result: Result<T, Error>) -> Promise<T> {
        match result {
            Ok(value) => Promise::resolve(value),
            Err(reason) => Promise::reject(reason),
        }
    }

    /// Fulfills with every input's value in input order once all inputs
    /// fulfill; the first rejection anywhere rejects the aggregate and
    /// later settlements become no-ops. An empty input fulfills immediately
    /// with an empty vector.
    pub fn all(promises: Vec<Promise<T>>) -> Promise<Vec<T>> {
        Promise::with(ContextDefaults::inline(), move |settler| {
            if promises.is_empty() {
                settler.resolve(Vec::new());
                return;
            }
            let slots: Arc<Mutex<Vec<Option<T>>>> =
                Arc::new(Mutex::new(vec![None; promises.len()]));
            for (index, promise) in promises.iter().enumerate() {
                let slots = slots.clone();
                let resolve = settler.clone();
                let reject = settler.clone();
                promise.subscribe_on(
                    &ExecutionContext::inline(),
                    move |value| {
                        let ready = {
                            let mut slots = slots.lock().unwrap();
                            slots[index] = Some(value);
                            if slots.iter().all(|slot| slot.is_some()) {
                                Some(slots.iter_mut().map(|slot| slot.take().unwrap()).collect())
                            } else {
                                None
                            }
                        };
                        if let Some(values) = ready {
                            resolve.resolve(values);
                        }
                    },
                    move |reason| reject.reject(reason),
                );
            }
        })
    }

    /// Settles with the outcome of whichever input settles first, success
    /// or failure. An input that is already settled wins immediately; an
    /// empty input never settles.
    pub fn race(promises: Vec<Promise<T>>) -> Promise<T> {
        Promise::with(ContextDefaults::inline(), move |settler| {
            for promise in &promises {
                let resolve = settler.clone();
                let reject = settler.clone();
                promise.subscribe_on(
                    &ExecutionContext::inline(),
                    move |value| resolve.resolve(value),
                    move |reason| reject.reject(reason),
                );
            }
        })
    }
}
