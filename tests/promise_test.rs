use futures::executor::block_on;
use promisor::{ContextDefaults, Error, Promise};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn inline() -> ContextDefaults {
    ContextDefaults::inline()
}

/// A promise resolved with `value` from another thread after `ms`.
fn delayed(ms: u64, value: i32) -> Promise<i32> {
    Promise::with(inline(), move |settler| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(ms));
            settler.resolve(value);
        });
    })
}

#[test]
fn then_transforms_the_fulfilled_value() {
    let promise = Promise::resolve(2);
    let doubled = promise.then(|value| value * 10);
    assert_eq!(doubled.value(), Some(20));
}

#[test]
fn then_chains_compose() {
    let promise = Promise::resolve(2)
        .then(|value| value * 10)
        .then(|value| value + 5);
    assert_eq!(promise.value(), Some(25));
}

#[test]
fn then_passes_rejection_through_untransformed() {
    let touched = Arc::new(AtomicUsize::new(0));
    let counter = touched.clone();
    let promise: Promise<i32> = Promise::reject(Error::failure("upstream"));
    let mapped = promise.then(move |value| {
        counter.fetch_add(1, Ordering::SeqCst);
        value + 1
    });
    assert_eq!(mapped.error(), Some(Error::failure("upstream")));
    assert_eq!(touched.load(Ordering::SeqCst), 0);
}

#[test]
fn panic_in_then_rejects_downstream_only() {
    let promise = Promise::resolve(1);
    let broken = promise.then(|_| -> i32 { panic!("mapper blew up") });
    assert_eq!(broken.error(), Some(Error::failure("mapper blew up")));
    // The upstream promise is untouched by its continuation's failure.
    assert_eq!(promise.value(), Some(1));
}

#[test]
fn and_then_flattens_a_nested_promise() {
    let promise = Promise::resolve(1).and_then(|value| Promise::resolve(value + 1));
    assert_eq!(promise.value(), Some(2));
}

#[test]
fn and_then_forwards_inner_rejection() {
    let promise =
        Promise::resolve(1).and_then(|_| Promise::<i32>::reject(Error::failure("inner")));
    assert_eq!(promise.error(), Some(Error::failure("inner")));
}

#[test]
fn and_then_skips_the_continuation_on_rejection() {
    let touched = Arc::new(AtomicUsize::new(0));
    let counter = touched.clone();
    let promise: Promise<i32> = Promise::reject(Error::failure("upstream"));
    let chained = promise.and_then(move |value| {
        counter.fetch_add(1, Ordering::SeqCst);
        Promise::resolve(value)
    });
    assert_eq!(chained.error(), Some(Error::failure("upstream")));
    assert_eq!(touched.load(Ordering::SeqCst), 0);
}

#[test]
fn and_then_settles_when_the_inner_promise_settles_later() {
    let (inner, settler) = Promise::deferred(inline());
    let promise = Promise::resolve(10).and_then(move |_| inner);
    assert!(promise.is_pending());
    settler.resolve(11);
    assert_eq!(promise.value(), Some(11));
}

#[test]
fn catch_does_not_run_on_fulfillment() {
    let caught = Arc::new(AtomicUsize::new(0));
    let counter = caught.clone();
    Promise::resolve(1).catch(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(caught.load(Ordering::SeqCst), 0);
}

#[test]
fn catch_observes_rejection() {
    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    let promise: Promise<i32> = Promise::reject(Error::failure("observed"));
    promise.catch(move |reason| *slot.lock().unwrap() = Some(reason));
    assert_eq!(*seen.lock().unwrap(), Some(Error::failure("observed")));
}

#[test]
fn recover_turns_rejection_back_into_fulfillment() {
    let promise: Promise<i32> = Promise::reject(Error::failure("nope"));
    let recovered = promise.recover(|_| 7);
    assert_eq!(recovered.value(), Some(7));
}

#[test]
fn recover_passes_fulfillment_through() {
    let recovered = Promise::resolve(4).recover(|_| 0);
    assert_eq!(recovered.value(), Some(4));
}

#[test]
fn recover_with_flattens_the_recovery_promise() {
    let promise: Promise<i32> = Promise::reject(Error::failure("nope"));
    let recovered = promise.recover_with(|_| Promise::resolve(8));
    assert_eq!(recovered.value(), Some(8));
}

#[test]
fn finally_runs_once_on_both_paths_and_forwards_the_outcome() {
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = runs.clone();
    let fulfilled = Promise::resolve(3).finally(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fulfilled.value(), Some(3));
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let counter = runs.clone();
    let rejected: Promise<i32> = Promise::reject(Error::failure("original"));
    let forwarded = rejected.finally(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(forwarded.error(), Some(Error::failure("original")));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn a_failing_finally_body_does_not_alter_the_outcome() {
    let promise = Promise::resolve(3).finally(|| panic!("side effect failed"));
    assert_eq!(promise.value(), Some(3));
}

#[test]
fn all_collects_values_in_input_order_even_when_the_middle_settles_last() {
    let all = Promise::all(vec![delayed(30, 1), delayed(90, 2), delayed(30, 3)]);
    thread::sleep(Duration::from_millis(300));
    assert_eq!(all.value(), Some(vec![1, 2, 3]));
}

#[test]
fn race_prefers_an_already_settled_input() {
    let race = Promise::race(vec![
        delayed(200, 1),
        Promise::resolve(2),
        delayed(100, 3),
        delayed(100, 4),
    ]);
    assert_eq!(race.value(), Some(2));
}

#[test]
fn race_settles_with_the_first_completion() {
    let race = Promise::race(vec![delayed(200, 1), delayed(30, 2)]);
    assert_eq!(block_on(race.clone()), Ok(2));
}

#[test]
fn cancelling_a_chain_rejects_every_pending_link() {
    let (root, _settler) = Promise::deferred(inline());
    let derived = root.then(|value: i32| value + 1);
    let tail = derived.then(|value| value * 2);

    // Cancelling from the middle reaches the whole chain through the
    // shared context.
    derived.cancel();

    assert_eq!(root.error(), Some(Error::Cancelled));
    assert_eq!(derived.error(), Some(Error::Cancelled));
    assert_eq!(tail.error(), Some(Error::Cancelled));
}

#[test]
fn cancelling_a_settled_chain_has_no_observable_effect() {
    let promise = Promise::resolve(5);
    let derived = promise.then(|value| value + 1);
    promise.cancel();
    assert_eq!(promise.value(), Some(5));
    assert_eq!(derived.value(), Some(6));
}

#[test]
fn cancellation_reaches_an_adopted_inner_promise() {
    let (inner, _settler) = Promise::<i32>::deferred(inline());
    let inner_handle = inner.clone();
    let outer = Promise::resolve(1).and_then(move |_| inner);
    assert!(outer.is_pending());

    outer.cancel();
    assert_eq!(inner_handle.error(), Some(Error::Cancelled));
    assert_eq!(outer.error(), Some(Error::Cancelled));
}

#[test]
fn independent_roots_do_not_share_cancellation() {
    let (first, _a) = Promise::<i32>::deferred(inline());
    let (second, settler) = Promise::<i32>::deferred(inline());
    first.cancel();
    assert!(second.is_pending());
    settler.resolve(1);
    assert_eq!(second.value(), Some(1));
}

#[test]
fn concurrent_subscribers_each_fire_exactly_once() {
    let (promise, settler) = Promise::deferred(inline());
    let fired = Arc::new(AtomicUsize::new(0));

    let mut attachers: Vec<_> = (0..8)
        .map(|_| {
            let promise = promise.clone();
            let fired = fired.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let counter = fired.clone();
                    promise.subscribe(
                        move |_| {
                            counter.fetch_add(1, Ordering::SeqCst);
                        },
                        |_| {},
                    );
                }
            })
        })
        .collect();
    attachers.push(thread::spawn(move || settler.resolve(1)));

    for handle in attachers {
        handle.join().expect("attacher thread panicked");
    }
    // Inline continuations run either during subscribe (already settled)
    // or during resolve (drained queue), so by now every one has fired.
    assert_eq!(fired.load(Ordering::SeqCst), 800);
}

#[test]
fn awaiting_a_promise_yields_its_settlement() {
    let promise = delayed(30, 42);
    assert_eq!(block_on(promise.clone()), Ok(42));
    // A second await replays the settled state.
    assert_eq!(block_on(promise), Ok(42));

    let rejected: Promise<i32> = Promise::with(inline(), |settler| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            settler.reject(Error::failure("late failure"));
        });
    });
    assert_eq!(block_on(rejected), Err(Error::failure("late failure")));
}

#[test]
fn default_construction_runs_the_executor_off_thread() {
    let promise = Promise::new(|settler| {
        thread::sleep(Duration::from_millis(20));
        settler.resolve(5);
    });
    assert_eq!(block_on(promise), Ok(5));
}
