//! Joining many promises into one.

use std::sync::{Arc, Mutex};

use crate::lane::{default_lane, Lane};
use crate::promise::Promise;

/// Per-index result slots plus the countdown to completion. Mutated only in
/// jobs scheduled on the output promise's lane, so two inputs completing at
/// the same instant cannot lose an update.
struct Gather<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Joins a sequence of promises into one that succeeds with the
    /// per-index results once every input has succeeded, or fails with the
    /// first error to arrive (arrival order, not input order). Later
    /// settlements from the remaining inputs are absorbed by the output's
    /// settle-once behavior. An empty input resolves immediately with an
    /// empty `Vec`.
    ///
    /// ```
    /// use promise_lane::Promise;
    /// use std::time::Duration;
    ///
    /// let inputs = vec![Promise::<i32, String>::resolve(1), Promise::resolve(2)];
    /// let joined = Promise::all(inputs);
    /// assert_eq!(joined.wait_timeout(Duration::from_secs(1)), Ok(Ok(vec![1, 2])));
    /// ```
    pub fn all(promises: Vec<Promise<T, E>>) -> Promise<Vec<T>, E> {
        Self::all_on(default_lane(), promises)
    }

    /// Same as [`Promise::all`], with the output promise on an explicit lane.
    pub fn all_on(lane: Lane, promises: Vec<Promise<T, E>>) -> Promise<Vec<T>, E> {
        let slot_lane = lane.clone();
        Promise::new_on(lane, move |settle| {
            if promises.is_empty() {
                settle.resolve(Vec::new());
                return;
            }
            let gather = Arc::new(Mutex::new(Gather {
                slots: vec![None; promises.len()],
                remaining: promises.len(),
            }));
            for (index, input) in promises.into_iter().enumerate() {
                let gather = Arc::clone(&gather);
                let resolve = settle.clone();
                let reject = settle.clone();
                let lane = slot_lane.clone();
                input
                    .then(move |value| {
                        lane.schedule(move || {
                            let mut gather = gather.lock().unwrap();
                            gather.slots[index] = Some(value);
                            gather.remaining -= 1;
                            if gather.remaining == 0 {
                                let values =
                                    std::mem::take(&mut gather.slots).into_iter().flatten().collect();
                                resolve.resolve(values);
                            }
                        });
                    })
                    .catch(move |error| {
                        reject.reject(error);
                    });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::bounded;

    use crate::lane::Lane;
    use crate::promise::Promise;

    const TICK: Duration = Duration::from_secs(5);

    #[test]
    fn results_are_index_ordered_even_when_inputs_settle_out_of_order() {
        let (gate_tx, gate_rx) = bounded::<()>(1);
        let slow = Promise::<i32, String>::new_on(Lane::new("slow-input"), move |settle| {
            let _ = gate_rx.recv_timeout(Duration::from_secs(5));
            settle.resolve(1);
        });
        let fast = Promise::<i32, String>::resolve(2);
        let faster = Promise::<i32, String>::resolve(3);
        let joined = Promise::all(vec![slow, fast.clone(), faster.clone()]);
        // make sure the later-indexed inputs land first
        assert_eq!(fast.wait_timeout(TICK), Ok(Ok(2)));
        assert_eq!(faster.wait_timeout(TICK), Ok(Ok(3)));
        gate_tx.send(()).unwrap();
        assert_eq!(joined.wait_timeout(TICK), Ok(Ok(vec![1, 2, 3])));
    }

    #[test]
    fn first_failure_rejects_the_join() {
        let joined = Promise::all(vec![
            Promise::<i32, String>::resolve(1),
            Promise::reject("broken".into()),
            Promise::resolve(3),
        ]);
        assert_eq!(joined.wait_timeout(TICK), Ok(Err("broken".to_string())));
    }

    #[test]
    fn successes_after_a_failure_are_absorbed() {
        let (gate_tx, gate_rx) = bounded::<()>(1);
        let late_success = Promise::<i32, String>::new_on(Lane::new("late-ok"), move |settle| {
            let _ = gate_rx.recv_timeout(Duration::from_secs(5));
            settle.resolve(10);
        });
        let failure = Promise::<i32, String>::reject("early".into());
        let joined = Promise::all(vec![late_success, failure]);
        assert_eq!(joined.wait_timeout(TICK), Ok(Err("early".to_string())));
        gate_tx.send(()).unwrap();
        // the join is already settled; the late success cannot change it
        assert_eq!(joined.wait_timeout(TICK), Ok(Err("early".to_string())));
    }

    #[test]
    fn empty_input_resolves_to_an_empty_vec() {
        let joined = Promise::<i32, String>::all(Vec::new());
        assert_eq!(joined.wait_timeout(TICK), Ok(Ok(Vec::new())));
    }
}
