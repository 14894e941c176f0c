//! The combinator algebra: `bind` and the `then`/`catch`/`fold` families.
//!
//! Everything here reduces to `bind`, whose transform maps an outcome to an
//! [`Either`]: `Left` carries an immediate value, `Right` a further promise
//! whose own outcome is adopted. The `then` variants leave the failure
//! branch untouched and the `catch` variants leave the success branch
//! untouched, which is why a failure flows through every intervening `then`
//! until something handles it.

use either::Either;

use crate::promise::Promise;

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// The generic composition primitive. Returns a new promise on this
    /// promise's lane; when the source settles, `transform` runs and either
    /// resolves the child directly (`Left`) or forwards the eventual outcome
    /// of a sub-promise into it (`Right`). The forwarding is recursive, so
    /// "promise of a promise" is always flattened.
    pub(crate) fn bind<S, F>(&self, transform: F) -> Promise<S, E>
    where
        S: Clone + Send + 'static,
        F: FnOnce(Result<T, E>) -> Either<S, Promise<S, E>> + Send + 'static,
    {
        let source = self.clone();
        Promise::new_on(self.lane.clone(), move |settle| {
            source.observe(move |outcome| match transform(outcome) {
                Either::Left(value) => settle.resolve(value),
                Either::Right(chained) => chained.observe(move |inner| settle.settle(inner)),
            });
        })
    }

    /// Maps a success value; a failure passes through unchanged.
    ///
    /// ```
    /// use promise_lane::Promise;
    /// use std::time::Duration;
    ///
    /// let p = Promise::<i32, String>::resolve(2).then(|n| n * 10);
    /// assert_eq!(p.wait_timeout(Duration::from_secs(1)), Ok(Ok(20)));
    /// ```
    pub fn then<S, F>(&self, on_value: F) -> Promise<S, E>
    where
        S: Clone + Send + 'static,
        F: FnOnce(T) -> S + Send + 'static,
    {
        self.then_either(move |value| Either::Left(on_value(value)))
    }

    /// Like [`Promise::then`], for handlers that produce another promise.
    /// The result mirrors the inner promise's eventual outcome.
    pub fn then_promise<S, F>(&self, on_value: F) -> Promise<S, E>
    where
        S: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<S, E> + Send + 'static,
    {
        self.then_either(move |value| Either::Right(on_value(value)))
    }

    /// Like [`Promise::then`], for handlers that decide per call between an
    /// immediate value and a further promise.
    pub fn then_either<S, F>(&self, on_value: F) -> Promise<S, E>
    where
        S: Clone + Send + 'static,
        F: FnOnce(T) -> Either<S, Promise<S, E>> + Send + 'static,
    {
        let lane = self.lane.clone();
        self.bind(move |outcome| match outcome {
            Ok(value) => on_value(value),
            Err(error) => Either::Right(Promise::reject_on(lane, error)),
        })
    }

    /// Handles a failure, producing a replacement success value; a success
    /// passes through unchanged.
    ///
    /// ```
    /// use promise_lane::Promise;
    /// use std::time::Duration;
    ///
    /// let p = Promise::<i32, String>::reject("oops".into()).catch(|_| 0);
    /// assert_eq!(p.wait_timeout(Duration::from_secs(1)), Ok(Ok(0)));
    /// ```
    pub fn catch<F>(&self, on_error: F) -> Promise<T, E>
    where
        F: FnOnce(E) -> T + Send + 'static,
    {
        self.catch_either(move |error| Either::Left(on_error(error)))
    }

    /// Like [`Promise::catch`], for handlers that produce another promise.
    /// The handler may recover or settle with a new failure.
    pub fn catch_promise<F>(&self, on_error: F) -> Promise<T, E>
    where
        F: FnOnce(E) -> Promise<T, E> + Send + 'static,
    {
        self.catch_either(move |error| Either::Right(on_error(error)))
    }

    /// Like [`Promise::catch`], for handlers that decide per call between an
    /// immediate value and a further promise.
    pub fn catch_either<F>(&self, on_error: F) -> Promise<T, E>
    where
        F: FnOnce(E) -> Either<T, Promise<T, E>> + Send + 'static,
    {
        self.bind(move |outcome| match outcome {
            Ok(value) => Either::Left(value),
            Err(error) => on_error(error),
        })
    }

    /// Handles both branches in one step, mapping either into a new success
    /// type.
    pub fn fold<S, F, G>(&self, on_value: F, on_error: G) -> Promise<S, E>
    where
        S: Clone + Send + 'static,
        F: FnOnce(T) -> S + Send + 'static,
        G: FnOnce(E) -> S + Send + 'static,
    {
        self.bind(move |outcome| Either::Left(outcome.map_or_else(on_error, on_value)))
    }

    /// Like [`Promise::fold`], for handlers that produce promises.
    pub fn fold_promise<S, F, G>(&self, on_value: F, on_error: G) -> Promise<S, E>
    where
        S: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<S, E> + Send + 'static,
        G: FnOnce(E) -> Promise<S, E> + Send + 'static,
    {
        self.bind(move |outcome| {
            Either::Right(match outcome {
                Ok(value) => on_value(value),
                Err(error) => on_error(error),
            })
        })
    }

    /// Like [`Promise::fold`], for handlers that decide per call between an
    /// immediate value and a further promise.
    pub fn fold_either<S, F, G>(&self, on_value: F, on_error: G) -> Promise<S, E>
    where
        S: Clone + Send + 'static,
        F: FnOnce(T) -> Either<S, Promise<S, E>> + Send + 'static,
        G: FnOnce(E) -> Either<S, Promise<S, E>> + Send + 'static,
    {
        self.bind(move |outcome| match outcome {
            Ok(value) => on_value(value),
            Err(error) => on_error(error),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use either::Either;

    use crate::lane::Lane;
    use crate::promise::Promise;

    const TICK: Duration = Duration::from_secs(1);

    #[test]
    fn then_maps_the_success_value() {
        let p = Promise::<i32, String>::resolve(4).then(|n| n * 3);
        assert_eq!(p.wait_timeout(TICK), Ok(Ok(12)));
    }

    #[test]
    fn a_failure_skips_then_handlers_until_a_catch() {
        let touched = Arc::new(AtomicUsize::new(0));
        let (t1, t2) = (touched.clone(), touched.clone());
        let p = Promise::<i32, String>::reject("upstream".into())
            .then(move |n| {
                t1.fetch_add(1, Ordering::SeqCst);
                n + 1
            })
            .then(move |n| {
                t2.fetch_add(1, Ordering::SeqCst);
                n * 2
            })
            .catch(|e| e.len() as i32);
        assert_eq!(p.wait_timeout(TICK), Ok(Ok(8)));
        assert_eq!(touched.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn a_success_passes_through_catch_untouched() {
        let p = Promise::<i32, String>::resolve(5).catch(|_| 0);
        assert_eq!(p.wait_timeout(TICK), Ok(Ok(5)));
    }

    #[test]
    fn then_promise_flattens_to_the_inner_outcome() {
        let inner = Lane::new("inner");
        let p = Promise::<i32, String>::resolve(3)
            .then_promise(move |n| Promise::new_on(inner, move |settle| settle.resolve(n * 10)));
        assert_eq!(p.wait_timeout(TICK), Ok(Ok(30)));
    }

    #[test]
    fn then_promise_forwards_an_inner_failure() {
        let p = Promise::<i32, String>::resolve(1)
            .then_promise(|_| Promise::<i32, String>::reject("inner failure".into()));
        assert_eq!(p.wait_timeout(TICK), Ok(Err("inner failure".to_string())));
    }

    #[test]
    fn nested_chains_stay_flat() {
        let p = Promise::<i32, String>::resolve(1)
            .then_promise(|n| Promise::resolve(n + 1).then_promise(|m| Promise::resolve(m + 1)));
        assert_eq!(p.wait_timeout(TICK), Ok(Ok(3)));
    }

    #[test]
    fn catch_promise_recovers_with_a_new_promise() {
        let p = Promise::<i32, String>::reject("gone".into()).catch_promise(|_| Promise::resolve(99));
        assert_eq!(p.wait_timeout(TICK), Ok(Ok(99)));
    }

    #[test]
    fn catch_may_substitute_a_different_failure() {
        let p = Promise::<i32, String>::reject("raw".into())
            .catch_promise(|e| Promise::reject(format!("wrapped: {e}")));
        assert_eq!(p.wait_timeout(TICK), Ok(Err("wrapped: raw".to_string())));
    }

    #[test]
    fn then_either_chooses_between_value_and_promise() {
        let split = |n: i32| {
            if n % 2 == 0 {
                Either::Left(n)
            } else {
                Either::Right(Promise::resolve(n * 10))
            }
        };
        let even = Promise::<i32, String>::resolve(2).then_either(split);
        let odd = Promise::<i32, String>::resolve(3).then_either(split);
        assert_eq!(even.wait_timeout(TICK), Ok(Ok(2)));
        assert_eq!(odd.wait_timeout(TICK), Ok(Ok(30)));
    }

    #[test]
    fn fold_handles_both_branches_into_one_type() {
        let ok = Promise::<i32, String>::resolve(2).fold(|n| format!("ok {n}"), |e| format!("err {e}"));
        let err =
            Promise::<i32, String>::reject("x".into()).fold(|n| format!("ok {n}"), |e| format!("err {e}"));
        assert_eq!(ok.wait_timeout(TICK), Ok(Ok("ok 2".to_string())));
        assert_eq!(err.wait_timeout(TICK), Ok(Ok("err x".to_string())));
    }

    #[test]
    fn children_inherit_the_parent_lane() {
        let lane = Lane::new("inherited");
        let p = Promise::<i32, ()>::resolve_on(lane, 1);
        let child = p.then(|n| n + 1).catch(|_| 0);
        assert_eq!(child.lane().label(), "inherited");
    }
}
