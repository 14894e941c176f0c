//! The promise cell: a single-assignment asynchronous result container.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::lane::{default_lane, Lane};
use crate::WaitError;

type Continuation<T, E> = Box<dyn FnOnce(Result<T, E>) + Send + 'static>;

enum State<T, E> {
    Pending(Vec<Continuation<T, E>>),
    Settled(Result<T, E>),
}

type Cell<T, E> = Arc<Mutex<State<T, E>>>;

/// A single-assignment asynchronous result cell.
///
/// A `Promise` settles at most once, with either a success of type `T` or a
/// failure of type `E`; later settlement attempts are silently ignored.
/// Observers attached before settlement receive the outcome in registration
/// order; observers attached afterwards receive it immediately. All of this
/// bookkeeping runs on the promise's [`Lane`], never on the caller's thread.
///
/// Cloning a `Promise` yields another handle to the same cell.
///
/// # Examples
///
/// ```
/// use promise_lane::Promise;
/// use std::time::Duration;
///
/// let p = Promise::<i32, String>::new(|settle| settle.resolve(21)).then(|n| n * 2);
/// assert_eq!(p.wait_timeout(Duration::from_secs(1)), Ok(Ok(42)));
/// ```
pub struct Promise<T, E> {
    cell: Cell<T, E>,
    pub(crate) lane: Lane,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            lane: self.lane.clone(),
        }
    }
}

/// The settlement capability handed to a producer.
///
/// Cloneable so a producer can fan it out to several callbacks; whichever
/// settlement arrives at the lane first wins, the rest are no-ops.
pub struct Settle<T, E> {
    cell: Cell<T, E>,
    lane: Lane,
}

impl<T, E> Clone for Settle<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            lane: self.lane.clone(),
        }
    }
}

impl<T, E> Settle<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(&self, error: E) {
        self.settle(Err(error));
    }

    /// Records the outcome and drains the continuation queue, in FIFO order.
    /// A no-op if the cell is already settled.
    pub fn settle(&self, outcome: Result<T, E>) {
        let cell = Arc::clone(&self.cell);
        self.lane.schedule(move || {
            let mut state = cell.lock().unwrap();
            let waiting = match &mut *state {
                State::Settled(_) => {
                    tracing::trace!("settlement ignored: cell already settled");
                    return;
                }
                State::Pending(continuations) => std::mem::take(continuations),
            };
            *state = State::Settled(outcome.clone());
            drop(state);
            tracing::trace!(observers = waiting.len(), "promise settled");
            for continuation in waiting {
                continuation(outcome.clone());
            }
        });
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a pending promise on the default lane and schedules
    /// `producer` onto it with the [`Settle`] capability.
    ///
    /// A producer that never settles leaves a valid promise that simply
    /// never fires its observers.
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce(Settle<T, E>) + Send + 'static,
    {
        Self::new_on(default_lane(), producer)
    }

    /// Same as [`Promise::new`], on an explicit lane.
    pub fn new_on<F>(lane: Lane, producer: F) -> Self
    where
        F: FnOnce(Settle<T, E>) + Send + 'static,
    {
        let cell: Cell<T, E> = Arc::new(Mutex::new(State::Pending(Vec::new())));
        let settle = Settle {
            cell: Arc::clone(&cell),
            lane: lane.clone(),
        };
        lane.schedule(move || producer(settle));
        Promise { cell, lane }
    }

    /// An immediately-successful promise.
    ///
    /// ```
    /// use promise_lane::Promise;
    /// use std::time::Duration;
    ///
    /// let p = Promise::<i32, String>::resolve(7);
    /// assert_eq!(p.wait_timeout(Duration::from_secs(1)), Ok(Ok(7)));
    /// ```
    pub fn resolve(value: T) -> Self {
        Self::resolve_on(default_lane(), value)
    }

    pub fn resolve_on(lane: Lane, value: T) -> Self {
        Self::new_on(lane, move |settle| settle.resolve(value))
    }

    /// An immediately-failed promise.
    pub fn reject(error: E) -> Self {
        Self::reject_on(default_lane(), error)
    }

    pub fn reject_on(lane: Lane, error: E) -> Self {
        Self::new_on(lane, move |settle| settle.reject(error))
    }

    /// The lane that owns this promise's state. Combinator children are
    /// created on the same lane.
    pub fn lane(&self) -> &Lane {
        &self.lane
    }

    /// Registers a continuation. Invoked immediately (still via the lane)
    /// if the cell has already settled, otherwise queued in FIFO order.
    pub(crate) fn observe<F>(&self, continuation: F)
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        let cell = Arc::clone(&self.cell);
        self.lane.schedule(move || {
            let mut state = cell.lock().unwrap();
            match &mut *state {
                State::Settled(outcome) => {
                    let outcome = outcome.clone();
                    drop(state);
                    continuation(outcome);
                }
                State::Pending(continuations) => continuations.push(Box::new(continuation)),
            }
        });
    }

    /// Blocks the calling thread until the promise settles or the deadline
    /// passes. Intended for tests and the synchronous edges of a program;
    /// everything else should chain combinators or await [`Promise::outcome`].
    ///
    /// Waiting is only an observation: a timed-out promise may still settle
    /// later, and repeated waits on a settled promise keep returning the
    /// recorded outcome. Must not be called from this promise's own lane,
    /// where it would stall the worker until the deadline.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Result<T, E>, WaitError> {
        let (tx, rx) = bounded(1);
        self.observe(move |outcome| {
            let _ = tx.send(outcome);
        });
        match rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(outcome),
            Err(RecvTimeoutError::Timeout) => Err(WaitError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(WaitError::LaneGone),
        }
    }

    /// A future that resolves with this promise's outcome.
    ///
    /// ```
    /// use futures::executor::block_on;
    /// use promise_lane::Promise;
    ///
    /// let p = Promise::<i32, String>::resolve(6).then(|n| n * 7);
    /// assert_eq!(block_on(p.outcome()), Ok(42));
    /// ```
    pub fn outcome(&self) -> OutcomeFuture<T, E> {
        let shared = Arc::new(Mutex::new(Waiting {
            outcome: None,
            waker: None,
        }));
        let slot = Arc::clone(&shared);
        self.observe(move |outcome| {
            let mut waiting = slot.lock().unwrap();
            waiting.outcome = Some(outcome);
            if let Some(waker) = waiting.waker.take() {
                waker.wake();
            }
        });
        OutcomeFuture { shared }
    }
}

struct Waiting<T, E> {
    outcome: Option<Result<T, E>>,
    waker: Option<Waker>,
}

/// Future returned by [`Promise::outcome`].
pub struct OutcomeFuture<T, E> {
    shared: Arc<Mutex<Waiting<T, E>>>,
}

impl<T, E> Future for OutcomeFuture<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut waiting = self.shared.lock().unwrap();
        match waiting.outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                waiting.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
