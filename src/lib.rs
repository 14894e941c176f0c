//! Lane-serialized promises.
//!
//! A [`Promise`] is a single-assignment asynchronous result cell: it settles
//! exactly once, with a success or a failure, and delivers that outcome to
//! every observer in registration order. All state transitions for one
//! promise run on its [`Lane`], a serialized work queue, so settlement is
//! race-free even with many concurrent producers.
//!
//! Combinators build new promises out of old ones without blocking: a
//! failure flows untouched through every `then` until a `catch` handles it,
//! a handler may itself return a promise (which is flattened into the
//! chain), and [`Promise::all`] joins many promises into one.
//!
//! # Examples
//!
//! ```
//! use promise_lane::Promise;
//! use std::time::Duration;
//!
//! let p = Promise::<i32, String>::new(|settle| settle.resolve(20))
//!     .then(|n| n + 1)
//!     .then(|n| n * 2);
//! assert_eq!(p.wait_timeout(Duration::from_secs(1)), Ok(Ok(42)));
//! ```

mod all;
mod chain;
pub mod lane;
mod promise;

use std::time::Duration;

use thiserror::Error;

pub use either::Either;
pub use lane::{default_lane, Lane};
pub use promise::{OutcomeFuture, Promise, Settle};

/// Failure modes of [`Promise::wait_timeout`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The promise had not settled when the deadline passed. It may still
    /// settle later; waiting is only an observation.
    #[error("timed out after {0:?} waiting for settlement")]
    Timeout(Duration),
    /// The promise's lane worker exited before delivering the outcome.
    #[error("lane worker exited before settlement")]
    LaneGone,
}
