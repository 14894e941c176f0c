//! Serialized execution lanes.
//!
//! A [`Lane`] is a logical work queue backed by one dedicated worker thread:
//! jobs scheduled on the same lane run one at a time, in submission order,
//! while jobs on different lanes run concurrently. Each promise pins its
//! bookkeeping to a lane, which is what makes settlement race-free without
//! locking at the call sites.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::thread;

use crossbeam_channel::{unbounded, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a serialized work queue.
///
/// Cloning yields another handle to the same queue. The worker thread exits
/// once every handle has been dropped and the queue has drained.
#[derive(Clone)]
pub struct Lane {
    jobs: Sender<Job>,
    label: Arc<str>,
}

impl Lane {
    /// Spawns a lane with its own worker thread, named `lane-<label>`.
    pub fn new(label: &str) -> Self {
        let (jobs, inbox) = unbounded::<Job>();
        thread::Builder::new()
            .name(format!("lane-{label}"))
            .spawn(move || {
                for job in inbox {
                    job();
                }
            })
            .expect("failed to spawn lane worker thread");
        Lane {
            jobs,
            label: label.into(),
        }
    }

    /// Submits a unit of work. Returns as soon as the job is queued; the job
    /// runs on the lane's worker thread after everything queued before it.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.jobs.send(Box::new(job)).is_err() {
            // The worker is gone, which only happens after a job panicked.
            tracing::warn!(lane = %self.label, "dropping job: lane worker has exited");
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lane").field("label", &self.label).finish()
    }
}

/// The process-wide default lane, constructed on first use. Constructors
/// that take no explicit lane land here; pass a [`Lane`] to the `_on`
/// variants to override it.
pub fn default_lane() -> Lane {
    static DEFAULT: OnceLock<Lane> = OnceLock::new();
    DEFAULT.get_or_init(|| Lane::new("default")).clone()
}
