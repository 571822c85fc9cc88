//! Fire-and-forget execution of observer callbacks.
//!
//! The store never waits for observers. Every callback invocation runs as
//! its own job, unordered with respect to every other job, and a panic
//! inside one job is caught and logged without touching the store or any
//! other watch.

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{Sender, unbounded};

/// Workers used when the machine's parallelism cannot be queried.
const FALLBACK_WORKERS: usize = 4;

/// A queued callback invocation.
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where observer callbacks run.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Dispatcher {
    /// A fixed set of worker threads draining a shared queue.
    ///
    /// A callback that blocks forever occupies one worker for good.
    Workers(WorkerPool),

    /// One short-lived OS thread per callback invocation.
    Thread,

    /// Blocking tasks on a tokio runtime.
    #[cfg(feature = "async")]
    Tokio(tokio::runtime::Handle),
}

impl Default for Dispatcher {
    /// A worker pool sized to the available parallelism.
    fn default() -> Self {
        let count = thread::available_parallelism().map_or(FALLBACK_WORKERS, NonZeroUsize::get);
        Self::workers(count)
    }
}

impl Dispatcher {
    /// Dispatcher backed by `count` worker threads (at least one).
    ///
    /// Falls back to [`Dispatcher::Thread`] if no worker could be spawned.
    #[must_use]
    pub fn workers(count: usize) -> Self {
        WorkerPool::spawn(count).map_or(Self::Thread, Self::Workers)
    }

    /// Dispatcher bound to the tokio runtime of the calling context.
    ///
    /// Returns `None` outside of a runtime.
    #[cfg(feature = "async")]
    #[must_use]
    pub fn current_tokio() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::Tokio)
    }

    /// Runs `job` without waiting for it.
    pub(crate) fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Workers(pool) => pool.submit(Box::new(job)),

            Self::Thread => {
                let spawned = thread::Builder::new()
                    .name("confwatch-notify".to_string())
                    .spawn(move || run_contained(job));
                if let Err(e) = spawned {
                    tracing::warn!(error = %e, "failed to spawn observer thread, callback dropped");
                }
            }

            #[cfg(feature = "async")]
            Self::Tokio(handle) => {
                drop(handle.spawn_blocking(move || run_contained(job)));
            }
        }
    }
}

/// Worker threads shared by every clone of a [`Dispatcher::Workers`].
///
/// The workers exit once the last clone is dropped and the queue drains.
#[derive(Clone)]
pub struct WorkerPool {
    queue: Sender<Job>,
    size: usize,
}

impl WorkerPool {
    fn spawn(count: usize) -> Option<Self> {
        let (queue, jobs) = unbounded::<Job>();
        let mut size = 0;

        for index in 0..count.max(1) {
            let jobs = jobs.clone();
            let spawned = thread::Builder::new()
                .name(format!("confwatch-worker-{index}"))
                .spawn(move || {
                    for job in jobs {
                        run_contained(job);
                    }
                });
            match spawned {
                Ok(_) => size += 1,
                Err(e) => tracing::warn!(error = %e, "failed to spawn observer worker"),
            }
        }

        if size == 0 {
            tracing::error!("no observer worker could be spawned, using a thread per callback");
            return None;
        }
        tracing::debug!(workers = size, "observer worker pool started");
        Some(Self { queue, size })
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    fn submit(&self, job: Job) {
        if self.queue.send(job).is_err() {
            tracing::warn!("observer workers are gone, callback dropped");
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("queued", &self.queue.len())
            .finish()
    }
}

/// Runs a callback, turning a panic into a log line.
fn run_contained<F: FnOnce()>(job: F) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::warn!(panic = %message, "observer callback panicked");
    }
}
