//! Bounded concurrency for async invocations.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{FlowgateError, Result};

/// Jobs waiting for a slot, plus how many are running.
struct Shared {
    active: usize,
    queue: VecDeque<BoxFuture<'static, ()>>,
}

/// Runs submitted futures with at most `limit` in flight.
///
/// Jobs under the limit are spawned the moment they are submitted;
/// the rest wait in a FIFO queue and start strictly in submission
/// order as running jobs settle. Every submitted job eventually runs.
/// A job failing (or panicking) releases its slot like any other
/// completion and does not disturb the jobs queued behind it.
///
/// Cloning is cheap; clones share the limit, the queue, and the
/// active count.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    limit: usize,
    shared: Arc<Mutex<Shared>>,
}

impl ConcurrencyLimiter {
    /// Create a limiter allowing `limit` concurrent jobs. A limit of 0
    /// would leave every submission unstartable, so it is raised to 1.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            shared: Arc::new(Mutex::new(Shared {
                active: 0,
                queue: VecDeque::new(),
            })),
        }
    }

    /// Submit a job, returning a [`Ticket`] resolving to its output.
    ///
    /// The job's own output passes through unchanged, so a job
    /// returning `Result` arrives as `Ok(Err(_))` on failure and
    /// remains distinguishable from the ticket's own error. Dropping
    /// the ticket does not cancel the job.
    pub fn submit<F, T>(&self, future: F) -> Ticket<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: BoxFuture<'static, ()> = async move {
            let value = future.await;
            // The submitter may have dropped the ticket; the job still
            // counts as complete.
            let _ = result_tx.send(value);
        }
        .boxed();

        let mut state = self.shared.lock();
        if state.active < self.limit {
            state.active += 1;
            drop(state);
            trace!("slot free, starting job");
            spawn_job(Arc::clone(&self.shared), job);
        } else {
            state.queue.push_back(job);
            debug!(queued = state.queue.len(), "limit reached, job queued");
        }
        Ticket { rx: result_rx }
    }

    /// Number of jobs currently running.
    pub fn active(&self) -> usize {
        self.shared.lock().active
    }

    /// Number of jobs waiting for a slot.
    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// The concurrency limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

fn spawn_job(shared: Arc<Mutex<Shared>>, job: BoxFuture<'static, ()>) {
    tokio::spawn(async move {
        let _slot = SlotGuard { shared };
        job.await;
    });
}

/// Releases the job's slot on completion. Runs on drop so a panicking
/// job still frees its slot and the queue keeps draining.
struct SlotGuard {
    shared: Arc<Mutex<Shared>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let next = {
            let mut state = self.shared.lock();
            match state.queue.pop_front() {
                // The slot is handed straight to the next queued job;
                // the active count carries over.
                Some(job) => Some(job),
                None => {
                    state.active -= 1;
                    None
                }
            }
        };
        if let Some(job) = next {
            trace!("job settled, starting next queued job");
            spawn_job(Arc::clone(&self.shared), job);
        }
    }
}

/// Deferred result of a submitted job.
///
/// Resolves to the job's output, or [`FlowgateError::Interrupted`]
/// when the job's executor went away (runtime shutdown, or the job
/// panicked) before a result was produced.
#[must_use = "tickets do nothing unless awaited"]
pub struct Ticket<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Ticket<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(FlowgateError::Interrupted)),
            Poll::Pending => Poll::Pending,
        }
    }
}
