//! Tokio-driven debounce worker.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::debounce::{DebounceSettings, Debouncer};

/// Commands accepted by the worker task.
enum Command<A, R> {
    Call(A),
    Cancel,
    Flush(oneshot::Sender<Option<R>>),
    Pending(oneshot::Sender<bool>),
}

/// Handle to a debouncer running on its own tokio task.
///
/// The worker owns the wrapped function and its [`Debouncer`] state;
/// it sleeps until the trailing deadline and fires the edge itself, so
/// the host never has to pump [`Debouncer::tick`]. Handles are cheap
/// to clone and every clone addresses the same worker.
///
/// When the last handle is dropped the worker stops and any pending
/// trailing invocation is discarded; call [`flush`](Self::flush) first
/// if the final invocation matters.
pub struct DebounceHandle<A, R> {
    tx: mpsc::UnboundedSender<Command<A, R>>,
}

impl<A, R> Clone for DebounceHandle<A, R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<A, R> DebounceHandle<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Move `func` into a background worker debouncing with `settings`.
    pub fn spawn<F>(func: F, settings: DebounceSettings) -> Self
    where
        F: FnMut(A) -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(Debouncer::new(func, settings), rx));
        Self { tx }
    }

    /// Move `func` into a background worker throttled to one
    /// invocation per `limit`.
    pub fn spawn_throttled<F>(func: F, limit: Duration) -> Self
    where
        F: FnMut(A) -> R + Send + 'static,
    {
        Self::spawn(func, DebounceSettings::throttle(limit))
    }

    /// Record a call. Results of immediate (leading or max-wait)
    /// invocations are discarded; use the synchronous [`Debouncer`]
    /// directly if return values matter.
    pub fn call(&self, args: A) {
        let _ = self.tx.send(Command::Call(args));
    }

    /// Discard any pending trailing invocation.
    pub fn cancel(&self) {
        let _ = self.tx.send(Command::Cancel);
    }

    /// Force the pending trailing invocation to run now, returning its
    /// result. Returns `None` when nothing was pending or the worker
    /// is gone.
    pub async fn flush(&self) -> Option<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(reply_tx)).is_err() {
            return None;
        }
        reply_rx.await.unwrap_or(None)
    }

    /// Whether a trailing invocation is currently scheduled. Returns
    /// `false` when the worker is gone.
    pub async fn pending(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Command::Pending(reply_tx)).is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }
}

/// Worker loop: race the command channel against the trailing-edge
/// timer. With no deadline armed the timer branch never completes.
async fn run<F, A, R>(
    mut debouncer: Debouncer<F, A>,
    mut rx: mpsc::UnboundedReceiver<Command<A, R>>,
) where
    F: FnMut(A) -> R,
{
    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Call(args)) => {
                    let _ = debouncer.call(args);
                }
                Some(Command::Cancel) => debouncer.cancel(),
                Some(Command::Flush(reply)) => {
                    let _ = reply.send(debouncer.flush());
                }
                Some(Command::Pending(reply)) => {
                    let _ = reply.send(debouncer.pending());
                }
                None => {
                    debug!("all handles dropped, stopping debounce worker");
                    break;
                }
            },
            _ = sleep_until_or_forever(deadline) => {
                let _ = debouncer.tick();
            }
        }
    }
}

async fn sleep_until_or_forever(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
