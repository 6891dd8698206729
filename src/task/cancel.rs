//! Settlement-time cooperative cancellation.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tracing::debug;

use crate::error::{FlowgateError, Result};

/// Wrap `future` so its eventual result can be suppressed.
///
/// Returns the wrapped future and a handle whose
/// [`cancel`](CancelHandle::cancel) flags the operation as canceled.
/// The flag is checked when the inner future settles, not when
/// `cancel` is called: a canceled-then-settled operation delivers
/// [`FlowgateError::Canceled`] and its settled value is discarded,
/// while an operation that settled before the flag was checked at
/// delivery is unaffected. Cancellation never interrupts the inner
/// future mid-flight; it only suppresses delivery.
///
/// An inner future returning `Result` arrives as `Ok(Err(_))` on
/// failure, so underlying failure and cancellation stay
/// distinguishable.
pub fn cancelable<F: Future>(future: F) -> (Cancelable<F>, CancelHandle) {
    let flag = Arc::new(AtomicBool::new(false));
    (
        Cancelable {
            inner: Box::pin(future),
            flag: Arc::clone(&flag),
        },
        CancelHandle { flag },
    )
}

/// Flags a [`Cancelable`] operation as canceled.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Set the cancellation flag. Idempotent; calling again has no
    /// further effect.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            debug!("cancellation requested");
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A future whose settled value is replaced by
/// [`FlowgateError::Canceled`] when its [`CancelHandle`] was used
/// before delivery.
#[must_use = "futures do nothing unless awaited"]
pub struct Cancelable<F> {
    inner: Pin<Box<F>>,
    flag: Arc<AtomicBool>,
}

impl<F: Future> Future for Cancelable<F> {
    type Output = Result<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.inner.as_mut().poll(cx) {
            Poll::Ready(output) => {
                // Flag check at delivery: the settled value is
                // discarded if a cancel beat it here.
                if this.flag.load(Ordering::SeqCst) {
                    debug!("settled after cancellation, discarding result");
                    Poll::Ready(Err(FlowgateError::Canceled))
                } else {
                    Poll::Ready(Ok(output))
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
