//! Throttling as a specialization of the debounce core.

use std::time::{Duration, Instant};

use super::debounce::{DebounceSettings, Debouncer};

/// Caps a wrapped function at one invocation per interval.
///
/// A throttler is a debouncer with both edges enabled and `max_wait`
/// pinned to the interval (see [`DebounceSettings::throttle`]): the
/// first call of a burst invokes immediately, further calls are
/// absorbed until the interval elapses, and a trailing invocation
/// delivers the last arguments seen. Over a duration `d` of continuous
/// calling the wrapped function runs at most `d / limit + 1` times.
pub struct Throttler<F, A> {
    inner: Debouncer<F, A>,
}

impl<F, A, R> Throttler<F, A>
where
    F: FnMut(A) -> R,
{
    /// Wrap `func`, allowing one invocation per `limit`.
    pub fn new(func: F, limit: Duration) -> Self {
        Self {
            inner: Debouncer::new(func, DebounceSettings::throttle(limit)),
        }
    }

    /// Record a call. Returns `Some(result)` when this call invoked
    /// immediately, `None` when it was absorbed.
    pub fn call(&mut self, args: A) -> Option<R> {
        self.inner.call(args)
    }

    /// Fire the trailing edge if it is due.
    pub fn tick(&mut self) -> Option<R> {
        self.inner.tick()
    }

    /// Force the pending trailing invocation to run now.
    pub fn flush(&mut self) -> Option<R> {
        self.inner.flush()
    }

    /// Discard any pending trailing invocation.
    pub fn cancel(&mut self) {
        self.inner.cancel()
    }

    /// Whether a trailing invocation is currently scheduled.
    pub fn pending(&self) -> bool {
        self.inner.pending()
    }

    /// When the trailing timer is due, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline()
    }

    #[cfg(test)]
    fn call_at(&mut self, args: A, now: Instant) -> Option<R> {
        self.inner.call_at(args, now)
    }

    #[cfg(test)]
    fn tick_at(&mut self, now: Instant) -> Option<R> {
        self.inner.tick_at(now)
    }
}
