//! Burst-collapsing debounce core.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Settings for a [`Debouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceSettings {
    /// How long a burst must be quiet before the trailing edge fires.
    #[serde(default = "default_wait")]
    pub wait: Duration,

    /// Invoke immediately on the first call of a new burst.
    #[serde(default)]
    pub leading: bool,

    /// Invoke once after the burst settles, with the last call's
    /// arguments.
    #[serde(default = "default_trailing")]
    pub trailing: bool,

    /// Upper bound on how long a continuous burst can defer the
    /// invocation. When set, at least one invocation happens per
    /// `max_wait` even if calls never stop arriving.
    #[serde(default)]
    pub max_wait: Option<Duration>,
}

impl DebounceSettings {
    /// Trailing-only debounce settings for the given wait interval.
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            leading: false,
            trailing: true,
            max_wait: None,
        }
    }

    /// Throttle settings: leading and trailing edges both enabled and
    /// `max_wait` pinned to the interval, which yields at most one
    /// invocation per `limit`.
    pub fn throttle(limit: Duration) -> Self {
        Self {
            wait: limit,
            leading: true,
            trailing: true,
            max_wait: Some(limit),
        }
    }
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self::new(default_wait())
    }
}

fn default_wait() -> Duration {
    Duration::from_millis(100)
}

fn default_trailing() -> bool {
    true
}

/// Collapses bursts of calls to a wrapped function into a bounded
/// invocation rate.
///
/// The debouncer is a plain state machine over timestamps: it never
/// sleeps and owns no timer. [`deadline`](Debouncer::deadline) reports
/// when the trailing edge is due and [`tick`](Debouncer::tick) fires it
/// if so, which lets any event loop drive it. Hosts on tokio can use
/// [`DebounceHandle`](super::DebounceHandle) instead and skip the
/// pumping entirely.
///
/// The wrapped function runs synchronously inside `call`, `tick`, and
/// `flush`; anything it panics with propagates to that caller.
pub struct Debouncer<F, A> {
    func: F,
    settings: DebounceSettings,
    /// Time of the most recent call.
    last_call: Option<Instant>,
    /// Time of the most recent invocation (or burst start when the
    /// leading edge is disabled, which is what anchors `max_wait`).
    last_invoke: Option<Instant>,
    /// Arguments for the trailing invocation. At most one trailing
    /// invocation is ever pending; newer calls overwrite this.
    pending: Option<A>,
    /// When the trailing timer is due, if armed.
    deadline: Option<Instant>,
}

impl<F, A, R> Debouncer<F, A>
where
    F: FnMut(A) -> R,
{
    /// Wrap `func` with the given settings.
    ///
    /// A `max_wait` shorter than `wait` is raised to `wait`, since the
    /// trailing timer can never fire earlier than `wait` anyway.
    pub fn new(func: F, mut settings: DebounceSettings) -> Self {
        settings.max_wait = settings.max_wait.map(|m| m.max(settings.wait));
        Self {
            func,
            settings,
            last_call: None,
            last_invoke: None,
            pending: None,
            deadline: None,
        }
    }

    /// Record a call.
    ///
    /// Returns `Some(result)` when this call triggered an immediate
    /// invocation (leading edge of a new burst, or a continuous burst
    /// hitting `max_wait`), `None` when the call was absorbed into the
    /// pending trailing invocation.
    pub fn call(&mut self, args: A) -> Option<R> {
        self.call_at(args, Instant::now())
    }

    /// Fire the trailing edge if it is due.
    ///
    /// Returns the invocation result if it fired. When the burst is
    /// still live the deadline is pushed out instead and `None` is
    /// returned.
    pub fn tick(&mut self) -> Option<R> {
        self.tick_at(Instant::now())
    }

    /// Force the pending trailing invocation to run now, returning its
    /// result. Returns `None` when nothing is pending.
    pub fn flush(&mut self) -> Option<R> {
        self.flush_at(Instant::now())
    }

    /// Discard any pending trailing invocation and forget the current
    /// burst. The wrapped function is not called.
    pub fn cancel(&mut self) {
        if self.deadline.is_some() {
            debug!("canceling pending trailing invocation");
        }
        self.last_call = None;
        self.last_invoke = None;
        self.pending = None;
        self.deadline = None;
    }

    /// Whether a trailing invocation is currently scheduled.
    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the trailing timer is due, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The settings this debouncer was built with.
    pub fn settings(&self) -> DebounceSettings {
        self.settings
    }

    pub(crate) fn call_at(&mut self, args: A, now: Instant) -> Option<R> {
        let is_invoking = self.should_invoke_at(now);
        trace!(invoking = is_invoking, "classified call");
        self.pending = Some(args);
        self.last_call = Some(now);

        if is_invoking {
            if self.deadline.is_none() {
                return self.leading_edge(now);
            }
            if self.settings.max_wait.is_some() {
                // A continuous burst has reached max_wait: invoke with
                // the newest arguments and re-arm the trailing timer.
                self.deadline = Some(now + self.settings.wait);
                if let Some(args) = self.pending.take() {
                    debug!("max_wait reached, invoking");
                    return Some(self.invoke(args, now));
                }
            }
        }
        if self.deadline.is_none() {
            self.deadline = Some(now + self.settings.wait);
        }
        None
    }

    pub(crate) fn tick_at(&mut self, now: Instant) -> Option<R> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        if self.should_invoke_at(now) {
            return self.trailing_edge(now);
        }
        // Calls arrived since the timer was armed; the burst is still
        // live. Push the deadline out to the remaining window.
        self.deadline = Some(now + self.remaining_wait(now));
        None
    }

    pub(crate) fn flush_at(&mut self, now: Instant) -> Option<R> {
        if self.deadline.is_none() {
            return None;
        }
        self.trailing_edge(now)
    }

    /// Start of a new burst: anchor `max_wait`, arm the trailing timer,
    /// and invoke if the leading edge is enabled.
    fn leading_edge(&mut self, now: Instant) -> Option<R> {
        self.last_invoke = Some(now);
        self.deadline = Some(now + self.settings.wait);
        if self.settings.leading {
            if let Some(args) = self.pending.take() {
                debug!("leading edge, invoking");
                return Some(self.invoke(args, now));
            }
        }
        None
    }

    fn trailing_edge(&mut self, now: Instant) -> Option<R> {
        self.deadline = None;
        if self.settings.trailing {
            if let Some(args) = self.pending.take() {
                debug!("trailing edge, invoking");
                return Some(self.invoke(args, now));
            }
        }
        // Leading already consumed the only call of this burst.
        self.pending = None;
        None
    }

    fn invoke(&mut self, args: A, now: Instant) -> R {
        self.last_invoke = Some(now);
        (self.func)(args)
    }

    /// Whether a call (or timer tick) at `now` should invoke rather
    /// than wait. True when this is the first call, when the burst has
    /// gone quiet for `wait`, when `max_wait` has elapsed since the
    /// last invocation, or when the clock moved backward (a timestamp
    /// earlier than the last call starts a new burst, so a clock
    /// adjustment can never park the trailing edge forever).
    fn should_invoke_at(&self, now: Instant) -> bool {
        let Some(last_call) = self.last_call else {
            return true;
        };
        let Some(since_call) = now.checked_duration_since(last_call) else {
            trace!("clock moved backward, starting a new burst");
            return true;
        };
        if since_call >= self.settings.wait {
            return true;
        }
        match (self.settings.max_wait, self.last_invoke) {
            (Some(max_wait), Some(last_invoke)) => now
                .checked_duration_since(last_invoke)
                .map_or(true, |since_invoke| since_invoke >= max_wait),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// How much longer the trailing timer has to run, from `now`.
    fn remaining_wait(&self, now: Instant) -> Duration {
        let since_call = self
            .last_call
            .and_then(|t| now.checked_duration_since(t))
            .unwrap_or(Duration::ZERO);
        let wait_left = self.settings.wait.saturating_sub(since_call);
        match (self.settings.max_wait, self.last_invoke) {
            (Some(max_wait), Some(last_invoke)) => {
                let since_invoke = now
                    .checked_duration_since(last_invoke)
                    .unwrap_or(Duration::ZERO);
                wait_left.min(max_wait.saturating_sub(since_invoke))
            }
            _ => wait_left,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_burst_collapses_to_one_trailing_invocation() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(
            |v: u32| v,
            DebounceSettings::new(Duration::from_millis(100)),
        );

        assert_eq!(d.call_at(1, t0), None);
        assert_eq!(d.call_at(2, at(t0, 30)), None);
        assert_eq!(d.call_at(3, at(t0, 60)), None);
        assert!(d.pending());

        // Timer armed at t=0 comes due at t=100, but the burst is
        // still live, so it reschedules for last_call + wait = 160.
        assert_eq!(d.tick_at(at(t0, 100)), None);
        assert_eq!(d.deadline(), Some(at(t0, 160)));

        // Fires with the last call's arguments.
        assert_eq!(d.tick_at(at(t0, 160)), Some(3));
        assert!(!d.pending());
    }

    #[test]
    fn test_spaced_calls_each_invoke() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(
            |v: u32| v * 10,
            DebounceSettings::new(Duration::from_millis(50)),
        );

        assert_eq!(d.call_at(1, t0), None);
        assert_eq!(d.tick_at(at(t0, 50)), Some(10));
        assert_eq!(d.call_at(2, at(t0, 200)), None);
        assert_eq!(d.tick_at(at(t0, 250)), Some(20));
    }

    #[test]
    fn test_leading_edge_invokes_first_call_of_burst() {
        let t0 = Instant::now();
        let settings = DebounceSettings {
            leading: true,
            ..DebounceSettings::new(Duration::from_millis(100))
        };
        let mut d = Debouncer::new(|v: u32| v, settings);

        assert_eq!(d.call_at(1, t0), Some(1));
        // Single-call burst: leading consumed the arguments, so the
        // trailing edge has nothing to fire.
        assert_eq!(d.tick_at(at(t0, 100)), None);
        assert!(!d.pending());

        // Quiet period over: the next call is a new burst.
        assert_eq!(d.call_at(2, at(t0, 250)), Some(2));
        // A second call within the burst re-arms the trailing edge.
        assert_eq!(d.call_at(3, at(t0, 260)), None);
        assert_eq!(d.tick_at(at(t0, 360)), Some(3));
    }

    #[test]
    fn test_max_wait_fires_during_continuous_burst() {
        let t0 = Instant::now();
        let settings = DebounceSettings {
            max_wait: Some(Duration::from_millis(150)),
            ..DebounceSettings::new(Duration::from_millis(50))
        };
        let mut d = Debouncer::new(|v: u32| v, settings);

        // Calls every 40ms never leave a 50ms quiet gap, but max_wait
        // forces an invocation by t=160.
        let mut fired = Vec::new();
        for ms in (0..=200).step_by(40) {
            if let Some(v) = d.call_at(ms, at(t0, ms as u64)) {
                fired.push((ms, v));
            }
        }
        assert_eq!(fired, vec![(160, 160)]);
    }

    #[test]
    fn test_cancel_discards_pending_invocation() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(
            |v: u32| v,
            DebounceSettings::new(Duration::from_millis(100)),
        );

        assert_eq!(d.call_at(1, t0), None);
        assert!(d.pending());
        d.cancel();
        assert!(!d.pending());
        assert_eq!(d.tick_at(at(t0, 500)), None);
    }

    #[test]
    fn test_flush_forces_pending_invocation() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(
            |v: u32| v,
            DebounceSettings::new(Duration::from_millis(100)),
        );

        assert_eq!(d.flush_at(t0), None);
        assert_eq!(d.call_at(7, t0), None);
        assert_eq!(d.flush_at(at(t0, 10)), Some(7));
        assert!(!d.pending());
        assert_eq!(d.flush_at(at(t0, 20)), None);
    }

    #[test]
    fn test_backward_clock_starts_new_burst() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(
            |v: u32| v,
            DebounceSettings::new(Duration::from_millis(100)),
        );

        assert_eq!(d.call_at(1, at(t0, 100)), None);
        // The clock jumps backward; the call is classified as a new
        // burst rather than blocking behind a far-future quiet gap.
        assert_eq!(d.call_at(2, t0), None);
        assert_eq!(d.tick_at(at(t0, 200)), Some(2));
    }

    #[test]
    fn test_max_wait_shorter_than_wait_is_raised() {
        let settings = DebounceSettings {
            max_wait: Some(Duration::from_millis(10)),
            ..DebounceSettings::new(Duration::from_millis(100))
        };
        let d = Debouncer::new(|v: u32| v, settings);
        assert_eq!(d.settings().max_wait, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = DebounceSettings::default();
        assert!(!settings.leading);
        assert!(settings.trailing);
        assert_eq!(settings.max_wait, None);
    }
}
