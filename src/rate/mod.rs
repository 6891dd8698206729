//! Debouncing and throttling.
//!
//! The synchronous [`Debouncer`] and [`Throttler`] are timestamp
//! state machines any event loop can drive; [`DebounceHandle`] runs
//! one on a tokio task so the trailing edge fires on its own.

mod debounce;
mod throttle;
mod worker;

pub use debounce::{DebounceSettings, Debouncer};
pub use throttle::Throttler;
pub use worker::DebounceHandle;
