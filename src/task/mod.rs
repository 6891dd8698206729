//! Shaping async invocations: bounded concurrency and cooperative
//! cancellation.

mod cancel;
mod limiter;

pub use cancel::{cancelable, CancelHandle, Cancelable};
pub use limiter::{ConcurrencyLimiter, Ticket};
