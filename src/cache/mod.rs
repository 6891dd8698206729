//! Memoization with a bounded, FIFO-evicting result cache.

mod key;
mod memo;

pub use key::{json_key, KeyFn};
pub use memo::{MemoCache, MemoSettings};
