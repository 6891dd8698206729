//! Cache key derivation.

use serde::Serialize;
use tracing::debug;

/// Derives the cache key for an argument value. Returning `None`
/// marks the arguments unkeyable: the call bypasses the cache and
/// always reaches the wrapped function.
pub type KeyFn<A> = dyn Fn(&A) -> Option<String> + Send + Sync;

/// Default key derivation: the JSON encoding of the argument value.
///
/// JSON is a deterministic structural encoding for `Serialize` types,
/// so equal argument values always collapse onto one key. Arguments
/// that fail to serialize (e.g. a map with non-string keys) are
/// treated as unkeyable rather than an error.
pub fn json_key<A: Serialize>(args: &A) -> Option<String> {
    match serde_json::to_string(args) {
        Ok(key) => Some(key),
        Err(error) => {
            debug!(%error, "arguments not serializable, bypassing cache");
            None
        }
    }
}
