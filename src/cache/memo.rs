//! Bounded, FIFO-evicting memoization.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::key::{json_key, KeyFn};

/// Settings for a [`MemoCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoSettings {
    /// Maximum number of cached entries. When full, the
    /// oldest-inserted entry is evicted to make room. Raised to 1 if
    /// set to 0.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Entries older than this count as misses and are recomputed.
    /// `None` means entries never expire.
    #[serde(default)]
    pub ttl: Option<Duration>,
}

impl Default for MemoSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            ttl: None,
        }
    }
}

fn default_max_size() -> usize {
    128
}

struct Entry<R> {
    value: R,
    inserted_at: Instant,
}

/// Map plus insertion order, kept in sync under one lock.
struct CacheState<R> {
    entries: HashMap<String, Entry<R>>,
    order: VecDeque<String>,
}

/// Wraps a function with a bounded result cache keyed by the
/// serialized argument value.
///
/// Eviction is FIFO: once `max_size` entries are stored, inserting a
/// new key drops the oldest-inserted one, regardless of how recently
/// it was read. With a `ttl`, entries past it are discarded on access
/// and recomputed; the refreshed value re-enters at the back of the
/// insertion order.
///
/// Misses compute outside the lock, so two concurrent misses for the
/// same key both invoke the wrapped function. There is no
/// single-flight deduplication; callers needing it must layer it on
/// top.
pub struct MemoCache<F, A, R> {
    func: F,
    key_fn: Box<KeyFn<A>>,
    settings: MemoSettings,
    state: Mutex<CacheState<R>>,
}

impl<F, A, R> MemoCache<F, A, R>
where
    F: Fn(&A) -> R,
    A: Serialize + 'static,
    R: Clone,
{
    /// Wrap `func` with the default JSON key encoding.
    pub fn new(func: F, settings: MemoSettings) -> Self {
        Self::with_key_fn(func, settings, json_key)
    }
}

impl<F, A, R> MemoCache<F, A, R>
where
    F: Fn(&A) -> R,
    R: Clone,
{
    /// Wrap `func` with a custom key derivation. The key function
    /// returning `None` marks the arguments unkeyable and the call
    /// bypasses the cache.
    pub fn with_key_fn<K>(func: F, mut settings: MemoSettings, key_fn: K) -> Self
    where
        K: Fn(&A) -> Option<String> + Send + Sync + 'static,
    {
        settings.max_size = settings.max_size.max(1);
        Self {
            func,
            key_fn: Box::new(key_fn),
            settings,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Look up `args` in the cache, invoking the wrapped function on a
    /// miss and storing its result.
    ///
    /// Anything the wrapped function panics with propagates to this
    /// caller; nothing is stored in that case.
    pub fn call(&self, args: &A) -> R {
        let Some(key) = (self.key_fn)(args) else {
            return (self.func)(args);
        };
        if let Some(value) = self.lookup(&key) {
            return value;
        }
        // Miss: compute outside the lock. A concurrent miss for the
        // same key also gets here and invokes the function again.
        let value = (self.func)(args);
        self.store(key, value.clone());
        value
    }

    /// Drop all entries.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Drop the entry for `args`. Returns whether one was present.
    pub fn remove(&self, args: &A) -> bool {
        let Some(key) = (self.key_fn)(args) else {
            return false;
        };
        let mut state = self.state.lock();
        if state.entries.remove(&key).is_none() {
            return false;
        }
        state.order.retain(|k| k != &key);
        true
    }

    /// Whether a live (unexpired) entry exists for `args`.
    pub fn contains(&self, args: &A) -> bool {
        let Some(key) = (self.key_fn)(args) else {
            return false;
        };
        let state = self.state.lock();
        match state.entries.get(&key) {
            Some(entry) => !self.expired(entry),
            None => false,
        }
    }

    /// Number of stored entries. Expired entries are dropped lazily on
    /// access, so this can include entries past their `ttl`.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// The settings this cache was built with.
    pub fn settings(&self) -> MemoSettings {
        self.settings
    }

    fn expired(&self, entry: &Entry<R>) -> bool {
        match self.settings.ttl {
            Some(ttl) => entry.inserted_at.elapsed() >= ttl,
            None => false,
        }
    }

    fn lookup(&self, key: &str) -> Option<R> {
        let mut state = self.state.lock();
        let expired = match state.entries.get(key) {
            Some(entry) => self.expired(entry),
            None => return None,
        };
        if expired {
            debug!(key, "entry past ttl, discarding");
            state.entries.remove(key);
            state.order.retain(|k| k != key);
            return None;
        }
        trace!(key, "cache hit");
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    fn store(&self, key: String, value: R) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(&key) {
            // A concurrent miss already stored this key; refresh the
            // value without disturbing its insertion order.
            entry.value = value;
            entry.inserted_at = Instant::now();
            return;
        }
        while state.entries.len() >= self.settings.max_size {
            match state.order.pop_front() {
                Some(oldest) => {
                    debug!(key = %oldest, "cache full, evicting oldest entry");
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
        state.order.push_back(key.clone());
        state.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_hit_skips_recompute() {
        let count = AtomicUsize::new(0);
        let cache = MemoCache::new(
            |x: &u32| {
                count.fetch_add(1, Ordering::SeqCst);
                x * 2
            },
            MemoSettings::default(),
        );

        assert_eq!(cache.call(&21), 42);
        assert_eq!(cache.call(&21), 42);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert_eq!(cache.call(&5), 10);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_ttl_expiry_recomputes() {
        let count = AtomicUsize::new(0);
        let settings = MemoSettings {
            ttl: Some(Duration::from_millis(30)),
            ..MemoSettings::default()
        };
        let cache = MemoCache::new(
            |x: &u32| {
                count.fetch_add(1, Ordering::SeqCst);
                *x
            },
            settings,
        );

        assert_eq!(cache.call(&1), 1);
        assert_eq!(cache.call(&1), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        std::thread::sleep(Duration::from_millis(50));
        assert!(!cache.contains(&1));
        assert_eq!(cache.call(&1), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fifo_eviction_drops_oldest_inserted() {
        let settings = MemoSettings {
            max_size: 2,
            ..MemoSettings::default()
        };
        let cache = MemoCache::new(|x: &char| *x, settings);

        cache.call(&'a');
        cache.call(&'b');
        cache.call(&'c');

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&'a'));
        assert!(cache.contains(&'b'));
        assert!(cache.contains(&'c'));
    }

    #[test]
    fn test_eviction_ignores_read_recency() {
        let count = AtomicUsize::new(0);
        let settings = MemoSettings {
            max_size: 2,
            ..MemoSettings::default()
        };
        let cache = MemoCache::new(
            |x: &char| {
                count.fetch_add(1, Ordering::SeqCst);
                *x
            },
            settings,
        );

        cache.call(&'a');
        cache.call(&'b');
        // Reading 'a' does not protect it; insertion order decides.
        cache.call(&'a');
        cache.call(&'c');

        assert!(!cache.contains(&'a'));
        assert!(cache.contains(&'b'));
        assert!(cache.contains(&'c'));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = MemoCache::new(|x: &u32| *x, MemoSettings::default());

        cache.call(&1);
        cache.call(&2);
        assert_eq!(cache.len(), 2);

        assert!(cache.remove(&1));
        assert!(!cache.remove(&1));
        assert!(!cache.contains(&1));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unkeyable_arguments_bypass_cache() {
        let count = AtomicUsize::new(0);
        let cache = MemoCache::with_key_fn(
            |x: &u32| {
                count.fetch_add(1, Ordering::SeqCst);
                *x
            },
            MemoSettings::default(),
            |_: &u32| None,
        );

        assert_eq!(cache.call(&1), 1);
        assert_eq!(cache.call(&1), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_structurally_equal_arguments_share_an_entry() {
        let count = Arc::new(AtomicUsize::new(0));
        let cache = MemoCache::new(
            {
                let count = Arc::clone(&count);
                move |args: &(u32, String)| {
                    count.fetch_add(1, Ordering::SeqCst);
                    args.0
                }
            },
            MemoSettings::default(),
        );

        assert_eq!(cache.call(&(1, "a".to_string())), 1);
        assert_eq!(cache.call(&(1, "a".to_string())), 1);
        assert_eq!(cache.call(&(1, "b".to_string())), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_misses_both_invoke() {
        let count = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(MemoCache::new(
            {
                let count = Arc::clone(&count);
                move |x: &u32| {
                    count.fetch_add(1, Ordering::SeqCst);
                    // Hold the miss open long enough for the other
                    // thread to also miss.
                    std::thread::sleep(Duration::from_millis(50));
                    *x
                }
            },
            MemoSettings::default(),
        ));

        let threads: Vec<_> = (0..2)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.call(&7))
            })
            .collect();
        for thread in threads {
            assert_eq!(thread.join().unwrap(), 7);
        }

        // No single-flight: both misses invoked the function.
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }
}
