//! Time-windowed memoization.
//!
//! Each memoized operation owns its own [`TtlCache`]; nothing is shared between
//! operations even when their keys have the same shape. An entry is valid while
//! `now - computed_at <= ttl`. Lookups recompute stale entries lazily and
//! [`CacheSweeper`] drops them in batch; both use the same rule.
//!
//! Misses are computed outside the cache lock, so two concurrent misses on one
//! key may both compute. Computations are expected to be idempotent.

use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{clock::Clock, Result};

/// Cache key made of positional arguments plus named arguments.
///
/// Named arguments are kept sorted, so the order they are added in does not
/// affect equality or hashing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallKey {
    args: Vec<String>,
    kwargs: BTreeMap<String, String>,
}

impl CallKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.kwargs.insert(name.into(), value.to_string());
        self
    }
}

pub struct TtlCache<K, V> {
    ttl: f64,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, (V, f64)>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: ttl.as_secs_f64(),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs_f64(self.ttl)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, (V, f64)>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn is_fresh(&self, computed_at: f64, now: f64) -> bool {
        now - computed_at <= self.ttl
    }

    /// Cached value for `key` if it is still within the TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        self.lock()
            .get(key)
            .filter(|(_, at)| self.is_fresh(*at, now))
            .map(|(v, _)| v.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        self.lock().insert(key, (value, now));
    }

    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce(&K) -> V) -> V {
        if let Some(v) = self.get(&key) {
            return v;
        }
        let value = compute(&key);
        self.insert(key, value.clone());
        value
    }

    /// Like [`Self::get_or_insert_with`], but failures are returned and not cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        compute: impl FnOnce(&K) -> std::result::Result<V, E>,
    ) -> std::result::Result<V, E> {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let value = compute(&key)?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Remove every entry older than the TTL; returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, (_, at)| now - *at <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fallible operation wrapped with its own TTL cache.
pub struct Memoized<K, V, F> {
    name: String,
    cache: TtlCache<K, V>,
    compute: F,
}

impl<K, V, F> Memoized<K, V, F>
where
    K: Eq + Hash,
    V: Clone,
    F: Fn(&K) -> Result<V>,
{
    pub fn new(name: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>, compute: F) -> Self {
        Self {
            name: name.into(),
            cache: TtlCache::new(ttl, clock),
            compute,
        }
    }

    pub fn call(&self, key: K) -> Result<V> {
        self.cache.get_or_try_insert_with(key, &self.compute)
    }

    pub fn cache(&self) -> &TtlCache<K, V> {
        &self.cache
    }
}

/// Anything holding expirable entries.
pub trait Sweep: Send + Sync {
    fn name(&self) -> &str;
    fn sweep(&self) -> usize;
}

impl<K, V, F> Sweep for Memoized<K, V, F>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
    F: Fn(&K) -> Result<V> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn sweep(&self) -> usize {
        self.cache.sweep()
    }
}

/// Explicit list of memoized operations to expire periodically.
///
/// Sweeping only bounds memory; freshness is already enforced on lookup.
#[derive(Default)]
pub struct CacheSweeper {
    caches: Vec<Arc<dyn Sweep>>,
}

impl CacheSweeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, cache: Arc<dyn Sweep>) {
        self.caches.push(cache);
    }

    pub fn sweep_all(&self) -> usize {
        let mut removed = 0;
        for cache in &self.caches {
            let n = cache.sweep();
            if n > 0 {
                tracing::debug!(cache = cache.name(), removed = n, "swept expired entries");
            }
            removed += n;
        }
        removed
    }

    /// Run [`Self::sweep_all`] every `every` until `cancel` fires.
    pub fn spawn(self: Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            // The first tick completes immediately; nothing can be stale yet.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        self.sweep_all();
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{clock::MockClock, errors::Error};

    fn counting(
        clock: &MockClock,
        calls: Arc<AtomicUsize>,
    ) -> Memoized<u32, u32, impl Fn(&u32) -> Result<u32>> {
        Memoized::new(
            "double",
            Duration::from_secs(10),
            Arc::new(clock.clone()),
            move |k: &u32| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(k * 2)
            },
        )
    }

    #[test]
    fn hit_within_ttl_and_recompute_after() {
        let clock = MockClock::at(0.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let f = counting(&clock, calls.clone());

        assert_eq!(f.call(1).unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.set(5.0);
        assert_eq!(f.call(1).unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.set(11.0);
        assert_eq!(f.call(1).unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn entry_exactly_ttl_old_is_still_valid() {
        let clock = MockClock::at(0.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let f = counting(&clock, calls.clone());
        f.call(1).unwrap();
        clock.set(10.0);
        f.call(1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.sweep(), 0);
    }

    #[test]
    fn distinct_keys_compute_independently() {
        let clock = MockClock::at(0.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let f = counting(&clock, calls.clone());
        f.call(1).unwrap();
        f.call(2).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.cache().len(), 2);
    }

    #[test]
    fn operations_never_share_a_cache() {
        let clock = MockClock::at(0.0);
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let a = counting(&clock, a_calls.clone());
        let b = counting(&clock, b_calls.clone());
        a.call(1).unwrap();
        b.call(1).unwrap();
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let clock = MockClock::at(0.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let f = Memoized::new(
            "flaky",
            Duration::from_secs(10),
            Arc::new(clock.clone()),
            move |_: &u32| -> Result<u32> {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(Error::External("down".to_string()));
                }
                Ok(1)
            },
        );
        assert!(f.call(0).is_err());
        assert_eq!(f.call(0).unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn call_key_ignores_kwarg_order() {
        let a = CallKey::new().arg(1).kwarg("lang", "en").kwarg("page", 2);
        let b = CallKey::new().arg(1).kwarg("page", 2).kwarg("lang", "en");
        assert_eq!(a, b);
        assert_ne!(a, CallKey::new().arg(2).kwarg("lang", "en").kwarg("page", 2));

        let cache: TtlCache<CallKey, &str> =
            TtlCache::new(Duration::from_secs(1), Arc::new(MockClock::at(0.0)));
        cache.insert(a, "hit");
        assert_eq!(cache.get(&b), Some("hit"));
    }

    #[test]
    fn sweeper_removes_only_expired_entries() {
        let clock = MockClock::at(0.0);
        let short = Arc::new(counting(&clock, Arc::new(AtomicUsize::new(0))));
        let long = Arc::new(Memoized::new(
            "long",
            Duration::from_secs(100),
            Arc::new(clock.clone()),
            |k: &u32| Ok(*k),
        ));

        let mut sweeper = CacheSweeper::new();
        sweeper.register(short.clone());
        sweeper.register(long.clone());

        short.call(1).unwrap();
        long.call(1).unwrap();
        clock.set(8.0);
        short.call(2).unwrap();

        clock.set(15.0);
        assert_eq!(sweeper.sweep_all(), 1);
        assert_eq!(short.cache().len(), 1);
        assert_eq!(long.cache().len(), 1);
    }

    #[tokio::test]
    async fn spawned_sweeper_stops_on_cancel() {
        let sweeper = Arc::new(CacheSweeper::new());
        let cancel = CancellationToken::new();
        let handle = sweeper.spawn(Duration::from_millis(5), cancel.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
