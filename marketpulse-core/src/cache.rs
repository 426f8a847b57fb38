//! Process-wide TTL cache.
//!
//! Entries remember only when they were written. Each read supplies its own
//! TTL, so changing a namespace's configured TTL applies to entries already
//! stored. Expired entries are skipped on read and overwritten on the next
//! write; nothing evicts them in the background.
//!
//! The store is injected into the services rather than living in a global,
//! and every namespace sits behind the [`Cache`] trait so tests can swap in
//! a double.

use crate::domain::{MonthlyBar, TickerPayload};
use crate::services::field_quotes::FieldQuoteMap;
use crate::services::ranges::RangeMap;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key namespaces. Every stored key is `"<namespace>:<key>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Quotes,
    Monthly,
    Fields,
    Ranges,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Quotes,
        Namespace::Monthly,
        Namespace::Fields,
        Namespace::Ranges,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Quotes => "quotes",
            Namespace::Monthly => "monthly",
            Namespace::Fields => "fields",
            Namespace::Ranges => "ranges",
        }
    }

    pub fn key(&self, key: &str) -> String {
        format!("{}:{key}", self.as_str())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable key for a whole request: the parts are sorted, joined and hashed,
/// so the same request in any order maps to the same entry.
pub fn composite_key<S: AsRef<str>>(parts: &[S]) -> String {
    let mut sorted: Vec<&str> = parts.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    let mut hasher = blake3::Hasher::new();
    for part in sorted {
        hasher.update(part.as_bytes());
        // Unit separator; never part of a ticker or field name.
        hasher.update(&[0x1f]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Key-value store with read-time expiry. Must tolerate concurrent readers
/// and writers racing on the same key.
pub trait Cache<V>: Send + Sync {
    /// The value under `key`, unless it is missing or at least `ttl` old.
    fn get(&self, key: &str, ttl: Duration) -> Option<V>;

    /// Store `value`, overwriting any previous entry and restarting its clock.
    fn set(&self, key: &str, value: V);

    /// Remove every entry whose key starts with `prefix`, or every entry when
    /// `prefix` is `None`. Returns how many were removed.
    fn clear(&self, prefix: Option<&str>) -> usize;

    /// Stored entries, expired ones included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`Cache`] over a sharded concurrent map.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, (V, Instant)>,
}

impl<V> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> Cache<V> for TtlCache<V> {
    fn get(&self, key: &str, ttl: Duration) -> Option<V> {
        let entry = self.entries.get(key)?;
        let (value, stored_at) = entry.value();
        if stored_at.elapsed() >= ttl {
            return None;
        }
        Some(value.clone())
    }

    fn set(&self, key: &str, value: V) {
        self.entries.insert(key.to_string(), (value, Instant::now()));
    }

    fn clear(&self, prefix: Option<&str>) -> usize {
        let before = self.entries.len();
        match prefix {
            None => self.entries.clear(),
            Some(p) => self.entries.retain(|k, _| !k.starts_with(p)),
        }
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A cache that keeps nothing. Every read misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl<V> Cache<V> for NullCache {
    fn get(&self, _key: &str, _ttl: Duration) -> Option<V> {
        None
    }

    fn set(&self, _key: &str, _value: V) {}

    fn clear(&self, _prefix: Option<&str>) -> usize {
        0
    }

    fn len(&self) -> usize {
        0
    }
}

/// Entries per namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub quotes: usize,
    pub monthly: usize,
    pub fields: usize,
    pub ranges: usize,
}

impl CacheStats {
    pub fn total(&self) -> usize {
        self.quotes + self.monthly + self.fields + self.ranges
    }
}

/// The caches of every namespace, built once at startup and shared.
#[derive(Clone)]
pub struct CacheStore {
    pub quotes: Arc<dyn Cache<TickerPayload>>,
    /// `None` records a symbol the long-window batch had no data for.
    pub monthly: Arc<dyn Cache<Option<Vec<MonthlyBar>>>>,
    pub fields: Arc<dyn Cache<FieldQuoteMap>>,
    pub ranges: Arc<dyn Cache<RangeMap>>,
}

impl CacheStore {
    pub fn in_memory() -> Self {
        Self {
            quotes: Arc::new(TtlCache::new()),
            monthly: Arc::new(TtlCache::new()),
            fields: Arc::new(TtlCache::new()),
            ranges: Arc::new(TtlCache::new()),
        }
    }

    /// Store that never hits, for running without memoization.
    pub fn disabled() -> Self {
        Self {
            quotes: Arc::new(NullCache),
            monthly: Arc::new(NullCache),
            fields: Arc::new(NullCache),
            ranges: Arc::new(NullCache),
        }
    }

    /// Admin clear across every namespace. With a prefix such as
    /// `"quotes:"` or `"quotes:TCS"`, only matching keys go.
    pub fn clear(&self, prefix: Option<&str>) -> usize {
        let removed = self.quotes.clear(prefix)
            + self.monthly.clear(prefix)
            + self.fields.clear(prefix)
            + self.ranges.clear(prefix);
        tracing::info!(prefix = prefix.unwrap_or("*"), removed, "cache cleared");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            quotes: self.quotes.len(),
            monthly: self.monthly.len(),
            fields: self.fields.len(),
            ranges: self.ranges.len(),
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore").field("stats", &self.stats()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::normalize;
    use std::thread;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn fresh_entry_is_returned() {
        let cache = TtlCache::new();
        cache.set("quotes:TCS.NS", 1u32);
        assert_eq!(cache.get("quotes:TCS.NS", MINUTE), Some(1));
        assert_eq!(cache.get("quotes:INFY.NS", MINUTE), None);
    }

    #[test]
    fn zero_ttl_always_misses() {
        let cache = TtlCache::new();
        cache.set("k", 1u32);
        assert_eq!(cache.get("k", Duration::ZERO), None);
        // Still stored; only skipped.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn ttl_is_chosen_at_read_time() {
        let cache = TtlCache::new();
        cache.set("k", "v".to_string());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k", Duration::from_millis(5)), None);
        assert_eq!(cache.get("k", MINUTE).as_deref(), Some("v"));
    }

    #[test]
    fn set_overwrites_and_restarts_clock() {
        let cache = TtlCache::new();
        cache.set("k", 1u32);
        thread::sleep(Duration::from_millis(20));
        cache.set("k", 2u32);
        assert_eq!(cache.get("k", Duration::from_millis(15)), Some(2));
    }

    #[test]
    fn clear_by_prefix() {
        let cache = TtlCache::new();
        cache.set(&Namespace::Quotes.key("TCS.NS"), 1u32);
        cache.set(&Namespace::Quotes.key("INFY.NS"), 2);
        cache.set(&Namespace::Ranges.key("abc"), 3);

        assert_eq!(cache.clear(Some("quotes:")), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.clear(None), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_writers_do_not_lose_keys() {
        let cache = Arc::new(TtlCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        cache.set(&format!("k{}", i % 50), t * 1000 + i);
                        let _ = cache.get(&format!("k{}", (i + 7) % 50), MINUTE);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 50);
    }

    #[test]
    fn composite_key_ignores_order() {
        let a = composite_key(&["TCS", "INFY", "|fields=close"]);
        let b = composite_key(&["|fields=close", "INFY", "TCS"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, composite_key(&["TCSINFY", "|fields=close"]));
    }

    #[test]
    fn null_cache_never_hits() {
        let store = CacheStore::disabled();
        let p = TickerPayload::unresolved(&normalize("TCS"), "INR");
        store.quotes.set("quotes:TCS.NS", p);
        assert!(store.quotes.get("quotes:TCS.NS", MINUTE).is_none());
        assert_eq!(store.stats().total(), 0);
    }

    #[test]
    fn store_clear_spans_namespaces() {
        let store = CacheStore::in_memory();
        let sym = normalize("TCS");
        store
            .quotes
            .set(&Namespace::Quotes.key(sym.as_str()), TickerPayload::unresolved(&sym, "INR"));
        store.monthly.set(&Namespace::Monthly.key(sym.as_str()), None);
        assert_eq!(store.stats().total(), 2);

        assert_eq!(store.clear(Some("monthly:")), 1);
        assert_eq!(store.stats(), CacheStats { quotes: 1, ..CacheStats::default() });
        assert_eq!(store.clear(None), 1);
    }
}
