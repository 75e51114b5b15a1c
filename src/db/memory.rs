use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use crate::clock::Clock;
use crate::models::FeedTab;

/// Keys under which prefetched payloads are stored
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrefetchKey {
    /// First page of a tab, warmed ahead of a tab switch
    Tab { tab: FeedTab, user_id: String },
    /// A later page of a tab, warmed ahead of the user scrolling to it
    NextPage {
        tab: FeedTab,
        user_id: String,
        page: u32,
    },
    /// Author profiles for a user's cached feed pages
    Profiles { user_id: String },
}

impl PrefetchKey {
    /// User the cached payload was fetched for
    pub fn user_id(&self) -> &str {
        match self {
            PrefetchKey::Tab { user_id, .. }
            | PrefetchKey::NextPage { user_id, .. }
            | PrefetchKey::Profiles { user_id } => user_id,
        }
    }
}

impl Display for PrefetchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefetchKey::Tab { tab, user_id } => write!(f, "prefetch-{}-{}", tab, user_id),
            PrefetchKey::NextPage { tab, user_id, page } => {
                write!(f, "next-page-{}-{}-{}", tab, user_id, page)
            }
            PrefetchKey::Profiles { user_id } => write!(f, "profiles-{}", user_id),
        }
    }
}

/// Time-to-live per kind of prefetch, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub next_page_ms: u64,
    pub tab_prefetch_ms: u64,
    pub profiles_ms: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            next_page_ms: 3 * 60 * 1000,
            tab_prefetch_ms: 5 * 60 * 1000,
            profiles_ms: 5 * 60 * 1000,
        }
    }
}

struct CacheEntry<V> {
    payload: Arc<V>,
    stored_at_ms: i64,
    ttl_ms: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now_ms: i64) -> bool {
        let ttl = i64::try_from(self.ttl_ms).unwrap_or(i64::MAX);
        now_ms >= self.stored_at_ms.saturating_add(ttl)
    }
}

/// Short-lived key/value store for prefetched payloads
///
/// Entries expire `ttl` after they were stored and are removed lazily the next
/// time they are read. There is no capacity bound; call [`purge_expired`] or
/// [`clear`] to reclaim memory.
///
/// [`purge_expired`]: PrefetchCache::purge_expired
/// [`clear`]: PrefetchCache::clear
pub struct PrefetchCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V> PrefetchCache<K, V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
        }
    }

    /// Returns the payload if present and not yet expired
    ///
    /// An expired entry is deleted as part of the lookup.
    pub fn get<Q>(&mut self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        if self.entries.get(key)?.is_expired(now) {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| Arc::clone(&entry.payload))
    }

    /// Whether a fresh entry exists, without touching expired ones
    pub fn contains_fresh<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Stores a payload, replacing any existing entry under the same key
    pub fn set(&mut self, key: K, payload: V, ttl_ms: u64) -> Arc<V> {
        let payload = Arc::new(payload);
        self.set_shared(key, Arc::clone(&payload), ttl_ms);
        payload
    }

    pub fn set_shared(&mut self, key: K, payload: Arc<V>, ttl_ms: u64) {
        let entry = CacheEntry {
            payload,
            stored_at_ms: self.clock.now_ms(),
            ttl_ms,
        };
        self.entries.insert(key, entry);
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).map(|entry| entry.payload)
    }

    /// Fresh payloads whose key satisfies `filter`
    pub fn fresh_values_where(&self, filter: impl Fn(&K) -> bool) -> Vec<Arc<V>> {
        let now = self.clock.now_ms();
        self.entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && filter(key))
            .map(|(_, entry)| Arc::clone(&entry.payload))
            .collect()
    }

    /// Drops every expired entry, returning how many were removed
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
