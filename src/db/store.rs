use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::models::UserBehaviorPattern;

/// Short-TTL persistence for behavior patterns across session loads
///
/// Implementations swallow their own failures: a broken store looks exactly
/// like an empty one.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PatternStore: Send + Sync {
    /// Returns the last saved pattern for the user, if any
    async fn load(&self, user_id: &str) -> Option<UserBehaviorPattern>;

    /// Saves the pattern without waiting for confirmation
    fn save(&self, pattern: &UserBehaviorPattern);
}

/// Pattern store that lives in process memory
#[derive(Default)]
pub struct MemoryPatternStore {
    patterns: RwLock<HashMap<String, UserBehaviorPattern>>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

#[async_trait::async_trait]
impl PatternStore for MemoryPatternStore {
    async fn load(&self, user_id: &str) -> Option<UserBehaviorPattern> {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    fn save(&self, pattern: &UserBehaviorPattern) {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.user_id.clone(), pattern.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedTab;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryPatternStore::new();
        let mut pattern = UserBehaviorPattern::new("u1", FeedTab::ForYou);
        pattern.average_velocity = 2.5;

        store.save(&pattern);

        let loaded = store.load("u1").await.unwrap();
        assert_eq!(loaded.average_velocity, 2.5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_works_outside_runtime() {
        let store = MemoryPatternStore::new();
        store.save(&UserBehaviorPattern::new("u1", FeedTab::ForYou));

        let loaded = tokio_test::block_on(store.load("u1"));
        assert_eq!(loaded.unwrap().user_id, "u1");
    }

    #[tokio::test]
    async fn test_memory_store_miss() {
        let store = MemoryPatternStore::new();
        assert!(store.load("ghost").await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let store = MemoryPatternStore::new();
        store.save(&UserBehaviorPattern::new("u1", FeedTab::ForYou));
        store.save(&UserBehaviorPattern::new("u1", FeedTab::Following));

        let loaded = store.load("u1").await.unwrap();
        assert_eq!(loaded.last_active_tab, FeedTab::Following);
        assert_eq!(store.len(), 1);
    }
}
