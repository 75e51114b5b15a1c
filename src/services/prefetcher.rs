use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    error::PrefetchError,
    db::{
        create_redis_client, CacheTtls, MemoryPatternStore, PatternStore, PatternWriterHandle,
        PrefetchCache, PrefetchKey, RedisPatternStore,
    },
    models::{FeedPage, FeedParams, FeedTab, PrefetchAction, ScrollEvent, UserBehaviorPattern, UserProfile},
    services::providers::{FeedFetcher, HttpFeedFetcher},
    services::tracker::{BehaviorTracker, TrackerSettings},
    services::triggers::{RandomSource, ThreadRandom, TriggerEvaluator, TriggerSettings},
};

/// How a background prefetch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// The payload was fetched and cached
    Stored,
    /// The fetch failed; nothing was cached
    Failed(String),
    /// The task was aborted before it finished
    Cancelled,
}

/// Handle to a background prefetch
///
/// Dropping the handle leaves the task running; call [`abort`] to cancel it.
///
/// [`abort`]: PrefetchHandle::abort
#[derive(Debug)]
pub struct PrefetchHandle {
    key: PrefetchKey,
    action: PrefetchAction,
    task: JoinHandle<PrefetchOutcome>,
}

impl PrefetchHandle {
    pub fn key(&self) -> &PrefetchKey {
        &self.key
    }

    pub fn action(&self) -> PrefetchAction {
        self.action
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the prefetch to settle
    pub async fn wait(self) -> PrefetchOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => PrefetchOutcome::Cancelled,
            Err(e) => {
                let err = PrefetchError::Internal(format!("prefetch task panicked: {}", e));
                tracing::error!(error = %err, key = %self.key, "Prefetch task ended abnormally");
                PrefetchOutcome::Failed(err.to_string())
            }
        }
    }
}

/// Work performed by a spawned prefetch task
enum PrefetchJob {
    Page {
        key: PrefetchKey,
        tab: FeedTab,
        params: FeedParams,
        ttl_ms: u64,
    },
    Profiles {
        key: PrefetchKey,
        user_ids: Vec<String>,
        ttl_ms: u64,
    },
}

struct PrefetcherInner {
    tracker: RwLock<BehaviorTracker>,
    evaluator: TriggerEvaluator,
    pages: RwLock<PrefetchCache<PrefetchKey, FeedPage>>,
    profiles: RwLock<PrefetchCache<PrefetchKey, Vec<UserProfile>>>,
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<dyn PatternStore>,
    ttls: CacheTtls,
    items_per_page: u32,
}

impl PrefetcherInner {
    async fn run(&self, job: PrefetchJob) -> PrefetchOutcome {
        match job {
            PrefetchJob::Page {
                key,
                tab,
                params,
                ttl_ms,
            } => match self.fetcher.fetch_feed(tab, params).await {
                Ok(page) => {
                    tracing::debug!(key = %key, items = page.items.len(), "Prefetched feed page");
                    self.pages.write().await.set(key, page, ttl_ms);
                    PrefetchOutcome::Stored
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        upstream = e.is_upstream(),
                        key = %key,
                        provider = self.fetcher.name(),
                        "Feed prefetch failed"
                    );
                    PrefetchOutcome::Failed(e.to_string())
                }
            },
            PrefetchJob::Profiles {
                key,
                user_ids,
                ttl_ms,
            } => match self.fetcher.fetch_profiles(user_ids).await {
                Ok(profiles) => {
                    tracing::debug!(key = %key, count = profiles.len(), "Prefetched user profiles");
                    self.profiles.write().await.set(key, profiles, ttl_ms);
                    PrefetchOutcome::Stored
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        upstream = e.is_upstream(),
                        key = %key,
                        provider = self.fetcher.name(),
                        "Profile prefetch failed"
                    );
                    PrefetchOutcome::Failed(e.to_string())
                }
            },
        }
    }
}

/// Builder for [`SmartPrefetcher`]
pub struct PrefetcherBuilder {
    fetcher: Arc<dyn FeedFetcher>,
    store: Option<Arc<dyn PatternStore>>,
    clock: Option<Arc<dyn Clock>>,
    random: Option<Box<dyn RandomSource>>,
    tracker: TrackerSettings,
    triggers: TriggerSettings,
    ttls: CacheTtls,
    items_per_page: u32,
}

impl PrefetcherBuilder {
    pub fn new(fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self {
            fetcher,
            store: None,
            clock: None,
            random: None,
            tracker: TrackerSettings::default(),
            triggers: TriggerSettings::default(),
            ttls: CacheTtls::default(),
            items_per_page: 10,
        }
    }

    /// Starts from the tuning values in `config`
    pub fn from_config(config: &Config, fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self {
            tracker: config.tracker_settings(),
            triggers: config.trigger_settings(),
            ttls: config.cache_ttls(),
            items_per_page: config.items_per_page,
            ..Self::new(fetcher)
        }
    }

    pub fn store(mut self, store: Arc<dyn PatternStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn random(mut self, random: Box<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    pub fn tracker_settings(mut self, settings: TrackerSettings) -> Self {
        self.tracker = settings;
        self
    }

    pub fn trigger_settings(mut self, settings: TriggerSettings) -> Self {
        self.triggers = settings;
        self
    }

    pub fn ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn items_per_page(mut self, items_per_page: u32) -> Self {
        self.items_per_page = items_per_page.max(1);
        self
    }

    pub fn build(self) -> SmartPrefetcher {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let random = self.random.unwrap_or_else(|| Box::new(ThreadRandom));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryPatternStore::new()));

        SmartPrefetcher {
            inner: Arc::new(PrefetcherInner {
                tracker: RwLock::new(BehaviorTracker::new(self.tracker)),
                evaluator: TriggerEvaluator::new(self.triggers, random),
                pages: RwLock::new(PrefetchCache::new(Arc::clone(&clock))),
                profiles: RwLock::new(PrefetchCache::new(clock)),
                fetcher: self.fetcher,
                store,
                ttls: self.ttls,
                items_per_page: self.items_per_page,
            }),
        }
    }
}

/// Warms the feed ahead of the user based on how they scroll
///
/// Cloning is cheap and every clone shares the same tracker and caches.
#[derive(Clone)]
pub struct SmartPrefetcher {
    inner: Arc<PrefetcherInner>,
}

impl SmartPrefetcher {
    pub fn builder(fetcher: Arc<dyn FeedFetcher>) -> PrefetcherBuilder {
        PrefetcherBuilder::new(fetcher)
    }

    /// Wires the HTTP feed backend and Redis pattern store described by `config`
    ///
    /// Must be called from within a tokio runtime. Shut the returned handle
    /// down on exit so pending pattern writes reach Redis.
    pub fn connect(config: &Config) -> anyhow::Result<(Self, PatternWriterHandle)> {
        config.validate()?;

        let redis_client = create_redis_client(&config.redis_url)?;
        let (store, writer) = RedisPatternStore::new(redis_client, config.behavior_ttl_secs);
        let fetcher = HttpFeedFetcher::new(config.feed_api_url.clone(), config.feed_api_key.clone());

        tracing::info!(
            feed_api_url = %config.feed_api_url,
            items_per_page = config.items_per_page,
            "Smart prefetcher configured"
        );

        let prefetcher = PrefetcherBuilder::from_config(config, Arc::new(fetcher))
            .store(Arc::new(store))
            .build();

        Ok((prefetcher, writer))
    }

    /// Restores the user's persisted pattern, overwriting in-memory state
    ///
    /// Returns whether a pattern was found.
    pub async fn load_session(&self, user_id: &str) -> bool {
        match self.inner.store.load(user_id).await {
            Some(pattern) if pattern.user_id == user_id => {
                self.inner.tracker.write().await.restore(pattern);
                tracing::debug!(user_id = %user_id, "Restored behavior pattern");
                true
            }
            Some(_) => {
                tracing::warn!(user_id = %user_id, "Stored pattern belongs to another user, ignoring");
                false
            }
            None => false,
        }
    }

    /// Feeds a scroll event through the tracker and triggers
    ///
    /// Returns a handle for every prefetch that was started. Actions whose
    /// target is already cached start nothing.
    pub async fn on_scroll(&self, event: ScrollEvent) -> Vec<PrefetchHandle> {
        let (pattern, actions) = {
            let mut tracker = self.inner.tracker.write().await;
            let previous = tracker.pattern(&event.user_id).cloned();
            let sample =
                tracker.record_scroll(&event.user_id, event.tab, event.scroll_top, event.timestamp_ms);
            let actions = self.inner.evaluator.evaluate(
                previous.as_ref(),
                event.tab,
                sample.velocity,
                event.scroll_top,
                event.timestamp_ms,
            );
            (tracker.pattern(&event.user_id).cloned(), actions)
        };

        if let Some(pattern) = &pattern {
            self.inner.store.save(pattern);
        }

        let mut handles = Vec::new();
        for action in actions {
            if let Some(handle) = self.dispatch(&event.user_id, action, event.page).await {
                handles.push(handle);
            }
        }
        handles
    }

    /// Records a tab switch and warms the tab the user just left
    pub async fn switch_tab(&self, user_id: &str, tab: FeedTab) -> Option<PrefetchHandle> {
        let pattern = {
            let mut tracker = self.inner.tracker.write().await;
            tracker.set_active_tab(user_id, tab);
            tracker.pattern(user_id).cloned()
        };
        if let Some(pattern) = &pattern {
            self.inner.store.save(pattern);
        }

        self.dispatch(user_id, PrefetchAction::OppositeTab(tab), 0).await
    }

    /// Starts the fetch behind `action` unless its result is already cached
    ///
    /// `page` is the page currently shown on the action's tab. Concurrent
    /// calls for the same uncached key each start their own fetch.
    pub async fn dispatch(
        &self,
        user_id: &str,
        action: PrefetchAction,
        page: u32,
    ) -> Option<PrefetchHandle> {
        let job = self.plan(user_id, action, page).await?;
        let key = match &job {
            PrefetchJob::Page { key, .. } | PrefetchJob::Profiles { key, .. } => key.clone(),
        };

        tracing::debug!(user_id = %user_id, action = %action, key = %key, "Starting prefetch");

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.run(job).await });

        Some(PrefetchHandle { key, action, task })
    }

    async fn plan(&self, user_id: &str, action: PrefetchAction, page: u32) -> Option<PrefetchJob> {
        let ttls = self.inner.ttls;
        let (key, tab, target_page, ttl_ms) = match action {
            PrefetchAction::NextPage(tab) => {
                let next = page.saturating_add(1);
                let key = PrefetchKey::NextPage {
                    tab,
                    user_id: user_id.to_string(),
                    page: next,
                };
                (key, tab, next, ttls.next_page_ms)
            }
            PrefetchAction::OppositeTab(active) => {
                let tab = active.opposite();
                let key = PrefetchKey::Tab {
                    tab,
                    user_id: user_id.to_string(),
                };
                (key, tab, 0, ttls.tab_prefetch_ms)
            }
            PrefetchAction::UserProfiles => return self.plan_profiles(user_id).await,
        };

        if self.inner.pages.read().await.contains_fresh(&key) {
            tracing::debug!(key = %key, "Prefetch target already cached");
            return None;
        }

        Some(PrefetchJob::Page {
            key,
            tab,
            params: FeedParams {
                user_id: user_id.to_string(),
                page: target_page,
                items_per_page: self.inner.items_per_page,
            },
            ttl_ms,
        })
    }

    async fn plan_profiles(&self, user_id: &str) -> Option<PrefetchJob> {
        let key = PrefetchKey::Profiles {
            user_id: user_id.to_string(),
        };
        if self.inner.profiles.read().await.contains_fresh(&key) {
            tracing::debug!(key = %key, "Prefetch target already cached");
            return None;
        }

        let pages = self
            .inner
            .pages
            .read()
            .await
            .fresh_values_where(|k| k.user_id() == user_id);

        let mut user_ids: Vec<String> = Vec::new();
        for page in &pages {
            for author in page.author_ids() {
                if author != user_id && !user_ids.contains(&author) {
                    user_ids.push(author);
                }
            }
        }
        user_ids.sort();

        if user_ids.is_empty() {
            tracing::debug!(user_id = %user_id, "No cached authors to prefetch profiles for");
            return None;
        }

        Some(PrefetchJob::Profiles {
            key,
            user_ids,
            ttl_ms: self.inner.ttls.profiles_ms,
        })
    }

    /// Returns a prefetched page, if one is cached and fresh
    ///
    /// Page 0 is served from tab prefetches, later pages from next-page
    /// prefetches.
    pub async fn cached_page(&self, user_id: &str, tab: FeedTab, page: u32) -> Option<Arc<FeedPage>> {
        let key = if page == 0 {
            PrefetchKey::Tab {
                tab,
                user_id: user_id.to_string(),
            }
        } else {
            PrefetchKey::NextPage {
                tab,
                user_id: user_id.to_string(),
                page,
            }
        };

        let hit = self.inner.pages.write().await.get(&key);
        tracing::debug!(key = %key, hit = hit.is_some(), "Prefetch cache lookup");
        hit
    }

    pub async fn cached_profiles(&self, user_id: &str) -> Option<Arc<Vec<UserProfile>>> {
        let key = PrefetchKey::Profiles {
            user_id: user_id.to_string(),
        };
        self.inner.profiles.write().await.get(&key)
    }

    pub async fn pattern(&self, user_id: &str) -> Option<UserBehaviorPattern> {
        self.inner.tracker.read().await.pattern(user_id).cloned()
    }

    /// Drops expired cache entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let pages = self.inner.pages.write().await.purge_expired();
        let profiles = self.inner.profiles.write().await.purge_expired();
        pages + profiles
    }

    /// Clears all tracked behavior and cached payloads
    ///
    /// Prefetches still in flight will repopulate the caches when they finish.
    pub async fn reset(&self) {
        self.inner.tracker.write().await.reset();
        self.inner.pages.write().await.clear();
        self.inner.profiles.write().await.clear();
        tracing::debug!("Prefetcher state reset");
    }
}
