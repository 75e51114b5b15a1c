/// Feed data sources
///
/// The prefetcher never talks to the backend directly. Callers hand it a
/// `FeedFetcher`, either the HTTP implementation below or their own.
use crate::{
    error::PrefetchResult,
    models::{FeedPage, FeedParams, FeedTab, UserProfile},
};

pub mod http;

pub use http::HttpFeedFetcher;

/// Trait for feed data providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch one page of a feed tab
    async fn fetch_feed(&self, tab: FeedTab, params: FeedParams) -> PrefetchResult<FeedPage>;

    /// Fetch public profiles for the given user ids
    async fn fetch_profiles(&self, user_ids: Vec<String>) -> PrefetchResult<Vec<UserProfile>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
