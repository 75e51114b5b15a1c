/// PostgREST feed provider
///
/// Talks to the hosted backend's REST surface:
/// 1. Feeds: POST /rest/v1/rpc/get_for_you_feed or /rest/v1/rpc/get_following_feed
/// 2. Profiles: GET /rest/v1/profiles?id=in.(...)
use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{PrefetchError, PrefetchResult},
    models::{FeedItem, FeedPage, FeedParams, FeedTab, UserProfile},
    services::providers::FeedFetcher,
};

const PROFILE_COLUMNS: &str = "id,username,display_name,avatar_url";

/// Row shape returned by the feed RPCs
#[derive(Debug, Clone, Deserialize)]
struct FeedRow {
    id: Uuid,
    user_id: String,
    #[serde(default)]
    entity_id: Option<Uuid>,
    title: String,
    created_at: DateTime<Utc>,
}

impl From<FeedRow> for FeedItem {
    fn from(row: FeedRow) -> Self {
        FeedItem {
            id: row.id,
            author_id: row.user_id,
            entity_id: row.entity_id,
            title: row.title,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct FeedRpcArgs<'a> {
    p_user_id: &'a str,
    p_limit: u32,
    p_offset: u64,
}

#[derive(Clone)]
pub struct HttpFeedFetcher {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
}

impl HttpFeedFetcher {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn rpc_name(tab: FeedTab) -> &'static str {
        match tab {
            FeedTab::ForYou => "get_for_you_feed",
            FeedTab::Following => "get_following_feed",
        }
    }

    fn rpc_url(&self, tab: FeedTab) -> String {
        format!("{}/rest/v1/rpc/{}", self.api_url, Self::rpc_name(tab))
    }

    fn profile_filter(user_ids: &[String]) -> String {
        format!("in.({})", user_ids.join(","))
    }

    async fn check_status(response: reqwest::Response) -> PrefetchResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(PrefetchError::ExternalApi(format!(
            "Feed API returned status {}: {}",
            status, body
        )))
    }
}

#[async_trait::async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch_feed(&self, tab: FeedTab, params: FeedParams) -> PrefetchResult<FeedPage> {
        let args = FeedRpcArgs {
            p_user_id: &params.user_id,
            p_limit: params.items_per_page,
            p_offset: params.offset(),
        };

        let response = self
            .http_client
            .post(self.rpc_url(tab))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&args)
            .send()
            .await?;

        let rows: Vec<FeedRow> = Self::check_status(response).await?.json().await?;
        let has_more = rows.len() as u64 >= u64::from(params.items_per_page);

        tracing::debug!(
            tab = %tab,
            user_id = %params.user_id,
            page = params.page,
            count = rows.len(),
            "Fetched feed page"
        );

        Ok(FeedPage {
            tab,
            page: params.page,
            items: rows.into_iter().map(FeedItem::from).collect(),
            has_more,
        })
    }

    async fn fetch_profiles(&self, user_ids: Vec<String>) -> PrefetchResult<Vec<UserProfile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/rest/v1/profiles", self.api_url);
        let filter = Self::profile_filter(&user_ids);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&[("select", PROFILE_COLUMNS), ("id", filter.as_str())])
            .send()
            .await?;

        let profiles: Vec<UserProfile> = Self::check_status(response).await?.json().await?;
        Ok(profiles)
    }

    fn name(&self) -> &'static str {
        "postgrest"
    }
}
