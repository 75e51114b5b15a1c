use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

pub mod behavior;

pub use behavior::{ScrollDirection, ScrollSample, TabActivity, UserBehaviorPattern};

/// One of the two feed content streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedTab {
    /// Algorithmic feed
    ForYou,
    /// Posts from followed users
    Following,
}

impl FeedTab {
    /// The other tab
    pub fn opposite(self) -> Self {
        match self {
            FeedTab::ForYou => FeedTab::Following,
            FeedTab::Following => FeedTab::ForYou,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedTab::ForYou => "for-you",
            FeedTab::Following => "following",
        }
    }
}

impl Display for FeedTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters passed to a feed fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedParams {
    pub user_id: String,
    /// Zero-based page index
    pub page: u32,
    pub items_per_page: u32,
}

impl FeedParams {
    /// Row offset of the first item on this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.items_per_page)
    }
}

/// A single recommendation post in a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: Uuid,
    pub author_id: String,
    #[serde(default)]
    pub entity_id: Option<Uuid>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One page of feed items as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub tab: FeedTab,
    pub page: u32,
    pub items: Vec<FeedItem>,
    pub has_more: bool,
}

impl FeedPage {
    /// Distinct author ids in display order
    pub fn author_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for item in &self.items {
            if !ids.contains(&item.author_id) {
                ids.push(item.author_id.clone());
            }
        }
        ids
    }
}

/// Public profile data shown next to feed items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A speculative fetch decided by the trigger evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "tab", rename_all = "snake_case")]
pub enum PrefetchAction {
    /// Fetch the page after the one being viewed on this tab
    NextPage(FeedTab),
    /// Fetch the first page of the tab opposite to this (active) one
    OppositeTab(FeedTab),
    /// Fetch profiles of authors in already cached pages
    UserProfiles,
}

impl Display for PrefetchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefetchAction::NextPage(tab) => write!(f, "next_page:{}", tab),
            PrefetchAction::OppositeTab(tab) => write!(f, "opposite_tab:{}", tab),
            PrefetchAction::UserProfiles => write!(f, "user_profiles"),
        }
    }
}

/// Input from the feed's scroll handler
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollEvent {
    pub user_id: String,
    pub tab: FeedTab,
    pub scroll_top: f64,
    pub timestamp_ms: f64,
    /// Zero-based page currently rendered on `tab`
    pub page: u32,
}
