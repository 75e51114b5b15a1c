use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::FeedTab;

/// Direction of a scroll movement relative to the previous sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Idle,
}

/// One observed scroll event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollSample {
    pub timestamp_ms: f64,
    pub scroll_position: f64,
    /// Absolute position delta over time delta, in units per millisecond
    pub velocity: f64,
    pub direction: ScrollDirection,
}

/// Count of scroll events seen on each tab
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabActivity {
    pub for_you: u32,
    pub following: u32,
}

impl TabActivity {
    pub fn bump(&mut self, tab: FeedTab) {
        match tab {
            FeedTab::ForYou => self.for_you = self.for_you.saturating_add(1),
            FeedTab::Following => self.following = self.following.saturating_add(1),
        }
    }

    pub fn count(&self, tab: FeedTab) -> u32 {
        match tab {
            FeedTab::ForYou => self.for_you,
            FeedTab::Following => self.following,
        }
    }
}

/// Rolling scroll statistics for one user session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBehaviorPattern {
    pub user_id: String,
    pub average_velocity: f64,
    pub preferred_feed_type: FeedTab,
    pub last_active_tab: FeedTab,
    /// Oldest first
    pub recent_samples: VecDeque<ScrollSample>,
    #[serde(default)]
    pub tab_activity: TabActivity,
}

impl UserBehaviorPattern {
    pub fn new(user_id: impl Into<String>, tab: FeedTab) -> Self {
        Self {
            user_id: user_id.into(),
            average_velocity: 0.0,
            preferred_feed_type: tab,
            last_active_tab: tab,
            recent_samples: VecDeque::new(),
            tab_activity: TabActivity::default(),
        }
    }

    pub fn last_sample(&self) -> Option<&ScrollSample> {
        self.recent_samples.back()
    }

    pub fn sample_count(&self) -> usize {
        self.recent_samples.len()
    }

    /// Whether the newest sample was taken at most `window_ms` before `now_ms`
    pub fn has_recent_activity(&self, now_ms: f64, window_ms: f64) -> bool {
        self.last_sample()
            .is_some_and(|last| now_ms >= last.timestamp_ms && now_ms - last.timestamp_ms <= window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp_ms: f64) -> ScrollSample {
        ScrollSample {
            timestamp_ms,
            scroll_position: 0.0,
            velocity: 0.0,
            direction: ScrollDirection::Idle,
        }
    }

    #[test]
    fn test_new_pattern_is_empty() {
        let pattern = UserBehaviorPattern::new("u1", FeedTab::ForYou);
        assert_eq!(pattern.sample_count(), 0);
        assert_eq!(pattern.average_velocity, 0.0);
        assert!(!pattern.has_recent_activity(0.0, 5000.0));
    }

    #[test]
    fn test_recent_activity_with_samples() {
        let mut pattern = UserBehaviorPattern::new("u1", FeedTab::ForYou);
        pattern.recent_samples.push_back(sample(1000.0));
        assert!(pattern.has_recent_activity(6000.0, 5000.0));
        assert!(!pattern.has_recent_activity(6001.0, 5000.0));
        assert!(!pattern.has_recent_activity(f64::NAN, 5000.0));
    }

    #[test]
    fn test_tab_activity_counts() {
        let mut activity = TabActivity::default();
        activity.bump(FeedTab::Following);
        activity.bump(FeedTab::Following);
        activity.bump(FeedTab::ForYou);
        assert_eq!(activity.count(FeedTab::Following), 2);
        assert_eq!(activity.count(FeedTab::ForYou), 1);
    }

    #[test]
    fn test_pattern_serde_keeps_samples() {
        let mut pattern = UserBehaviorPattern::new("u1", FeedTab::Following);
        pattern.recent_samples.push_back(sample(10.0));
        let json = serde_json::to_string(&pattern).unwrap();
        let restored: UserBehaviorPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, pattern);
        assert!(json.contains("\"preferred_feed_type\":\"following\""));
    }
}
