use std::collections::HashMap;

use crate::models::{FeedTab, ScrollDirection, ScrollSample, UserBehaviorPattern};

/// Sizing of the per-user sample history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Samples kept per user; the oldest is dropped first
    pub history_capacity: usize,
    /// Most recent samples averaged into `average_velocity`
    pub average_window: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            average_window: 10,
        }
    }
}

/// Records scroll samples and keeps a rolling velocity per user
#[derive(Debug, Default)]
pub struct BehaviorTracker {
    settings: TrackerSettings,
    patterns: HashMap<String, UserBehaviorPattern>,
}

fn valid(value: f64) -> Option<f64> {
    (value.is_finite() && value >= 0.0).then_some(value)
}

impl BehaviorTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings: TrackerSettings {
                history_capacity: settings.history_capacity.max(1),
                average_window: settings.average_window.max(1),
            },
            patterns: HashMap::new(),
        }
    }

    /// Records a scroll event and returns the sample it produced
    ///
    /// Velocity is measured against the user's previous sample. Input that
    /// cannot produce a meaningful delta (first event, non-finite or negative
    /// values, time not moving forward) yields a velocity of zero.
    pub fn record_scroll(
        &mut self,
        user_id: &str,
        tab: FeedTab,
        scroll_top: f64,
        timestamp_ms: f64,
    ) -> ScrollSample {
        let settings = self.settings;
        let pattern = self
            .patterns
            .entry(user_id.to_string())
            .or_insert_with(|| UserBehaviorPattern::new(user_id, tab));

        let previous = pattern.last_sample().copied();
        let position = valid(scroll_top)
            .or(previous.map(|p| p.scroll_position))
            .unwrap_or(0.0);
        let timestamp = valid(timestamp_ms);

        let (velocity, direction) = match (previous, timestamp, valid(scroll_top)) {
            (Some(prev), Some(now), Some(_)) if now > prev.timestamp_ms => {
                let delta = position - prev.scroll_position;
                let velocity = delta.abs() / (now - prev.timestamp_ms);
                let direction = if delta > 0.0 {
                    ScrollDirection::Down
                } else if delta < 0.0 {
                    ScrollDirection::Up
                } else {
                    ScrollDirection::Idle
                };
                (velocity, direction)
            }
            _ => (0.0, ScrollDirection::Idle),
        };

        let sample = ScrollSample {
            timestamp_ms: timestamp
                .or(previous.map(|p| p.timestamp_ms))
                .unwrap_or(0.0),
            scroll_position: position,
            velocity,
            direction,
        };

        pattern.recent_samples.push_back(sample);
        while pattern.recent_samples.len() > settings.history_capacity {
            pattern.recent_samples.pop_front();
        }
        pattern.average_velocity = rolling_average(pattern, settings.average_window);

        pattern.last_active_tab = tab;
        pattern.tab_activity.bump(tab);
        let current = pattern.preferred_feed_type;
        if pattern.tab_activity.count(tab) > pattern.tab_activity.count(current) {
            pattern.preferred_feed_type = tab;
        }

        sample
    }

    /// Marks `tab` as the user's active tab without recording a sample
    pub fn set_active_tab(&mut self, user_id: &str, tab: FeedTab) {
        self.patterns
            .entry(user_id.to_string())
            .or_insert_with(|| UserBehaviorPattern::new(user_id, tab))
            .last_active_tab = tab;
    }

    pub fn pattern(&self, user_id: &str) -> Option<&UserBehaviorPattern> {
        self.patterns.get(user_id)
    }

    /// Replaces the in-memory pattern with one loaded from a previous session
    pub fn restore(&mut self, mut pattern: UserBehaviorPattern) {
        while pattern.recent_samples.len() > self.settings.history_capacity {
            pattern.recent_samples.pop_front();
        }
        pattern.average_velocity = rolling_average(&pattern, self.settings.average_window);
        self.patterns.insert(pattern.user_id.clone(), pattern);
    }

    pub fn reset(&mut self) {
        self.patterns.clear();
    }

    /// Number of tracked users
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn settings(&self) -> TrackerSettings {
        self.settings
    }
}

fn rolling_average(pattern: &UserBehaviorPattern, window: usize) -> f64 {
    let count = pattern.recent_samples.len().min(window);
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = pattern
        .recent_samples
        .iter()
        .rev()
        .take(count)
        .map(|s| s.velocity)
        .sum();
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_scroll_creates_pattern_with_zero_velocity() {
        let mut tracker = BehaviorTracker::default();
        let sample = tracker.record_scroll("u1", FeedTab::ForYou, 500.0, 1_000.0);

        assert_eq!(sample.velocity, 0.0);
        let pattern = tracker.pattern("u1").unwrap();
        assert_eq!(pattern.sample_count(), 1);
        assert_eq!(pattern.average_velocity, 0.0);
    }

    #[test]
    fn test_velocity_is_absolute_delta_over_time() {
        let mut tracker = BehaviorTracker::default();
        tracker.record_scroll("u1", FeedTab::ForYou, 1_000.0, 0.0);
        let sample = tracker.record_scroll("u1", FeedTab::ForYou, 800.0, 100.0);

        assert_eq!(sample.velocity, 2.0);
        assert_eq!(sample.direction, ScrollDirection::Up);
    }

    #[test]
    fn test_velocity_never_negative() {
        let mut tracker = BehaviorTracker::default();
        let positions = [0.0, 300.0, 100.0, 900.0, 900.0, 50.0, 2_000.0, 0.0];
        for (i, pos) in positions.iter().enumerate() {
            let sample = tracker.record_scroll("u1", FeedTab::ForYou, *pos, (i as f64) * 16.0);
            assert!(sample.velocity >= 0.0);
        }
        assert!(tracker.pattern("u1").unwrap().average_velocity >= 0.0);
    }

    #[test]
    fn test_history_is_capped_fifo() {
        let mut tracker = BehaviorTracker::default();
        for i in 0..50 {
            tracker.record_scroll("u1", FeedTab::ForYou, (i * 10) as f64, (i * 100) as f64);
        }

        let pattern = tracker.pattern("u1").unwrap();
        assert_eq!(pattern.sample_count(), 20);
        assert_eq!(pattern.recent_samples.front().unwrap().timestamp_ms, 3_000.0);
        assert_eq!(pattern.last_sample().unwrap().timestamp_ms, 4_900.0);
    }

    #[test]
    fn test_idle_eleventh_event_pulls_average_down() {
        let mut tracker = BehaviorTracker::default();
        for i in 0..10 {
            tracker.record_scroll("u1", FeedTab::ForYou, (i * 100) as f64, (i * 100) as f64);
        }
        let before = tracker.pattern("u1").unwrap().average_velocity;
        // Nine non-zero samples (1.0 each) after the zero-velocity first sample
        assert!((before - 0.9).abs() < 1e-9);

        let sample = tracker.record_scroll("u1", FeedTab::ForYou, 900.0, 1_000.0);
        assert_eq!(sample.velocity, 0.0);
        assert_eq!(sample.direction, ScrollDirection::Idle);

        // Window now holds the nine moving samples plus the idle one
        let after = tracker.pattern("u1").unwrap().average_velocity;
        assert!((after - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_timestamps_yield_zero_velocity() {
        let mut tracker = BehaviorTracker::default();
        tracker.record_scroll("u1", FeedTab::ForYou, 0.0, 100.0);

        let nan = tracker.record_scroll("u1", FeedTab::ForYou, 500.0, f64::NAN);
        assert_eq!(nan.velocity, 0.0);
        assert_eq!(nan.timestamp_ms, 100.0);

        let negative = tracker.record_scroll("u1", FeedTab::ForYou, 900.0, -5.0);
        assert_eq!(negative.velocity, 0.0);

        let backwards = tracker.record_scroll("u1", FeedTab::ForYou, 1_200.0, 50.0);
        assert_eq!(backwards.velocity, 0.0);
    }

    #[test]
    fn test_malformed_position_keeps_previous() {
        let mut tracker = BehaviorTracker::default();
        tracker.record_scroll("u1", FeedTab::ForYou, 400.0, 100.0);
        let sample = tracker.record_scroll("u1", FeedTab::ForYou, f64::INFINITY, 200.0);

        assert_eq!(sample.velocity, 0.0);
        assert_eq!(sample.scroll_position, 400.0);
    }

    #[test]
    fn test_preferred_feed_type_follows_most_used_tab() {
        let mut tracker = BehaviorTracker::default();
        tracker.record_scroll("u1", FeedTab::ForYou, 0.0, 0.0);
        tracker.record_scroll("u1", FeedTab::Following, 10.0, 10.0);
        assert_eq!(
            tracker.pattern("u1").unwrap().preferred_feed_type,
            FeedTab::ForYou
        );

        tracker.record_scroll("u1", FeedTab::Following, 20.0, 20.0);
        let pattern = tracker.pattern("u1").unwrap();
        assert_eq!(pattern.preferred_feed_type, FeedTab::Following);
        assert_eq!(pattern.last_active_tab, FeedTab::Following);
    }

    #[test]
    fn test_users_are_tracked_independently() {
        let mut tracker = BehaviorTracker::default();
        tracker.record_scroll("u1", FeedTab::ForYou, 0.0, 0.0);
        tracker.record_scroll("u2", FeedTab::Following, 0.0, 0.0);
        tracker.record_scroll("u2", FeedTab::Following, 100.0, 10.0);

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.pattern("u1").unwrap().sample_count(), 1);
        assert_eq!(tracker.pattern("u2").unwrap().sample_count(), 2);
    }

    #[test]
    fn test_restore_trims_and_recomputes() {
        let mut tracker = BehaviorTracker::new(TrackerSettings {
            history_capacity: 3,
            average_window: 2,
        });
        let mut pattern = UserBehaviorPattern::new("u1", FeedTab::ForYou);
        for v in [1.0, 2.0, 3.0, 4.0, 6.0] {
            pattern.recent_samples.push_back(ScrollSample {
                timestamp_ms: 0.0,
                scroll_position: 0.0,
                velocity: v,
                direction: ScrollDirection::Down,
            });
        }
        pattern.average_velocity = 99.0;

        tracker.restore(pattern);

        let restored = tracker.pattern("u1").unwrap();
        assert_eq!(restored.sample_count(), 3);
        assert_eq!(restored.average_velocity, 5.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tracker = BehaviorTracker::default();
        tracker.record_scroll("u1", FeedTab::ForYou, 0.0, 0.0);
        tracker.set_active_tab("u2", FeedTab::Following);
        tracker.reset();
        assert!(tracker.is_empty());
    }
}
