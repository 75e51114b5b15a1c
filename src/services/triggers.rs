use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{FeedTab, PrefetchAction, UserBehaviorPattern};

/// Uniform random numbers in `[0, 1)` for the probabilistic trigger
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Always returns the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Reproducible sequence from a seed
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen::<f64>(),
            Err(poisoned) => poisoned.into_inner().gen::<f64>(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerSettings {
    pub velocity_multiplier: f64,
    pub opposite_tab_probability: f64,
    pub profile_scroll_threshold: f64,
    pub recent_activity_window_ms: f64,
    /// Samples required before the velocity comparison is trusted
    pub min_samples: usize,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            velocity_multiplier: 1.5,
            opposite_tab_probability: 0.3,
            profile_scroll_threshold: 1000.0,
            recent_activity_window_ms: 5000.0,
            min_samples: 2,
        }
    }
}

/// Decides which prefetches a scroll event warrants
pub struct TriggerEvaluator {
    settings: TriggerSettings,
    random: Box<dyn RandomSource>,
}

impl TriggerEvaluator {
    pub fn new(settings: TriggerSettings, random: Box<dyn RandomSource>) -> Self {
        Self { settings, random }
    }

    /// Evaluates the rules for one scroll event
    ///
    /// `pattern` holds the user's statistics from before this event.
    /// Rules run in a fixed order: next page on a velocity spike, opposite tab
    /// by chance while the user is active, profiles once scrolled deep enough.
    /// Without enough history the velocity rule is skipped.
    pub fn evaluate(
        &self,
        pattern: Option<&UserBehaviorPattern>,
        active_tab: FeedTab,
        velocity: f64,
        scroll_top: f64,
        timestamp_ms: f64,
    ) -> Vec<PrefetchAction> {
        let mut actions = Vec::new();

        if let Some(pattern) = pattern {
            if self.is_velocity_spike(pattern, velocity) {
                actions.push(PrefetchAction::NextPage(active_tab));
            }

            if pattern.has_recent_activity(timestamp_ms, self.settings.recent_activity_window_ms)
                && self.random.next_f64() < self.settings.opposite_tab_probability
            {
                actions.push(PrefetchAction::OppositeTab(active_tab));
            }
        }

        if scroll_top.is_finite() && scroll_top > self.settings.profile_scroll_threshold {
            actions.push(PrefetchAction::UserProfiles);
        }

        tracing::debug!(
            tab = %active_tab,
            velocity,
            scroll_top,
            actions = ?actions,
            "Evaluated prefetch triggers"
        );

        actions
    }

    fn is_velocity_spike(&self, pattern: &UserBehaviorPattern, velocity: f64) -> bool {
        pattern.sample_count() >= self.settings.min_samples
            && velocity.is_finite()
            && velocity > self.settings.velocity_multiplier * pattern.average_velocity
    }

    pub fn settings(&self) -> TriggerSettings {
        self.settings
    }
}

impl Default for TriggerEvaluator {
    fn default() -> Self {
        Self::new(TriggerSettings::default(), Box::new(ThreadRandom))
    }
}
