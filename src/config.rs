use serde::Deserialize;

use crate::db::CacheTtls;
use crate::error::{PrefetchError, PrefetchResult};
use crate::services::{TrackerSettings, TriggerSettings};

/// Prefetcher configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Redis connection URL used to persist behavior patterns
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Base URL of the feed backend
    #[serde(default = "default_feed_api_url")]
    pub feed_api_url: String,

    /// Anonymous API key for the feed backend
    #[serde(default)]
    pub feed_api_key: String,

    /// Items requested per feed page
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,

    /// Maximum scroll samples kept per user
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Number of most recent samples averaged into the rolling velocity
    #[serde(default = "default_average_window")]
    pub average_window: usize,

    /// Velocity must exceed this multiple of the average to prefetch the next page
    #[serde(default = "default_velocity_multiplier")]
    pub velocity_multiplier: f64,

    /// Chance of warming the opposite tab on an active scroll
    #[serde(default = "default_opposite_tab_probability")]
    pub opposite_tab_probability: f64,

    /// Scroll offset past which user profiles get prefetched
    #[serde(default = "default_profile_scroll_threshold")]
    pub profile_scroll_threshold: f64,

    /// How far back a sample still counts as recent activity
    #[serde(default = "default_recent_activity_window_ms")]
    pub recent_activity_window_ms: f64,

    #[serde(default = "default_next_page_ttl_ms")]
    pub next_page_ttl_ms: u64,

    #[serde(default = "default_tab_prefetch_ttl_ms")]
    pub tab_prefetch_ttl_ms: u64,

    #[serde(default = "default_profile_ttl_ms")]
    pub profile_ttl_ms: u64,

    /// TTL of persisted behavior patterns, in seconds
    #[serde(default = "default_behavior_ttl_secs")]
    pub behavior_ttl_secs: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_feed_api_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_items_per_page() -> u32 {
    10
}

fn default_history_capacity() -> usize {
    20
}

fn default_average_window() -> usize {
    10
}

fn default_velocity_multiplier() -> f64 {
    1.5
}

fn default_opposite_tab_probability() -> f64 {
    0.3
}

fn default_profile_scroll_threshold() -> f64 {
    1000.0
}

fn default_recent_activity_window_ms() -> f64 {
    5000.0
}

fn default_next_page_ttl_ms() -> u64 {
    3 * 60 * 1000
}

fn default_tab_prefetch_ttl_ms() -> u64 {
    5 * 60 * 1000
}

fn default_profile_ttl_ms() -> u64 {
    5 * 60 * 1000
}

fn default_behavior_ttl_secs() -> u64 {
    1800
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            feed_api_url: default_feed_api_url(),
            feed_api_key: String::new(),
            items_per_page: default_items_per_page(),
            history_capacity: default_history_capacity(),
            average_window: default_average_window(),
            velocity_multiplier: default_velocity_multiplier(),
            opposite_tab_probability: default_opposite_tab_probability(),
            profile_scroll_threshold: default_profile_scroll_threshold(),
            recent_activity_window_ms: default_recent_activity_window_ms(),
            next_page_ttl_ms: default_next_page_ttl_ms(),
            tab_prefetch_ttl_ms: default_tab_prefetch_ttl_ms(),
            profile_ttl_ms: default_profile_ttl_ms(),
            behavior_ttl_secs: default_behavior_ttl_secs(),
        }
    }
}

fn invalid(message: impl Into<String>) -> PrefetchError {
    PrefetchError::Config(message.into())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the heuristics cannot work with
    pub fn validate(&self) -> PrefetchResult<()> {
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity must be at least 1"));
        }
        if self.average_window == 0 || self.average_window > self.history_capacity {
            return Err(invalid(format!(
                "average_window must be between 1 and history_capacity ({})",
                self.history_capacity
            )));
        }
        if !(0.0..=1.0).contains(&self.opposite_tab_probability) {
            return Err(invalid("opposite_tab_probability must be within [0, 1]"));
        }
        for (name, value) in [
            ("velocity_multiplier", self.velocity_multiplier),
            ("profile_scroll_threshold", self.profile_scroll_threshold),
            ("recent_activity_window_ms", self.recent_activity_window_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.items_per_page == 0 {
            return Err(invalid("items_per_page must be at least 1"));
        }
        Ok(())
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            history_capacity: self.history_capacity,
            average_window: self.average_window,
        }
    }

    pub fn trigger_settings(&self) -> TriggerSettings {
        TriggerSettings {
            velocity_multiplier: self.velocity_multiplier,
            opposite_tab_probability: self.opposite_tab_probability,
            profile_scroll_threshold: self.profile_scroll_threshold,
            recent_activity_window_ms: self.recent_activity_window_ms,
            ..TriggerSettings::default()
        }
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            next_page_ms: self.next_page_ttl_ms,
            tab_prefetch_ms: self.tab_prefetch_ttl_ms,
            profiles_ms: self.profile_ttl_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.average_window, 10);
        assert_eq!(config.next_page_ttl_ms, 180_000);
        assert_eq!(config.tab_prefetch_ttl_ms, 300_000);
    }

    #[test]
    fn test_envy_applies_defaults() {
        let vars = vec![("ITEMS_PER_PAGE".to_string(), "25".to_string())];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.items_per_page, 25);
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.velocity_multiplier, 1.5);
    }

    #[test]
    fn test_average_window_larger_than_history_is_rejected() {
        let config = Config {
            average_window: 30,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_probability_out_of_range_is_rejected() {
        let config = Config {
            opposite_tab_probability: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_or_negative_tuning_is_rejected() {
        let bad = [
            Config {
                velocity_multiplier: f64::NAN,
                ..Config::default()
            },
            Config {
                velocity_multiplier: -1.0,
                ..Config::default()
            },
            Config {
                profile_scroll_threshold: f64::INFINITY,
                ..Config::default()
            },
            Config {
                recent_activity_window_ms: -5.0,
                ..Config::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(PrefetchError::Config(_))));
        }
    }

    #[test]
    fn test_validation_error_names_the_setting() {
        let config = Config {
            velocity_multiplier: f64::NAN,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: velocity_multiplier"));
    }

    // The only test in the crate that touches process environment variables
    #[test]
    fn test_from_env_reads_and_validates() {
        std::env::set_var("ITEMS_PER_PAGE", "7");
        let config = Config::from_env().unwrap();
        assert_eq!(config.items_per_page, 7);

        std::env::set_var("ITEMS_PER_PAGE", "0");
        let rejected = Config::from_env();
        std::env::remove_var("ITEMS_PER_PAGE");

        assert!(rejected.is_err());
    }

    #[test]
    fn test_derived_settings() {
        let config = Config::default();
        assert_eq!(config.tracker_settings().history_capacity, 20);
        assert_eq!(config.trigger_settings().profile_scroll_threshold, 1000.0);
        assert_eq!(config.cache_ttls().profiles_ms, 300_000);
    }
}
