pub mod prefetcher;
pub mod providers;
pub mod tracker;
pub mod triggers;

pub use prefetcher::{PrefetchHandle, PrefetchOutcome, PrefetcherBuilder, SmartPrefetcher};
pub use providers::{FeedFetcher, HttpFeedFetcher};
pub use tracker::{BehaviorTracker, TrackerSettings};
pub use triggers::{
    FixedRandom, RandomSource, SeededRandom, ThreadRandom, TriggerEvaluator, TriggerSettings,
};
