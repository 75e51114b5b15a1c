//! Scroll-driven prefetching for social feeds.
//!
//! A [`SmartPrefetcher`] watches how a user scrolls, decides when a feed page,
//! the other feed tab or author profiles are worth fetching early, runs those
//! fetches in the background and keeps the results in a short-lived cache the
//! feed renderer checks before going to the network.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{PrefetchError, PrefetchResult};
pub use models::{FeedPage, FeedParams, FeedTab, PrefetchAction, ScrollEvent, UserBehaviorPattern};
pub use services::{PrefetchHandle, PrefetchOutcome, PrefetcherBuilder, SmartPrefetcher};
