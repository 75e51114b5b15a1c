pub mod memory;
pub mod redis;
pub mod store;

pub use memory::{CacheTtls, PrefetchCache, PrefetchKey};
pub use self::redis::{create_redis_client, PatternWriterHandle, RedisPatternStore};
pub use store::{MemoryPatternStore, PatternStore};
