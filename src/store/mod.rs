//! Durable store abstraction.
//!
//! `QueueStore` narrows the full Redis command surface down to the
//! operations the match engine, session manager, and popularity reporting
//! actually need, so a deterministic in-memory double can stand in for
//! tests without reimplementing a Redis server.

pub mod mock;
pub mod redis_store;

use crate::error::AppError;

pub use mock::MockQueueStore;
pub use redis_store::RedisQueueStore;

/// Durable state backing the queue store, session records, and popularity
/// accounting. Every method maps to one or a small pipelined batch of Redis
/// commands in `RedisQueueStore`; see each method's doc for the mapping.
#[allow(async_fn_in_trait)]
pub trait QueueStore: Send + Sync {
    /// `SPOP key` — atomically remove and return one random member, or
    /// `None` if the set is empty.
    async fn pop_random_member(&self, key: &str) -> Result<Option<String>, AppError>;

    /// `SADD key member`.
    async fn add_member(&self, key: &str, member: &str) -> Result<(), AppError>;

    /// `SADD key member [member ...]` for several keys in one round trip,
    /// one `SADD` per key, `member` shared across all of them.
    async fn add_member_to_many(&self, keys: &[String], member: &str) -> Result<(), AppError>;

    /// `SREM key member`.
    async fn remove_member(&self, key: &str, member: &str) -> Result<(), AppError>;

    /// `SREM key member` across several keys in one pipelined round trip.
    async fn remove_member_from_many(&self, keys: &[String], member: &str) -> Result<(), AppError>;

    /// `SMEMBERS key`.
    async fn members(&self, key: &str) -> Result<Vec<String>, AppError>;

    /// `DEL key`.
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// `DEL key [key ...]` in one round trip.
    async fn delete_many(&self, keys: &[String]) -> Result<(), AppError>;

    /// `GET key`.
    async fn get_string(&self, key: &str) -> Result<Option<String>, AppError>;

    /// `SET key value`.
    async fn set_string(&self, key: &str, value: &str) -> Result<(), AppError>;

    /// `SET key value` for several `(key, value)` pairs in one pipelined
    /// round trip (used by session creation, which writes the session
    /// record and both participants' user→session mapping together).
    async fn set_many(&self, pairs: &[(String, String)]) -> Result<(), AppError>;

    /// `SCAN 0 MATCH <prefix>* COUNT ...` fully drained into a `Vec`,
    /// returning the matched keys with `prefix` stripped off.
    async fn scan_suffixes(&self, prefix: &str) -> Result<Vec<String>, AppError>;

    /// `ZADD key score member`, setting (not incrementing) `member`'s score.
    /// Used to timestamp a user's most recent enqueue under an interest tag.
    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), AppError>;

    /// `ZREMRANGEBYSCORE key -inf max` followed by `ZCARD key` in one
    /// pipelined round trip: drop entries older than the popularity window,
    /// then read how many remain live.
    async fn trim_and_count(&self, key: &str, max_score: f64) -> Result<u64, AppError>;
}
