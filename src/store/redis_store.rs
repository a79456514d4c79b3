//! Redis-backed `QueueStore`.

use deadpool_redis::Pool;
use redis::AsyncCommands;

use crate::error::AppError;

use super::QueueStore;

/// Wraps a `deadpool-redis` connection pool. Cheap to clone — the pool
/// itself is reference-counted.
#[derive(Clone)]
pub struct RedisQueueStore {
    pool: Pool,
}

impl RedisQueueStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl QueueStore for RedisQueueStore {
    async fn pop_random_member(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.pool.get().await?;
        let member: Option<String> = conn.spop(key).await?;
        Ok(member)
    }

    async fn add_member(&self, key: &str, member: &str) -> Result<(), AppError> {
        let mut conn = self.pool.get().await?;
        conn.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn add_member_to_many(&self, keys: &[String], member: &str) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.sadd(key, member).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), AppError> {
        let mut conn = self.pool.get().await?;
        conn.srem::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn remove_member_from_many(&self, keys: &[String], member: &str) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.srem(key, member).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.pool.get().await?;
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(keys).await?;
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut conn = self.pool.get().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn set_many(&self, pairs: &[(String, String)]) -> Result<(), AppError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();
        for (key, value) in pairs {
            pipe.set(key, value).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn scan_suffixes(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.pool.get().await?;
        let pattern = format!("{prefix}*");
        let mut suffixes = Vec::new();
        let mut iter: redis::AsyncIter<'_, String> = conn.scan_match(pattern).await?;
        while let Some(key) = futures::StreamExt::next(&mut iter).await {
            if let Some(suffix) = key.strip_prefix(prefix) {
                suffixes.push(suffix.to_string());
            }
        }
        Ok(suffixes)
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), AppError> {
        let mut conn = self.pool.get().await?;
        conn.zadd::<_, _, _, ()>(key, member, score).await?;
        Ok(())
    }

    async fn trim_and_count(&self, key: &str, max_score: f64) -> Result<u64, AppError> {
        let mut conn = self.pool.get().await?;
        let (_removed, count): (u64, u64) = redis::pipe()
            .zrembyscore(key, f64::NEG_INFINITY, max_score)
            .zcard(key)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}
