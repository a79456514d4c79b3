//! In-memory `QueueStore` double for deterministic unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::AppError;

use super::QueueStore;

#[derive(Default)]
struct Inner {
    sets: HashMap<String, HashSet<String>>,
    strings: HashMap<String, String>,
    sorted: HashMap<String, HashMap<String, f64>>,
}

/// Mutex-guarded in-process state implementing the same trait the Redis
/// backend does, so the match engine and session manager can be exercised
/// without a live Redis instance.
#[derive(Default)]
pub struct MockQueueStore {
    inner: Mutex<Inner>,
}

impl MockQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for MockQueueStore {
    async fn pop_random_member(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(set) = inner.sets.get_mut(key) else {
            return Ok(None);
        };
        let member = set.iter().next().cloned();
        if let Some(member) = &member {
            set.remove(member);
        }
        Ok(member)
    }

    async fn add_member(&self, key: &str, member: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sets.entry(key.to_string()).or_default().insert(member.to_string());
        Ok(())
    }

    async fn add_member_to_many(&self, keys: &[String], member: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        for key in keys {
            inner.sets.entry(key.clone()).or_default().insert(member.to_string());
        }
        Ok(())
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(set) = inner.sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn remove_member_from_many(&self, keys: &[String], member: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        for key in keys {
            if let Some(set) = inner.sets.get_mut(key) {
                set.remove(member);
            }
        }
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sets.remove(key);
        inner.strings.remove(key);
        inner.sorted.remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        for key in keys {
            inner.sets.remove(key);
            inner.strings.remove(key);
            inner.sorted.remove(key);
        }
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.strings.get(key).cloned())
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_many(&self, pairs: &[(String, String)]) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        for (key, value) in pairs {
            inner.strings.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn scan_suffixes(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut suffixes: Vec<String> = inner
            .sets
            .keys()
            .chain(inner.strings.keys())
            .chain(inner.sorted.keys())
            .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
            .collect();
        suffixes.sort();
        suffixes.dedup();
        Ok(suffixes)
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sorted.entry(key.to_string()).or_default().insert(member.to_string(), score);
        Ok(())
    }

    async fn trim_and_count(&self, key: &str, max_score: f64) -> Result<u64, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(zset) = inner.sorted.get_mut(key) {
            zset.retain(|_, score| *score > max_score);
            Ok(zset.len() as u64)
        } else {
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pop_random_member_empty_set_returns_none() {
        let store = MockQueueStore::new();
        assert_eq!(store.pop_random_member("interest:MUSIC").await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_then_pop_roundtrips() {
        let store = MockQueueStore::new();
        store.add_member("interest:MUSIC", "u1").await.unwrap();
        let popped = store.pop_random_member("interest:MUSIC").await.unwrap();
        assert_eq!(popped, Some("u1".to_string()));
        assert_eq!(store.members("interest:MUSIC").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn trim_and_count_drops_stale_scores() {
        let store = MockQueueStore::new();
        store.zadd("popular:MUSIC", 1.0, "u1").await.unwrap();
        store.zadd("popular:MUSIC", 100.0, "u2").await.unwrap();
        let count = store.trim_and_count("popular:MUSIC", 50.0).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn set_many_and_delete_many() {
        let store = MockQueueStore::new();
        store
            .set_many(&[
                ("chat_session:abc".to_string(), "{}".to_string()),
                ("user_session:u1".to_string(), "abc".to_string()),
            ])
            .await
            .unwrap();
        assert_eq!(store.get_string("user_session:u1").await.unwrap(), Some("abc".to_string()));
        store
            .delete_many(&["chat_session:abc".to_string(), "user_session:u1".to_string()])
            .await
            .unwrap();
        assert_eq!(store.get_string("user_session:u1").await.unwrap(), None);
    }
}
