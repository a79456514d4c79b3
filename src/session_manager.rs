//! Session lifecycle: create, look up, and end chat sessions, including
//! repair of stale user→session mappings left behind by a crash between
//! writes.

use std::sync::Arc;

use crate::error::AppError;
use crate::model::{SessionRecord, StoredSession};
use crate::store::QueueStore;
use crate::util::{chat_session_key, user_session_key};

pub struct SessionManager<S: QueueStore> {
    store: Arc<S>,
}

impl<S: QueueStore> SessionManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist a new session record and both participants' user→session
    /// mapping in one pipelined write. Idempotent: re-creating the same
    /// `chat_id` with the same participants and server URL overwrites with
    /// identical content, which is harmless if two concurrent callers both
    /// happen to pop each other and race to create the same session.
    pub async fn create(&self, chat_id: &str, participants: [String; 2], server_url: String) -> Result<(), AppError> {
        let record = StoredSession { server_url, participants: participants.clone() };
        let payload = serde_json::to_string(&record)?;

        let mut pairs = vec![(chat_session_key(chat_id), payload)];
        for user_id in &participants {
            pairs.push((user_session_key(user_id), chat_id.to_string()));
        }
        self.store.set_many(&pairs).await
    }

    /// Resolve a user's active session, repairing a dangling mapping (the
    /// `user_session` key points at a `chat_session` that no longer exists,
    /// e.g. after the counterpart ended the session and only their own
    /// mapping was cleaned up due to a crash) by deleting the stale mapping
    /// and returning `NotFound` rather than surfacing `Inconsistent`.
    pub async fn get_session_for_user(&self, user_id: &str) -> Result<SessionRecord, AppError> {
        let chat_id = self
            .store
            .get_string(&user_session_key(user_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no active session for user {user_id}")))?;

        match self.store.get_string(&chat_session_key(&chat_id)).await? {
            Some(raw) => {
                let stored: StoredSession = serde_json::from_str(&raw)?;
                Ok(SessionRecord {
                    chat_id,
                    server_url: stored.server_url,
                    participants: stored.participants,
                })
            }
            None => {
                self.store.delete(&user_session_key(user_id)).await?;
                Err(AppError::NotFound(format!("no active session for user {user_id}")))
            }
        }
    }

    /// End a session: delete the session record and every participant's
    /// user→session mapping in one pipelined write. Looks the record up
    /// first so it can clean up the *other* participant's mapping too, not
    /// just the caller's. Returns `false` (and leaves only the caller's own
    /// mapping touched) when there was nothing to end or the session record
    /// was missing/malformed.
    pub async fn end(&self, user_id: &str) -> Result<bool, AppError> {
        let chat_id = match self.store.get_string(&user_session_key(user_id)).await? {
            Some(chat_id) => chat_id,
            None => return Ok(false),
        };

        let raw = match self.store.get_string(&chat_session_key(&chat_id)).await? {
            Some(raw) => raw,
            None => {
                self.store.delete(&user_session_key(user_id)).await?;
                return Ok(false);
            }
        };

        let stored: StoredSession = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(_) => {
                self.store.delete(&user_session_key(user_id)).await?;
                return Ok(false);
            }
        };

        let mut keys = vec![chat_session_key(&chat_id)];
        for participant in stored.participants {
            let key = user_session_key(&participant);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        self.store.delete_many(&keys).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockQueueStore;

    #[tokio::test]
    async fn create_then_get_session_roundtrips() {
        let manager = SessionManager::new(Arc::new(MockQueueStore::new()));
        manager
            .create("chat1", ["alice".to_string(), "bob".to_string()], "wss://server1".to_string())
            .await
            .unwrap();

        let record = manager.get_session_for_user("alice").await.unwrap();
        assert_eq!(record.chat_id, "chat1");
        assert_eq!(record.server_url, "wss://server1");

        let record = manager.get_session_for_user("bob").await.unwrap();
        assert_eq!(record.chat_id, "chat1");
    }

    #[tokio::test]
    async fn get_session_for_unknown_user_is_not_found() {
        let manager = SessionManager::new(Arc::new(MockQueueStore::new()));
        let err = manager.get_session_for_user("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn end_removes_both_participants_mappings() {
        let manager = SessionManager::new(Arc::new(MockQueueStore::new()));
        manager
            .create("chat1", ["alice".to_string(), "bob".to_string()], "wss://server1".to_string())
            .await
            .unwrap();

        assert!(manager.end("alice").await.unwrap());

        assert!(matches!(manager.get_session_for_user("alice").await, Err(AppError::NotFound(_))));
        assert!(matches!(manager.get_session_for_user("bob").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn end_then_end_again_is_true_then_false() {
        let manager = SessionManager::new(Arc::new(MockQueueStore::new()));
        manager
            .create("chat1", ["alice".to_string(), "bob".to_string()], "wss://server1".to_string())
            .await
            .unwrap();

        assert!(manager.end("alice").await.unwrap());
        assert!(!manager.end("alice").await.unwrap());
    }

    #[tokio::test]
    async fn dangling_mapping_is_repaired_as_not_found() {
        let store = Arc::new(MockQueueStore::new());
        store.set_string(&user_session_key("alice"), "ghost-chat").await.unwrap();
        let manager = SessionManager::new(store.clone());

        let err = manager.get_session_for_user("alice").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert_eq!(store.get_string(&user_session_key("alice")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn end_with_no_active_session_is_a_noop() {
        let manager = SessionManager::new(Arc::new(MockQueueStore::new()));
        assert!(!manager.end("nobody").await.unwrap());
    }
}
