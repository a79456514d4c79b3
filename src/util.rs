//! Interest normalization, deterministic chat ids, and store key naming.

use sha1::{Digest, Sha1};

use crate::model::WILDCARD_TAG;

/// Trim, upper-case, and dedupe a caller-supplied interest list while
/// preserving first-seen order.
pub fn normalize_interests(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Deterministic chat id for a pair of user ids: SHA-1 hex of the two ids
/// sorted lexicographically and joined with `-`. Symmetric:
/// `chat_id(a, b) == chat_id(b, a)`.
pub fn chat_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha1::new();
    hasher.update(first.as_bytes());
    hasher.update(b"-");
    hasher.update(second.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key for the per-tag waiting-user set: `interest:<TAG>`.
pub fn interest_key(tag: &str) -> String {
    format!("interest:{tag}")
}

/// Key for the set of tags a user is currently queued under.
pub fn user_interests_key(user_id: &str) -> String {
    format!("user_interests:{user_id}")
}

/// Prefix for a tag's popularity event log, scanned to enumerate every tag
/// that has ever recorded an enrollment.
pub const POPULAR_PREFIX: &str = "popular:";

/// Key for a tag's popularity event log: a sorted set of `userId -> last
/// enqueued at (ms)`, trimmed to the popularity window before counting.
pub fn popular_key(tag: &str) -> String {
    format!("{POPULAR_PREFIX}{tag}")
}

/// Key for the registry of every tag that has ever been queued against.
pub fn all_interests_key() -> &'static str {
    "all_interests"
}

/// Key for a persisted session record: `chat_session:<chatId>`.
pub fn chat_session_key(chat_id: &str) -> String {
    format!("chat_session:{chat_id}")
}

/// Key mapping a user id to their active `chatId`.
pub fn user_session_key(user_id: &str) -> String {
    format!("user_session:{user_id}")
}

/// Pub/sub channel a waiting user's SSE handler subscribes to.
pub fn match_notification_channel(user_id: &str) -> String {
    format!("match_notification:{user_id}")
}

/// The reserved wildcard tag's queue key, exposed for callers that need to
/// special-case it (e.g. skip it when scanning interest-bearing tags only).
pub fn wildcard_key() -> String {
    interest_key(WILDCARD_TAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_upper_cases_and_dedupes() {
        let input = vec![
            " music ".to_string(),
            "Music".to_string(),
            "FILM".to_string(),
            "".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(normalize_interests(&input), vec!["MUSIC", "FILM"]);
    }

    #[test]
    fn normalize_preserves_first_seen_order() {
        let input = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(normalize_interests(&input), vec!["B", "A"]);
    }

    #[test]
    fn chat_id_is_symmetric() {
        assert_eq!(chat_id("alice", "bob"), chat_id("bob", "alice"));
    }

    #[test]
    fn chat_id_is_deterministic() {
        let first = chat_id("alice", "bob");
        let second = chat_id("alice", "bob");
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
    }

    #[test]
    fn chat_id_differs_for_different_pairs() {
        assert_ne!(chat_id("alice", "bob"), chat_id("alice", "carol"));
    }

    #[test]
    fn key_helpers_produce_expected_shapes() {
        assert_eq!(interest_key("MUSIC"), "interest:MUSIC");
        assert_eq!(user_interests_key("u1"), "user_interests:u1");
        assert_eq!(chat_session_key("abc"), "chat_session:abc");
        assert_eq!(user_session_key("u1"), "user_session:u1");
        assert_eq!(match_notification_channel("u1"), "match_notification:u1");
        assert_eq!(wildcard_key(), "interest:WILDCARD_ANY");
        assert_eq!(popular_key("MUSIC"), "popular:MUSIC");
    }
}
