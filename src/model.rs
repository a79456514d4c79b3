//! Wire and storage types shared by the match engine, session manager, and
//! HTTP routes.

use serde::{Deserialize, Serialize};

/// Reserved tag representing "match with anyone", stored and scanned like
/// any other interest tag.
pub const WILDCARD_TAG: &str = "WILDCARD_ANY";

/// Popularity accounting window.
pub const POPULARITY_WINDOW_MS: i64 = 10 * 60 * 1000;

/// Refresh interval for the chat-server URL cache.
pub const CHAT_SERVER_REFRESH_SECS: u64 = 60;

/// The result of a `findOrQueue` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Matched {
        partner_user_id: String,
        common_interests: Vec<String>,
        chat_id: String,
        chat_server_url: String,
    },
    Waiting,
}

/// Envelope published on `match_notification:<userId>` and mirrored to the
/// waiter's SSE stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedNotification {
    pub state: &'static str,
    #[serde(rename = "matchedUserId")]
    pub matched_user_id: String,
    pub interest: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "chatServerUrl")]
    pub chat_server_url: String,
}

impl MatchedNotification {
    pub fn new(matched_user_id: String, common_interests: &[String], chat_id: String, chat_server_url: String) -> Self {
        Self {
            state: "MATCHED",
            matched_user_id,
            interest: common_interests.join(","),
            chat_id,
            chat_server_url,
        }
    }
}

/// The JSON document stored at `chat_session:<chatId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(rename = "serverUrl")]
    pub server_url: String,
    pub participants: [String; 2],
}

/// The record returned to callers reconnecting to a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "serverUrl")]
    pub server_url: String,
    pub participants: [String; 2],
}
