//! Per-user cross-instance match notification delivery.
//!
//! A waiting user's SSE handler subscribes to `match_notification:<userId>`
//! before it starts scanning the queue; if another instance of this process
//! forms the pair, it publishes here instead of writing directly into a
//! process-local channel, so delivery works across instances sharing only
//! the store.

use futures::Stream;
use redis::AsyncCommands;

use crate::error::AppError;
use crate::model::MatchedNotification;
use crate::util::match_notification_channel;

#[allow(async_fn_in_trait)]
pub trait NotificationBus: Send + Sync {
    /// Publish a `MATCHED` notification to the given user's channel. Callers
    /// that form a pair call this for whichever participant did not call
    /// `findOrQueue` on this instance.
    async fn publish(&self, user_id: &str, notification: &MatchedNotification) -> Result<(), AppError>;

    /// Subscribe to the given user's channel and return a stream of
    /// deserialized notifications. The subscription is established before
    /// this returns, so a publish racing the caller's own queue scan is
    /// never lost.
    async fn subscribe(
        &self,
        user_id: &str,
    ) -> Result<impl Stream<Item = MatchedNotification> + Send + Unpin + 'static, AppError>;
}

/// Redis pub/sub backed implementation. Each subscribe opens its own
/// connection — pub/sub connections cannot be pooled alongside ordinary
/// commands in the `redis` crate.
#[derive(Clone)]
pub struct RedisNotificationBus {
    client: redis::Client,
}

impl RedisNotificationBus {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

impl NotificationBus for RedisNotificationBus {
    async fn publish(&self, user_id: &str, notification: &MatchedNotification) -> Result<(), AppError> {
        let channel = match_notification_channel(user_id);
        let payload = serde_json::to_string(notification)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        user_id: &str,
    ) -> Result<impl Stream<Item = MatchedNotification> + Send + Unpin + 'static, AppError> {
        let channel = match_notification_channel(user_id);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;
        let stream = pubsub.into_on_message();
        Ok(Box::pin(futures::StreamExt::filter_map(stream, |msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str::<MatchedNotification>(&payload).ok()
        })))
    }
}


#[cfg(test)]
mod tests {
    use super::tests_support::MockNotificationBus;
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn publish_reaches_existing_subscriber() {
        let bus = MockNotificationBus::new();
        let mut stream = bus.subscribe("u1").await.unwrap();
        let notification =
            MatchedNotification::new("u2".to_string(), &["MUSIC".to_string()], "chat1".to_string(), "wss://x".to_string());
        bus.publish("u1", &notification).await.unwrap();
        let received = stream.next().await.unwrap();
        assert_eq!(received.matched_user_id, "u2");
        assert_eq!(received.chat_id, "chat1");
    }
}
