use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use vanish_types::events::ChatEvent;

/// Per-recipient channel registry. Maps an identity handle to the set of
/// live subscriber connections for `chat.user.{handle}`. Publishing looks up
/// exactly one handle's set — never a walk over all connections.
#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// handle -> (conn_id -> sender)
    channels: RwLock<HashMap<String, HashMap<Uuid, mpsc::UnboundedSender<ChatEvent>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a subscriber connection on a handle's channel.
    /// Returns (conn_id, receiver).
    pub async fn subscribe(&self, handle: &str) -> (Uuid, mpsc::UnboundedReceiver<ChatEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .channels
            .write()
            .await
            .entry(handle.to_string())
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Drop one subscriber connection; the channel entry goes away with its
    /// last subscriber.
    pub async fn unsubscribe(&self, handle: &str, conn_id: Uuid) {
        let mut channels = self.inner.channels.write().await;
        if let Some(subscribers) = channels.get_mut(handle) {
            subscribers.remove(&conn_id);
            if subscribers.is_empty() {
                channels.remove(handle);
            }
        }
    }

    /// Deliver an event to every live subscriber of one handle's channel.
    /// Returns the number of connections reached; zero subscribers is not an
    /// error — the message is already durable in the store.
    pub async fn publish(&self, handle: &str, event: ChatEvent) -> usize {
        let channels = self.inner.channels.read().await;
        let Some(subscribers) = channels.get(handle) else {
            return 0;
        };

        subscribers
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    pub async fn subscriber_count(&self, handle: &str) -> usize {
        self.inner
            .channels
            .read()
            .await
            .get(handle)
            .map_or(0, HashMap::len)
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanish_types::api::MessagePayload;

    fn payload(id: i64, sender: &str, recipient: &str) -> MessagePayload {
        MessagePayload {
            id,
            sender_username: sender.into(),
            recipient_username: recipient.into(),
            message: Some("hi".into()),
            voice_url: None,
            created_at: "2026-02-19T13:00:00+00:00".into(),
            time: "13:00".into(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_only_the_target_handle() {
        let registry = ChannelRegistry::new();
        let (_sara_conn, mut sara_rx) = registry.subscribe("sara").await;
        let (_ali_conn, mut ali_rx) = registry.subscribe("ali").await;

        let delivered = registry
            .publish("sara", ChatEvent::MessageSent(payload(1, "ali", "sara")))
            .await;
        assert_eq!(delivered, 1);

        let ChatEvent::MessageSent(received) = sara_rx.recv().await.unwrap() else {
            panic!("expected message.sent");
        };
        assert_eq!(received.id, 1);

        // The sender's own channel stays silent.
        assert!(ali_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_delivers_zero() {
        let registry = ChannelRegistry::new();
        let delivered = registry
            .publish("nobody", ChatEvent::MessageSent(payload(2, "ali", "nobody")))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn unsubscribe_clears_empty_channels() {
        let registry = ChannelRegistry::new();
        let (conn, _rx) = registry.subscribe("sara").await;
        assert_eq!(registry.subscriber_count("sara").await, 1);

        registry.unsubscribe("sara", conn).await;
        assert_eq!(registry.subscriber_count("sara").await, 0);
    }

    #[tokio::test]
    async fn multiple_connections_per_handle_all_receive() {
        let registry = ChannelRegistry::new();
        let (_c1, mut rx1) = registry.subscribe("sara").await;
        let (_c2, mut rx2) = registry.subscribe("sara").await;

        let delivered = registry
            .publish("sara", ChatEvent::MessageSent(payload(3, "ali", "sara")))
            .await;
        assert_eq!(delivered, 2);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
