//! Per-conversation presence fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::PresenceEvent;

struct Subscriber {
    user_id: Uuid,
    tx: UnboundedSender<PresenceEvent>,
}

/// Registry of presence subscribers, keyed by conversation.
///
/// Held in memory per server instance; losing it on restart is fine because
/// the state it carries is ephemeral by definition. Closed subscribers are
/// pruned on the next publish to their conversation.
#[derive(Default, Clone)]
pub struct PresenceChannel {
    inner: Arc<RwLock<HashMap<Uuid, Vec<Subscriber>>>>,
}

impl PresenceChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `user_id` on the conversation's topic. Dropping the
    /// returned receiver unsubscribes on the next publish.
    pub async fn subscribe(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> UnboundedReceiver<PresenceEvent> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard
            .entry(conversation_id)
            .or_default()
            .push(Subscriber { user_id, tx });
        rx
    }

    /// Fans the event out to every subscriber of its conversation except
    /// the sender. Best-effort: a closed receiver is dropped, never waited
    /// on.
    pub async fn publish(&self, event: PresenceEvent) {
        let mut guard = self.inner.write().await;
        let Some(subscribers) = guard.get_mut(&event.conversation_id) else {
            return;
        };
        subscribers.retain(|subscriber| {
            if subscriber.user_id == event.user_id {
                return !subscriber.tx.is_closed();
            }
            subscriber.tx.send(event.clone()).is_ok()
        });
        if subscribers.is_empty() {
            guard.remove(&event.conversation_id);
        }
        debug!(
            conversation_id = %event.conversation_id,
            kind = ?event.kind,
            "presence event published"
        );
    }

    pub async fn send_typing(&self, conversation_id: Uuid, user_id: Uuid) {
        self.publish(PresenceEvent::typing(conversation_id, user_id))
            .await;
    }

    pub async fn send_stop_typing(&self, conversation_id: Uuid, user_id: Uuid) {
        self.publish(PresenceEvent::stop_typing(conversation_id, user_id))
            .await;
    }

    #[cfg(test)]
    pub(crate) async fn subscriber_count(&self, conversation_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.get(&conversation_id).map_or(0, |s| s.len())
    }
}
