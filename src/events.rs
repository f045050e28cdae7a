//! Domain event stream.
//!
//! Services publish a [`DomainEvent`] after each successful store
//! transaction; consumers (feed fan-out, notification glue, websocket
//! sessions) subscribe through the [`EventBus`]. Delivery is best-effort
//! over a `tokio::sync::broadcast` channel — a lagging subscriber loses the
//! oldest events rather than blocking publishers, and anything that needs
//! durability must read the store instead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ConversationCreated {
        conversation_id: Uuid,
        participants: (Uuid, Uuid),
    },
    MessageSent {
        conversation_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        sent_at: DateTime<Utc>,
    },
    MessagesRead {
        conversation_id: Uuid,
        reader_id: Uuid,
        marked: u64,
    },
    MessageDeleted {
        conversation_id: Uuid,
        message_id: Uuid,
    },
    DeletionRequested {
        conversation_id: Uuid,
        requested_by: Uuid,
        expires_at: DateTime<Utc>,
    },
    DeletionCancelled {
        conversation_id: Uuid,
        requested_by: Uuid,
    },
    ConversationDeleted {
        conversation_id: Uuid,
    },
    Followed {
        follower_id: Uuid,
        followee_id: Uuid,
    },
    Unfollowed {
        follower_id: Uuid,
        followee_id: Uuid,
    },
    Blocked {
        blocker_id: Uuid,
        blocked_id: Uuid,
    },
    Unblocked {
        blocker_id: Uuid,
        blocked_id: Uuid,
    },
    PostCreated {
        post_id: Uuid,
        author_id: Uuid,
    },
    PostDeleted {
        post_id: Uuid,
        author_id: Uuid,
    },
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::ConversationCreated { .. } => "conversation_created",
            DomainEvent::MessageSent { .. } => "message_sent",
            DomainEvent::MessagesRead { .. } => "messages_read",
            DomainEvent::MessageDeleted { .. } => "message_deleted",
            DomainEvent::DeletionRequested { .. } => "deletion_requested",
            DomainEvent::DeletionCancelled { .. } => "deletion_cancelled",
            DomainEvent::ConversationDeleted { .. } => "conversation_deleted",
            DomainEvent::Followed { .. } => "followed",
            DomainEvent::Unfollowed { .. } => "unfollowed",
            DomainEvent::Blocked { .. } => "blocked",
            DomainEvent::Unblocked { .. } => "unblocked",
            DomainEvent::PostCreated { .. } => "post_created",
            DomainEvent::PostDeleted { .. } => "post_deleted",
        }
    }
}

/// Broadcast fan-out for [`DomainEvent`]s.
///
/// Cloning is cheap; every clone publishes into the same channel. Publishing
/// with no subscribers is a successful no-op.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: DomainEvent) {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => debug!(event_type, receivers, "published domain event"),
            // No subscribers right now; the event is simply dropped.
            Err(_) => debug!(event_type, "published domain event with no subscribers"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
