//! Ephemeral presence signaling.
//!
//! Typing indicators are broadcast per conversation and never persisted.
//! Delivery is best-effort: a dropped event is healed by the subscriber's
//! auto-clear window, so nothing here retries or buffers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod channel;
pub mod typing;

pub use channel::PresenceChannel;
pub use typing::{TypingDebouncer, TypingTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceKind {
    Typing,
    StopTyping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub kind: PresenceKind,
    pub sent_at: DateTime<Utc>,
}

impl PresenceEvent {
    pub fn typing(conversation_id: Uuid, user_id: Uuid) -> Self {
        Self {
            conversation_id,
            user_id,
            kind: PresenceKind::Typing,
            sent_at: Utc::now(),
        }
    }

    pub fn stop_typing(conversation_id: Uuid, user_id: Uuid) -> Self {
        Self {
            conversation_id,
            user_id,
            kind: PresenceKind::StopTyping,
            sent_at: Utc::now(),
        }
    }
}
