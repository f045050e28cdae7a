use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    /// Store-assigned, strictly increasing per conversation. The
    /// authoritative ordering key; `created_at` is clamped to agree with it.
    pub sequence_number: i64,
    pub created_at: DateTime<Utc>,
    /// Set once by the recipient's mark-read, never cleared afterwards.
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}
