use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// The two participants of a direct conversation, held in canonical (sorted)
/// order so the unordered pair maps to exactly one key. Uniqueness of
/// conversations per pair reduces to a plain unique constraint on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    first: Uuid,
    second: Uuid,
}

impl ParticipantPair {
    pub fn new(a: Uuid, b: Uuid) -> AppResult<Self> {
        if a == b {
            return Err(AppError::Validation(
                "a conversation requires two distinct participants".into(),
            ));
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { first, second })
    }

    pub fn first(&self) -> Uuid {
        self.first
    }

    pub fn second(&self) -> Uuid {
        self.second
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.first == user_id || self.second == user_id
    }

    /// The participant that is not `user_id`, if `user_id` is one of the pair.
    pub fn other(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.first {
            Some(self.second)
        } else if user_id == self.second {
            Some(self.first)
        } else {
            None
        }
    }

    pub fn as_tuple(&self) -> (Uuid, Uuid) {
        (self.first, self.second)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: ParticipantPair,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn new(participants: ParticipantPair) -> Self {
        Self {
            id: Uuid::new_v4(),
            participants,
            created_at: Utc::now(),
            last_message_at: None,
        }
    }
}

/// A pending request to delete a conversation, awaiting the other
/// participant's consent. At most one active request exists per
/// conversation; stale ones are dropped lazily wherever they are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionRequest {
    pub conversation_id: Uuid,
    pub requested_by: Uuid,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DeletionRequest {
    pub fn new(conversation_id: Uuid, requested_by: Uuid, ttl: Duration) -> Self {
        let requested_at = Utc::now();
        Self {
            conversation_id,
            requested_by,
            requested_at,
            expires_at: requested_at + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// What a deletion-request call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionOutcome {
    /// A fresh request is now pending the other participant's consent.
    Requested,
    /// The caller already had an unexpired request pending; nothing changed.
    AlreadyPending,
    /// The other participant had already asked, so the conversation was
    /// purged outright.
    Deleted,
}

/// A conversation as it appears in a user's inbox listing.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub unread_count: u64,
    pub pending_deletion: Option<DeletionRequest>,
}
