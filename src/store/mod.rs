//! Persistence boundary.
//!
//! The core never talks to a database directly; it is written against the
//! three traits in this module. Every mutating method is required to be
//! individually atomic — a caller that drops the future mid-flight must
//! never observe partial state — and uniqueness races are reported as
//! [`StoreError::Conflict`](crate::error::StoreError) so services can
//! resolve them by re-reading instead of failing the caller.
//!
//! [`MemoryStore`] is the in-tree reference implementation backing the test
//! suite; deployments substitute a transactional backend behind the same
//! traits.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{Conversation, DeletionRequest, Message, ParticipantPair, Post, Profile};

pub mod memory;

pub use memory::MemoryStore;

/// Read/write access to follow and block edges plus the profiles they hang
/// off. Follower/following/posts counters are derived fields that the store
/// adjusts inside the same transaction as the edge write, never recomputed
/// by scanning.
#[async_trait]
pub trait SocialGraphStore: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool>;

    /// Directional: has `blocker_id` blocked `blocked_id`.
    async fn is_blocked(&self, blocker_id: Uuid, blocked_id: Uuid) -> StoreResult<bool>;

    /// A block in either direction makes the pair mutually invisible.
    async fn has_block_between(&self, user_a: Uuid, user_b: Uuid) -> StoreResult<bool> {
        Ok(self.is_blocked(user_a, user_b).await? || self.is_blocked(user_b, user_a).await?)
    }

    /// Everyone `viewer_id` follows. Snapshot read for batched visibility.
    async fn following_ids(&self, viewer_id: Uuid) -> StoreResult<HashSet<Uuid>>;

    /// Everyone with a block edge touching `viewer_id`, in either direction.
    async fn blocked_ids(&self, viewer_id: Uuid) -> StoreResult<HashSet<Uuid>>;

    /// Idempotent edge insert. Returns true when a new edge was written; a
    /// new edge also increments followee.followers_count and
    /// follower.following_count in the same transaction.
    async fn create_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool>;

    /// Returns true when an edge was removed, with the mirror-image counter
    /// decrements (floored at zero).
    async fn delete_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool>;

    /// Idempotent block insert. A new block also removes both follow
    /// directions between the pair, counters included, in one transaction.
    async fn create_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> StoreResult<bool>;

    /// Directional, so only the blocker who created the edge can remove it.
    async fn delete_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> StoreResult<bool>;
}

/// Conversations, messages and deletion requests.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>>;

    /// Canonical-pair lookup; one query covers both participant orderings.
    async fn find_conversation_by_pair(
        &self,
        pair: ParticipantPair,
    ) -> StoreResult<Option<Conversation>>;

    /// Fails with `StoreError::Conflict` when a conversation for the same
    /// pair already exists, which is how concurrent creation races are
    /// detected and collapsed to one row.
    async fn insert_conversation(&self, conversation: Conversation) -> StoreResult<()>;

    /// Conversations `user_id` participates in, newest activity first.
    async fn conversations_for(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>>;

    /// Assigns the message id, the per-conversation sequence number and a
    /// store-side `created_at` that is strictly increasing within the
    /// conversation, and bumps `last_message_at`, all in one transaction.
    async fn append_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: String,
    ) -> StoreResult<Message>;

    async fn get_message(&self, id: Uuid) -> StoreResult<Option<Message>>;

    /// Messages of a conversation in sequence order.
    async fn messages_for(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>>;

    /// Sets `read_at = now` on every unread message not sent by `reader_id`.
    /// Returns how many rows changed; already-read messages are untouched.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Unread messages addressed to `user_id` in this conversation.
    async fn unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> StoreResult<u64>;

    /// Returns true when the message existed and was removed.
    async fn delete_message(&self, id: Uuid) -> StoreResult<bool>;

    /// The stored request, expired or not; expiry is the caller's to judge.
    async fn get_deletion_request(
        &self,
        conversation_id: Uuid,
    ) -> StoreResult<Option<DeletionRequest>>;

    /// Upserts the request for its conversation (at most one is stored).
    async fn put_deletion_request(&self, request: DeletionRequest) -> StoreResult<()>;

    /// Returns true when a request existed and was removed.
    async fn clear_deletion_request(&self, conversation_id: Uuid) -> StoreResult<bool>;

    /// Hard-deletes the conversation, all of its messages and the deletion
    /// request in one transaction, but only while a request by
    /// `requested_by` is still stored. Returns false, changing nothing,
    /// when that request has been cancelled or replaced meanwhile — the
    /// check and the purge must not be separable, or an approval racing a
    /// cancel could delete a conversation whose request was already
    /// withdrawn.
    async fn purge_if_requested(
        &self,
        conversation_id: Uuid,
        requested_by: Uuid,
    ) -> StoreResult<bool>;
}

/// Profiles and posts, the write side of the visibility engine's inputs.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fails with `StoreError::Conflict` on a duplicate username.
    async fn insert_profile(&self, profile: Profile) -> StoreResult<()>;

    /// Inserts the post and increments the author's posts_count in the same
    /// transaction.
    async fn insert_post(&self, post: Post) -> StoreResult<()>;

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>>;

    /// Returns true when the post existed; removal decrements the author's
    /// posts_count in the same transaction.
    async fn delete_post(&self, id: Uuid) -> StoreResult<bool>;
}
