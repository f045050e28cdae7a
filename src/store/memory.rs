//! In-memory reference store.
//!
//! Every trait method takes the single state mutex for its whole duration,
//! which gives each operation the transaction isolation the store contract
//! demands. Tests run against this; production swaps in a real backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{Conversation, DeletionRequest, Message, ParticipantPair, Post, Profile};
use crate::store::{ContentStore, ConversationStore, SocialGraphStore};

#[derive(Debug, Default)]
struct State {
    profiles: HashMap<Uuid, Profile>,
    usernames: HashMap<String, Uuid>,
    follows: HashSet<(Uuid, Uuid)>,
    blocks: HashSet<(Uuid, Uuid)>,
    posts: HashMap<Uuid, Post>,
    conversations: HashMap<Uuid, Conversation>,
    pairs: HashMap<ParticipantPair, Uuid>,
    messages: HashMap<Uuid, Vec<Message>>,
    message_conversations: HashMap<Uuid, Uuid>,
    next_seq: HashMap<Uuid, i64>,
    deletion_requests: HashMap<Uuid, DeletionRequest>,
}

impl State {
    fn adjust_follow_counters(&mut self, follower_id: Uuid, followee_id: Uuid, delta: i64) {
        if let Some(follower) = self.profiles.get_mut(&follower_id) {
            follower.following_count = (follower.following_count + delta).max(0);
        }
        if let Some(followee) = self.profiles.get_mut(&followee_id) {
            followee.followers_count = (followee.followers_count + delta).max(0);
        }
    }

    fn remove_follow_edge(&mut self, follower_id: Uuid, followee_id: Uuid) -> bool {
        let removed = self.follows.remove(&(follower_id, followee_id));
        if removed {
            self.adjust_follow_counters(follower_id, followee_id, -1);
        }
        removed
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SocialGraphStore for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let state = self.state.lock().await;
        Ok(state.profiles.get(&id).cloned())
    }

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state.follows.contains(&(follower_id, followee_id)))
    }

    async fn is_blocked(&self, blocker_id: Uuid, blocked_id: Uuid) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state.blocks.contains(&(blocker_id, blocked_id)))
    }

    async fn following_ids(&self, viewer_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        let state = self.state.lock().await;
        Ok(state
            .follows
            .iter()
            .filter(|(follower, _)| *follower == viewer_id)
            .map(|(_, followee)| *followee)
            .collect())
    }

    async fn blocked_ids(&self, viewer_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        let state = self.state.lock().await;
        Ok(state
            .blocks
            .iter()
            .filter_map(|(blocker, blocked)| {
                if *blocker == viewer_id {
                    Some(*blocked)
                } else if *blocked == viewer_id {
                    Some(*blocker)
                } else {
                    None
                }
            })
            .collect())
    }

    async fn create_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if !state.profiles.contains_key(&follower_id) || !state.profiles.contains_key(&followee_id)
        {
            return Err(StoreError::RowNotFound("profile"));
        }
        let inserted = state.follows.insert((follower_id, followee_id));
        if inserted {
            state.adjust_follow_counters(follower_id, followee_id, 1);
        }
        Ok(inserted)
    }

    async fn delete_follow(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.remove_follow_edge(follower_id, followee_id))
    }

    async fn create_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if !state.profiles.contains_key(&blocker_id) || !state.profiles.contains_key(&blocked_id) {
            return Err(StoreError::RowNotFound("profile"));
        }
        let inserted = state.blocks.insert((blocker_id, blocked_id));
        if inserted {
            // Blocking severs the relationship both ways.
            state.remove_follow_edge(blocker_id, blocked_id);
            state.remove_follow_edge(blocked_id, blocker_id);
        }
        Ok(inserted)
    }

    async fn delete_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.blocks.remove(&(blocker_id, blocked_id)))
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let state = self.state.lock().await;
        Ok(state.conversations.get(&id).cloned())
    }

    async fn find_conversation_by_pair(
        &self,
        pair: ParticipantPair,
    ) -> StoreResult<Option<Conversation>> {
        let state = self.state.lock().await;
        Ok(state
            .pairs
            .get(&pair)
            .and_then(|id| state.conversations.get(id))
            .cloned())
    }

    async fn insert_conversation(&self, conversation: Conversation) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.pairs.contains_key(&conversation.participants) {
            return Err(StoreError::Conflict("conversation participant pair"));
        }
        state.pairs.insert(conversation.participants, conversation.id);
        state.conversations.insert(conversation.id, conversation);
        Ok(())
    }

    async fn conversations_for(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>> {
        let state = self.state.lock().await;
        let mut conversations: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.participants.contains(user_id))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| {
            let a_key = a.last_message_at.unwrap_or(a.created_at);
            let b_key = b.last_message_at.unwrap_or(b.created_at);
            b_key.cmp(&a_key)
        });
        Ok(conversations)
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: String,
    ) -> StoreResult<Message> {
        let mut state = self.state.lock().await;
        if !state.conversations.contains_key(&conversation_id) {
            return Err(StoreError::RowNotFound("conversation"));
        }
        let seq = {
            let counter = state.next_seq.entry(conversation_id).or_insert(0);
            *counter += 1;
            *counter
        };
        // Store-assigned timestamp, clamped so created_at stays strictly
        // increasing within the conversation even if the wall clock stalls.
        let mut created_at = Utc::now();
        if let Some(last) = state
            .messages
            .get(&conversation_id)
            .and_then(|m| m.last())
            .map(|m| m.created_at)
        {
            if created_at <= last {
                created_at = last + Duration::milliseconds(1);
            }
        }
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content,
            sequence_number: seq,
            created_at,
            read_at: None,
        };
        state
            .messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());
        state.message_conversations.insert(message.id, conversation_id);
        if let Some(conversation) = state.conversations.get_mut(&conversation_id) {
            conversation.last_message_at = Some(created_at);
        }
        Ok(message)
    }

    async fn get_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        let state = self.state.lock().await;
        let Some(conversation_id) = state.message_conversations.get(&id) else {
            return Ok(None);
        };
        Ok(state
            .messages
            .get(conversation_id)
            .and_then(|m| m.iter().find(|msg| msg.id == id))
            .cloned())
    }

    async fn messages_for(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>> {
        let state = self.state.lock().await;
        // Messages are appended in sequence order already.
        Ok(state
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let mut marked = 0;
        if let Some(messages) = state.messages.get_mut(&conversation_id) {
            for message in messages
                .iter_mut()
                .filter(|m| m.sender_id != reader_id && m.read_at.is_none())
            {
                message.read_at = Some(now);
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> StoreResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .get(&conversation_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| m.sender_id != user_id && m.read_at.is_none())
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn delete_message(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(conversation_id) = state.message_conversations.remove(&id) else {
            return Ok(false);
        };
        if let Some(messages) = state.messages.get_mut(&conversation_id) {
            messages.retain(|m| m.id != id);
        }
        Ok(true)
    }

    async fn get_deletion_request(
        &self,
        conversation_id: Uuid,
    ) -> StoreResult<Option<DeletionRequest>> {
        let state = self.state.lock().await;
        Ok(state.deletion_requests.get(&conversation_id).cloned())
    }

    async fn put_deletion_request(&self, request: DeletionRequest) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if !state.conversations.contains_key(&request.conversation_id) {
            return Err(StoreError::RowNotFound("conversation"));
        }
        state
            .deletion_requests
            .insert(request.conversation_id, request);
        Ok(())
    }

    async fn clear_deletion_request(&self, conversation_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.deletion_requests.remove(&conversation_id).is_some())
    }

    async fn purge_if_requested(
        &self,
        conversation_id: Uuid,
        requested_by: Uuid,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        // Guard and purge under one mutex hold: if the request was
        // cancelled or replaced since the caller read it, do nothing.
        let still_requested = state
            .deletion_requests
            .get(&conversation_id)
            .is_some_and(|r| r.requested_by == requested_by);
        if !still_requested {
            return Ok(false);
        }
        let Some(conversation) = state.conversations.remove(&conversation_id) else {
            return Ok(false);
        };
        state.pairs.remove(&conversation.participants);
        state.deletion_requests.remove(&conversation_id);
        state.next_seq.remove(&conversation_id);
        if let Some(messages) = state.messages.remove(&conversation_id) {
            for message in &messages {
                state.message_conversations.remove(&message.id);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert_profile(&self, profile: Profile) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.usernames.contains_key(&profile.username) {
            return Err(StoreError::Conflict("profile username"));
        }
        state.usernames.insert(profile.username.clone(), profile.id);
        state.profiles.insert(profile.id, profile);
        Ok(())
    }

    async fn insert_post(&self, post: Post) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let Some(author) = state.profiles.get_mut(&post.author_id) else {
            return Err(StoreError::RowNotFound("profile"));
        };
        author.posts_count += 1;
        state.posts.insert(post.id, post);
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let state = self.state.lock().await;
        Ok(state.posts.get(&id).cloned())
    }

    async fn delete_post(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(post) = state.posts.remove(&id) else {
            return Ok(false);
        };
        if let Some(author) = state.profiles.get_mut(&post.author_id) {
            author.posts_count = (author.posts_count - 1).max(0);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_pair(store: &MemoryStore) -> (Profile, Profile) {
        let alice = Profile::new("alice");
        let bob = Profile::new("bob");
        store.insert_profile(alice.clone()).await.unwrap();
        store.insert_profile(bob.clone()).await.unwrap();
        (alice, bob)
    }

    #[tokio::test]
    async fn duplicate_pair_insert_reports_conflict() {
        let store = MemoryStore::new();
        let (alice, bob) = seeded_pair(&store).await;
        let pair = ParticipantPair::new(alice.id, bob.id).unwrap();

        store
            .insert_conversation(Conversation::new(pair))
            .await
            .unwrap();
        let err = store
            .insert_conversation(Conversation::new(pair))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn append_assigns_increasing_seq_and_timestamps() {
        let store = MemoryStore::new();
        let (alice, bob) = seeded_pair(&store).await;
        let pair = ParticipantPair::new(alice.id, bob.id).unwrap();
        let conversation = Conversation::new(pair);
        let conversation_id = conversation.id;
        store.insert_conversation(conversation).await.unwrap();

        let first = store
            .append_message(conversation_id, alice.id, "one".into())
            .await
            .unwrap();
        let second = store
            .append_message(conversation_id, bob.id, "two".into())
            .await
            .unwrap();

        assert_eq!(first.sequence_number, 1);
        assert_eq!(second.sequence_number, 2);
        assert!(second.created_at > first.created_at);

        let conversation = store
            .get_conversation(conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.last_message_at, Some(second.created_at));
    }

    #[tokio::test]
    async fn follow_counters_track_edge_writes() {
        let store = MemoryStore::new();
        let (alice, bob) = seeded_pair(&store).await;

        assert!(store.create_follow(alice.id, bob.id).await.unwrap());
        // Second insert is idempotent and must not double-count.
        assert!(!store.create_follow(alice.id, bob.id).await.unwrap());

        let bob_profile = store.get_profile(bob.id).await.unwrap().unwrap();
        let alice_profile = store.get_profile(alice.id).await.unwrap().unwrap();
        assert_eq!(bob_profile.followers_count, 1);
        assert_eq!(alice_profile.following_count, 1);

        assert!(store.delete_follow(alice.id, bob.id).await.unwrap());
        let bob_profile = store.get_profile(bob.id).await.unwrap().unwrap();
        assert_eq!(bob_profile.followers_count, 0);
    }

    #[tokio::test]
    async fn block_removes_follows_in_both_directions() {
        let store = MemoryStore::new();
        let (alice, bob) = seeded_pair(&store).await;
        store.create_follow(alice.id, bob.id).await.unwrap();
        store.create_follow(bob.id, alice.id).await.unwrap();

        assert!(store.create_block(alice.id, bob.id).await.unwrap());

        assert!(!store.is_following(alice.id, bob.id).await.unwrap());
        assert!(!store.is_following(bob.id, alice.id).await.unwrap());
        assert!(store.has_block_between(bob.id, alice.id).await.unwrap());

        let alice_profile = store.get_profile(alice.id).await.unwrap().unwrap();
        assert_eq!(alice_profile.followers_count, 0);
        assert_eq!(alice_profile.following_count, 0);
    }

    #[tokio::test]
    async fn purge_removes_conversation_messages_and_request() {
        let store = MemoryStore::new();
        let (alice, bob) = seeded_pair(&store).await;
        let pair = ParticipantPair::new(alice.id, bob.id).unwrap();
        let conversation = Conversation::new(pair);
        let conversation_id = conversation.id;
        store.insert_conversation(conversation).await.unwrap();
        let message = store
            .append_message(conversation_id, alice.id, "hi".into())
            .await
            .unwrap();
        store
            .put_deletion_request(DeletionRequest::new(
                conversation_id,
                alice.id,
                Duration::days(7),
            ))
            .await
            .unwrap();

        assert!(store
            .purge_if_requested(conversation_id, alice.id)
            .await
            .unwrap());

        assert!(store
            .get_conversation(conversation_id)
            .await
            .unwrap()
            .is_none());
        assert!(store.get_message(message.id).await.unwrap().is_none());
        assert!(store
            .get_deletion_request(conversation_id)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_conversation_by_pair(pair)
            .await
            .unwrap()
            .is_none());
        // The pair is free again, as after an approved deletion.
        store
            .insert_conversation(Conversation::new(pair))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn purge_is_refused_without_the_matching_request() {
        let store = MemoryStore::new();
        let (alice, bob) = seeded_pair(&store).await;
        let pair = ParticipantPair::new(alice.id, bob.id).unwrap();
        let conversation = Conversation::new(pair);
        let conversation_id = conversation.id;
        store.insert_conversation(conversation).await.unwrap();
        store
            .append_message(conversation_id, alice.id, "hi".into())
            .await
            .unwrap();

        // No request stored at all.
        assert!(!store
            .purge_if_requested(conversation_id, alice.id)
            .await
            .unwrap());

        // A request by someone other than the claimed requester.
        store
            .put_deletion_request(DeletionRequest::new(
                conversation_id,
                bob.id,
                Duration::days(7),
            ))
            .await
            .unwrap();
        assert!(!store
            .purge_if_requested(conversation_id, alice.id)
            .await
            .unwrap());

        // Nothing was touched by the refused purges.
        assert!(store
            .get_conversation(conversation_id)
            .await
            .unwrap()
            .is_some());
        assert_eq!(store.messages_for(conversation_id).await.unwrap().len(), 1);
        assert!(store
            .get_deletion_request(conversation_id)
            .await
            .unwrap()
            .is_some());
    }
}
