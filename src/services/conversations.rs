//! Conversation lifecycle.
//!
//! Owns conversation dedup, message ordering and read-state, and the
//! two-party deletion-agreement protocol. All storage goes through
//! [`ConversationStore`]; block checks go through [`SocialGraphStore`];
//! every committed mutation publishes a [`DomainEvent`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult, StoreError};
use crate::events::{DomainEvent, EventBus};
use crate::models::{
    Conversation, ConversationSummary, DeletionOutcome, DeletionRequest, Message, ParticipantPair,
};
use crate::moderation::ModerationFilter;
use crate::store::{ConversationStore, SocialGraphStore};

pub struct ConversationService<S, G> {
    store: Arc<S>,
    graph: Arc<G>,
    moderation: ModerationFilter,
    events: EventBus,
    max_message_length: usize,
    deletion_request_ttl: Duration,
}

impl<S, G> ConversationService<S, G>
where
    S: ConversationStore,
    G: SocialGraphStore,
{
    pub fn new(
        store: Arc<S>,
        graph: Arc<G>,
        moderation: ModerationFilter,
        events: EventBus,
        config: &Config,
    ) -> Self {
        Self {
            store,
            graph,
            moderation,
            events,
            max_message_length: config.max_message_length,
            deletion_request_ttl: Duration::days(config.deletion_request_ttl_days),
        }
    }

    /// Returns the conversation for the pair, creating it if absent.
    ///
    /// Idempotent and race-safe: participants are stored as a canonical
    /// sorted pair, so two concurrent first-message calls collapse onto one
    /// row; whichever writer loses the uniqueness race re-reads the winner's
    /// row instead of surfacing an error.
    pub async fn start_or_get_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Conversation> {
        let pair = ParticipantPair::new(user_a, user_b)?;
        if self.graph.has_block_between(user_a, user_b).await? {
            return Err(AppError::Forbidden {
                action: "message a blocked user",
            });
        }

        if let Some(existing) = self.store.find_conversation_by_pair(pair).await? {
            return Ok(existing);
        }

        let conversation = Conversation::new(pair);
        match self.store.insert_conversation(conversation.clone()).await {
            Ok(()) => {
                info!(conversation_id = %conversation.id, "conversation created");
                self.events.publish(DomainEvent::ConversationCreated {
                    conversation_id: conversation.id,
                    participants: pair.as_tuple(),
                });
                Ok(conversation)
            }
            // Lost the creation race; the other participant's row wins.
            Err(StoreError::Conflict(_)) => {
                let existing = self
                    .store
                    .find_conversation_by_pair(pair)
                    .await?
                    .ok_or(AppError::NotFound {
                        resource: "conversation",
                    })?;
                Ok(existing)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Appends a message. Content is validated and moderated before any
    /// store write; the sender's own message is never marked read.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("message content is empty".into()));
        }
        if content.chars().count() > self.max_message_length {
            return Err(AppError::Validation(format!(
                "message exceeds {} characters",
                self.max_message_length
            )));
        }
        self.moderation.ensure_clean(content)?;

        let conversation = self.get_participant_conversation(conversation_id, sender_id).await?;
        let message = self
            .store
            .append_message(conversation.id, sender_id, content.to_string())
            .await?;
        info!(
            conversation_id = %conversation.id,
            message_id = %message.id,
            seq = message.sequence_number,
            "message sent"
        );
        self.events.publish(DomainEvent::MessageSent {
            conversation_id: conversation.id,
            message_id: message.id,
            sender_id,
            sent_at: message.created_at,
        });
        Ok(message)
    }

    /// Marks every unread message from the other participant as read.
    /// Idempotent; returns how many messages were newly marked.
    pub async fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> AppResult<u64> {
        self.get_participant_conversation(conversation_id, reader_id)
            .await?;
        let marked = self
            .store
            .mark_read(conversation_id, reader_id, Utc::now())
            .await?;
        if marked > 0 {
            self.events.publish(DomainEvent::MessagesRead {
                conversation_id,
                reader_id,
                marked,
            });
        }
        Ok(marked)
    }

    /// Hard-deletes a single message. Sender-only, no recovery.
    pub async fn delete_message(&self, message_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or(AppError::NotFound { resource: "message" })?;
        if message.sender_id != requester_id {
            return Err(AppError::Forbidden {
                action: "delete another user's message",
            });
        }
        self.store.delete_message(message_id).await?;
        self.events.publish(DomainEvent::MessageDeleted {
            conversation_id: message.conversation_id,
            message_id,
        });
        Ok(())
    }

    /// Files (or resolves) a request to delete the conversation.
    ///
    /// Outcomes: with no active request, a fresh one is filed
    /// (`Requested`). If the caller's own request is already pending,
    /// nothing changes (`AlreadyPending`). If the *other* participant's
    /// request is pending, the call counts as the second party's consent
    /// and the conversation is purged immediately (`Deleted`) — no separate
    /// approve step happens in that path, which is deliberate even though
    /// the caller never clicked "approve".
    pub async fn request_deletion(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> AppResult<DeletionOutcome> {
        let conversation = self
            .get_participant_conversation(conversation_id, requester_id)
            .await?;

        match self.active_request(conversation_id).await? {
            None => self.file_request(conversation_id, requester_id).await,
            Some(pending) if pending.requested_by == requester_id => {
                Ok(DeletionOutcome::AlreadyPending)
            }
            // Both participants have now asked: mutual agreement. The purge
            // re-checks the other side's request inside the store
            // transaction; if it was cancelled while this call was in
            // flight, the caller's own fresh request is filed instead.
            Some(pending) => {
                if self
                    .purge_as_agreed(conversation.id, pending.requested_by)
                    .await?
                {
                    Ok(DeletionOutcome::Deleted)
                } else {
                    self.file_request(conversation_id, requester_id).await
                }
            }
        }
    }

    /// Withdraws a pending deletion request. Only its author may cancel.
    pub async fn cancel_deletion(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> AppResult<()> {
        self.get_participant_conversation(conversation_id, requester_id)
            .await?;
        let pending = self
            .active_request(conversation_id)
            .await?
            .ok_or(AppError::RequestNotFound)?;
        if pending.requested_by != requester_id {
            return Err(AppError::Forbidden {
                action: "cancel another user's deletion request",
            });
        }
        self.store.clear_deletion_request(conversation_id).await?;
        info!(conversation_id = %conversation_id, "deletion request cancelled");
        self.events.publish(DomainEvent::DeletionCancelled {
            conversation_id,
            requested_by: requester_id,
        });
        Ok(())
    }

    /// Consents to the other participant's deletion request and purges the
    /// conversation, its messages and the request atomically.
    pub async fn approve_deletion(
        &self,
        conversation_id: Uuid,
        approver_id: Uuid,
    ) -> AppResult<()> {
        self.get_participant_conversation(conversation_id, approver_id)
            .await?;
        let pending = self
            .active_request(conversation_id)
            .await?
            .ok_or(AppError::RequestNotFound)?;
        if pending.requested_by == approver_id {
            return Err(AppError::Forbidden {
                action: "approve your own deletion request",
            });
        }
        // The purge is conditional on the request still standing, so an
        // approval racing a cancel loses cleanly instead of deleting a
        // conversation whose request was already withdrawn.
        if !self
            .purge_as_agreed(conversation_id, pending.requested_by)
            .await?
        {
            return Err(AppError::RequestNotFound);
        }
        Ok(())
    }

    /// Participant-gated fetch of a single conversation.
    pub async fn get_conversation(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> AppResult<Conversation> {
        self.get_participant_conversation(conversation_id, requester_id)
            .await
    }

    /// The user's inbox: conversations by most recent activity, with unread
    /// counts and any active deletion request. Stale requests encountered
    /// here are dropped (lazy expiry).
    pub async fn list_conversations(&self, user_id: Uuid) -> AppResult<Vec<ConversationSummary>> {
        let conversations = self.store.conversations_for(user_id).await?;
        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let unread_count = self.store.unread_count(conversation.id, user_id).await?;
            let pending_deletion = self.active_request(conversation.id).await?;
            summaries.push(ConversationSummary {
                conversation,
                unread_count,
                pending_deletion,
            });
        }
        Ok(summaries)
    }

    /// Full message history in sequence order. Participant-gated.
    pub async fn message_history(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> AppResult<Vec<Message>> {
        self.get_participant_conversation(conversation_id, requester_id)
            .await?;
        Ok(self.store.messages_for(conversation_id).await?)
    }

    pub async fn unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<u64> {
        self.get_participant_conversation(conversation_id, user_id)
            .await?;
        Ok(self.store.unread_count(conversation_id, user_id).await?)
    }

    /// The active (unexpired) deletion request, if any. An expired request
    /// found here is cleared so every later read agrees it is gone.
    async fn active_request(&self, conversation_id: Uuid) -> AppResult<Option<DeletionRequest>> {
        let Some(request) = self.store.get_deletion_request(conversation_id).await? else {
            return Ok(None);
        };
        if request.is_expired(Utc::now()) {
            warn!(
                conversation_id = %conversation_id,
                requested_by = %request.requested_by,
                "dropping expired deletion request"
            );
            self.store.clear_deletion_request(conversation_id).await?;
            return Ok(None);
        }
        Ok(Some(request))
    }

    async fn get_participant_conversation(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or(AppError::NotFound {
                resource: "conversation",
            })?;
        if !conversation.participants.contains(user_id) {
            return Err(AppError::Forbidden {
                action: "access a conversation you are not part of",
            });
        }
        Ok(conversation)
    }

    async fn file_request(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> AppResult<DeletionOutcome> {
        let request =
            DeletionRequest::new(conversation_id, requester_id, self.deletion_request_ttl);
        let expires_at = request.expires_at;
        self.store.put_deletion_request(request).await?;
        info!(
            conversation_id = %conversation_id,
            requested_by = %requester_id,
            "conversation deletion requested"
        );
        self.events.publish(DomainEvent::DeletionRequested {
            conversation_id,
            requested_by: requester_id,
            expires_at,
        });
        Ok(DeletionOutcome::Requested)
    }

    /// Purges conversation, messages and request in one store transaction,
    /// guarded on `requested_by`'s request still being present. Returns
    /// whether the purge happened.
    async fn purge_as_agreed(&self, conversation_id: Uuid, requested_by: Uuid) -> AppResult<bool> {
        if !self
            .store
            .purge_if_requested(conversation_id, requested_by)
            .await?
        {
            return Ok(false);
        }
        info!(conversation_id = %conversation_id, "conversation purged by mutual consent");
        self.events
            .publish(DomainEvent::ConversationDeleted { conversation_id });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::store::{ContentStore, MemoryStore};
    use crate::models::Profile;
    use crate::error::StoreResult;

    /// Store wrapper that withdraws the deletion request immediately after
    /// it is read, reproducing a cancel landing between the service's read
    /// and its purge.
    struct CancelAfterReadStore {
        inner: Arc<MemoryStore>,
        cancel_next_read: AtomicBool,
    }

    impl CancelAfterReadStore {
        fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                cancel_next_read: AtomicBool::new(false),
            }
        }

        fn arm(&self) {
            self.cancel_next_read.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl ConversationStore for CancelAfterReadStore {
        async fn get_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
            self.inner.get_conversation(id).await
        }

        async fn find_conversation_by_pair(
            &self,
            pair: ParticipantPair,
        ) -> StoreResult<Option<Conversation>> {
            self.inner.find_conversation_by_pair(pair).await
        }

        async fn insert_conversation(&self, conversation: Conversation) -> StoreResult<()> {
            self.inner.insert_conversation(conversation).await
        }

        async fn conversations_for(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>> {
            self.inner.conversations_for(user_id).await
        }

        async fn append_message(
            &self,
            conversation_id: Uuid,
            sender_id: Uuid,
            content: String,
        ) -> StoreResult<Message> {
            self.inner
                .append_message(conversation_id, sender_id, content)
                .await
        }

        async fn get_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
            self.inner.get_message(id).await
        }

        async fn messages_for(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>> {
            self.inner.messages_for(conversation_id).await
        }

        async fn mark_read(
            &self,
            conversation_id: Uuid,
            reader_id: Uuid,
            now: chrono::DateTime<Utc>,
        ) -> StoreResult<u64> {
            self.inner.mark_read(conversation_id, reader_id, now).await
        }

        async fn unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> StoreResult<u64> {
            self.inner.unread_count(conversation_id, user_id).await
        }

        async fn delete_message(&self, id: Uuid) -> StoreResult<bool> {
            self.inner.delete_message(id).await
        }

        async fn get_deletion_request(
            &self,
            conversation_id: Uuid,
        ) -> StoreResult<Option<DeletionRequest>> {
            let request = self.inner.get_deletion_request(conversation_id).await?;
            if request.is_some() && self.cancel_next_read.swap(false, Ordering::SeqCst) {
                self.inner.clear_deletion_request(conversation_id).await?;
            }
            Ok(request)
        }

        async fn put_deletion_request(&self, request: DeletionRequest) -> StoreResult<()> {
            self.inner.put_deletion_request(request).await
        }

        async fn clear_deletion_request(&self, conversation_id: Uuid) -> StoreResult<bool> {
            self.inner.clear_deletion_request(conversation_id).await
        }

        async fn purge_if_requested(
            &self,
            conversation_id: Uuid,
            requested_by: Uuid,
        ) -> StoreResult<bool> {
            self.inner
                .purge_if_requested(conversation_id, requested_by)
                .await
        }
    }

    type RacingService = ConversationService<CancelAfterReadStore, MemoryStore>;

    async fn racing_setup() -> (Arc<MemoryStore>, Arc<CancelAfterReadStore>, RacingService) {
        let inner = Arc::new(MemoryStore::new());
        let store = Arc::new(CancelAfterReadStore::new(inner.clone()));
        let service = ConversationService::new(
            store.clone(),
            inner.clone(),
            ModerationFilter::new(),
            EventBus::new(16),
            &Config::test_defaults(),
        );
        (inner, store, service)
    }

    async fn user(store: &MemoryStore, name: &str) -> Uuid {
        let profile = Profile::new(name);
        let id = profile.id;
        store.insert_profile(profile).await.unwrap();
        id
    }

    #[tokio::test]
    async fn approval_loses_to_a_cancel_landing_after_the_read() {
        let (inner, store, service) = racing_setup().await;
        let alice = user(&inner, "alice").await;
        let bob = user(&inner, "bob").await;
        let conversation = service.start_or_get_conversation(alice, bob).await.unwrap();
        service
            .send_message(conversation.id, alice, "hello")
            .await
            .unwrap();

        assert_eq!(
            service.request_deletion(conversation.id, alice).await.unwrap(),
            DeletionOutcome::Requested
        );

        // Alice's cancel slips in after Bob's approval has read the request.
        store.arm();
        let err = service
            .approve_deletion(conversation.id, bob)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RequestNotFound));

        // Nothing was purged and no request survives.
        assert!(inner
            .get_conversation(conversation.id)
            .await
            .unwrap()
            .is_some());
        assert_eq!(inner.messages_for(conversation.id).await.unwrap().len(), 1);
        assert!(inner
            .get_deletion_request(conversation.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn counter_request_racing_a_cancel_files_a_fresh_request() {
        let (inner, store, service) = racing_setup().await;
        let alice = user(&inner, "alice").await;
        let bob = user(&inner, "bob").await;
        let conversation = service.start_or_get_conversation(alice, bob).await.unwrap();

        assert_eq!(
            service.request_deletion(conversation.id, alice).await.unwrap(),
            DeletionOutcome::Requested
        );

        // Alice cancels just after Bob's request reads hers: no mutual
        // agreement, so Bob's own request is filed instead of a purge.
        store.arm();
        assert_eq!(
            service.request_deletion(conversation.id, bob).await.unwrap(),
            DeletionOutcome::Requested
        );

        assert!(inner
            .get_conversation(conversation.id)
            .await
            .unwrap()
            .is_some());
        let pending = inner
            .get_deletion_request(conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.requested_by, bob);
    }
}
