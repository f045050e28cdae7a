//! Post ingestion.
//!
//! Validation and moderation run before any store write; the audience rule
//! from the source application is enforced here: a post marked private must
//! name at least one allowed user, and the author is never on their own
//! allow-list.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::events::{DomainEvent, EventBus};
use crate::models::{Post, PrivacyLevel};
use crate::moderation::ModerationFilter;
use crate::store::ContentStore;

pub struct ContentService<C> {
    store: Arc<C>,
    moderation: ModerationFilter,
    events: EventBus,
    max_post_length: usize,
}

impl<C: ContentStore> ContentService<C> {
    pub fn new(
        store: Arc<C>,
        moderation: ModerationFilter,
        events: EventBus,
        config: &Config,
    ) -> Self {
        Self {
            store,
            moderation,
            events,
            max_post_length: config.max_post_length,
        }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        content: &str,
        privacy_level: PrivacyLevel,
        allowed_users: HashSet<Uuid>,
    ) -> AppResult<Post> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("post content is empty".into()));
        }
        if content.chars().count() > self.max_post_length {
            return Err(AppError::Validation(format!(
                "post exceeds {} characters",
                self.max_post_length
            )));
        }
        self.moderation.ensure_clean(content)?;

        let mut allowed_users = allowed_users;
        allowed_users.remove(&author_id);
        if privacy_level == PrivacyLevel::Private && allowed_users.is_empty() {
            return Err(AppError::Validation(
                "a private post needs at least one allowed user".into(),
            ));
        }

        let mut post = Post::new(author_id, content, privacy_level);
        post.allowed_users = allowed_users;
        self.store.insert_post(post.clone()).await?;
        info!(post_id = %post.id, author = %author_id, privacy = privacy_level.as_str(), "post created");
        self.events.publish(DomainEvent::PostCreated {
            post_id: post.id,
            author_id,
        });
        Ok(post)
    }

    /// Owner-only hard delete.
    pub async fn delete_post(&self, post_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or(AppError::NotFound { resource: "post" })?;
        if post.author_id != requester_id {
            return Err(AppError::Forbidden {
                action: "delete another user's post",
            });
        }
        self.store.delete_post(post_id).await?;
        info!(post_id = %post_id, "post deleted");
        self.events.publish(DomainEvent::PostDeleted {
            post_id,
            author_id: post.author_id,
        });
        Ok(())
    }
}
