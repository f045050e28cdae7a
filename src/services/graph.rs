//! Follow and block edge writes.
//!
//! Counters (followers/following) are adjusted by the store inside the same
//! transaction as the edge write; this layer adds validation, block gating
//! and event emission.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{DomainEvent, EventBus};
use crate::store::SocialGraphStore;

pub struct GraphService<G> {
    graph: Arc<G>,
    events: EventBus,
}

impl<G: SocialGraphStore> GraphService<G> {
    pub fn new(graph: Arc<G>, events: EventBus) -> Self {
        Self { graph, events }
    }

    /// Creates a follow edge. Idempotent; refollowing is a silent no-op.
    /// Self-follows are invalid and follows across an active block are
    /// forbidden.
    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> AppResult<()> {
        if follower_id == followee_id {
            return Err(AppError::Validation("cannot follow yourself".into()));
        }
        if self.graph.has_block_between(follower_id, followee_id).await? {
            return Err(AppError::Forbidden {
                action: "follow a blocked user",
            });
        }
        let created = self.graph.create_follow(follower_id, followee_id).await?;
        if created {
            info!(follower = %follower_id, followee = %followee_id, "follow created");
            self.events.publish(DomainEvent::Followed {
                follower_id,
                followee_id,
            });
        }
        Ok(())
    }

    /// Removes a follow edge. Idempotent.
    pub async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> AppResult<()> {
        let removed = self.graph.delete_follow(follower_id, followee_id).await?;
        if removed {
            info!(follower = %follower_id, followee = %followee_id, "follow removed");
            self.events.publish(DomainEvent::Unfollowed {
                follower_id,
                followee_id,
            });
        }
        Ok(())
    }

    /// Creates a block edge. A new block also severs any follow
    /// relationship between the pair, in both directions, in the same
    /// store transaction.
    pub async fn block(&self, blocker_id: Uuid, blocked_id: Uuid) -> AppResult<()> {
        if blocker_id == blocked_id {
            return Err(AppError::Validation("cannot block yourself".into()));
        }
        let created = self.graph.create_block(blocker_id, blocked_id).await?;
        if created {
            info!(blocker = %blocker_id, blocked = %blocked_id, "block created");
            self.events.publish(DomainEvent::Blocked {
                blocker_id,
                blocked_id,
            });
        }
        Ok(())
    }

    /// Removes a block edge. Only the blocker who created the edge holds
    /// it, so the operation is requester-scoped by construction.
    pub async fn unblock(&self, blocker_id: Uuid, blocked_id: Uuid) -> AppResult<()> {
        let removed = self.graph.delete_block(blocker_id, blocked_id).await?;
        if removed {
            info!(blocker = %blocker_id, blocked = %blocked_id, "block removed");
            self.events.publish(DomainEvent::Unblocked {
                blocker_id,
                blocked_id,
            });
        }
        Ok(())
    }
}
