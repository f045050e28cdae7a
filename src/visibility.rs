//! Visibility engine.
//!
//! Decides whether a viewer may see a post or a profile. The rules, in
//! order: owners always see their own content; a block in either direction
//! hides everything; a private author's posts go only to followers and
//! allow-listed users, whatever the post-level setting says; public authors'
//! posts follow the post-level privacy. Anything unresolved is hidden —
//! including content whose author record cannot be loaded.

use std::collections::HashSet;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Post, PrivacyLevel, Profile, ProfileView};
use crate::store::SocialGraphStore;

pub struct VisibilityEngine<G> {
    graph: std::sync::Arc<G>,
}

impl<G: SocialGraphStore> VisibilityEngine<G> {
    pub fn new(graph: std::sync::Arc<G>) -> Self {
        Self { graph }
    }

    /// Single-item visibility decision. `viewer` is `None` for anonymous
    /// readers, who can only see public posts on public profiles.
    pub async fn can_view(&self, viewer: Option<Uuid>, post: &Post) -> AppResult<bool> {
        let Some(author) = self.graph.get_profile(post.author_id).await? else {
            // Fail closed rather than leaking orphaned content.
            warn!(post_id = %post.id, "post author missing, hiding content");
            return Ok(false);
        };

        if viewer == Some(author.id) {
            return Ok(true);
        }
        let Some(viewer_id) = viewer else {
            return Ok(!author.is_private && post.privacy_level == PrivacyLevel::Public);
        };
        if self.graph.has_block_between(viewer_id, author.id).await? {
            return Ok(false);
        }
        let follows = self.graph.is_following(viewer_id, author.id).await?;
        let decision = decide(viewer_id, &author, post, follows);
        debug!(viewer = %viewer_id, post_id = %post.id, decision, "visibility decision");
        Ok(decision)
    }

    /// Precomputes the viewer's follow-set and block-set for batched
    /// filtering. Reusable across feed pages while staleness is tolerable.
    pub async fn snapshot(&self, viewer: Option<Uuid>) -> AppResult<ViewerSnapshot> {
        let (following, blocked) = match viewer {
            Some(viewer_id) => (
                self.graph.following_ids(viewer_id).await?,
                self.graph.blocked_ids(viewer_id).await?,
            ),
            None => (HashSet::new(), HashSet::new()),
        };
        Ok(ViewerSnapshot {
            viewer,
            following,
            blocked,
        })
    }

    /// Batched form of [`can_view`](Self::can_view) for feed construction:
    /// one snapshot read, then O(1) membership checks per post.
    pub async fn filter_visible(
        &self,
        viewer: Option<Uuid>,
        posts: Vec<Post>,
    ) -> AppResult<Vec<Post>> {
        let snapshot = self.snapshot(viewer).await?;
        let mut visible = Vec::with_capacity(posts.len());
        for post in posts {
            let author = self.graph.get_profile(post.author_id).await?;
            match author {
                Some(author) if snapshot.decide(&author, &post) => visible.push(post),
                Some(_) => {}
                None => {
                    warn!(post_id = %post.id, "post author missing, hiding content");
                }
            }
        }
        Ok(visible)
    }

    /// What `viewer` gets back when loading `profile_id`: the full profile
    /// for the owner, followers and public accounts; a limited card for
    /// private accounts; nothing across a block.
    pub async fn profile_view(
        &self,
        viewer: Option<Uuid>,
        profile_id: Uuid,
    ) -> AppResult<ProfileView> {
        let profile = self
            .graph
            .get_profile(profile_id)
            .await?
            .ok_or(AppError::NotFound { resource: "profile" })?;

        if viewer == Some(profile.id) {
            return Ok(ProfileView::Full(profile));
        }
        let Some(viewer_id) = viewer else {
            return Ok(if profile.is_private {
                ProfileView::limited(&profile)
            } else {
                ProfileView::Full(profile)
            });
        };
        if self.graph.has_block_between(viewer_id, profile.id).await? {
            return Ok(ProfileView::Hidden);
        }
        if !profile.is_private || self.graph.is_following(viewer_id, profile.id).await? {
            Ok(ProfileView::Full(profile))
        } else {
            Ok(ProfileView::limited(&profile))
        }
    }
}

/// The viewer's precomputed graph neighborhood. Membership checks are O(1);
/// decisions against it involve no I/O.
#[derive(Debug, Clone)]
pub struct ViewerSnapshot {
    viewer: Option<Uuid>,
    following: HashSet<Uuid>,
    blocked: HashSet<Uuid>,
}

impl ViewerSnapshot {
    pub fn decide(&self, author: &Profile, post: &Post) -> bool {
        if self.viewer == Some(post.author_id) {
            return true;
        }
        let Some(viewer_id) = self.viewer else {
            return !author.is_private && post.privacy_level == PrivacyLevel::Public;
        };
        if self.blocked.contains(&author.id) {
            return false;
        }
        decide(viewer_id, author, post, self.following.contains(&author.id))
    }
}

/// The ordered resolution rules, applied after the owner and block
/// short-circuits. Account-level privacy is a hard ceiling: for a private
/// author the post-level setting is ignored entirely.
fn decide(viewer_id: Uuid, author: &Profile, post: &Post, follows: bool) -> bool {
    if author.is_private {
        return follows || post.allowed_users.contains(&viewer_id);
    }
    match post.privacy_level {
        PrivacyLevel::Public => true,
        PrivacyLevel::Followers => follows,
        PrivacyLevel::Private => post.allowed_users.contains(&viewer_id),
    }
}
