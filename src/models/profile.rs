use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_private: bool,
    /// Derived counters, adjusted transactionally with edge/post writes.
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            full_name: None,
            bio: None,
            avatar_url: None,
            is_private: false,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn private(username: impl Into<String>) -> Self {
        Self {
            is_private: true,
            ..Self::new(username)
        }
    }
}

/// What a given viewer gets back when loading a profile.
///
/// Private accounts are redacted to name and avatar for everyone except the
/// owner and accepted followers; a block in either direction hides the
/// profile entirely.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "visibility", rename_all = "snake_case")]
pub enum ProfileView {
    Full(Profile),
    Limited {
        username: String,
        avatar_url: Option<String>,
    },
    Hidden,
}

impl ProfileView {
    pub fn limited(profile: &Profile) -> Self {
        ProfileView::Limited {
            username: profile.username.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, ProfileView::Full(_))
    }
}
