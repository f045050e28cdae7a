use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Public,
    Followers,
    Private,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::Followers => "followers",
            PrivacyLevel::Private => "private",
        }
    }
}

impl TryFrom<&str> for PrivacyLevel {
    type Error = AppError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "public" => Ok(PrivacyLevel::Public),
            "followers" => Ok(PrivacyLevel::Followers),
            "private" => Ok(PrivacyLevel::Private),
            _ => Err(AppError::Validation("invalid privacy_level".into())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub privacy_level: PrivacyLevel,
    /// Extra audience, consulted only when the effective privacy is private
    /// (post-level private, or the author account is private).
    pub allowed_users: HashSet<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(author_id: Uuid, content: impl Into<String>, privacy_level: PrivacyLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            content: content.into(),
            privacy_level,
            allowed_users: HashSet::new(),
            created_at: Utc::now(),
        }
    }
}
