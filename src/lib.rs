//! # social-core
//!
//! Core engine for a social-graph application: content visibility, direct
//! messaging with a two-party deletion-agreement protocol, and ephemeral
//! typing presence.
//!
//! The crate is storage-agnostic. All reads and writes go through the
//! [`store`] traits; [`store::MemoryStore`] is the in-tree implementation
//! used by the test suite, and deployments substitute a transactional
//! backend behind the same traits.
//!
//! ## Subsystems
//!
//! - [`visibility::VisibilityEngine`] answers "may this viewer see this
//!   post/profile", combining follow edges, block edges, account-level
//!   privacy and per-post audiences. Account privacy is a hard ceiling:
//!   a private author's posts never reach non-followers, whatever the
//!   post-level setting says.
//! - [`services::ConversationService`] owns conversation dedup, message
//!   ordering and read-state, and the mutual-consent deletion protocol
//!   (either participant requests, the other approves within seven days,
//!   stale requests expire lazily).
//! - [`presence`] carries typing indicators over per-conversation
//!   fan-out channels. Nothing in it is persisted.
//! - [`moderation::ModerationFilter`] screens message and post text
//!   against a denylist before anything is stored.
//!
//! Every mutation that commits publishes a [`events::DomainEvent`] on the
//! [`events::EventBus`], which is how downstream consumers (feed fan-out,
//! notifications, websocket sessions) observe the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod moderation;
pub mod presence;
pub mod retry;
pub mod services;
pub mod store;
pub mod visibility;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use events::{DomainEvent, EventBus};
pub use moderation::ModerationFilter;
pub use store::MemoryStore;
pub use visibility::VisibilityEngine;
