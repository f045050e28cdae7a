pub mod conversation;
pub mod message;
pub mod post;
pub mod profile;

pub use conversation::{
    Conversation, ConversationSummary, DeletionOutcome, DeletionRequest, ParticipantPair,
};
pub use message::Message;
pub use post::{Post, PrivacyLevel};
pub use profile::{Profile, ProfileView};
