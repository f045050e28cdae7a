pub mod conversations;
pub mod graph;
pub mod posts;

pub use conversations::ConversationService;
pub use graph::GraphService;
pub use posts::ContentService;
