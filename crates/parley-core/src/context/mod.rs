//! Conversation context: persistence port and the budgeted manager.

pub mod manager;
pub mod repository;

pub use manager::{ContextManager, estimate_token_count};
pub use repository::{ContextRepository, StoredContext};
