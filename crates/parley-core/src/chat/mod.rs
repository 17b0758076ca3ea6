//! Room chat: repository port and the multi-agent orchestrator.

pub mod orchestrator;
pub mod repository;

pub use orchestrator::{ChatOrchestrator, ChatOutcome, ChatRequest};
pub use repository::ChatRepository;
