//! Shared domain types for Parley.
//!
//! Canonical generation messages, vendor credentials, conversation contexts,
//! room chat records, room events, configuration and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, secrecy.

pub mod chat;
pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod event;
pub mod llm;
