//! Infrastructure layer for Parley.
//!
//! Implementations of the ports defined in `parley-core`: vendor adapters
//! and the provider factory, SQLite repositories, environment credential
//! binding, configuration loading and web search.

pub mod config;
pub mod llm;
pub mod search;
pub mod secret;
pub mod sqlite;
