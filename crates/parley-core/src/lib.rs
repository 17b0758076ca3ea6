//! Business logic and port definitions for Parley.
//!
//! This crate defines the "ports" (adapter, repository and search traits)
//! that the infrastructure layer implements, plus the logic built on them:
//! provider resolution, context management and chat fan-out. It depends
//! only on `parley-types` -- never on `parley-infra` or any database/IO crate.

pub mod chat;
pub mod context;
pub mod event;
pub mod llm;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;
