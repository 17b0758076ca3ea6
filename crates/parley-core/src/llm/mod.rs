//! Vendor adapter abstractions for Parley.
//!
//! - `LlmProvider`: RPITIT trait every vendor adapter implements
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `stream`: sink contract and the driver that enforces one terminal event
//! - `alias` / `registry`: provider name normalization and adapter resolution

pub mod alias;
pub mod box_provider;
pub mod provider;
pub mod registry;
pub mod stream;
