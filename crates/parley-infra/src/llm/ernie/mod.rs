//! Baidu ERNIE (Qianfan) provider.
//!
//! Authenticates with an OAuth client-credentials exchange and streams SSE
//! frames carrying an explicit `is_end` flag.

pub mod auth;
pub mod client;
pub mod types;

pub use client::ErnieProvider;
