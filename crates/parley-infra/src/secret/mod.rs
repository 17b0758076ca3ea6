//! Credential sources.
//!
//! Default vendor credentials are bound from environment variables once at
//! startup (see [`env`]).

pub mod env;
