//! Observability setup for Parley: subscriber installation and the
//! attribute names used on LLM spans.

pub mod genai_attrs;
pub mod tracing_setup;
