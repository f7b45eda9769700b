//! Scripture Companion — conversational Bible reading companion core.

pub mod channels;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod model;
pub mod plan;
pub mod session;
pub mod store;
