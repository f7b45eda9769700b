//! Error types for Scripture Companion.

use std::time::Duration;

/// Top-level error type for the companion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Document store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The candidate root reference is unreachable or not writable.
    #[error("Invalid store root {candidate}: {reason}")]
    RootInvalid { candidate: String, reason: String },

    /// A read or write against a linked root failed. A turn that hits this
    /// during its read phase aborts without writing anything.
    #[error("Store unavailable during {operation}: {reason}")]
    Unavailable { operation: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Document codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid value for header key {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Reading plan generation errors.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The backend produced no parseable day entries, even after a retry.
    #[error("Generated plan was empty")]
    Empty,

    /// The backend response could not be parsed into day entries.
    #[error("Could not parse plan response: {reason}")]
    Unparseable { reason: String },

    /// Appended entries would break day contiguity.
    #[error("Plan entries not contiguous: expected day {expected}, got {got}")]
    NonContiguous { expected: u32, got: u32 },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Generative backend errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Backend call exceeded time budget of {budget:?}")]
    Timeout { budget: Duration },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Conversation state machine errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Onboarding input outside the enumerated option set. The same
    /// sub-step is re-prompted.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },
}

/// Result type alias for the companion.
pub type Result<T> = std::result::Result<T, Error>;
