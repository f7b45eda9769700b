//! Generative backend integration.
//!
//! The backend is a black box: prompt text in, response text out. Every
//! call is single-shot and stateless; conversation history is supplied
//! explicitly in the prompt (see `context`), never relied upon as
//! backend-side memory.

pub mod gemini;

pub use gemini::GeminiProvider;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;

/// A generative text backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Complete a prompt into response text. May fail or hang; callers
    /// go through [`complete_with_timeout`].
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Timebox a backend call. A call that exceeds `budget` aborts the turn
/// with `LlmError::Timeout` before any state is written.
pub async fn complete_with_timeout(
    llm: &dyn LlmProvider,
    prompt: &str,
    budget: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(budget, llm.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(provider = llm.name(), ?budget, "backend call timed out");
            Err(LlmError::Timeout { budget })
        }
    }
}
