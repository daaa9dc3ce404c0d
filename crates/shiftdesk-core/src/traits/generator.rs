//! Text/JSON generation service used for shift suggestions.

use async_trait::async_trait;

use crate::error::Result;

/// Black-box completion service. Output is untrusted and must be validated.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generator name (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Produce a completion for `prompt`; expected to contain JSON.
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
