//! Natural-language narrative generation for risky assessments.
//!
//! The engine never calls this; the hourly cycle decides when a narrative is
//! warranted and hands the prompt to whichever provider is configured.

pub mod gemini;
pub mod prompt;

use crate::error::Result;

#[async_trait::async_trait]
pub trait NarrativeProvider: Send + Sync {
    /// Generate text for `user_prompt` under `system_instruction`.
    ///
    /// `Ok(None)` means the provider answered but produced no text.
    async fn generate(&self, user_prompt: &str, system_instruction: &str) -> Result<Option<String>>;

    /// Short identifier used in logs and stored summaries.
    fn name(&self) -> &str;
}
