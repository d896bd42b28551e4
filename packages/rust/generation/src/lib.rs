//! Text-generation capability for AccessCMS.
//!
//! The adaptation engine talks to a [`TextGenerator`]: one request in, free
//! text out. This crate provides the trait, an OpenAI-compatible
//! chat-completions client, and [`from_config`], which decides at startup
//! whether a generator exists at all.
//!
//! There is no retry logic here. Retry policy belongs to the caller.

mod client;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use accesscms_shared::{AppConfig, Result, resolve_api_key};

pub use client::ChatCompletionsClient;

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System instruction framing the model's role.
    pub system_instruction: String,
    /// The user prompt.
    pub user_prompt: String,
    /// Output token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// An external text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Identifier of the model behind this generator.
    fn model_id(&self) -> &str;

    /// Perform a single request and return the raw response text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Shared handle to a generator. `None` means generation is not configured.
pub type Capability = Option<Arc<dyn TextGenerator>>;

/// Build the generation capability from config.
///
/// A missing API key is not an error: it yields `Ok(None)` and every
/// adaptation falls back to the original content.
pub fn from_config(config: &AppConfig) -> Result<Capability> {
    let Some(api_key) = resolve_api_key(config) else {
        warn!(
            env = %config.generation.api_key_env,
            "no generation API key configured, adapted content will mirror originals"
        );
        return Ok(None);
    };

    let client = ChatCompletionsClient::new(&config.generation, api_key)?;
    info!(
        model = %config.generation.model,
        base_url = %config.generation.base_url,
        "generation client initialized"
    );
    Ok(Some(Arc::new(client)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_yields_no_capability() {
        let mut config = AppConfig::default();
        config.generation.api_key_env = "ACMS_GEN_TEST_UNSET_KEY_98765".into();
        let capability = from_config(&config).expect("from_config");
        assert!(capability.is_none());
    }
}
