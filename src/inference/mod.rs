//! Language model clients.
//!
//! The orchestration loop only needs "prompt in, text out". Both clients
//! send the whole prompt as a single user turn.

pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::config::{ModelConfig, Provider};
use crate::types::Completion;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A text-completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion>;
}

/// Build the client selected by `config.provider`.
pub fn build_model(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
    let api_key = config
        .resolve_api_key()
        .with_context(|| format!("No API key configured for provider '{}'", config.provider))?;
    let model: Arc<dyn LanguageModel> = match config.provider {
        Provider::Openai => Arc::new(OpenAiClient::new(config, &api_key)),
        Provider::Gemini => Arc::new(GeminiClient::new(config, &api_key)),
    };
    Ok(model)
}
