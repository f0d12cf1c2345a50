//! LLM integration for Inbox Assist.
//!
//! Talks to any OpenAI-compatible chat-completions endpoint; the default
//! configuration points at Gemini's compatibility API.

mod openai_compat;
pub mod provider;
pub mod reasoning;

pub use openai_compat::OpenAiCompatProvider;
pub use provider::*;
pub use reasoning::{Reasoning, ReasoningContext, RespondOutput, RespondResult, TokenUsage};

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiCompatProvider::new(config)?;
    tracing::info!(model = %config.model, api_base = %config.api_base, "Using OpenAI-compatible provider");
    Ok(Arc::new(provider))
}
