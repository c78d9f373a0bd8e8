//! LLM interaction: the text-generation seam and its edgequake-llm adapter.
//!
//! The formatter only needs "system prompt + text in, text out", so it talks
//! to a [`TextGenerator`] rather than to a provider directly. Production code
//! wraps any `edgequake_llm::LLMProvider` in a [`ProviderGenerator`]; tests
//! substitute a stub.
//!
//! No retries happen here. A failed call is classified once and returned.

use crate::config::NotesConfig;
use crate::error::{LlmError, NotesError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A successful model response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Anything that can turn a prompt plus text into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider label used in errors and logs.
    fn name(&self) -> &str;

    async fn generate(&self, system_prompt: &str, text: &str) -> Result<Completion, LlmError>;
}

/// [`TextGenerator`] backed by an edgequake-llm provider.
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &NotesConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            options: build_options(config),
        }
    }
}

#[async_trait]
impl TextGenerator for ProviderGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, system_prompt: &str, text: &str) -> Result<Completion, LlmError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(text)];

        match self.provider.chat(&messages, Some(&self.options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    self.label,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                Ok(Completion {
                    content: response.content,
                    input_tokens: response.prompt_tokens as usize,
                    output_tokens: response.completion_tokens as usize,
                })
            }
            Err(e) => {
                let err = classify_backend_error(&self.label, &e.to_string());
                warn!("{}: formatting call failed: {}", self.label, err);
                Err(err)
            }
        }
    }
}

/// Build `CompletionOptions` from the notes config.
fn build_options(config: &NotesConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Map a provider error message onto the [`LlmError`] taxonomy.
///
/// Providers report credentials problems in different shapes (HTTP status,
/// "invalid_api_key", "Unauthorized"); anything that looks like one becomes
/// [`LlmError::Auth`] so callers know a retry is pointless.
pub fn classify_backend_error(provider: &str, message: &str) -> LlmError {
    let lower = message.to_ascii_lowercase();
    let auth_markers = [
        "401",
        "403",
        "unauthorized",
        "unauthorised",
        "forbidden",
        "authentication",
        "invalid api key",
        "invalid_api_key",
        "incorrect api key",
    ];
    if auth_markers.iter().any(|m| lower.contains(m)) {
        LlmError::Auth {
            provider: provider.to_string(),
            detail: message.to_string(),
        }
    } else {
        LlmError::Backend {
            provider: provider.to_string(),
            detail: message.to_string(),
        }
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider + model** (`config.provider_name`): built through
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI key present**: `OPENAI_API_KEY` wins over other keys.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Returns the provider with a label for logs and errors.
pub fn resolve_provider(
    config: &NotesConfig,
) -> Result<(Arc<dyn LLMProvider>, String), NotesError> {
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), "custom".to_string()));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model).map(|p| (p, name.clone()));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model).map(|p| (p, prov));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model).map(|p| (p, "openai".to_string()));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| NotesError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, "auto".to_string()))
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, NotesError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        NotesError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
