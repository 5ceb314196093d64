//! Vision summaries: one inline image → one short description.
//!
//! The enrichment stage only depends on [`ImageSummarizer`]; the production
//! implementation, [`VisionSummarizer`], drives any `edgequake_llm` provider
//! with vision support.
//!
//! ## Retry Strategy
//!
//! Off by default: a failed image simply stays undescribed and the next run
//! picks it up again. With `max_retries > 0` the wait doubles per attempt
//! (`retry_backoff_ms * 2^(attempt-1)`), e.g. 500 ms → 1 s → 2 s.

use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::model::MimeType;
use crate::pipeline::encode::encode_payload;
use crate::prompts::{has_stock_opener, IMAGE_SUMMARY_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Turns one base64 image into a description.
#[async_trait]
pub trait ImageSummarizer: Send + Sync {
    async fn summarize(&self, image_base64: &str, mime: &MimeType) -> Result<String, IngestError>;
}

/// [`ImageSummarizer`] backed by a vision-capable LLM provider.
pub struct VisionSummarizer {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl VisionSummarizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| IMAGE_SUMMARY_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.summary_max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, IngestError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ImageSummarizer for VisionSummarizer {
    async fn summarize(&self, image_base64: &str, mime: &MimeType) -> Result<String, IngestError> {
        let image = encode_payload(image_base64, mime)?;
        let messages = vec![
            ChatMessage::system(self.prompt.as_str()),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let options = self.options();
        let start = Instant::now();

        let mut last_err: Option<String> = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!("Summary retry {}/{} after {}ms", attempt, self.max_retries, backoff);
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "Summary: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let summary = response.content.trim().to_string();
                    if summary.is_empty() {
                        last_err = Some("model returned an empty description".to_string());
                        continue;
                    }
                    if !has_stock_opener(&summary) {
                        warn!("Summary does not start with a stock opener: {:.60}", summary);
                    }
                    return Ok(summary);
                }
                Err(e) => {
                    warn!("Summary attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e.to_string());
                }
            }
        }

        Err(IngestError::SummaryFailed {
            message: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, IngestError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        IngestError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Provider override read from the environment, shared with the CLI flags.
pub const PROVIDER_ENV: &str = "EDGEQUAKE_LLM_PROVIDER";
/// Model override read from the environment, shared with the CLI flags.
pub const MODEL_ENV: &str = "EDGEQUAKE_MODEL";

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` with `config.model` (default `gpt-4o`).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. OpenAI, when `OPENAI_API_KEY` is set.
/// 5. Whatever [`ProviderFactory::from_env`] detects.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, IngestError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.vision_model());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var(PROVIDER_ENV),
        std::env::var(MODEL_ENV),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", config.vision_model());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| IngestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY (or another provider key) in the environment or .env.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
