//! LLM interaction: send a rendered prompt, get raw text back.
//!
//! The pipeline talks to the model only through the [`LlmClient`] trait, so
//! chunk generation and topic discovery can be driven by a scripted client in
//! tests. The production client, [`ProviderClient`], adapts any
//! `edgequake-llm` provider and owns the retry policy. Prompt wording lives in
//! [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^attempt`)
//! spreads retries out: with 500 ms base and 2 retries the wait sequence is
//! 500 ms → 1 s per chunk.

use crate::config::GenerationConfig;
use crate::error::{LlmCallError, QuizError};
use crate::prompts::Prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Model used when only a provider name (or an OpenAI key) is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Text returned by one LLM call, with token usage when the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl LlmReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// One prompt in, raw completion text out.
///
/// Implementations handle their own retries; an `Err` means the call is
/// given up for good.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(&self, prompt: &Prompt) -> Result<LlmReply, LlmCallError>;
}

/// [`LlmClient`] backed by an `edgequake-llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &GenerationConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }
}

#[async_trait]
impl LlmClient for ProviderClient {
    async fn invoke(&self, prompt: &Prompt) -> Result<LlmReply, LlmCallError> {
        let messages = vec![
            ChatMessage::system(prompt.system.as_str()),
            ChatMessage::user(prompt.user.as_str()),
        ];
        let start = Instant::now();

        let response = retry_with_backoff(self.max_retries, self.retry_backoff_ms, || {
            self.provider.chat(&messages, Some(&self.options))
        })
        .await?;

        debug!(
            "LLM call: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(LlmReply {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// [`LlmClient`] wrapping a synchronous closure.
///
/// Useful for offline runs and tests where the "model" is a canned reply.
pub struct FnClient<F> {
    f: F,
}

impl<F> FnClient<F>
where
    F: Fn(&Prompt) -> Result<String, LlmCallError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> LlmClient for FnClient<F>
where
    F: Fn(&Prompt) -> Result<String, LlmCallError> + Send + Sync,
{
    async fn invoke(&self, prompt: &Prompt) -> Result<LlmReply, LlmCallError> {
        (self.f)(prompt).map(LlmReply::text)
    }
}

/// Run `call` up to `max_retries + 1` times with exponential backoff.
pub(crate) async fn retry_with_backoff<T, E, F, Fut>(
    max_retries: u32,
    retry_backoff_ms: u64,
    mut call: F,
) -> Result<T, LlmCallError>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_err: Option<String> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!("LLM retry {}/{} after {}ms", attempt, max_retries, backoff);
            sleep(Duration::from_millis(backoff)).await;
        }

        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let err_msg = e.to_string();
                warn!("LLM attempt {} failed: {}", attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(LlmCallError {
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        attempts: max_retries + 1,
    })
}

/// Build `CompletionOptions` from the generation config.
fn build_options(config: &GenerationConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the client for a run, from most-specific to least-specific:
///
/// 1. **Injected client** (`config.llm_client`), used as-is.
/// 2. **Pre-built provider** (`config.provider`), wrapped in [`ProviderClient`].
/// 3. **Named provider + model** (`config.provider_name`), created through
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **`OPENAI_API_KEY`** present: OpenAI with the configured model.
/// 6. **Auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_client(config: &GenerationConfig) -> Result<Arc<dyn LlmClient>, QuizError> {
    if let Some(ref client) = config.llm_client {
        return Ok(Arc::clone(client));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderClient::new(provider, config)))
}

fn resolve_provider(config: &GenerationConfig) -> Result<Arc<dyn LLMProvider>, QuizError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| QuizError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    info!("Using auto-detected LLM provider");
    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, QuizError> {
    info!("Using LLM provider {} with model {}", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        QuizError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn build_options_defaults() {
        let config = GenerationConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(2, 1, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("HTTP 429 Too Many Requests")
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.expect("third attempt succeeds"), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_with_last_error() {
        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(1, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("HTTP 503 Service Unavailable") }
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 2);
        assert!(err.detail.contains("503"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fn_client_returns_closure_output() {
        let client = FnClient::new(|p: &Prompt| Ok(format!("echo: {}", p.user)));
        let prompt = Prompt {
            system: "sys".into(),
            user: "hello".into(),
        };
        let reply = client.invoke(&prompt).await.expect("invoke");
        assert_eq!(reply.content, "echo: hello");
        assert_eq!(reply.input_tokens, 0);
    }

    #[test]
    fn injected_client_wins() {
        let client: Arc<dyn LlmClient> = Arc::new(FnClient::new(|_: &Prompt| Ok(String::new())));
        let config = GenerationConfig::builder()
            .llm_client(Arc::clone(&client))
            .build()
            .expect("config");
        let resolved = resolve_client(&config).expect("resolve");
        assert!(Arc::ptr_eq(&resolved, &client));
    }
}
