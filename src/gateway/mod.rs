//! Provider gateway for chat completions.

pub mod error;
pub mod openai;
pub mod types;

use openai::ChatProvider;

pub use error::{ErrorContext, ProviderError};
pub use openai::OpenAiAdapter;
pub use types::*;

use crate::config::HarnessConfig;

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Gateway over a single provider adapter.
///
/// One instance is built per run and reused for every call; calls are issued
/// strictly one at a time by the stage loops. There is no retry layer: a
/// failed call is terminal for that item.
pub struct ProviderGateway<P: ChatProvider> {
    provider: P,
}

#[async_trait::async_trait]
impl<P: ChatProvider> ChatGateway for ProviderGateway<P> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl ProviderGateway<OpenAiAdapter> {
    /// Build the gateway from harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, ProviderError> {
        if config.api.api_key.trim().is_empty() {
            return Err(ProviderError::config(
                "api_key is not set (config file [api] section or RUBRIC_API_KEY)",
            ));
        }
        let adapter = OpenAiAdapter::with_config(
            &config.api.api_key,
            &config.api.base_url,
            config.api.timeout(),
        )?;
        Ok(Self::new(adapter))
    }
}

impl<P: ChatProvider> ProviderGateway<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let caller = req.attribution.caller;
        let result = self.provider.chat(&req).await;
        match &result {
            Ok(resp) => {
                tracing::debug!(
                    caller,
                    model = %req.model,
                    latency_ms = resp.latency.as_millis() as u64,
                    "chat call completed"
                );
            }
            Err(err) => {
                tracing::warn!(caller, model = %req.model, code = err.code(), "chat call failed");
            }
        }
        result
    }
}
