//! Provider selection and instance caching.
//!
//! Providers are selected by [`ProviderKind`] and cached by
//! `(kind, config-fingerprint)` so repeated requests share one HTTP client.
//! Explicit registration overrides construction, which is how tests inject
//! scripted providers and deployments swap in custom backends.

use crate::anthropic::{AnthropicConfig, AnthropicProvider};
use crate::gemini::{GeminiConfig, GeminiProvider};
use crate::openai::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};
use crate::provider::LLMProvider;
use crate::types::LLMResult;
use conductor_core::ProviderKind;
use dashmap::DashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Default)]
pub struct ProviderFactory {
    registered: DashMap<ProviderKind, Arc<dyn LLMProvider>>,
    cache: DashMap<(ProviderKind, u64), Arc<dyn LLMProvider>>,
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an explicit provider instance for a kind.
    ///
    /// Registered instances take precedence over environment-derived
    /// construction.
    pub fn register(&self, kind: ProviderKind, provider: Arc<dyn LLMProvider>) {
        self.registered.insert(kind, provider);
    }

    /// Resolve the provider for a kind, constructing and caching on miss.
    pub fn provider_for(&self, kind: ProviderKind) -> LLMResult<Arc<dyn LLMProvider>> {
        if let Some(provider) = self.registered.get(&kind) {
            return Ok(provider.value().clone());
        }

        let fingerprint = Self::config_fingerprint(kind);
        if let Some(cached) = self.cache.get(&(kind, fingerprint)) {
            return Ok(cached.value().clone());
        }

        let provider: Arc<dyn LLMProvider> = match kind {
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_env()?),
            ProviderKind::Gemini => Arc::new(GeminiProvider::from_env()?),
            _ => Arc::new(OpenAiCompatibleProvider::from_env(kind)?),
        };
        self.cache.insert((kind, fingerprint), provider.clone());
        Ok(provider)
    }

    /// Names of every supported provider, for the listing endpoint.
    pub fn provider_names() -> Vec<&'static str> {
        ProviderKind::ALL.iter().map(ProviderKind::as_str).collect()
    }

    /// Hash of the environment-derived connection parameters. A changed
    /// key or endpoint yields a new instance instead of a stale client.
    fn config_fingerprint(kind: ProviderKind) -> u64 {
        let mut hasher = std::hash::DefaultHasher::new();
        match kind {
            ProviderKind::Anthropic => {
                let config = AnthropicConfig::from_env();
                (config.api_key, config.base_url, config.default_model, config.timeout_secs)
                    .hash(&mut hasher);
            }
            ProviderKind::Gemini => {
                let config = GeminiConfig::from_env();
                (config.api_key, config.base_url, config.default_model, config.timeout_secs)
                    .hash(&mut hasher);
            }
            _ => {
                let config = OpenAiCompatibleConfig::from_env(kind);
                (config.api_key, config.base_url, config.default_model, config.timeout_secs)
                    .hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_is_cached_per_kind_and_config() {
        let factory = ProviderFactory::new();
        let first = factory.provider_for(ProviderKind::OpenAi).unwrap();
        let second = factory.provider_for(ProviderKind::OpenAi).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn registered_instances_win() {
        struct Probe;
        #[async_trait::async_trait]
        impl LLMProvider for Probe {
            fn provider_name(&self) -> &str {
                "probe"
            }
            fn available_models(&self) -> Vec<&str> {
                vec![]
            }
            async fn chat_completion(
                &self,
                _: &[conductor_core::ChatMessage],
                _: &str,
                _: u32,
                _: f32,
            ) -> crate::types::LLMResult<crate::types::ChatResponse> {
                unimplemented!("probe")
            }
            async fn orchestration_completion(
                &self,
                _: &crate::types::OrchestrationRequest,
            ) -> crate::types::LLMResult<crate::types::OrchestrationResponse> {
                unimplemented!("probe")
            }
            fn format_tools(&self, _: &[conductor_core::ToolDefinition]) -> serde_json::Value {
                serde_json::Value::Null
            }
        }

        let factory = ProviderFactory::new();
        factory.register(ProviderKind::OpenAi, Arc::new(Probe));
        let provider = factory.provider_for(ProviderKind::OpenAi).unwrap();
        assert_eq!(provider.provider_name(), "probe");
    }

    #[test]
    fn all_eight_providers_are_listed() {
        let names = ProviderFactory::provider_names();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"openai"));
        assert!(names.contains(&"kimi_k2"));
    }
}
