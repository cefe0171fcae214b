//! Generation orchestration: builds the prompt for the generative-tag
//! capability, requests candidates, and hands them to the ranker.

use crate::config::AppConfig;
use crate::error::EngineError;
use crate::models::GenerationResult;
use crate::normalize;
use crate::ranker;
use providers::lmstudio::{LmStudioConfig, LmStudioProvider};
use providers::noop::NoopProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use std::sync::Arc;
use tracing::debug;

/// Builds the keyword-extraction prompt for a free-text description.
///
/// Tags come back comma-separated: the most meaningful combination first,
/// then related tags, nothing but tags. Multi-word tags are allowed.
pub fn build_prompt(query_text: &str) -> String {
    format!(
        "Extract keywords from the following description as short descriptive tags. \
         Tags may contain multiple words. Return the most meaningful combination first, \
         then up to two related tags. \
         Separate tags with commas and output nothing but tags.\n\
         Description: ```{}```",
        query_text
    )
}

/// Requests candidates from the configured provider and ranks them into a
/// [`GenerationResult`].
///
/// Provider-side failures (transport, malformed responses, missing backend)
/// surface as `GenerationUnavailable` and are safe to retry; low-quality but
/// parsable output is not an error. Nothing here touches the catalog, so a
/// caller that drops the future simply abandons the request.
pub async fn suggest(
    query_text: &str,
    registry: &ProviderRegistry,
    provider: Option<&str>,
) -> Result<GenerationResult, EngineError> {
    // Validate the input up front so an empty query is the caller's error,
    // not a wasted network round-trip.
    let _ = normalize::normalize_query(query_text)?;

    let tagger = registry
        .tagger(provider)
        .map_err(|e| EngineError::GenerationUnavailable(e.to_string()))?;
    let prompt = build_prompt(query_text);
    let response = tagger
        .request_candidates(&prompt)
        .await
        .map_err(|e| EngineError::GenerationUnavailable(e.to_string()))?;
    debug!(
        "provider proposed {} raw candidates",
        response.candidates.len()
    );

    ranker::rank(&response.candidates, query_text)
}

/// Builds the provider registry from configuration and environment, the
/// noop backend always present as a fallback name.
pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new().with_tagger("noop", Arc::new(NoopProvider));

    if let Some(key) = std::env::var_os("OPENAI_API_KEY") {
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.to_string_lossy().into_owned(),
            base_url,
            chat_model: config.generator.chat_model.clone(),
        });
        reg = reg.with_tagger("openai", Arc::new(provider));
    }

    if let Some(base) = std::env::var_os("LMSTUDIO_BASE_URL") {
        let provider = LmStudioProvider::new(LmStudioConfig {
            base_url: base.to_string_lossy().into_owned(),
            chat_model: config.generator.chat_model.clone(),
        });
        reg = reg.with_tagger("lmstudio", Arc::new(provider));
    }

    reg.set_preferred(&config.generator.provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::{CandidateResponse, ProviderError, TagProvider};

    struct StubProvider {
        candidates: Vec<String>,
    }

    #[async_trait::async_trait]
    impl TagProvider for StubProvider {
        async fn request_candidates(
            &self,
            _prompt: &str,
        ) -> Result<CandidateResponse, ProviderError> {
            Ok(CandidateResponse {
                candidates: self.candidates.clone(),
            })
        }
    }

    fn stub_registry(candidates: &[&str]) -> ProviderRegistry {
        ProviderRegistry::new()
            .with_tagger(
                "stub",
                Arc::new(StubProvider {
                    candidates: candidates.iter().map(|s| s.to_string()).collect(),
                }),
            )
            .set_preferred("stub")
    }

    #[tokio::test]
    async fn suggest_ranks_provider_candidates() {
        let registry = stub_registry(&["Ocean Sunset", "seascape", "golden hour"]);
        let result = suggest("sunset over the ocean", &registry, None)
            .await
            .unwrap();
        assert_eq!(result.primary().tag.as_str(), "ocean sunset");
        assert_eq!(result.secondaries().len(), 2);
    }

    #[tokio::test]
    async fn missing_backend_is_generation_unavailable() {
        let registry = ProviderRegistry::new()
            .with_tagger("noop", Arc::new(NoopProvider))
            .set_preferred("noop");
        let err = suggest("a quiet beach", &registry, None).await.unwrap_err();
        assert!(matches!(err, EngineError::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_query_fails_before_the_provider_is_called() {
        let registry = stub_registry(&["anything"]);
        let err = suggest("   ", &registry, None).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn junk_only_candidates_are_no_tags() {
        let registry = stub_registry(&["???", "..."]);
        let err = suggest("a quiet beach", &registry, None).await.unwrap_err();
        assert!(matches!(err, EngineError::NoTagsGenerated));
    }
}
