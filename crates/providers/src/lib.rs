//! Provider abstractions for the generative-tag capability.
//!
//! A [`TagProvider`] turns a free-text prompt into an ordered list of raw
//! candidate tag strings. Backends are interchangeable (remote model, local
//! model, test stub); callers treat the output as untrusted input.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod lmstudio;
pub mod noop;
pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// Raw candidate tags as proposed by a backend, most-confident first.
///
/// Nothing about the contents is guaranteed: duplicates, casing variance, and
/// irrelevant terms are all possible and left for the caller to clean up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub candidates: Vec<String>,
}

#[async_trait::async_trait]
pub trait TagProvider: Send + Sync {
    async fn request_candidates(&self, prompt: &str) -> Result<CandidateResponse, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    taggers: HashMap<String, Arc<dyn TagProvider>>,
    pub preferred: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tagger(mut self, name: &str, provider: Arc<dyn TagProvider>) -> Self {
        self.taggers.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred(mut self, name: &str) -> Self {
        self.preferred = Some(name.to_string());
        self
    }

    pub fn tagger(&self, name: Option<&str>) -> Result<Arc<dyn TagProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no tag provider configured".into()))?;
        self.taggers
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}

/// Splits a chat-style completion into candidate tag strings.
///
/// Backends that speak the OpenAI wire format return one content string; tags
/// are expected comma-separated, with newlines tolerated as a fallback
/// separator. Empty fragments are dropped, everything else passes through
/// verbatim for the caller to normalize.
pub(crate) fn split_candidates(content: &str) -> Vec<String> {
    content
        .split(|c| c == ',' || c == '\n')
        .map(|s| s.trim().trim_matches(|c| c == '"' || c == '`'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
