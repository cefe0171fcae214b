use crate::{CandidateResponse, ProviderError, TagProvider};

#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl TagProvider for NoopProvider {
    async fn request_candidates(&self, _prompt: &str) -> Result<CandidateResponse, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
