use thiserror::Error;

/// Engine error taxonomy.
///
/// `InvalidInput` is the caller's fault and never retried automatically.
/// `GenerationUnavailable` is transient and safe to retry with backoff.
/// `NoTagsGenerated` is a valid empty outcome, surfaced as "no suggestions".
/// `Inconsistency` means the store/index invariant broke; there is no
/// recovery path, callers should fail loudly.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("tag generation unavailable: {0}")]
    GenerationUnavailable(String),
    #[error("no tags generated")]
    NoTagsGenerated,
    #[error("catalog inconsistency: {0}")]
    Inconsistency(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}
