//! Text normalization: the canonical form every tag and query passes through
//! before comparison. Pure and deterministic.

use crate::error::EngineError;
use crate::models::Tag;

/// Splits free text into normalized tokens: lowercased, punctuation treated
/// as whitespace, empty tokens dropped.
///
/// Fails with `InvalidInput` when the input is empty or nothing textual
/// survives normalization.
pub fn tokenize(text: &str) -> Result<Vec<String>, EngineError> {
    if text.trim().is_empty() {
        return Err(EngineError::InvalidInput("empty text".into()));
    }
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let tokens: Vec<String> = cleaned.split_whitespace().map(str::to_string).collect();
    if tokens.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "no textual content in {:?}",
            text
        )));
    }
    Ok(tokens)
}

/// Normalized query form: tokens rejoined with single spaces.
pub fn normalize_query(text: &str) -> Result<String, EngineError> {
    Ok(tokenize(text)?.join(" "))
}

/// Canonical single-tag form of a candidate string, or `None` when nothing
/// survives normalization (the candidate is unusable, not an error).
pub fn normalize_tag(text: &str) -> Option<Tag> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(Tag::from_normalized(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        let tokens = tokenize("Sunset, over THE ocean!").unwrap();
        assert_eq!(tokens, vec!["sunset", "over", "the", "ocean"]);
    }

    #[test]
    fn tokenize_rejects_empty_and_nontextual() {
        assert!(matches!(
            tokenize("   "),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            tokenize("!!! ---"),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn normalize_tag_collapses_whitespace() {
        let tag = normalize_tag("  Golden   Hour  ").unwrap();
        assert_eq!(tag.as_str(), "golden hour");
        assert_eq!(normalize_tag("Golden_Hour").unwrap(), tag);
    }

    #[test]
    fn normalize_tag_returns_none_for_junk() {
        assert!(normalize_tag("???").is_none());
        assert!(normalize_tag("").is_none());
    }

    #[test]
    fn tokenize_is_deterministic() {
        let a = tokenize("A dog on a leash").unwrap();
        let b = tokenize("A dog on a leash").unwrap();
        assert_eq!(a, b);
    }
}
