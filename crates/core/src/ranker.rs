//! Candidate ranking and deduplication: turns the untrusted raw strings a
//! provider proposes into at most one primary and two secondary tags.

use crate::error::EngineError;
use crate::models::{GenerationResult, ScoredTag, Tag};
use crate::normalize;
use std::collections::HashSet;
use tracing::debug;

/// Secondary tags carry half the primary's relative weight.
const SECONDARY_WEIGHT: f64 = 0.5;

/// Ranks raw candidates against the query they were generated for.
///
/// Candidates identical to, or a strict substring of, the normalized query
/// are discarded (self-referential tags add no discovery value) unless that
/// would discard everything, in which case the closest match — the longest
/// normalized form, first-seen on ties — is retained instead of returning an
/// empty result. Survivors are deduplicated by normalized form keeping
/// first-seen order; the provider's ordering is assumed most-confident-first.
///
/// The primary tag always occupies index 0 of the result.
pub fn rank(raw_candidates: &[String], query_text: &str) -> Result<GenerationResult, EngineError> {
    let query_norm = normalize::normalize_query(query_text)?;

    let normalized: Vec<Tag> = raw_candidates
        .iter()
        .filter_map(|raw| normalize::normalize_tag(raw))
        .collect();
    if normalized.is_empty() {
        return Err(EngineError::NoTagsGenerated);
    }

    let mut survivors: Vec<Tag> = normalized
        .iter()
        .filter(|t| !query_norm.contains(t.as_str()))
        .cloned()
        .collect();
    if survivors.is_empty() {
        // Every candidate echoed the query; keep the closest match rather
        // than reporting nothing.
        let mut best = &normalized[0];
        for tag in &normalized[1..] {
            if tag.as_str().len() > best.as_str().len() {
                best = tag;
            }
        }
        debug!("all candidates self-referential, retaining closest match");
        survivors.push(best.clone());
    }

    let mut seen = HashSet::new();
    survivors.retain(|t| seen.insert(t.clone()));
    survivors.truncate(3);

    // A pool smaller than three scales the secondary weight down with it.
    let pool_scale = survivors.len() as f64 / 3.0;
    let tags = survivors
        .into_iter()
        .enumerate()
        .map(|(i, tag)| ScoredTag {
            tag,
            confidence: if i == 0 {
                1.0
            } else {
                SECONDARY_WEIGHT * pool_scale
            },
        })
        .collect();

    Ok(GenerationResult { tags })
}
