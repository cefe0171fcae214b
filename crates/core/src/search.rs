//! Query matching: scores media items against a free-text query through the
//! inverted tag index.

use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::models::SearchHit;
use crate::normalize;
use std::collections::HashMap;
use tracing::debug;

/// Ranks media items against `query_text`.
///
/// Each distinct normalized query token is a candidate tag: it matches every
/// indexed tag containing it as a whole word, and each match adds that
/// association's confidence to the media item's score, so items matching
/// more query tags accumulate higher scores. Ties break by more recent
/// creation timestamp, then ascending id for determinism. A query that
/// matches nothing returns an empty result, not an error.
///
/// `limit` of `None` or zero means no truncation.
pub async fn search(
    catalog: &Catalog,
    query_text: &str,
    limit: Option<usize>,
) -> Result<Vec<SearchHit>, EngineError> {
    let mut tokens = normalize::tokenize(query_text)?;
    tokens.sort();
    tokens.dedup();

    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut matched = 0usize;
    for token in &tokens {
        for tag in catalog.tags_matching_token(token).await {
            for assoc in catalog.associations_for_tag(&tag).await {
                *scores.entry(assoc.media_id).or_insert(0.0) += assoc.confidence;
            }
            matched += 1;
        }
    }
    debug!(
        "query matched {} media items across {} tag hits",
        scores.len(),
        matched
    );

    let mut hits: Vec<(SearchHit, i64)> = Vec::with_capacity(scores.len());
    for (media_id, score) in scores {
        let created_at = catalog
            .media(&media_id)
            .await
            .map(|m| m.created_at)
            .unwrap_or_default();
        hits.push((SearchHit { media_id, score }, created_at));
    }
    hits.sort_by(|(a, a_created), (b, b_created)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b_created.cmp(a_created))
            .then_with(|| a.media_id.cmp(&b.media_id))
    });

    let mut hits: Vec<SearchHit> = hits.into_iter().map(|(hit, _)| hit).collect();
    if let Some(limit) = limit {
        if limit > 0 {
            hits.truncate(limit);
        }
    }
    Ok(hits)
}
