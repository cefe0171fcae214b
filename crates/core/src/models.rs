use serde::{Deserialize, Serialize};
use std::fmt;

/// A media item known to the catalog. The file itself is owned by the
/// filesystem; the engine only keeps the stable identifier, the path
/// reference, a sniffed kind, and the import timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub path: String,
    pub kind: Option<String>,
    pub created_at: i64,
}

/// A normalized tag: lowercase, punctuation-stripped, single-spaced.
///
/// Equality is structural. Construction goes through
/// [`crate::normalize::normalize_tag`]; the catalog rebuilds tags from
/// already-normalized stored strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub(crate) fn from_normalized(s: String) -> Self {
        Tag(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    User,
    Generated,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::User => "user",
            Provenance::Generated => "generated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Provenance::User),
            "generated" => Some(Provenance::Generated),
            _ => None,
        }
    }
}

/// One (media, tag) association. At most one exists per distinct tag of a
/// media item; re-associating overwrites confidence and provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagAssociation {
    pub media_id: String,
    pub tag: Tag,
    pub confidence: f64,
    pub provenance: Provenance,
}

/// A generated tag with its relative confidence weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTag {
    pub tag: Tag,
    pub confidence: f64,
}

/// Outcome of one generation request: the primary tag at index 0 followed by
/// up to two secondary tags. Transient; becomes associations once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub tags: Vec<ScoredTag>,
}

impl GenerationResult {
    pub fn primary(&self) -> &ScoredTag {
        &self.tags[0]
    }

    pub fn secondaries(&self) -> &[ScoredTag] {
        &self.tags[1..]
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub media_id: String,
    pub score: f64,
}
