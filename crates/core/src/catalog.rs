//! The tag catalog: durable Tag Store plus its in-memory Inverted Tag Index,
//! encapsulated as one unit so the two can never drift apart.
//!
//! Every mutation commits a SQLite transaction and applies the in-memory
//! change while holding the write lock; readers only ever observe both
//! structures updated together. The index is rebuilt from the store on open,
//! so the invariant survives process restarts.

use crate::error::EngineError;
use crate::models::{MediaItem, Provenance, Tag, TagAssociation};
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct CatalogState {
    media: HashMap<String, MediaItem>,
    /// media id -> tag -> association. The forward Tag Store.
    store: HashMap<String, HashMap<Tag, TagAssociation>>,
    /// tag -> media ids carrying it. The inverted index; lookup hot path.
    index: HashMap<Tag, HashSet<String>>,
    /// token -> tags containing that token. Lets a single query token reach
    /// multi-word tags ("sunset" finds "ocean sunset").
    tokens: HashMap<String, HashSet<Tag>>,
}

impl CatalogState {
    fn index_tag(&mut self, tag: &Tag) {
        for token in tag.as_str().split_whitespace() {
            self.tokens
                .entry(token.to_string())
                .or_default()
                .insert(tag.clone());
        }
    }

    /// Drops the tag from the token map once no media carries it.
    fn unindex_tag(&mut self, tag: &Tag) {
        for token in tag.as_str().split_whitespace() {
            let now_empty = self
                .tokens
                .get_mut(token)
                .map(|tags| {
                    tags.remove(tag);
                    tags.is_empty()
                })
                .unwrap_or(false);
            if now_empty {
                self.tokens.remove(token);
            }
        }
    }

    /// Drops one media id from a tag's index entry, unmapping the tag when
    /// it loses its last carrier.
    fn drop_index_entry(&mut self, tag: &Tag, media_id: &str) {
        let now_empty = self
            .index
            .get_mut(tag)
            .map(|ids| {
                ids.remove(media_id);
                ids.is_empty()
            })
            .unwrap_or(false);
        if now_empty {
            self.index.remove(tag);
            self.unindex_tag(tag);
        }
    }
}

#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
    state: Arc<RwLock<CatalogState>>,
}

impl Catalog {
    /// Loads the durable store and rebuilds the inverted index.
    pub async fn open(pool: SqlitePool) -> Result<Self, EngineError> {
        let mut state = CatalogState::default();

        let media_rows = sqlx::query("SELECT id, path, kind, created_at FROM media")
            .fetch_all(&pool)
            .await?;
        for row in media_rows {
            let item = MediaItem {
                id: row.get(0),
                path: row.get(1),
                kind: row.try_get(2).ok(),
                created_at: row.get(3),
            };
            state.store.entry(item.id.clone()).or_default();
            state.media.insert(item.id.clone(), item);
        }

        let assoc_rows = sqlx::query(
            r#"
            SELECT mt.media_id, t.name, mt.confidence, mt.provenance
            FROM media_tags mt JOIN tags t ON t.id = mt.tag_id
            "#,
        )
        .fetch_all(&pool)
        .await?;
        for row in assoc_rows {
            let media_id: String = row.get(0);
            let name: String = row.get(1);
            let confidence: f64 = row.get(2);
            let provenance: String = row.get(3);
            let provenance = Provenance::parse(&provenance).ok_or_else(|| {
                EngineError::Inconsistency(format!("unknown provenance {:?} in store", provenance))
            })?;
            let tag = Tag::from_normalized(name);
            state.index_tag(&tag);
            state
                .index
                .entry(tag.clone())
                .or_default()
                .insert(media_id.clone());
            state.store.entry(media_id.clone()).or_default().insert(
                tag.clone(),
                TagAssociation {
                    media_id,
                    tag,
                    confidence,
                    provenance,
                },
            );
        }

        info!(
            "catalog opened: {} media items, {} distinct tags",
            state.media.len(),
            state.index.len()
        );
        Ok(Self {
            pool,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Registers a media item, or refreshes the path/kind of an already-known
    /// one. The first import's timestamp sticks; existing tags are untouched.
    pub async fn register(
        &self,
        id: &str,
        path: &str,
        kind: Option<&str>,
        created_at: i64,
    ) -> Result<MediaItem, EngineError> {
        let mut state = self.state.write().await;

        sqlx::query(
            r#"
            INSERT INTO media (id, path, kind, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET path = excluded.path, kind = excluded.kind
            "#,
        )
        .bind(id)
        .bind(path)
        .bind(kind)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let item = match state.media.get(id) {
            Some(existing) => MediaItem {
                id: id.to_string(),
                path: path.to_string(),
                kind: kind.map(str::to_string),
                created_at: existing.created_at,
            },
            None => MediaItem {
                id: id.to_string(),
                path: path.to_string(),
                kind: kind.map(str::to_string),
                created_at,
            },
        };
        state.store.entry(id.to_string()).or_default();
        state.media.insert(id.to_string(), item.clone());
        debug!("registered media {} ({})", item.id, item.path);
        Ok(item)
    }

    /// Associates `tag` with a media item, overwriting confidence and
    /// provenance if the pair already exists.
    pub async fn associate(
        &self,
        media_id: &str,
        tag: Tag,
        confidence: f64,
        provenance: Provenance,
    ) -> Result<(), EngineError> {
        let confidence = confidence.clamp(0.0, 1.0);
        let mut state = self.state.write().await;
        if !state.media.contains_key(media_id) {
            return Err(EngineError::InvalidInput(format!(
                "unknown media id: {media_id}"
            )));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")
            .bind(tag.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO media_tags (media_id, tag_id, confidence, provenance)
            VALUES (?1, (SELECT id FROM tags WHERE name = ?2), ?3, ?4)
            ON CONFLICT(media_id, tag_id) DO UPDATE SET
                confidence = excluded.confidence,
                provenance = excluded.provenance
            "#,
        )
        .bind(media_id)
        .bind(tag.as_str())
        .bind(confidence)
        .bind(provenance.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        state.index_tag(&tag);
        state
            .index
            .entry(tag.clone())
            .or_default()
            .insert(media_id.to_string());
        state.store.entry(media_id.to_string()).or_default().insert(
            tag.clone(),
            TagAssociation {
                media_id: media_id.to_string(),
                tag,
                confidence,
                provenance,
            },
        );
        Ok(())
    }

    /// Detaches one tag from a media item. Removing an association that does
    /// not exist is a no-op.
    pub async fn disassociate(&self, media_id: &str, tag: &Tag) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        if !state.media.contains_key(media_id) {
            return Err(EngineError::InvalidInput(format!(
                "unknown media id: {media_id}"
            )));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM media_tags WHERE media_id = ?1 AND tag_id = (SELECT id FROM tags WHERE name = ?2)",
        )
        .bind(media_id)
        .bind(tag.as_str())
        .execute(&mut *tx)
        .await?;
        // Tags exist only while referenced.
        sqlx::query("DELETE FROM tags WHERE id NOT IN (SELECT DISTINCT tag_id FROM media_tags)")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if let Some(tags) = state.store.get_mut(media_id) {
            tags.remove(tag);
        }
        state.drop_index_entry(tag, media_id);
        Ok(())
    }

    /// Deregisters a media item, cascading through its associations and
    /// every index entry that carries it.
    pub async fn remove(&self, media_id: &str) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        if !state.media.contains_key(media_id) {
            return Err(EngineError::InvalidInput(format!(
                "unknown media id: {media_id}"
            )));
        }

        let mut tx = self.pool.begin().await?;
        // media_tags rows go with the media row (ON DELETE CASCADE).
        sqlx::query("DELETE FROM media WHERE id = ?1")
            .bind(media_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tags WHERE id NOT IN (SELECT DISTINCT tag_id FROM media_tags)")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        state.media.remove(media_id);
        if let Some(tags) = state.store.remove(media_id) {
            for tag in tags.keys() {
                state.drop_index_entry(tag, media_id);
            }
        }
        debug!("removed media {}", media_id);
        Ok(())
    }

    /// All associations of one media item, sorted by descending confidence
    /// then tag for determinism.
    pub async fn tags_for(&self, media_id: &str) -> Result<Vec<TagAssociation>, EngineError> {
        let state = self.state.read().await;
        let tags = state.store.get(media_id).ok_or_else(|| {
            EngineError::InvalidInput(format!("unknown media id: {media_id}"))
        })?;
        let mut out: Vec<TagAssociation> = tags.values().cloned().collect();
        out.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.tag.cmp(&b.tag))
        });
        Ok(out)
    }

    /// Media ids carrying `tag`, sorted for determinism.
    pub async fn media_for(&self, tag: &Tag) -> Vec<String> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state
            .index
            .get(tag)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Tags whose normalized form contains `token` as a whole word. This is
    /// how a single query token reaches multi-word tags.
    pub async fn tags_matching_token(&self, token: &str) -> Vec<Tag> {
        let state = self.state.read().await;
        let mut tags: Vec<Tag> = state
            .tokens
            .get(token)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    /// Full associations for one tag, resolved through the inverted index.
    pub async fn associations_for_tag(&self, tag: &Tag) -> Vec<TagAssociation> {
        let state = self.state.read().await;
        let Some(ids) = state.index.get(tag) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| state.store.get(id).and_then(|tags| tags.get(tag)).cloned())
            .collect()
    }

    pub async fn all_tags(&self) -> Vec<Tag> {
        let state = self.state.read().await;
        let mut tags: Vec<Tag> = state.index.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub async fn media(&self, media_id: &str) -> Option<MediaItem> {
        self.state.read().await.media.get(media_id).cloned()
    }

    /// All registered media, newest first, id-ordered within a timestamp.
    pub async fn all_media(&self) -> Vec<MediaItem> {
        let state = self.state.read().await;
        let mut items: Vec<MediaItem> = state.media.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    /// Walks both directions of the store/index mapping. Any mismatch is a
    /// broken invariant and reported as `Inconsistency`; this must never
    /// happen under correct locking.
    pub async fn verify_consistency(&self) -> Result<(), EngineError> {
        let state = self.state.read().await;
        for (media_id, tags) in &state.store {
            if !state.media.contains_key(media_id) {
                return Err(EngineError::Inconsistency(format!(
                    "store entry for unregistered media {media_id}"
                )));
            }
            for tag in tags.keys() {
                let indexed = state
                    .index
                    .get(tag)
                    .map(|ids| ids.contains(media_id))
                    .unwrap_or(false);
                if !indexed {
                    return Err(EngineError::Inconsistency(format!(
                        "association ({media_id}, {tag}) missing from index"
                    )));
                }
            }
        }
        for (tag, ids) in &state.index {
            if ids.is_empty() {
                return Err(EngineError::Inconsistency(format!(
                    "index entry for {tag} is empty"
                )));
            }
            for media_id in ids {
                let stored = state
                    .store
                    .get(media_id)
                    .map(|tags| tags.contains_key(tag))
                    .unwrap_or(false);
                if !stored {
                    return Err(EngineError::Inconsistency(format!(
                        "index entry ({tag}, {media_id}) missing from store"
                    )));
                }
            }
            for token in tag.as_str().split_whitespace() {
                let mapped = state
                    .tokens
                    .get(token)
                    .map(|tags| tags.contains(tag))
                    .unwrap_or(false);
                if !mapped {
                    return Err(EngineError::Inconsistency(format!(
                        "tag {tag} missing from token map entry {token}"
                    )));
                }
            }
        }
        for (token, tags) in &state.tokens {
            for tag in tags {
                if !state.index.contains_key(tag) {
                    return Err(EngineError::Inconsistency(format!(
                        "token map entry ({token}, {tag}) references an unindexed tag"
                    )));
                }
            }
        }
        Ok(())
    }
}
