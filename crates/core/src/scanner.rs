//! Walks import roots and registers media files with the catalog. The file
//! bytes are only read far enough to derive the stable identifier and sniff
//! the media kind; content analysis is someone else's job.

use crate::catalog::Catalog;
use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task;
use walkdir::WalkDir;

/// Identifier hash covers the first 64 KiB; plenty to tell media files apart
/// without reading whole videos.
const ID_HASH_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct DiscoveredMedia {
    id: String,
    path: PathBuf,
    kind: Option<String>,
    created_at: i64,
}

/// Scans `roots` and registers every non-hidden, non-excluded file.
/// Returns the number of newly registered media items; re-imports of known
/// files refresh path/kind but count as zero and leave tags untouched.
pub async fn import(
    roots: &[PathBuf],
    excludes: &[String],
    catalog: &Catalog,
) -> anyhow::Result<u64> {
    let (tx, mut rx) = mpsc::channel(100);
    let exclude_set = build_globset(excludes)?;
    let roots = roots.to_vec();

    let walker_handle = task::spawn_blocking(move || {
        for root in roots {
            for entry in WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| should_descend(e.path(), &exclude_set))
            {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => continue,
                };

                let path = entry.path();
                if path.is_dir() || is_excluded(path, &exclude_set) || is_hidden(path) {
                    continue;
                }

                let meta = match fs::metadata(path) {
                    Ok(m) => m,
                    Err(_) => continue,
                };

                let created_at = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or_else(|| chrono::Utc::now().timestamp());

                let (id, kind) = match identify(path) {
                    Ok(pair) => pair,
                    Err(_) => continue,
                };

                let item = DiscoveredMedia {
                    id,
                    path: path.to_path_buf(),
                    kind,
                    created_at,
                };

                if tx.blocking_send(item).is_err() {
                    // Receiver dropped, stop walking.
                    break;
                }
            }
        }
    });

    let mut registered = 0u64;
    while let Some(item) = rx.recv().await {
        let known = catalog.media(&item.id).await.is_some();
        catalog
            .register(
                &item.id,
                &item.path.to_string_lossy(),
                item.kind.as_deref(),
                item.created_at,
            )
            .await
            .with_context(|| format!("failed to register media: {:?}", item.path))?;
        if !known {
            registered += 1;
        }
    }

    walker_handle.await?;
    Ok(registered)
}

/// Stable media id (blake3 over the file's first bytes) and sniffed kind.
fn identify(path: &Path) -> anyhow::Result<(String, Option<String>)> {
    use std::io::Read;
    let mut file = fs::File::open(path)?;
    let mut buf = vec![0u8; ID_HASH_BYTES];
    let n = file.read(&mut buf)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(&buf[..n]);
    let id = hasher.finalize().to_hex().to_string();
    let kind = infer::get(&buf[..n]).map(|t| t.mime_type().to_string());
    Ok((id, kind))
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn should_descend(path: &Path, excludes: &GlobSet) -> bool {
    !is_excluded(path, excludes) && !is_hidden(path)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_excluded(path: &Path, excludes: &GlobSet) -> bool {
    excludes.is_match(path)
}
