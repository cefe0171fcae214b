use anyhow::Result;
use clap::{Parser, Subcommand};
use tagsense_core::catalog::Catalog;
use tagsense_core::config;
use tagsense_core::config::AppConfig;
use tagsense_core::error::EngineError;
use tagsense_core::generator;
use tagsense_core::models::{GenerationResult, Provenance, Tag};
use tagsense_core::normalize;
use tagsense_core::scanner;
use tagsense_core::search;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Import { json } => run_import(cfg, json).await,
        Commands::Suggest {
            text,
            provider,
            json,
        } => run_suggest(cfg, &text, provider.as_deref(), json).await,
        Commands::Tag {
            media_id,
            text,
            provider,
            json,
        } => run_tag(cfg, &media_id, &text, provider.as_deref(), json).await,
        Commands::Associate {
            media_id,
            tag,
            confidence,
        } => run_associate(cfg, &media_id, &tag, confidence).await,
        Commands::Detach { media_id, tag } => run_detach(cfg, &media_id, &tag).await,
        Commands::Remove { media_id } => run_remove(cfg, &media_id).await,
        Commands::Search { query, topk, json } => run_search(cfg, &query, topk, json).await,
        Commands::Tags { json } => run_tags(cfg, json).await,
        Commands::Media { json } => run_media(cfg, json).await,
        Commands::Show { media_id, json } => run_show(cfg, &media_id, json).await,
    }
}

#[derive(Parser)]
#[command(name = "tagsense")]
#[command(about = "Tag generation and matching for media files", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan configured roots and register media files
    Import {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Generate tag suggestions for a description without storing anything
    Suggest {
        /// Free-text description to derive tags from
        text: String,
        /// Override the configured tag provider
        #[arg(long)]
        provider: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate tags for a description and associate them with a media item
    Tag {
        /// Media identifier to tag
        media_id: String,
        /// Free-text description to derive tags from
        text: String,
        /// Override the configured tag provider
        #[arg(long)]
        provider: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Attach a tag to a media item by hand
    Associate {
        media_id: String,
        tag: String,
        /// Confidence weight in [0, 1]
        #[arg(long, default_value_t = 1.0)]
        confidence: f64,
    },
    /// Detach one tag from a media item
    Detach { media_id: String, tag: String },
    /// Deregister a media item and all its tag associations
    Remove { media_id: String },
    /// Rank media items against a free-text query
    Search {
        query: String,
        /// Number of results; omit for no cap
        #[arg(short, long)]
        topk: Option<usize>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List all indexed tags with media counts
    Tags {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered media items, newest first
    Media {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one media item and its tag associations
    Show {
        media_id: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

async fn open_catalog(cfg: &AppConfig) -> Result<Catalog> {
    let pool = storage::connect(&cfg.database.path).await?;
    storage::migrate(&pool).await?;
    Ok(Catalog::open(pool).await?)
}

/// Parses user-supplied tag text into its canonical form.
fn parse_tag(raw: &str) -> Result<Tag> {
    normalize::normalize_tag(raw)
        .ok_or_else(|| anyhow::anyhow!("tag {:?} has no textual content", raw))
}

async fn run_import(cfg: AppConfig, json: bool) -> Result<()> {
    let catalog = open_catalog(&cfg).await?;
    let roots: Vec<std::path::PathBuf> = cfg
        .import
        .include
        .iter()
        .map(std::path::PathBuf::from)
        .collect();
    let registered = scanner::import(&roots, &cfg.import.exclude, &catalog).await?;
    let total = catalog.all_media().await.len();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "ok",
                "registered": registered,
                "total": total,
            }))?
        );
    } else {
        println!("import: registered {} new items ({} total)", registered, total);
    }
    Ok(())
}

async fn run_suggest(cfg: AppConfig, text: &str, provider: Option<&str>, json: bool) -> Result<()> {
    let registry = generator::build_registry(&cfg);
    match generator::suggest(text, &registry, provider).await {
        Ok(result) => print_generation(&result, json),
        Err(EngineError::NoTagsGenerated) => {
            if json {
                println!("{}", serde_json::json!({ "tags": [] }));
            } else {
                println!("no suggestions");
            }
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn run_tag(
    cfg: AppConfig,
    media_id: &str,
    text: &str,
    provider: Option<&str>,
    json: bool,
) -> Result<()> {
    let catalog = open_catalog(&cfg).await?;
    let registry = generator::build_registry(&cfg);
    let result = match generator::suggest(text, &registry, provider).await {
        Ok(result) => result,
        Err(EngineError::NoTagsGenerated) => {
            println!("no suggestions; nothing associated");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    for scored in &result.tags {
        catalog
            .associate(
                media_id,
                scored.tag.clone(),
                scored.confidence,
                Provenance::Generated,
            )
            .await?;
    }
    print_generation(&result, json);
    Ok(())
}

fn print_generation(result: &GenerationResult, json: bool) {
    if json {
        match serde_json::to_string_pretty(&result.tags) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("failed to encode tags: {}", e),
        }
        return;
    }
    println!(
        "primary: {} ({:.2})",
        result.primary().tag,
        result.primary().confidence
    );
    for scored in result.secondaries() {
        println!("related: {} ({:.2})", scored.tag, scored.confidence);
    }
}

async fn run_associate(cfg: AppConfig, media_id: &str, tag: &str, confidence: f64) -> Result<()> {
    let catalog = open_catalog(&cfg).await?;
    let tag = parse_tag(tag)?;
    catalog
        .associate(media_id, tag.clone(), confidence, Provenance::User)
        .await?;
    println!("associated {} with {}", tag, media_id);
    Ok(())
}

async fn run_detach(cfg: AppConfig, media_id: &str, tag: &str) -> Result<()> {
    let catalog = open_catalog(&cfg).await?;
    let tag = parse_tag(tag)?;
    catalog.disassociate(media_id, &tag).await?;
    println!("detached {} from {}", tag, media_id);
    Ok(())
}

async fn run_remove(cfg: AppConfig, media_id: &str) -> Result<()> {
    let catalog = open_catalog(&cfg).await?;
    catalog.remove(media_id).await?;
    println!("removed {}", media_id);
    Ok(())
}

async fn run_search(cfg: AppConfig, query: &str, topk: Option<usize>, json: bool) -> Result<()> {
    let catalog = open_catalog(&cfg).await?;
    let limit = topk.or(cfg.search.default_limit);
    let hits = search::search(&catalog, query, limit).await?;

    let mut rows = Vec::with_capacity(hits.len());
    for hit in &hits {
        let media = catalog.media(&hit.media_id).await;
        let tags: Vec<String> = catalog
            .tags_for(&hit.media_id)
            .await
            .map(|assocs| assocs.iter().map(|a| a.tag.to_string()).collect())
            .unwrap_or_default();
        rows.push(serde_json::json!({
            "id": hit.media_id,
            "score": hit.score,
            "path": media.map(|m| m.path),
            "tags": tags,
        }));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("no results");
    } else {
        for row in &rows {
            println!(
                "{:.3}  {}  {}",
                row.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0),
                row.get("path").and_then(|p| p.as_str()).unwrap_or("?"),
                row.get("tags")
                    .and_then(|t| t.as_array())
                    .map(|t| {
                        t.iter()
                            .filter_map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

async fn run_tags(cfg: AppConfig, json: bool) -> Result<()> {
    let catalog = open_catalog(&cfg).await?;
    let tags = catalog.all_tags().await;
    let mut rows = Vec::with_capacity(tags.len());
    for tag in &tags {
        let count = catalog.media_for(tag).await.len();
        rows.push(serde_json::json!({ "tag": tag, "media": count }));
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in &rows {
            println!(
                "{}  ({})",
                row.get("tag").and_then(|t| t.as_str()).unwrap_or("?"),
                row.get("media").and_then(|c| c.as_u64()).unwrap_or(0)
            );
        }
    }
    Ok(())
}

async fn run_media(cfg: AppConfig, json: bool) -> Result<()> {
    let catalog = open_catalog(&cfg).await?;
    let items = catalog.all_media().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            let created = chrono::DateTime::from_timestamp(item.created_at, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| item.created_at.to_string());
            println!("{}  {}  {}", item.id, created, item.path);
        }
    }
    Ok(())
}

async fn run_show(cfg: AppConfig, media_id: &str, json: bool) -> Result<()> {
    let catalog = open_catalog(&cfg).await?;
    let Some(media) = catalog.media(media_id).await else {
        anyhow::bail!("unknown media id: {media_id}");
    };
    let assocs = catalog.tags_for(media_id).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "media": media,
                "tags": assocs,
            }))?
        );
    } else {
        println!("{}  {}", media.id, media.path);
        for assoc in &assocs {
            println!(
                "  {}  ({:.2}, {})",
                assoc.tag,
                assoc.confidence,
                assoc.provenance.as_str()
            );
        }
    }
    Ok(())
}
