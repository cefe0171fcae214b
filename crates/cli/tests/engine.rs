use tagsense_core::catalog::Catalog;
use tagsense_core::models::{Provenance, Tag};
use tagsense_core::normalize;
use tagsense_core::search;
use tempfile::tempdir;

fn tag(s: &str) -> Tag {
    normalize::normalize_tag(s).unwrap()
}

/// Shared in-memory DB so multiple connections see the same data.
async fn open_catalog(name: &str) -> Catalog {
    let url = format!("sqlite://file:{name}?mode=memory&cache=shared");
    let pool = storage::connect(&url).await.unwrap();
    storage::migrate(&pool).await.unwrap();
    Catalog::open(pool).await.unwrap()
}

#[tokio::test]
async fn reassociating_overwrites_confidence_and_provenance() {
    let catalog = open_catalog("engine_reassoc").await;
    catalog.register("m1", "/media/a.jpg", None, 100).await.unwrap();

    catalog
        .associate("m1", tag("ocean"), 0.5, Provenance::Generated)
        .await
        .unwrap();
    catalog
        .associate("m1", tag("ocean"), 0.9, Provenance::User)
        .await
        .unwrap();

    let assocs = catalog.tags_for("m1").await.unwrap();
    assert_eq!(assocs.len(), 1);
    assert!((assocs[0].confidence - 0.9).abs() < f64::EPSILON);
    assert_eq!(assocs[0].provenance, Provenance::User);
    catalog.verify_consistency().await.unwrap();
}

#[tokio::test]
async fn removing_media_cascades_through_store_and_index() {
    let catalog = open_catalog("engine_remove").await;
    catalog.register("m1", "/media/a.jpg", None, 100).await.unwrap();
    catalog.register("m2", "/media/b.jpg", None, 200).await.unwrap();

    catalog
        .associate("m1", tag("ocean"), 1.0, Provenance::Generated)
        .await
        .unwrap();
    catalog
        .associate("m1", tag("sunset"), 0.5, Provenance::Generated)
        .await
        .unwrap();
    catalog
        .associate("m2", tag("ocean"), 1.0, Provenance::User)
        .await
        .unwrap();

    catalog.remove("m1").await.unwrap();

    assert!(catalog.media("m1").await.is_none());
    assert!(catalog.tags_for("m1").await.is_err());
    assert_eq!(catalog.media_for(&tag("ocean")).await, vec!["m2"]);
    // "sunset" lost its last carrier and is gone from the index entirely.
    assert!(catalog.media_for(&tag("sunset")).await.is_empty());
    assert_eq!(catalog.all_tags().await, vec![tag("ocean")]);
    catalog.verify_consistency().await.unwrap();
}

#[tokio::test]
async fn detaching_is_idempotent() {
    let catalog = open_catalog("engine_detach").await;
    catalog.register("m1", "/media/a.jpg", None, 100).await.unwrap();
    catalog
        .associate("m1", tag("ocean"), 1.0, Provenance::User)
        .await
        .unwrap();

    catalog.disassociate("m1", &tag("ocean")).await.unwrap();
    catalog.disassociate("m1", &tag("ocean")).await.unwrap();

    assert!(catalog.tags_for("m1").await.unwrap().is_empty());
    assert!(catalog.all_tags().await.is_empty());
    catalog.verify_consistency().await.unwrap();
}

#[tokio::test]
async fn unknown_media_is_rejected() {
    let catalog = open_catalog("engine_unknown").await;
    let err = catalog
        .associate("ghost", tag("ocean"), 1.0, Provenance::User)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        tagsense_core::error::EngineError::InvalidInput(_)
    ));
    assert!(catalog.remove("ghost").await.is_err());
    assert!(catalog.tags_for("ghost").await.is_err());
}

#[tokio::test]
async fn more_matched_tags_rank_higher() {
    let catalog = open_catalog("engine_rank").await;
    catalog.register("m1", "/media/a.jpg", None, 100).await.unwrap();
    catalog.register("m2", "/media/b.jpg", None, 200).await.unwrap();

    catalog
        .associate("m1", tag("ocean"), 1.0, Provenance::Generated)
        .await
        .unwrap();
    catalog
        .associate("m1", tag("sunset"), 0.5, Provenance::Generated)
        .await
        .unwrap();
    catalog
        .associate("m2", tag("ocean"), 1.0, Provenance::Generated)
        .await
        .unwrap();

    let hits = search::search(&catalog, "ocean sunset", None).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].media_id, "m1");
    assert!((hits[0].score - 1.5).abs() < 1e-9);
    assert_eq!(hits[1].media_id, "m2");
    assert!((hits[1].score - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn ties_break_by_recency_then_id() {
    let catalog = open_catalog("engine_ties").await;
    catalog.register("older", "/media/a.jpg", None, 100).await.unwrap();
    catalog.register("newer", "/media/b.jpg", None, 200).await.unwrap();
    catalog.register("b-same", "/media/c.jpg", None, 200).await.unwrap();
    catalog.register("a-same", "/media/d.jpg", None, 200).await.unwrap();

    for id in ["older", "newer", "b-same", "a-same"] {
        catalog
            .associate(id, tag("ocean"), 1.0, Provenance::User)
            .await
            .unwrap();
    }

    let hits = search::search(&catalog, "ocean", None).await.unwrap();
    let order: Vec<&str> = hits.iter().map(|h| h.media_id.as_str()).collect();
    // Equal scores: newest first, id ascending within the same timestamp.
    assert_eq!(order, vec!["a-same", "b-same", "newer", "older"]);
}

#[tokio::test]
async fn search_is_idempotent_and_empty_on_no_match() {
    let catalog = open_catalog("engine_idem").await;
    catalog.register("m1", "/media/a.jpg", None, 100).await.unwrap();
    catalog
        .associate("m1", tag("ocean sunset"), 1.0, Provenance::Generated)
        .await
        .unwrap();
    catalog
        .associate("m1", tag("sunset"), 0.5, Provenance::Generated)
        .await
        .unwrap();

    let first = search::search(&catalog, "sunset on the water", None)
        .await
        .unwrap();
    let second = search::search(&catalog, "sunset on the water", None)
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert!(first[0].score > 0.0);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.media_id, b.media_id);
        assert!((a.score - b.score).abs() < f64::EPSILON);
    }

    // No match is an empty result, not an error.
    let none = search::search(&catalog, "nonexistent-term", None).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn limit_truncates_but_zero_does_not() {
    let catalog = open_catalog("engine_limit").await;
    for (i, id) in ["m1", "m2", "m3"].iter().enumerate() {
        catalog
            .register(id, &format!("/media/{id}.jpg"), None, 100 + i as i64)
            .await
            .unwrap();
        catalog
            .associate(id, tag("ocean"), 1.0, Provenance::User)
            .await
            .unwrap();
    }

    let capped = search::search(&catalog, "ocean", Some(2)).await.unwrap();
    assert_eq!(capped.len(), 2);
    let uncapped = search::search(&catalog, "ocean", Some(0)).await.unwrap();
    assert_eq!(uncapped.len(), 3);
}

#[tokio::test]
async fn catalog_survives_restart() {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("catalog.db").to_string_lossy().into_owned();

    {
        let pool = storage::connect(&db_path).await.unwrap();
        storage::migrate(&pool).await.unwrap();
        let catalog = Catalog::open(pool.clone()).await.unwrap();
        catalog.register("m1", "/media/a.jpg", Some("image/jpeg"), 100)
            .await
            .unwrap();
        catalog
            .associate("m1", tag("golden hour"), 0.5, Provenance::Generated)
            .await
            .unwrap();
        catalog
            .associate("m1", tag("seascape"), 1.0, Provenance::User)
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = storage::connect(&db_path).await.unwrap();
    storage::migrate(&pool).await.unwrap();
    let reloaded = Catalog::open(pool).await.unwrap();

    let media = reloaded.media("m1").await.unwrap();
    assert_eq!(media.created_at, 100);
    assert_eq!(media.kind.as_deref(), Some("image/jpeg"));

    let assocs = reloaded.tags_for("m1").await.unwrap();
    assert_eq!(assocs.len(), 2);
    assert_eq!(assocs[0].tag, tag("seascape"));
    assert_eq!(assocs[0].provenance, Provenance::User);

    let hits = search::search(&reloaded, "seascape", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].media_id, "m1");
    reloaded.verify_consistency().await.unwrap();
}
