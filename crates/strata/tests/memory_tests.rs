//! Integration tests for memory units
//!
//! Covers store/index consistency, ranking, the top-k bound, fail-open
//! queries, and save/load round trips.

use serde_json::{Value, json};

use strata::index::{IndexKind, Metric};
use strata::memory::{MemoryUnit, Record};
use strata::storage;

// =============================================================================
// Test Fixtures
// =============================================================================

fn record(title: &str, embedding: &[f32]) -> Record {
    json!({
        "title": title,
        "text": format!("{title} body"),
        "embedding": embedding,
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn titles(items: &[Record]) -> Vec<Value> {
    items.iter().map(|r| r["title"].clone()).collect()
}

async fn abc_unit(metric: Metric) -> MemoryUnit {
    let mut unit = MemoryUnit::new(IndexKind::Flat, 3, metric).unwrap();
    unit.add(&record("A", &[1.0, 0.0, 0.0]), "embedding").await.unwrap();
    unit.add(&record("B", &[0.0, 1.0, 0.0]), "embedding").await.unwrap();
    unit.add(&record("C", &[0.9, 0.1, 0.0]), "embedding").await.unwrap();
    unit
}

// =============================================================================
// Ranking
// =============================================================================

#[tokio::test]
async fn test_abc_scenario_returns_a_then_c() {
    let unit = abc_unit(Metric::Cosine).await;
    let result = unit.query(&[1.0, 0.0, 0.0], 2).await;

    assert_eq!(titles(&result.items), vec![json!("A"), json!("C")]);
    assert_eq!(result.scores.len(), 2);
}

#[tokio::test]
async fn test_abc_scenario_with_l2() {
    let unit = abc_unit(Metric::L2).await;
    let result = unit.query(&[1.0, 0.0, 0.0], 2).await;

    assert_eq!(titles(&result.items), vec![json!("A"), json!("C")]);
}

#[tokio::test]
async fn test_top_k_bound() {
    let unit = abc_unit(Metric::Cosine).await;

    for k in 0..6 {
        let result = unit.query(&[0.3, 0.3, 0.3], k).await;
        assert_eq!(result.len(), k.min(3), "k={k}");
    }
}

#[tokio::test]
async fn test_returned_record_is_full_copy() {
    let unit = abc_unit(Metric::Cosine).await;
    let result = unit.query(&[0.0, 1.0, 0.0], 1).await;

    let b = &result.items[0];
    assert_eq!(b["title"], json!("B"));
    assert_eq!(b["text"], json!("B body"));
    assert_eq!(b["embedding"], json!([0.0, 1.0, 0.0]));
}

// =============================================================================
// Consistency
// =============================================================================

#[tokio::test]
async fn test_store_and_index_stay_consistent() {
    let mut unit = MemoryUnit::new(IndexKind::Flat, 4, Metric::Cosine).unwrap();

    for i in 0..25 {
        let embedding = [i as f32, 1.0, (i % 3) as f32, 0.5];
        unit.add(&record(&format!("r{i}"), &embedding), "embedding")
            .await
            .unwrap();
        assert!(unit.is_consistent());
    }

    // A rejected add doesn't disturb the pairing either
    assert!(unit.add(&record("bad", &[1.0]), "embedding").await.is_err());
    assert!(unit.is_consistent());
    assert_eq!(unit.len(), 25);
}

#[tokio::test]
async fn test_ids_are_unique_and_increasing() {
    let mut unit = MemoryUnit::new(IndexKind::Flat, 3, Metric::Cosine).unwrap();
    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(
            unit.add(&record(&i.to_string(), &[1.0, 0.0, 0.0]), "embedding")
                .await
                .unwrap(),
        );
    }

    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, ids);
    assert_eq!(unit.len(), 10);
}

#[tokio::test]
async fn test_custom_embedding_field() {
    let mut unit = MemoryUnit::new(IndexKind::Flat, 2, Metric::Cosine).unwrap();
    let rec = json!({"title": "x", "vec": [0.0, 1.0]})
        .as_object()
        .cloned()
        .unwrap();

    let id = unit.add(&rec, "vec").await.unwrap();
    assert_eq!(unit.get(&id), Some(&rec));
}

// =============================================================================
// Fail-open
// =============================================================================

#[tokio::test]
async fn test_fresh_unit_query_is_empty() {
    let unit = MemoryUnit::new(IndexKind::Flat, 3, Metric::Cosine).unwrap();
    let result = unit.query(&[1.0, 0.0, 0.0], 5).await;

    assert!(result.items.is_empty());
    assert!(result.scores.is_empty());
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_save_load_round_trip_reproduces_queries() {
    let dir = tempfile::tempdir().unwrap();
    let unit = abc_unit(Metric::Cosine).await;
    unit.save(dir.path()).await.unwrap();

    let mut restored = MemoryUnit::new(IndexKind::Flat, 3, Metric::Cosine).unwrap();
    restored.load(dir.path()).await.unwrap();

    assert_eq!(restored.records().ids(), unit.records().ids());
    assert!(restored.is_consistent());

    let query = [0.7, 0.2, 0.1];
    assert_eq!(restored.query(&query, 3).await, unit.query(&query, 3).await);
}

#[tokio::test]
async fn test_save_layout() {
    let dir = tempfile::tempdir().unwrap();
    abc_unit(Metric::Cosine).await.save(dir.path()).await.unwrap();

    assert!(dir.path().join("memory.json").exists());
    assert!(dir.path().join("index.json").exists());

    let raw = std::fs::read_to_string(dir.path().join("memory.json")).unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value.as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn test_ids_after_load_sort_after_restored() {
    let dir = tempfile::tempdir().unwrap();
    let unit = abc_unit(Metric::Cosine).await;
    unit.save(dir.path()).await.unwrap();
    let last = unit.records().last_id().cloned().unwrap();

    let mut restored = MemoryUnit::new(IndexKind::Flat, 3, Metric::Cosine).unwrap();
    restored.load(dir.path()).await.unwrap();
    let new_id = restored
        .add(&record("D", &[0.0, 0.0, 1.0]), "embedding")
        .await
        .unwrap();

    assert!(new_id > last);
    assert_eq!(restored.len(), 4);
}

#[tokio::test]
async fn test_load_into_other_dimension_fails() {
    let dir = tempfile::tempdir().unwrap();
    abc_unit(Metric::Cosine).await.save(dir.path()).await.unwrap();

    let mut wrong = MemoryUnit::new(IndexKind::Flat, 5, Metric::Cosine).unwrap();
    let result = wrong.load(dir.path()).await;

    assert!(matches!(
        result,
        Err(strata::StrataError::DimensionMismatch { .. })
    ));
    assert!(wrong.is_empty());
}

#[tokio::test]
async fn test_load_rejects_mismatched_files() {
    let dir = tempfile::tempdir().unwrap();
    abc_unit(Metric::Cosine).await.save(dir.path()).await.unwrap();

    // Drop one record from memory.json so it disagrees with index.json
    let path = dir.path().join("memory.json");
    let mut value: serde_json::Map<String, Value> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let first = value.keys().next().cloned().unwrap();
    value.remove(&first);
    std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

    let mut unit = MemoryUnit::new(IndexKind::Flat, 3, Metric::Cosine).unwrap();
    assert!(unit.load(dir.path()).await.is_err());
    assert!(unit.is_empty());
}

// =============================================================================
// Interrupted saves
// =============================================================================

#[tokio::test]
async fn test_half_written_save_keeps_prior_snapshot() {
    let root = tempfile::tempdir().unwrap();
    let tenant = root.path().join("tenant");

    let mut unit = abc_unit(Metric::Cosine).await;
    unit.save(&tenant).await.unwrap();
    unit.add(&record("D", &[0.0, 0.0, 1.0]), "embedding").await.unwrap();

    // A save that died after writing the records but before the index
    let staging = storage::begin_staging(&tenant).unwrap();
    unit.records().save(&staging).unwrap();

    let mut restored = MemoryUnit::new(IndexKind::Flat, 3, Metric::Cosine).unwrap();
    restored.load(&tenant).await.unwrap();
    assert_eq!(restored.len(), 3);
    assert!(restored.is_consistent());

    // The next full save replaces the leftovers
    unit.save(&tenant).await.unwrap();
    restored.load(&tenant).await.unwrap();
    assert_eq!(restored.len(), 4);
}

#[tokio::test]
async fn test_save_interrupted_mid_swap_still_loads() {
    let root = tempfile::tempdir().unwrap();
    let tenant = root.path().join("tenant");
    abc_unit(Metric::Cosine).await.save(&tenant).await.unwrap();

    // Old snapshot parked, new one never moved into place
    let (_, previous) = storage::swap_paths(&tenant).unwrap();
    std::fs::rename(&tenant, &previous).unwrap();

    let mut restored = MemoryUnit::new(IndexKind::Flat, 3, Metric::Cosine).unwrap();
    restored.load(&tenant).await.unwrap();
    assert_eq!(restored.len(), 3);

    restored.save(&tenant).await.unwrap();
    assert!(tenant.join("memory.json").exists());
    assert!(!previous.exists());
}

#[tokio::test]
async fn test_resave_leaves_no_staging_behind() {
    let root = tempfile::tempdir().unwrap();
    let tenant = root.path().join("tenant");
    let unit = abc_unit(Metric::Cosine).await;

    unit.save(&tenant).await.unwrap();
    unit.save(&tenant).await.unwrap();

    let names: Vec<_> = std::fs::read_dir(root.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("tenant")]);
}
