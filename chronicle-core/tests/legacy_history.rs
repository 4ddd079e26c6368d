//! Histories written before messages carried a `kind` tag.
//!
//! Markers are recognised from the text alone, and every key on an untouched
//! message comes back out unchanged.

use chronicle_core::{
    build_digest, load_history, scan, CompressionConfig, Compressor, MockModel, RetryPolicy,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn legacy_history() -> Value {
    let mut messages = vec![json!({"role": "system", "content": "You are the Dungeon Master."})];
    for k in 1..=4 {
        messages.push(json!({"role": "user", "content": format!("We search area {k}.")}));
        messages.push(json!({
            "role": "assistant",
            "content": format!("=== LOCATION SUMMARY ===\n\nArea {k}: The party fought goblins and found a key.")
        }));
        messages.push(json!({
            "role": "user",
            "content": format!("Location transition: Area {k} to Area {}", k + 1),
            "timestamp": format!("2024-01-0{k}T12:00:00")
        }));
    }
    Value::Array(messages)
}

#[tokio::test]
async fn test_legacy_markers_are_detected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("conversation_history.json");
    std::fs::write(&path, serde_json::to_string_pretty(&legacy_history()).unwrap()).unwrap();

    let messages = load_history(&path).await.unwrap();
    let markers = scan(&messages);

    assert_eq!(markers.location_summaries.len(), 4);
    assert_eq!(markers.location_summaries[2].location, "Area 3");
    assert_eq!(markers.transitions, vec![3, 6, 9, 12]);
    assert_eq!(
        build_digest(&messages).current_location.as_deref(),
        Some("Area 5")
    );
}

#[tokio::test]
async fn test_legacy_history_compresses() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("conversation_history.json");
    let original = serde_json::to_string_pretty(&legacy_history()).unwrap();
    std::fs::write(&path, &original).unwrap();

    let config = CompressionConfig::new()
        .with_trigger(4)
        .with_chunk_size(4)
        .with_backups(false)
        .with_retry(RetryPolicy::immediate(1));
    let compressor = Compressor::new(config, MockModel::new(vec![]));

    assert!(compressor.check_and_compress(&path).await.unwrap());

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let raw = raw.as_array().unwrap();
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[0]["kind"], "chronicle");
    assert!(raw[0]["content"]
        .as_str()
        .unwrap()
        .ends_with("[AI-Generated Chronicle Summary]"));

    // The kept transition is written back exactly as it was read
    assert_eq!(
        raw[1],
        json!({
            "role": "user",
            "content": "Location transition: Area 4 to Area 5",
            "timestamp": "2024-01-04T12:00:00"
        })
    );

    let tail = &original[original.rfind("\n  {").unwrap()..];
    assert!(std::fs::read_to_string(&path).unwrap().ends_with(tail));

    // Every covered area appears in the route, in order
    let prompt = &compressor.model().prompts()[0].1;
    assert!(prompt.contains("Area 1 -> Area 2 -> Area 3 -> Area 4"));
    assert!(!dir.path().join("backups").exists());
}
