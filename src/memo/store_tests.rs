use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

fn new_york() -> RawLocation {
    json!({
        "osm_id": 12345,
        "lat": 40.7,
        "lon": -74.0,
        "address": { "city": "New York", "state": "NY", "country": "USA" }
    })
    .as_object()
    .cloned()
    .expect("object")
}

#[test]
fn test_add_known_then_search_round_trip() {
    let mut memo = Memo::in_memory();
    memo.add("new york", 12345, &new_york(), 1.0).unwrap();

    assert!(memo.add_known("big apple", 12345, 0.5));
    let record = memo.search("big apple", None).expect("alias should resolve");
    assert_eq!(record.city, "New York");
    assert_eq!(record.latitude, 40.7);
}

#[test]
fn test_add_known_first_confidence_wins() {
    let mut memo = Memo::in_memory();
    assert!(memo.add_known("nyc", 12345, 0.7));
    assert!(!memo.add_known("nyc", 12345, 0.2));
    assert!(!memo.add_known("nyc", 999, 1.0));

    assert_eq!(
        memo.alias("nyc"),
        Some(NameAlias {
            id: 12345,
            confidence: 0.7
        })
    );
    assert_eq!(memo.document().map_name.len(), 1);
}

#[test]
fn test_add_lowercases_and_aliases_display_name() {
    let mut raw = new_york();
    raw.insert(
        "display_name".to_string(),
        json!("New York, United States"),
    );

    let mut memo = Memo::in_memory();
    let record = memo.add("New York", 12345, &raw, 0.9).unwrap();

    assert_eq!(record.state, "NY");
    assert!(memo.document().known_names.contains("new york"));
    assert!(memo.document().known_names.contains("new york, united states"));
    assert_eq!(memo.alias("new york, united states").unwrap().confidence, 0.9);
    assert!(memo.is_known_id(12345));
}

#[test]
fn test_add_existing_id_returns_stored_record() {
    let mut memo = Memo::in_memory();
    memo.add("new york", 12345, &new_york(), 1.0).unwrap();

    let other = json!({ "osm_id": 12345, "lat": 0.0, "lon": 0.0 })
        .as_object()
        .cloned()
        .unwrap();
    let record = memo.add("manhattan", 12345, &other, 0.8).unwrap();

    assert_eq!(record.latitude, 40.7);
    assert_eq!(memo.document().locations.len(), 1);
    assert_eq!(memo.alias("manhattan").unwrap().id, 12345);
}

#[test]
fn test_search_by_id_fallback() {
    let mut memo = Memo::in_memory();
    memo.add("new york", 12345, &new_york(), 1.0).unwrap();

    assert!(memo.search("gotham", None).is_none());
    let record = memo.search("gotham", Some(12345)).expect("id fallback");
    assert_eq!(record.country, "USA");
    assert!(memo.search("gotham", Some(1)).is_none());
}

#[test]
fn test_search_purges_orphaned_id() {
    let mut memo = Memo::in_memory();
    memo.add_known("nowhere", 777, 1.0);
    assert!(memo.is_known_id(777));

    assert!(memo.search("elsewhere", Some(777)).is_none());
    assert!(!memo.is_known_id(777));
    // alias survives
    assert_eq!(memo.alias("nowhere").unwrap().id, 777);
}

#[test]
fn test_search_purges_orphan_reached_by_alias() {
    let mut memo = Memo::in_memory();
    memo.add_known("nowhere", 777, 1.0);

    assert!(memo.search("nowhere", None).is_none());
    assert!(!memo.is_known_id(777));
}

#[test]
fn test_unknown_scoped_per_agent() {
    let mut memo = Memo::in_memory();
    assert!(memo.add_unknown("agent-a", "Atlantis"));
    assert!(!memo.add_unknown("agent-a", "atlantis"));

    assert!(memo.is_unknown("atlantis", Some("agent-a")));
    assert!(!memo.is_unknown("atlantis", Some("agent-b")));
    assert!(memo.is_unknown("atlantis", None));

    memo.add_unknown("agent-b", "atlantis");
    assert!(memo.remove_unknown("atlantis"));
    assert!(!memo.is_unknown("atlantis", None));
    assert!(!memo.remove_unknown("atlantis"));
}

#[test]
fn test_pending_counts_store_mutations() {
    let mut memo = Memo::in_memory();
    memo.add("new york", 12345, &new_york(), 1.0).unwrap();
    assert_eq!(memo.pending_changes(), 1);

    memo.add_known("new york", 12345, 1.0);
    memo.search("new york", None);
    assert_eq!(memo.pending_changes(), 1);

    memo.add_unknown("agent-a", "atlantis");
    memo.remove_unknown("atlantis");
    assert_eq!(memo.pending_changes(), 3);

    memo.reset_pending();
    assert_eq!(memo.pending_changes(), 0);
}

#[test]
fn test_load_creates_default_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memo.json");

    let memo = Memo::load(&path).unwrap();

    assert_eq!(memo.document(), &MemoDocument::default());
    assert!(path.exists());
    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    for key in ["unknown", "known_names", "known_osm_ids", "map_name", "locations"] {
        assert!(on_disk.get(key).is_some(), "missing top-level key {}", key);
    }
}

#[test]
fn test_load_recovers_from_corrupt_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memo.json");
    fs::write(&path, "{ not json").unwrap();

    let memo = Memo::load(&path).unwrap();
    assert!(memo.document().locations.is_empty());
    // the corrupt content is kept in the first backup
    assert_eq!(
        fs::read_to_string(dir.path().join("memo.bak")).unwrap(),
        "{ not json"
    );
}

#[test]
fn test_save_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memo.json");

    let mut memo = Memo::load(&path).unwrap();
    memo.add("new york", 12345, &new_york(), 1.0).unwrap();
    memo.add_unknown("agent-a", "atlantis");
    memo.save().unwrap();

    let reloaded = Memo::load(&path).unwrap();
    assert_eq!(reloaded.document(), memo.document());
    assert_eq!(reloaded.pending_changes(), 0);
}

#[test]
fn test_backup_rotation_keeps_two_generations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memo.json");
    let (first, second) = backup_paths(&path);
    assert_eq!(first, dir.path().join("memo.bak"));
    assert_eq!(second, dir.path().join("memo.bak.bak"));

    let mut memo = Memo::load(&path).unwrap();
    memo.add_known("gen one", 1, 1.0);
    memo.save().unwrap();

    let mut memo = Memo::load(&path).unwrap();
    memo.add_known("gen two", 2, 1.0);
    memo.save().unwrap();

    Memo::load(&path).unwrap();

    let first_doc: MemoDocument =
        serde_json::from_str(&fs::read_to_string(&first).unwrap()).unwrap();
    let second_doc: MemoDocument =
        serde_json::from_str(&fs::read_to_string(&second).unwrap()).unwrap();
    assert!(first_doc.known_names.contains("gen two"));
    assert!(second_doc.known_names.contains("gen one"));
    assert!(!second_doc.known_names.contains("gen two"));
}

#[test]
fn test_in_memory_save_is_noop() {
    let memo = Memo::in_memory();
    assert!(memo.path().is_none());
    assert!(memo.save().is_ok());
}

#[test]
fn test_add_clears_display_name_from_unknown() {
    let mut raw = new_york();
    raw.insert(
        "display_name".to_string(),
        json!("New York, United States"),
    );

    let mut memo = Memo::in_memory();
    memo.add_unknown("agent-a", "new york, united states");
    memo.add_unknown("agent-b", "new york, united states");
    memo.reset_pending();

    memo.add("new york", 12345, &raw, 1.0).unwrap();

    assert!(!memo.is_unknown("new york, united states", None));
    assert_eq!(memo.pending_changes(), 1);
    assert_eq!(
        memo.search("new york, united states", None).unwrap().city,
        "New York"
    );
}

#[test]
fn test_add_keeps_display_name_unknown_when_aliased_elsewhere() {
    let mut raw = new_york();
    raw.insert("display_name".to_string(), json!("Springfield"));

    let mut memo = Memo::in_memory();
    memo.add_known("springfield", 777, 1.0);
    memo.add_unknown("agent-a", "springfield");

    memo.add("new york", 12345, &raw, 1.0).unwrap();

    assert_eq!(memo.alias("springfield").unwrap().id, 777);
    assert!(memo.is_unknown("springfield", Some("agent-a")));
}

#[test]
fn test_load_in_missing_directory_is_unavailable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("memo.json");

    let err = Memo::load(&path).unwrap_err();

    assert!(
        matches!(err, MemoError::Unavailable { .. }),
        "unexpected error: {:?}",
        err
    );
    assert!(!path.exists());
}
