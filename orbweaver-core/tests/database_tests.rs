// Tests for the graph store

use orbweaver_core::data::{Database, normalize_sentinel};
use orbweaver_core::error::StoreError;
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_database_exists() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!Database::exists(&db_path));

    let _db = Database::new(&db_path).unwrap();
    assert!(Database::exists(&db_path));
}

#[test]
fn test_database_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let _db = Database::new(&db_path).unwrap();
    assert!(Database::exists(&db_path));

    Database::drop(&db_path);
    assert!(!Database::exists(&db_path));
}

#[test]
fn test_database_reopen_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let db = Database::new(&db_path).unwrap();
        db.upsert_user("alice", 0).unwrap();
        db.mark_visited("alice").unwrap();
    }

    let db = Database::new(&db_path).unwrap();
    let alice = db.get_user("alice").unwrap().unwrap();
    assert!(alice.visited);
    assert_eq!(alice.depth, 0);
}

// ============================================================================
// User Tests
// ============================================================================

#[test]
fn test_upsert_user_inserts_once() {
    let (_temp_dir, db) = create_test_db();

    assert!(db.upsert_user("alice", 0).unwrap());
    assert!(!db.upsert_user("alice", 0).unwrap());
    assert_eq!(db.count_users().unwrap(), 1);
}

#[test]
fn test_upsert_user_keeps_first_depth() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 1).unwrap();
    db.upsert_user("alice", 3).unwrap();

    let alice = db.get_user("alice").unwrap().unwrap();
    assert_eq!(alice.depth, 1);
}

#[test]
fn test_upsert_user_keeps_visited_flag() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.mark_visited("alice").unwrap();
    db.upsert_user("alice", 2).unwrap();

    let alice = db.get_user("alice").unwrap().unwrap();
    assert!(alice.visited);
    assert_eq!(alice.depth, 0);
}

#[test]
fn test_user_exists() {
    let (_temp_dir, db) = create_test_db();

    assert!(!db.user_exists("alice").unwrap());
    db.upsert_user("alice", 0).unwrap();
    assert!(db.user_exists("alice").unwrap());
}

#[test]
fn test_new_user_starts_unvisited() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    assert!(!db.is_visited("alice").unwrap());
}

#[test]
fn test_unknown_user_reported_unvisited() {
    let (_temp_dir, db) = create_test_db();

    assert!(!db.is_visited("nobody").unwrap());
}

#[test]
fn test_mark_visited_is_idempotent() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.mark_visited("alice").unwrap();
    db.mark_visited("alice").unwrap();

    assert!(db.is_visited("alice").unwrap());
    assert_eq!(db.count_visited().unwrap(), 1);
}

#[test]
fn test_users_at_depth_insertion_order() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("carol", 1).unwrap();
    db.upsert_user("alice", 1).unwrap();
    db.upsert_user("bob", 1).unwrap();
    db.upsert_user("root", 0).unwrap();

    let depth_one: Vec<String> = db
        .users_at_depth(1)
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(depth_one, vec!["carol", "alice", "bob"]);
}

#[test]
fn test_next_unvisited_follows_insertion_order() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("first", 0).unwrap();
    db.upsert_user("second", 1).unwrap();
    db.upsert_user("third", 1).unwrap();

    assert_eq!(db.next_unvisited().unwrap().unwrap().name, "first");

    db.mark_visited("first").unwrap();
    assert_eq!(db.next_unvisited().unwrap().unwrap().name, "second");

    db.mark_visited("second").unwrap();
    db.mark_visited("third").unwrap();
    assert!(db.next_unvisited().unwrap().is_none());
}

// ============================================================================
// Edge Tests
// ============================================================================

#[test]
fn test_add_edge() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.upsert_user("bob", 1).unwrap();

    let edge_id = db.add_edge("alice", "bob", 3).unwrap();
    assert!(edge_id > 0);

    let edge = db.get_edge("alice", "bob").unwrap().unwrap();
    assert_eq!(edge.weight, 3);
}

#[test]
fn test_add_edge_twice_keeps_both_rows() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.upsert_user("bob", 1).unwrap();

    db.add_edge("alice", "bob", 1).unwrap();
    db.add_edge("alice", "bob", 4).unwrap();

    assert_eq!(db.count_edges().unwrap(), 2);
}

#[test]
fn test_upsert_edge_accumulates_weight() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.upsert_user("bob", 0).unwrap();

    db.upsert_edge("alice", "bob", 2).unwrap();
    db.upsert_edge("alice", "bob", 5).unwrap();

    assert_eq!(db.count_edges().unwrap(), 1);
    let edge = db.get_edge("alice", "bob").unwrap().unwrap();
    assert_eq!(edge.weight, 7);
}

#[test]
fn test_upsert_edge_is_directional() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.upsert_user("bob", 0).unwrap();

    db.upsert_edge("alice", "bob", 2).unwrap();
    db.upsert_edge("bob", "alice", 3).unwrap();

    assert_eq!(db.count_edges().unwrap(), 2);
    assert_eq!(db.get_edge("alice", "bob").unwrap().unwrap().weight, 2);
    assert_eq!(db.get_edge("bob", "alice").unwrap().unwrap().weight, 3);
}

#[test]
fn test_edge_rejects_unknown_source() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("bob", 0).unwrap();

    let result = db.add_edge("ghost", "bob", 1);
    assert!(matches!(
        result,
        Err(StoreError::DanglingReference { ref user }) if user == "ghost"
    ));
    assert_eq!(db.count_edges().unwrap(), 0);
}

#[test]
fn test_edge_rejects_unknown_target() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();

    let result = db.upsert_edge("alice", "ghost", 1);
    assert!(matches!(
        result,
        Err(StoreError::DanglingReference { ref user }) if user == "ghost"
    ));
    assert_eq!(db.count_edges().unwrap(), 0);
}

#[test]
fn test_edges_returned_in_insertion_order() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("a", 0).unwrap();
    db.upsert_user("b", 0).unwrap();
    db.upsert_user("c", 0).unwrap();

    db.add_edge("a", "b", 1).unwrap();
    db.add_edge("b", "c", 2).unwrap();
    db.add_edge("c", "a", 3).unwrap();

    let edges = db.edges().unwrap();
    assert_eq!(edges.len(), 3);
    assert_eq!(edges[0].source, "a");
    assert_eq!(edges[2].target, "a");
}

#[test]
fn test_top_edges_ordered_by_weight() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("a", 0).unwrap();
    db.upsert_user("b", 0).unwrap();
    db.upsert_user("c", 0).unwrap();

    db.add_edge("a", "b", 2).unwrap();
    db.add_edge("b", "c", 9).unwrap();
    db.add_edge("c", "a", 5).unwrap();

    let top = db.top_edges(2).unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].weight, 9);
    assert_eq!(top[1].weight, 5);
}

// ============================================================================
// Message Tests
// ============================================================================

#[test]
fn test_add_message() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    let id = db.add_message("alice", "hello world").unwrap();
    assert!(id > 0);

    let messages = db.messages_for_user("alice").unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "hello world");
}

#[test]
fn test_duplicate_messages_are_kept() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.add_message("alice", "same text").unwrap();
    db.add_message("alice", "same text").unwrap();

    assert_eq!(db.count_messages().unwrap(), 2);
}

#[test]
fn test_message_rejects_unknown_user() {
    let (_temp_dir, db) = create_test_db();

    let result = db.add_message("ghost", "boo");
    assert!(matches!(result, Err(StoreError::DanglingReference { .. })));
}

#[test]
fn test_messages_across_users_in_insertion_order() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.upsert_user("bob", 0).unwrap();
    db.add_message("alice", "one").unwrap();
    db.add_message("bob", "two").unwrap();
    db.add_message("alice", "three").unwrap();

    let texts: Vec<String> = db.messages().unwrap().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

// ============================================================================
// Location Tests
// ============================================================================

#[test]
fn test_add_location() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.add_location("alice", Some("{\"type\":\"Point\"}"), Some("Berlin"))
        .unwrap();

    let locations = db.locations_for_user("alice").unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].location.as_deref(), Some("Berlin"));
}

#[test]
fn test_location_null_columns_roundtrip() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("alice", 0).unwrap();
    db.add_location("alice", None, Some("NYC")).unwrap();
    db.add_location("alice", Some("{}"), None).unwrap();

    let locations = db.locations_for_user("alice").unwrap();
    assert_eq!(locations[0].geojson, None);
    assert_eq!(locations[0].location.as_deref(), Some("NYC"));
    assert_eq!(locations[1].geojson.as_deref(), Some("{}"));
    assert_eq!(locations[1].location, None);
}

#[test]
fn test_location_rejects_unknown_user() {
    let (_temp_dir, db) = create_test_db();

    let result = db.add_location("ghost", None, Some("nowhere"));
    assert!(matches!(result, Err(StoreError::DanglingReference { .. })));
}

// ============================================================================
// Sentinel Normalization Tests
// ============================================================================

#[test]
fn test_normalize_sentinel_absent_values() {
    assert_eq!(normalize_sentinel(""), None);
    assert_eq!(normalize_sentinel("   "), None);
    assert_eq!(normalize_sentinel("nan"), None);
    assert_eq!(normalize_sentinel("NaN"), None);
    assert_eq!(normalize_sentinel("None"), None);
    assert_eq!(normalize_sentinel("NULL"), None);
}

#[test]
fn test_normalize_sentinel_real_values() {
    assert_eq!(normalize_sentinel("Berlin").as_deref(), Some("Berlin"));
    assert_eq!(normalize_sentinel("  Oslo  ").as_deref(), Some("Oslo"));
    // "none" in lowercase is a plausible location string, only the Python
    // repr spelling marks absence
    assert_eq!(normalize_sentinel("none").as_deref(), Some("none"));
}

// ============================================================================
// Aggregate Tests
// ============================================================================

#[test]
fn test_counts_on_empty_database() {
    let (_temp_dir, db) = create_test_db();

    assert_eq!(db.count_users().unwrap(), 0);
    assert_eq!(db.count_visited().unwrap(), 0);
    assert_eq!(db.count_edges().unwrap(), 0);
    assert_eq!(db.count_messages().unwrap(), 0);
    assert_eq!(db.count_locations().unwrap(), 0);
    assert_eq!(db.max_depth().unwrap(), 0);
}

#[test]
fn test_depth_histogram() {
    let (_temp_dir, db) = create_test_db();

    db.upsert_user("root", 0).unwrap();
    db.upsert_user("a", 1).unwrap();
    db.upsert_user("b", 1).unwrap();
    db.upsert_user("c", 2).unwrap();

    let histogram = db.depth_histogram().unwrap();
    assert_eq!(histogram, vec![(0, 1), (1, 2), (2, 1)]);
    assert_eq!(db.max_depth().unwrap(), 2);
}
