use orbweaver_core::mentions;
use orbweaver_core::Database;

use crate::error::Result;
use crate::event::StreamEvent;

/// Folds one qualifying event into the store: the author at depth 0,
/// the message, the location row, and one weighted edge per mentioned
/// handle. Repeat mentions in the same event add to the edge weight.
pub fn apply(event: &StreamEvent, db: &Database) -> Result<()> {
    db.upsert_user(&event.account, 0)?;
    db.add_message(&event.account, &event.text)?;
    db.add_location(
        &event.account,
        event.geojson.as_deref(),
        event.location.as_deref(),
    )?;

    for node in mentions::mention_counts([event.raw.as_str()]) {
        db.upsert_user(&node.handle, 0)?;
        db.upsert_edge(&event.account, &node.handle, node.count)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ParsedLine;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("reduce.db")).unwrap();
        (db, dir)
    }

    fn event_from(raw: &str) -> StreamEvent {
        match StreamEvent::parse(raw) {
            Some(ParsedLine::Event(event)) => event,
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_records_everything() {
        let (db, _dir) = test_db();
        let event =
            event_from(r#"{"account": "bob", "text": "hi @alice @alice", "location": "NYC"}"#);
        apply(&event, &db).unwrap();

        let bob = db.get_user("bob").unwrap().unwrap();
        assert_eq!(bob.depth, 0);
        assert!(db.user_exists("alice").unwrap());

        let messages = db.messages_for_user("bob").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hi @alice @alice");

        let locations = db.locations_for_user("bob").unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].geojson, None);
        assert_eq!(locations[0].location.as_deref(), Some("NYC"));

        let edge = db.get_edge("bob", "alice").unwrap().unwrap();
        assert_eq!(edge.weight, 2);
    }

    #[test]
    fn test_apply_accumulates_across_events() {
        let (db, _dir) = test_db();
        let first = event_from(r#"{"account": "bob", "text": "cc @alice"}"#);
        let second = event_from(r#"{"account": "bob", "text": "again @alice"}"#);
        apply(&first, &db).unwrap();
        apply(&second, &db).unwrap();

        assert_eq!(db.count_edges().unwrap(), 1);
        let edge = db.get_edge("bob", "alice").unwrap().unwrap();
        assert_eq!(edge.weight, 2);
    }

    #[test]
    fn test_apply_without_mentions_adds_no_edges() {
        let (db, _dir) = test_db();
        let event = event_from(r#"{"account": "bob", "text": "just thinking out loud"}"#);
        apply(&event, &db).unwrap();

        assert_eq!(db.count_edges().unwrap(), 0);
        assert_eq!(db.count_messages().unwrap(), 1);
    }
}
