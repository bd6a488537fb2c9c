// Tests for mention scanning

use orbweaver_core::mentions::{MentionCount, mention_counts};

#[test]
fn test_basic_extraction() {
    let counts = mention_counts(["hey @alice how are you"]);
    assert_eq!(
        counts,
        vec![MentionCount {
            handle: "alice".to_string(),
            count: 1
        }]
    );
}

#[test]
fn test_handle_stored_without_at_sign() {
    let counts = mention_counts(["@bob"]);
    assert_eq!(counts[0].handle, "bob");
}

#[test]
fn test_email_addresses_are_not_mentions() {
    let counts = mention_counts(["contact me at alice@example.com"]);
    assert!(counts.is_empty());
}

#[test]
fn test_mention_at_start_of_text() {
    let counts = mention_counts(["@alice hi"]);
    assert_eq!(counts.len(), 1);
}

#[test]
fn test_mention_inside_punctuation() {
    let counts = mention_counts(["(cc @carol)"]);
    assert_eq!(counts[0].handle, "carol");
}

#[test]
fn test_counts_per_occurrence() {
    let counts = mention_counts(["ping @alice, again @alice, and @bob"]);
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].handle, "alice");
    assert_eq!(counts[0].count, 2);
    assert_eq!(counts[1].handle, "bob");
    assert_eq!(counts[1].count, 1);
}

#[test]
fn test_counts_accumulate_across_texts() {
    let counts = mention_counts(["@a @b", "@a and @a", "@c"]);
    assert_eq!(counts[0].handle, "a");
    assert_eq!(counts[0].count, 3);
}

#[test]
fn test_ties_keep_first_seen_order() {
    let counts = mention_counts(["@zeta @alpha @mid @zeta @alpha"]);
    let handles: Vec<&str> = counts.iter().map(|c| c.handle.as_str()).collect();
    // zeta and alpha tie at 2, zeta was seen first
    assert_eq!(handles, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_handles_allow_underscores_and_digits() {
    let counts = mention_counts(["shout out to @under_score99"]);
    assert_eq!(counts[0].handle, "under_score99");
}

#[test]
fn test_no_mentions() {
    let counts = mention_counts(["nothing to see here"]);
    assert!(counts.is_empty());

    let empty: Vec<&str> = Vec::new();
    assert!(mention_counts(empty).is_empty());
}
