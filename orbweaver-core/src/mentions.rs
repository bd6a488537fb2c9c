use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

// \B rejects handles glued to word characters, so e-mail addresses
// ("user@example.com") never count as mentions.
static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\B@(\w+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionCount {
    pub handle: String,
    pub count: i64,
}

/// Tallies @handle mentions across raw texts, one tally per occurrence.
/// Handles are returned without the leading '@', heaviest first; ties keep
/// first-seen order.
pub fn mention_counts<'a, I>(texts: I) -> Vec<MentionCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, i64> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for text in texts {
        for capture in MENTION.captures_iter(text) {
            let handle = &capture[1];
            match counts.get_mut(handle) {
                Some(count) => *count += 1,
                None => {
                    counts.insert(handle.to_string(), 1);
                    order.push(handle.to_string());
                }
            }
        }
    }

    let mut ranked: Vec<MentionCount> = order
        .into_iter()
        .map(|handle| {
            let count = counts.get(&handle).copied().unwrap_or(0);
            MentionCount { handle, count }
        })
        .collect();
    // Stable sort, so equal counts stay in first-seen order
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}
