use orbweaver_core::data::normalize_sentinel;
use serde_json::Value;

/// One event pulled off a feed. The raw line is retained so mention
/// scanning sees the whole payload, not just the text field.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub account: String,
    pub text: String,
    pub geojson: Option<String>,
    pub location: Option<String>,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Event(StreamEvent),
    /// A deletion notice for an earlier event. Nothing to ingest.
    Retraction,
}

impl StreamEvent {
    /// Parses one NDJSON line. Returns None when the line is not valid
    /// JSON or lacks the account/text fields.
    pub fn parse(raw: &str) -> Option<ParsedLine> {
        let value: Value = serde_json::from_str(raw).ok()?;

        if value.get("delete").is_some() {
            return Some(ParsedLine::Retraction);
        }

        let account = value
            .get("account")
            .or_else(|| value.get("user").and_then(|user| user.get("screen_name")))
            .and_then(Value::as_str)?
            .to_string();
        let text = value.get("text").and_then(Value::as_str)?.to_string();

        let geojson = match value.get("coordinates") {
            None | Some(Value::Null) => None,
            Some(Value::String(raw_geo)) => normalize_sentinel(raw_geo),
            Some(other) => Some(other.to_string()),
        };
        let location = value
            .get("location")
            .or_else(|| value.get("user").and_then(|user| user.get("location")))
            .and_then(Value::as_str)
            .and_then(normalize_sentinel);

        Some(ParsedLine::Event(StreamEvent {
            account,
            text,
            geojson,
            location,
            raw: raw.to_string(),
        }))
    }
}
