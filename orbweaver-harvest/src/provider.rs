use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use orbweaver_core::data::normalize_sentinel;
use orbweaver_core::mentions::{self, MentionCount};
use reqwest::Client;
use serde_json::Value;
use std::io::Write;
use tracing::debug;
use url::Url;

/// One user's fetched timeline. Posts are kept as raw JSON so mention
/// scanning and dumps see the whole payload, not just the text field.
#[derive(Debug, Clone)]
pub struct Harvest {
    user: String,
    posts: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoRecord {
    pub geojson: Option<String>,
    pub location: Option<String>,
}

impl Harvest {
    pub fn new(user: impl Into<String>, posts: Vec<Value>) -> Self {
        Harvest {
            user: user.into(),
            posts,
        }
    }

    pub fn empty(user: impl Into<String>) -> Self {
        Harvest {
            user: user.into(),
            posts: Vec::new(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Message texts in feed order. Posts without a text field are skipped.
    pub fn messages(&self) -> Vec<String> {
        self.posts
            .iter()
            .filter_map(|post| post.get("text").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    /// Mention tallies over the serialized posts, heaviest first.
    pub fn nodes(&self) -> Vec<MentionCount> {
        let serialized: Vec<String> = self.posts.iter().map(|post| post.to_string()).collect();
        mentions::mention_counts(serialized.iter().map(String::as_str))
    }

    /// Geo observations with absent markers normalized to None. The
    /// location string comes from the post itself or from the author's
    /// profile; posts carrying neither side are dropped.
    pub fn locations(&self) -> Vec<GeoRecord> {
        self.posts
            .iter()
            .filter_map(|post| {
                let geojson = normalize_geo(post.get("coordinates"));
                let location = post
                    .get("location")
                    .or_else(|| post.get("user").and_then(|user| user.get("location")))
                    .and_then(Value::as_str)
                    .and_then(normalize_sentinel);
                if geojson.is_none() && location.is_none() {
                    None
                } else {
                    Some(GeoRecord { geojson, location })
                }
            })
            .collect()
    }

    /// Writes the raw posts as JSONL, one post per line.
    pub fn dump<W: Write>(&self, writer: &mut W) -> Result<()> {
        for post in &self.posts {
            serde_json::to_writer(&mut *writer, post)?;
            writeln!(writer)?;
        }
        Ok(())
    }
}

fn normalize_geo(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(raw) => normalize_sentinel(raw),
        other => Some(other.to_string()),
    }
}

/// Source of user timelines. The crawler needs exactly one capability, so
/// tests can script a provider without touching the network.
#[async_trait]
pub trait FeedProvider: Send + Sync {
    async fn load(&self, user: &str, limit: usize) -> Result<Harvest>;
}

pub struct HttpFeedProvider {
    client: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl HttpFeedProvider {
    pub fn new(base_url: Url) -> Self {
        Self::with_timeout(base_url, 10)
    }

    pub fn with_timeout(base_url: Url, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent("Orbweaver/0.1 (https://github.com/trapdoorsec/orbweaver)")
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(timeout_secs / 2))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl FeedProvider for HttpFeedProvider {
    async fn load(&self, user: &str, limit: usize) -> Result<Harvest> {
        let url = self
            .base_url
            .join(&format!("users/{}/timeline", user))
            .map_err(|e| HarvestError::InvalidUrl(format!("timeline URL for {}: {}", user, e)))?;

        debug!("Fetching timeline for {} from {}", user, url);

        let mut request = self
            .client
            .get(url)
            .query(&[("limit", limit.to_string())]);
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(HarvestError::FeedError(format!(
                "timeline request for {} returned {}",
                user,
                response.status()
            )));
        }

        let posts: Vec<Value> = response.json().await?;
        Ok(Harvest::new(user, posts))
    }
}
