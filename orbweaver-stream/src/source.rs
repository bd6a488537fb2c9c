use std::path::Path;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, StreamError};

/// Reads newline-delimited events from a long-lived HTTP response and
/// forwards complete lines down a channel.
pub struct HttpEventSource {
    client: reqwest::Client,
    url: Url,
    bearer_token: Option<String>,
}

impl HttpEventSource {
    pub fn new(url: Url) -> Self {
        Self::with_timeout(url, 30)
    }

    /// The timeout bounds connection setup only; an established stream
    /// stays open indefinitely.
    pub fn with_timeout(url: Url, connect_timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Orbweaver/0.1 (https://github.com/trapdoorsec/orbweaver)")
            .connect_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url,
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    /// Connects and pumps lines until the stream ends or the receiver
    /// goes away.
    pub async fn run(&self, tx: Sender<String>) -> Result<()> {
        info!("Connecting to event stream at {}", self.url);

        let mut request = self.client.get(self.url.clone());
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(StreamError::FeedError(format!(
                "feed returned {}",
                response.status()
            )));
        }

        let mut body = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        while let Some(chunk) = body.next().await {
            pending.extend_from_slice(&chunk?);
            while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if tx.send(line).await.is_err() {
                    debug!("Receiver dropped, closing stream");
                    return Ok(());
                }
            }
        }

        // Chunked transports may omit the final newline.
        let tail = String::from_utf8_lossy(&pending).trim().to_string();
        if !tail.is_empty() {
            let _ = tx.send(tail).await;
        }
        Ok(())
    }
}

/// Replays a saved capture, one event per line. The path "-" reads
/// from standard input.
pub async fn replay_lines(path: &Path, tx: Sender<String>) -> Result<()> {
    if path == Path::new("-") {
        let reader = BufReader::new(tokio::io::stdin());
        return forward_lines(reader, tx).await;
    }
    info!("Replaying events from {}", path.display());
    let file = tokio::fs::File::open(path).await?;
    forward_lines(BufReader::new(file), tx).await
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: BufReader<R>, tx: Sender<String>) -> Result<()> {
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if tx.send(line).await.is_err() {
            break;
        }
    }
    Ok(())
}

/// Case-insensitive keyword filter. An empty keyword list matches
/// everything (sample mode).
pub fn matches_track(line: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let lowered = line.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_matches_track_empty_list_matches_all() {
        assert!(matches_track("anything at all", &[]));
    }

    #[test]
    fn test_matches_track_case_insensitive() {
        let keywords = vec!["VACCINE".to_string()];
        assert!(matches_track("new Vaccine trial results", &keywords));
        assert!(!matches_track("nothing relevant here", &keywords));
    }

    #[test]
    fn test_matches_track_any_keyword() {
        let keywords = vec!["alpha".to_string(), "beta".to_string()];
        assert!(matches_track("only beta appears", &keywords));
    }

    #[tokio::test]
    async fn test_replay_lines_skips_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"account": "ada", "text": "one"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"account": "bo", "text": "two"}}"#).unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        replay_lines(file.path(), tx).await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ada"));
        assert!(lines[1].contains("bo"));
    }

    #[tokio::test]
    async fn test_http_source_splits_lines() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("{\"x\":1}\n{\"x\":2}\n{\"x\":3}"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/stream", server.uri())).unwrap();
        let source = HttpEventSource::new(url);
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        source.run(tx).await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        // The last line has no trailing newline and arrives via the
        // tail flush.
        assert_eq!(lines, vec!["{\"x\":1}", "{\"x\":2}", "{\"x\":3}"]);
    }

    #[tokio::test]
    async fn test_http_source_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/stream", server.uri())).unwrap();
        let source = HttpEventSource::new(url);
        let (tx, _rx) = tokio::sync::mpsc::channel(16);
        let result = source.run(tx).await;
        assert!(matches!(result, Err(StreamError::FeedError(_))));
    }
}
