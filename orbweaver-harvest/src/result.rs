use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Totals for one crawl run. Counts only cover work done in this run, not
/// what an earlier run on the same store already collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStats {
    pub users_visited: usize,
    pub messages_stored: usize,
    pub edges_added: usize,
    pub locations_stored: usize,
    pub fetch_failures: usize,
    pub max_depth_reached: i64,
    pub duration: Duration,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self {
            users_visited: 0,
            messages_stored: 0,
            edges_added: 0,
            locations_stored: 0,
            fetch_failures: 0,
            max_depth_reached: 0,
            duration: Duration::from_secs(0),
        }
    }
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}
