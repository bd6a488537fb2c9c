use crate::error::Result;
use crate::provider::{FeedProvider, Harvest};
use crate::result::CrawlStats;
use orbweaver_core::data::Database;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub type ProgressCallback = Arc<dyn Fn(i64, String) + Send + Sync>;

pub struct Crawler {
    provider: Arc<dyn FeedProvider>,
    max_depth: i64,
    message_count: usize,
    follow_fraction: f64,
    dump_dir: Option<PathBuf>,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(provider: Arc<dyn FeedProvider>) -> Self {
        Self {
            provider,
            max_depth: 2,
            message_count: 100,
            follow_fraction: 0.05,
            dump_dir: None,
            progress_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: i64) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_message_count(mut self, count: usize) -> Self {
        self.message_count = count;
        self
    }

    pub fn with_follow_fraction(mut self, fraction: f64) -> Self {
        self.follow_fraction = fraction;
        self
    }

    pub fn with_dump_dir(mut self, dir: PathBuf) -> Self {
        self.dump_dir = Some(dir);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Breadth-first expansion from `root`. Every user is fetched at most
    /// once; rerunning on the same store resumes where the last run left off.
    pub async fn run(&self, db: &Database, root: &str) -> Result<CrawlStats> {
        let started = Instant::now();
        info!("Starting crawl from {} to depth {}", root, self.max_depth);

        let mut stats = CrawlStats::new();
        db.upsert_user(root, 0)?;

        let mut current_depth = 0;
        while current_depth <= self.max_depth {
            self.expand_depth(db, current_depth, &mut stats).await?;
            current_depth += 1;
        }

        stats.max_depth_reached = db.max_depth()?;
        stats.duration = started.elapsed();
        info!(
            "Crawl finished: {} users visited, {} connections added in {:?}",
            stats.users_visited, stats.edges_added, stats.duration
        );
        Ok(stats)
    }

    async fn expand_depth(&self, db: &Database, depth: i64, stats: &mut CrawlStats) -> Result<()> {
        let frontier = db.users_at_depth(depth)?;
        debug!("Expanding depth {}: {} users on frontier", depth, frontier.len());

        for user in frontier {
            // An earlier run may already have fetched this user
            if db.is_visited(&user.name)? {
                continue;
            }

            if let Some(ref callback) = self.progress_callback {
                callback(depth, user.name.clone());
            }

            let harvest = match self.provider.load(&user.name, self.message_count).await {
                Ok(harvest) => harvest,
                Err(e) => {
                    warn!("Fetch failed for {}: {}", user.name, e);
                    stats.fetch_failures += 1;
                    Harvest::empty(user.name.clone())
                }
            };

            if let Some(ref dir) = self.dump_dir {
                if let Err(e) = dump_harvest(dir, &harvest) {
                    warn!("Dump failed for {}: {}", user.name, e);
                }
            }

            for text in harvest.messages() {
                db.add_message(&user.name, &text)?;
                stats.messages_stored += 1;
            }

            // The follow cap is a fraction of the configured fetch size, not
            // of however many posts actually came back, so thin timelines do
            // not inflate the kept share.
            let cap = (self.follow_fraction * self.message_count as f64).ceil() as usize;
            for node in harvest.nodes().into_iter().take(cap) {
                db.upsert_user(&node.handle, depth + 1)?;
                db.add_edge(&user.name, &node.handle, node.count)?;
                stats.edges_added += 1;
            }

            for record in harvest.locations() {
                db.add_location(
                    &user.name,
                    record.geojson.as_deref(),
                    record.location.as_deref(),
                )?;
                stats.locations_stored += 1;
            }

            // Visited is the last write, so a crash never strands a user in
            // a half-recorded-but-skipped state
            db.mark_visited(&user.name)?;
            stats.users_visited += 1;
        }

        Ok(())
    }
}

fn dump_harvest(dir: &Path, harvest: &Harvest) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.jsonl", harvest.user()));
    let mut file = std::fs::File::create(path)?;
    harvest.dump(&mut file)?;
    Ok(())
}
