pub mod crawler;
pub mod error;
pub mod provider;
pub mod result;

pub use crawler::Crawler;
pub use error::HarvestError;
pub use provider::{FeedProvider, Harvest, HttpFeedProvider};
pub use result::CrawlStats;
