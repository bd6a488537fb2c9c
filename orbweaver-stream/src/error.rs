use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Feed error: {0}")]
    FeedError(String),

    #[error("Classifier error: {0}")]
    ClassifierError(String),

    #[error("Malformed model: {0}")]
    ModelError(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] orbweaver_core::StoreError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
