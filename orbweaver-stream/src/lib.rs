pub mod buffer;
pub mod classifier;
pub mod error;
pub mod event;
pub mod reduce;
pub mod source;

pub use buffer::ClassificationBuffer;
pub use classifier::{BayesModel, Classifier};
pub use error::StreamError;
pub use event::StreamEvent;
