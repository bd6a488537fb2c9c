// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    database_path_for_seed,
    resolve_event_source,
    sanitize_seed,
    validate_threshold,
};
