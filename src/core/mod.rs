// Public modules
pub mod defaults;
pub mod error;
pub mod executor;
pub mod inspect;
pub mod provision;
pub mod render;
pub mod run_log;
pub mod ssh;
pub mod target;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
