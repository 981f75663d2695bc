//! Generic utility primitives with zero domain knowledge.
//!
//! - `shell` - Shell escaping and quoting
//! - `token` - Secret redaction and URL credential embedding
//! - `validation` - Input validation helpers

pub mod shell;
pub mod token;
pub mod validation;
