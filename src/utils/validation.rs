//! Input validation primitives.
//!
//! Ergonomic helpers for the checks applied to operator input before a
//! run touches the remote host.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Require an Option to contain a value.
pub fn require<T>(opt: Option<T>, field: &str, message: &str) -> Result<T> {
    opt.ok_or_else(|| Error::validation_invalid_argument(field, message, None))
}

/// Require a string to be non-empty after trimming.
///
/// Returns a reference to the trimmed string on success.
pub fn require_non_empty<'a>(value: &'a str, field: &str, message: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation_invalid_argument(field, message, None))
    } else {
        Ok(trimmed)
    }
}

/// Require a TCP port in 1..=65535.
pub fn require_port(port: u16, field: &str) -> Result<u16> {
    if port == 0 {
        return Err(Error::validation_invalid_argument(
            field,
            "Port must be between 1 and 65535",
            Some(port.to_string()),
        ));
    }
    Ok(port)
}

fn container_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Docker's own grammar for container names.
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]+$").expect("container name pattern is valid")
    })
}

/// Require a name Docker accepts for `--name` / `container_name`.
pub fn require_container_name<'a>(name: &'a str, field: &str) -> Result<&'a str> {
    if container_name_pattern().is_match(name) {
        Ok(name)
    } else {
        Err(Error::validation_invalid_argument(
            field,
            "Must start with a letter or digit and contain only [a-zA-Z0-9_.-]",
            Some(name.to_string()),
        ))
    }
}

/// Require an `https://` clone URL with a host and a path.
pub fn require_https_url<'a>(url: &'a str, field: &str) -> Result<&'a str> {
    let rest = url.strip_prefix("https://").ok_or_else(|| {
        Error::validation_invalid_argument(
            field,
            "Repository URL must start with https://",
            Some(url.to_string()),
        )
    })?;

    match rest.split_once('/') {
        Some((host, path)) if !host.is_empty() && !path.is_empty() => Ok(url),
        _ => Err(Error::validation_invalid_argument(
            field,
            "Repository URL must include a host and a repository path",
            Some(url.to_string()),
        )),
    }
}
