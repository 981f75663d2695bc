//! Terminal I/O utilities for CLI.
//!
//! Provides TTY detection and operator prompting.

use std::io::{self, BufRead, IsTerminal, Write};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn prompt(message: &str) -> dockhand::Result<String> {
    eprint!("{}: ", message);
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line).map_err(|e| {
        dockhand::Error::new(
            dockhand::ErrorCode::InternalIoError,
            format!("Failed to read input: {}", e),
            serde_json::Value::Null,
        )
    })?;

    Ok(line.trim().to_string())
}

/// Read a secret without echoing it. An empty answer is allowed.
pub fn prompt_secret(message: &str) -> dockhand::Result<String> {
    dialoguer::Password::new()
        .with_prompt(message)
        .allow_empty_password(true)
        .interact()
        .map(|answer| answer.trim().to_string())
        .map_err(|e| {
            dockhand::Error::new(
                dockhand::ErrorCode::InternalIoError,
                format!("Failed to read input: {}", e),
                serde_json::Value::Null,
            )
        })
}

/// Print status message to stderr if running in a terminal.
pub fn status(message: &str) {
    if io::stderr().is_terminal() {
        eprintln!("{}", message);
    }
}
