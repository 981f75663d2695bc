//! Per-run log file.
//!
//! Every remote command of a run, its exit status and its combined output
//! are appended with an RFC 3339 timestamp. The log is a side artifact: a
//! write failure is reported once on stderr and never aborts the run.

use chrono::{SecondsFormat, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::defaults::Defaults;
use crate::error::{Error, Result};
use crate::paths;
use crate::ssh::CommandOutput;
use crate::utils::token;

pub struct RunLog {
    run_id: String,
    path: Option<PathBuf>,
    file: Option<File>,
    secrets: Vec<String>,
}

impl RunLog {
    /// Create `<dir>/<action>-<timestamp>-<run id>.log`, creating `dir` if needed.
    pub fn create(dir: &Path, action: &str) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("create {}", dir.display())))
        })?;

        let run_id = new_run_id();
        let file_name = format!(
            "{}-{}-{}.log",
            action,
            Utc::now().format("%Y%m%dT%H%M%SZ"),
            run_id
        );
        let path = dir.join(file_name);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("open {}", path.display())))
            })?;

        Ok(Self {
            run_id,
            path: Some(path),
            file: Some(file),
            secrets: Vec::new(),
        })
    }

    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self {
            run_id: new_run_id(),
            path: None,
            file: None,
            secrets: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Register a value that must never reach the log file.
    pub fn redact(&mut self, secret: &str) {
        if !secret.is_empty() {
            self.secrets.push(secret.to_string());
        }
    }

    /// Apply every registered redaction to `text`.
    pub fn scrub(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| token::redact(&acc, secret))
    }

    pub fn line(&mut self, message: &str) {
        let scrubbed = self.scrub(message);
        let Some(file) = self.file.as_mut() else {
            return;
        };

        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut buf = String::new();
        for line in scrubbed.lines() {
            buf.push_str(&format!("[{}] {}\n", stamp, line));
        }
        if buf.is_empty() {
            buf = format!("[{}]\n", stamp);
        }

        if let Err(e) = file.write_all(buf.as_bytes()) {
            log_status!("log", "Could not write run log: {}", e);
            self.file = None;
        }
    }

    /// Record a command and what it produced.
    pub fn command(&mut self, step: &str, command: &str, output: &CommandOutput) {
        self.line(&format!("[{}] $ {}", step, command));
        let combined = output.combined();
        if !combined.is_empty() {
            self.line(&combined);
        }
        self.line(&format!("[{}] exit {}", step, output.exit_code));
    }
}

/// Log directory: an explicit override, then `logDir` from the defaults file, then
/// the config directory.
pub fn resolve_dir(override_dir: Option<&str>, defaults: &Defaults) -> Result<PathBuf> {
    match override_dir.or(defaults.log_dir.as_deref()) {
        Some(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(shellexpand::tilde(dir).to_string())),
        _ => paths::logs(),
    }
}

fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_names_file_after_action() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::create(&dir.path().join("logs"), "deploy").unwrap();

        let path = log.path().unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("deploy-"));
        assert!(name.ends_with(&format!("-{}.log", log.run_id())));
        assert!(path.exists());
    }

    #[test]
    fn lines_are_timestamped_and_scrubbed() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::create(dir.path(), "deploy").unwrap();
        log.redact("ghp_secret");
        log.command(
            "source-sync",
            "git clone https://ghp_secret@example.com/org/app.git .",
            &CommandOutput::ok("Cloning into '.'...\n"),
        );

        let content = fs::read_to_string(log.path().unwrap()).unwrap();
        assert!(!content.contains("ghp_secret"));
        assert!(content.contains("https://***@example.com/org/app.git"));
        assert!(content.contains("Cloning into"));
        assert!(content.contains("[source-sync] exit 0"));
        assert!(content.lines().all(|l| l.starts_with('[')));
    }

    #[test]
    fn override_dir_wins_over_defaults() {
        let mut defaults = crate::defaults::builtin_defaults();
        defaults.log_dir = Some("/var/log/dockhand".to_string());

        assert_eq!(
            resolve_dir(Some("/tmp/runs"), &defaults).unwrap(),
            PathBuf::from("/tmp/runs")
        );
        assert_eq!(
            resolve_dir(None, &defaults).unwrap(),
            PathBuf::from("/var/log/dockhand")
        );
    }

    #[test]
    fn disabled_log_has_no_path() {
        let mut log = RunLog::disabled();
        log.line("ignored");
        assert!(log.path().is_none());
        assert_eq!(log.run_id().len(), 8);
    }
}
