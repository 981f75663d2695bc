//! A provisioning session: one executor, one run log, and the policy that
//! decides whether a failed command is fatal, ignored, or informational.

use serde::Serialize;

use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::executor::RemoteExecutor;
use crate::run_log::RunLog;
use crate::ssh::CommandOutput;

use super::Step;

const DOCKER_SOCKET_DENIED: &str = "permission denied while trying to connect to the docker daemon";

/// A failure that was expected in the common case and deliberately not treated as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredFailure {
    pub step: String,
    pub command: String,
    pub exit_code: i32,
    pub output: String,
}

pub struct Session<E: RemoteExecutor> {
    executor: E,
    log: RunLog,
    ignored: Vec<IgnoredFailure>,
}

impl<E: RemoteExecutor> Session<E> {
    pub fn new(executor: E, log: RunLog) -> Self {
        Self {
            executor,
            log,
            ignored: Vec::new(),
        }
    }

    pub fn log(&mut self) -> &mut RunLog {
        &mut self.log
    }

    pub fn log_path(&self) -> Option<String> {
        self.log.path().map(|p| p.display().to_string())
    }

    pub fn run_id(&self) -> String {
        self.log.run_id().to_string()
    }

    pub fn host(&self) -> String {
        self.executor.target().host
    }

    pub fn ignored_failures(&self) -> Vec<IgnoredFailure> {
        self.ignored.clone()
    }

    fn exec(&mut self, step: Step, command: &str) -> CommandOutput {
        let output = self.executor.execute(command);
        self.log.command(step.as_str(), command, &output);
        output
    }

    /// Run a command whose failure aborts the run.
    pub fn run(&mut self, step: Step, command: &str) -> Result<CommandOutput> {
        let output = self.exec(step, command);
        if output.success {
            Ok(output)
        } else {
            Err(self.failure(step, command, &output))
        }
    }

    /// Run a command and hand back its output whatever the exit status.
    /// Only a transport failure is an error.
    pub fn check(&mut self, step: Step, command: &str) -> Result<CommandOutput> {
        let output = self.exec(step, command);
        if !output.success && self.executor.is_transport_failure(&output) {
            return Err(self.failure(step, command, &output));
        }
        Ok(output)
    }

    /// Run a command whose failure is expected and recorded, never raised.
    pub fn run_ignoring_failure(&mut self, step: Step, command: &str) -> CommandOutput {
        let output = self.exec(step, command);
        if !output.success {
            self.log
                .line(&format!("[{}] failure ignored", step.as_str()));
            self.ignored.push(IgnoredFailure {
                step: step.as_str().to_string(),
                command: self.log.scrub(command),
                exit_code: output.exit_code,
                output: self.log.scrub(&output.combined()),
            });
        }
        output
    }

    /// Run a command for information only. Nothing is raised or recorded as ignored.
    pub fn probe(&mut self, step: Step, command: &str) -> CommandOutput {
        self.exec(step, command)
    }

    /// Write a file on the remote host; failure aborts the run.
    pub fn write_file(&mut self, step: Step, path: &str, content: &str) -> Result<()> {
        let output = self.executor.write_file(path, content);
        let label = format!("write {} ({} bytes)", path, content.len());
        self.log.command(step.as_str(), &label, &output);
        if output.success {
            Ok(())
        } else {
            Err(self.failure(step, &label, &output))
        }
    }

    fn failure(&mut self, step: Step, command: &str, output: &CommandOutput) -> Error {
        let details = RemoteCommandFailedDetails {
            step: step.as_str().to_string(),
            command: self.log.scrub(command),
            exit_code: output.exit_code,
            stdout: self.log.scrub(&output.stdout),
            stderr: self.log.scrub(&output.stderr),
            target: self.executor.target(),
        };

        let err = if self.executor.is_transport_failure(output) {
            Error::ssh_connect_failed(details)
        } else if output.stderr.to_lowercase().contains(DOCKER_SOCKET_DENIED) {
            Error::remote_command_failed(details).with_hint(format!(
                "{} was just added to the docker group; the new membership applies to new login sessions, so run dockhand again",
                self.executor.target().user
            ))
        } else {
            Error::remote_command_failed(details)
        };

        self.annotate(err)
    }

    /// Record a fatal error in the run log and point the operator at it.
    pub fn annotate(&mut self, err: Error) -> Error {
        self.log.line(&format!("FAILED: {} ({})", err.message, err.code.as_str()));
        match self.log_path() {
            Some(path) => err.with_hint(format!("See the run log at {}", path)),
            None => err,
        }
    }
}
