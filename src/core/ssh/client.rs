use crate::error::{Error, Result, TargetDetails};
use crate::executor::RemoteExecutor;
use crate::target::DeploymentConfig;
use crate::utils::shell;
use std::io::Write;
use std::process::{Command, Stdio};

pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the server address is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }

    /// stdout and stderr together, the way a terminal would have shown them.
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end(), self.stderr.trim_end()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }
}

impl SshClient {
    pub fn from_config(config: &DeploymentConfig) -> Result<Self> {
        let target = &config.target;
        let key = shellexpand::tilde(&target.ssh_key_path).to_string();

        let is_local = is_local_host(&target.server_address);
        if is_local {
            log_status!(
                "ssh",
                "Server '{}' is localhost, using local execution",
                target.server_address
            );
        } else if !std::path::Path::new(&key).exists() {
            return Err(Error::ssh_identity_file_not_found(key));
        }

        Ok(Self {
            host: target.server_address.clone(),
            user: target.ssh_user.clone(),
            port: config.settings.ssh_port,
            identity_file: Some(key),
            is_local,
        })
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Never prompt: a missing key or unknown password must fail, not hang.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    fn command_for(&self, command: &str) -> Command {
        if self.is_local {
            return local_shell(command);
        }

        let mut cmd = Command::new("ssh");
        cmd.args(self.build_ssh_args(command));
        cmd
    }
}

impl RemoteExecutor for SshClient {
    fn execute(&self, command: &str) -> CommandOutput {
        let mut cmd = self.command_for(command);
        cmd.stdin(Stdio::null());
        collect(cmd.output(), "SSH error")
    }

    fn write_file(&self, remote_path: &str, content: &str) -> CommandOutput {
        let remote_command = format!("cat > {}", shell::quote_path(remote_path));
        let cmd = self.command_for(&remote_command);
        run_with_stdin(cmd, content)
    }

    fn target(&self) -> TargetDetails {
        TargetDetails {
            host: self.host.clone(),
            user: self.user.clone(),
        }
    }

    fn is_transport_failure(&self, output: &CommandOutput) -> bool {
        // Without ssh in between, 255 is just the command's own status.
        if self.is_local {
            return output.exit_code == -1;
        }
        is_connection_error(output)
    }
}

fn local_shell(command: &str) -> Command {
    #[cfg(windows)]
    let cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    cmd
}

fn run_with_stdin(mut cmd: Command, content: &str) -> CommandOutput {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return CommandOutput::failed(-1, format!("SSH error: {}", e)),
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(content.as_bytes()) {
            let _ = child.kill();
            return CommandOutput::failed(-1, format!("Failed to stream file content: {}", e));
        }
        // stdin is dropped here so the remote `cat` sees EOF.
    }

    collect(child.wait_with_output(), "SSH error")
}

fn collect(output: std::io::Result<std::process::Output>, label: &str) -> CommandOutput {
    match output {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput::failed(-1, format!("{}: {}", label, e)),
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Check if a failure came from the SSH transport rather than the remote command.
///
/// ssh reserves exit status 255 for its own errors; -1 means the ssh process never ran.
pub fn is_connection_error(output: &CommandOutput) -> bool {
    output.exit_code == 255
        || (output.exit_code == -1 && output.stderr.to_lowercase().starts_with("ssh error"))
}
