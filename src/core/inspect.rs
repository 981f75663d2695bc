//! Remote state inspection.
//!
//! State is re-read from the host every time it is needed and never cached.

use serde::Serialize;

use crate::error::Result;
use crate::executor::RemoteExecutor;
use crate::provision::{Session, Step};
use crate::target::DeploymentConfig;
use crate::utils::shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteState {
    Absent,
    Present,
}

impl RemoteState {
    pub fn is_present(&self) -> bool {
        matches!(self, RemoteState::Present)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectReport {
    pub host: String,
    pub app_dir: String,
    pub repository: RemoteState,
    pub container: RemoteState,
    pub container_name: String,
}

pub fn repo_check_command(app_dir: &str) -> String {
    format!(
        "if [ -d {} ]; then echo present; else echo absent; fi",
        shell::quote_path(&format!("{}/.git", app_dir))
    )
}

pub fn container_check_command(container_name: &str) -> String {
    format!(
        "if command -v docker >/dev/null 2>&1; then docker ps -a --filter {} --format {}; fi",
        shell::quote_arg(&format!("name=^/{}$", container_name)),
        shell::quote_arg("{{.Names}}")
    )
}

/// Does the application directory hold a git working tree?
pub fn repository<E: RemoteExecutor>(
    session: &mut Session<E>,
    step: Step,
    config: &DeploymentConfig,
) -> Result<RemoteState> {
    let output = session.run(step, &repo_check_command(&config.settings.app_dir))?;
    Ok(if output.stdout.trim() == "present" {
        RemoteState::Present
    } else {
        RemoteState::Absent
    })
}

/// Does a container with the reserved name exist, running or stopped?
pub fn container<E: RemoteExecutor>(
    session: &mut Session<E>,
    step: Step,
    config: &DeploymentConfig,
) -> Result<RemoteState> {
    let name = &config.settings.container_name;
    let output = session.run(step, &container_check_command(name))?;
    Ok(if output.stdout.lines().any(|l| l.trim() == name) {
        RemoteState::Present
    } else {
        RemoteState::Absent
    })
}

/// Read both states without changing anything on the host.
pub fn inspect<E: RemoteExecutor>(
    session: &mut Session<E>,
    config: &DeploymentConfig,
) -> Result<InspectReport> {
    let repository = repository(session, Step::Inspect, config)?;
    let container = container(session, Step::Inspect, config)?;

    Ok(InspectReport {
        host: session.host(),
        app_dir: config.settings.app_dir.clone(),
        repository,
        container,
        container_name: config.settings.container_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_check_quotes_marker_path() {
        assert_eq!(
            repo_check_command("/home/deploy/app"),
            "if [ -d '/home/deploy/app/.git' ]; then echo present; else echo absent; fi"
        );
    }

    #[test]
    fn container_check_anchors_name() {
        let cmd = container_check_command("myapp");
        assert!(cmd.contains("--filter 'name=^/myapp$'"));
        assert!(cmd.contains("--format '{{.Names}}'"));
    }
}
