//! Deployment target and the settings that shape a provisioning run.
//!
//! Operator input arrives piecemeal (defaults file, JSON spec, CLI flags,
//! prompts) as a [`TargetInput`]; [`TargetInput::resolve`] validates it once
//! and produces the immutable [`DeploymentConfig`] the provisioner consumes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::defaults::{Defaults, NginxConfig, PackagesConfig};
use crate::error::{Error, Result};
use crate::render::RenderParams;
use crate::utils::validation;

/// Where the reverse proxy runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyTopology {
    /// Nginx installed on the host, forwarding to `localhost:<port>`.
    #[default]
    Host,
    /// Nginx as a sibling compose service, forwarding to `app:<port>`.
    Container,
}

impl ProxyTopology {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyTopology::Host => "host",
            ProxyTopology::Container => "container",
        }
    }
}

impl fmt::Display for ProxyTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyTopology {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "host" => Ok(ProxyTopology::Host),
            "container" => Ok(ProxyTopology::Container),
            other => Err(format!(
                "unknown proxy topology '{}' (expected host or container)",
                other
            )),
        }
    }
}

/// How the application container is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Runtime {
    #[default]
    Compose,
    DockerRun,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Compose => "compose",
            Runtime::DockerRun => "docker-run",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Runtime {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "compose" => Ok(Runtime::Compose),
            "docker-run" => Ok(Runtime::DockerRun),
            other => Err(format!(
                "unknown runtime '{}' (expected compose or docker-run)",
                other
            )),
        }
    }
}

/// The seven operator inputs of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTarget {
    pub repo_url: String,
    #[serde(skip_serializing)]
    pub auth_token: String,
    pub branch: String,
    pub ssh_user: String,
    pub server_address: String,
    pub ssh_key_path: String,
    pub app_port: u16,
}

/// Everything about a run that is not an operator input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionSettings {
    pub app_dir: String,
    pub container_name: String,
    pub project_name: String,
    pub proxy: ProxyTopology,
    pub runtime: Runtime,
    pub compose_command: String,
    pub forward_proto: bool,
    pub reset_directory: bool,
    pub ssh_port: u16,
    pub packages: PackagesConfig,
    pub nginx: NginxConfig,
}

/// Immutable configuration passed through every provisioning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    pub target: DeploymentTarget,
    pub settings: ProvisionSettings,
}

impl DeploymentConfig {
    pub fn render_params(&self) -> RenderParams {
        RenderParams {
            app_port: self.target.app_port,
            container_name: self.settings.container_name.clone(),
            proxy: self.settings.proxy,
            forward_proto: self.settings.forward_proto,
            nginx_image: self.settings.nginx.image.clone(),
        }
    }

    /// Path of the rendered compose descriptor on the remote host.
    pub fn compose_path(&self) -> String {
        format!("{}/docker-compose.yml", self.settings.app_dir)
    }

    /// Path of the rendered proxy descriptor on the remote host.
    pub fn proxy_path(&self) -> String {
        format!("{}/nginx.conf", self.settings.app_dir)
    }

    /// Host Nginx server block installed by this tool.
    pub fn site_available_path(&self) -> String {
        format!(
            "{}/{}",
            self.settings.nginx.sites_available, self.settings.container_name
        )
    }

    /// Symlink enabling the host Nginx server block.
    pub fn site_enabled_path(&self) -> String {
        format!(
            "{}/{}",
            self.settings.nginx.sites_enabled, self.settings.container_name
        )
    }
}

/// Operator input before validation. Every field is optional so sources can be layered.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetInput {
    pub repo_url: Option<String>,
    pub auth_token: Option<String>,
    pub branch: Option<String>,
    pub ssh_user: Option<String>,
    pub server_address: Option<String>,
    pub ssh_key_path: Option<String>,
    pub app_port: Option<u16>,

    pub app_dir: Option<String>,
    pub container_name: Option<String>,
    pub project_name: Option<String>,
    pub proxy: Option<ProxyTopology>,
    pub runtime: Option<Runtime>,
    pub compose_command: Option<String>,
    pub forward_proto: Option<bool>,
    pub reset_directory: Option<bool>,
    pub ssh_port: Option<u16>,
}

/// One operator input the CLI may ask for interactively.
#[derive(Debug, Clone, Copy)]
pub struct Prompt {
    pub key: &'static str,
    pub label: &'static str,
    pub secret: bool,
    pub required: bool,
}

pub const PROMPTS: &[Prompt] = &[
    Prompt { key: "repoUrl", label: "Git repository URL (https)", secret: false, required: true },
    Prompt { key: "authToken", label: "Access token (empty for public repos)", secret: true, required: false },
    Prompt { key: "branch", label: "Branch (default: main)", secret: false, required: false },
    Prompt { key: "sshUser", label: "SSH username", secret: false, required: true },
    Prompt { key: "serverAddress", label: "Server address", secret: false, required: true },
    Prompt { key: "sshKeyPath", label: "Path to SSH private key", secret: false, required: true },
    Prompt { key: "appPort", label: "Application port", secret: false, required: true },
];

impl TargetInput {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            Error::validation_invalid_json(
                e,
                Some("parse target spec".to_string()),
                Some(raw.chars().take(200).collect::<String>()),
            )
        })
    }

    /// Layer `other` on top of `self`; fields set in `other` win.
    pub fn overlay(self, other: TargetInput) -> TargetInput {
        TargetInput {
            repo_url: other.repo_url.or(self.repo_url),
            auth_token: other.auth_token.or(self.auth_token),
            branch: other.branch.or(self.branch),
            ssh_user: other.ssh_user.or(self.ssh_user),
            server_address: other.server_address.or(self.server_address),
            ssh_key_path: other.ssh_key_path.or(self.ssh_key_path),
            app_port: other.app_port.or(self.app_port),
            app_dir: other.app_dir.or(self.app_dir),
            container_name: other.container_name.or(self.container_name),
            project_name: other.project_name.or(self.project_name),
            proxy: other.proxy.or(self.proxy),
            runtime: other.runtime.or(self.runtime),
            compose_command: other.compose_command.or(self.compose_command),
            forward_proto: other.forward_proto.or(self.forward_proto),
            reset_directory: other.reset_directory.or(self.reset_directory),
            ssh_port: other.ssh_port.or(self.ssh_port),
        }
    }

    pub fn is_set(&self, key: &str) -> bool {
        match key {
            "repoUrl" => self.repo_url.is_some(),
            "authToken" => self.auth_token.is_some(),
            "branch" => self.branch.is_some(),
            "sshUser" => self.ssh_user.is_some(),
            "serverAddress" => self.server_address.is_some(),
            "sshKeyPath" => self.ssh_key_path.is_some(),
            "appPort" => self.app_port.is_some(),
            _ => false,
        }
    }

    /// Prompts whose value is still unset.
    pub fn pending_prompts(&self) -> Vec<Prompt> {
        PROMPTS
            .iter()
            .copied()
            .filter(|p| !self.is_set(p.key))
            .collect()
    }

    /// Required inputs that are still unset.
    pub fn missing_required(&self) -> Vec<String> {
        self.pending_prompts()
            .into_iter()
            .filter(|p| p.required)
            .map(|p| p.key.to_string())
            .collect()
    }

    /// Set an operator input from its prompt key. Empty answers to optional prompts are kept
    /// as empty (token) or left unset (branch) so defaults still apply.
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        let value = value.trim().to_string();
        match key {
            "repoUrl" => self.repo_url = Some(value),
            "authToken" => self.auth_token = Some(value),
            "branch" => self.branch = Some(value).filter(|v| !v.is_empty()),
            "sshUser" => self.ssh_user = Some(value),
            "serverAddress" => self.server_address = Some(value),
            "sshKeyPath" => self.ssh_key_path = Some(value),
            "appPort" => {
                let port = value.parse::<u16>().map_err(|_| {
                    Error::validation_invalid_argument(
                        "appPort",
                        "Port must be a number between 1 and 65535",
                        Some(value.clone()),
                    )
                })?;
                self.app_port = Some(port);
            }
            other => {
                return Err(Error::validation_invalid_argument(
                    other,
                    "Unknown target field",
                    None,
                ))
            }
        }
        Ok(())
    }

    /// Validate and freeze the input into a [`DeploymentConfig`].
    pub fn resolve(self, defaults: &Defaults) -> Result<DeploymentConfig> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(Error::validation_missing_argument(missing));
        }

        let params = self.render_params(defaults)?;

        let repo_url = self.repo_url.unwrap_or_default();
        validation::require_https_url(repo_url.trim(), "repoUrl")?;
        let ssh_user = validation::require_non_empty(
            self.ssh_user.as_deref().unwrap_or_default(),
            "sshUser",
            "SSH username cannot be empty",
        )?
        .to_string();
        let server_address = validation::require_non_empty(
            self.server_address.as_deref().unwrap_or_default(),
            "serverAddress",
            "Server address cannot be empty",
        )?
        .to_string();
        let ssh_key_path = validation::require_non_empty(
            self.ssh_key_path.as_deref().unwrap_or_default(),
            "sshKeyPath",
            "SSH key path cannot be empty",
        )?;
        let ssh_key_path = shellexpand::tilde(ssh_key_path).to_string();

        let branch = self
            .branch
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| defaults.branch.clone());

        let app_dir = self
            .app_dir
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("/home/{}/app", ssh_user));
        if !app_dir.starts_with('/') || app_dir.trim_end_matches('/').is_empty() {
            return Err(Error::config_invalid_value(
                "appDir",
                Some(app_dir),
                "Application directory must be an absolute path other than /",
            ));
        }
        let app_dir = app_dir.trim_end_matches('/').to_string();

        let project_name = self
            .project_name
            .unwrap_or_else(|| params.container_name.clone());
        validation::require_container_name(&project_name, "projectName")?;

        let ssh_port = validation::require_port(
            self.ssh_port.unwrap_or(defaults.ssh_port),
            "sshPort",
        )?;

        Ok(DeploymentConfig {
            target: DeploymentTarget {
                repo_url: repo_url.trim().to_string(),
                auth_token: self.auth_token.unwrap_or_default(),
                branch,
                ssh_user,
                server_address,
                ssh_key_path,
                app_port: params.app_port,
            },
            settings: ProvisionSettings {
                app_dir,
                container_name: params.container_name,
                project_name,
                proxy: params.proxy,
                runtime: self.runtime.unwrap_or(defaults.runtime),
                compose_command: self
                    .compose_command
                    .unwrap_or_else(|| defaults.compose_command.clone()),
                forward_proto: params.forward_proto,
                reset_directory: self.reset_directory.unwrap_or(defaults.reset_directory),
                ssh_port,
                packages: defaults.packages.clone(),
                nginx: defaults.nginx.clone(),
            },
        })
    }

    /// The subset of input that determines the rendered descriptors. Only `appPort` is required.
    pub fn render_params(&self, defaults: &Defaults) -> Result<RenderParams> {
        let app_port = validation::require(
            self.app_port,
            "appPort",
            "Application port is required",
        )?;
        let app_port = validation::require_port(app_port, "appPort")?;

        let container_name = self
            .container_name
            .clone()
            .unwrap_or_else(|| defaults.container_name.clone());
        validation::require_container_name(&container_name, "containerName")?;

        let proxy = self.proxy.unwrap_or(defaults.proxy);
        let runtime = self.runtime.unwrap_or(defaults.runtime);
        if runtime == Runtime::DockerRun && proxy == ProxyTopology::Container {
            return Err(Error::config_invalid_value(
                "runtime",
                Some(runtime.to_string()),
                "The docker-run runtime has no compose network; use the host proxy topology",
            ));
        }

        Ok(RenderParams {
            app_port,
            container_name,
            proxy,
            forward_proto: self.forward_proto.unwrap_or(defaults.forward_proto),
            nginx_image: defaults.nginx.image.clone(),
        })
    }
}
