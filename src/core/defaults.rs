use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths;
use crate::target::{ProxyTopology, Runtime};

/// Root configuration structure for dockhand.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DockhandConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via dockhand.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_container_name")]
    pub container_name: String,

    #[serde(default)]
    pub proxy: ProxyTopology,

    #[serde(default)]
    pub runtime: Runtime,

    #[serde(default = "default_compose_command")]
    pub compose_command: String,

    #[serde(default = "default_true")]
    pub forward_proto: bool,

    #[serde(default = "default_true")]
    pub reset_directory: bool,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    #[serde(default = "default_packages")]
    pub packages: PackagesConfig,

    #[serde(default = "default_nginx")]
    pub nginx: NginxConfig,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            container_name: default_container_name(),
            proxy: ProxyTopology::default(),
            runtime: Runtime::default(),
            compose_command: default_compose_command(),
            forward_proto: true,
            reset_directory: true,
            ssh_port: default_ssh_port(),
            log_dir: None,
            packages: default_packages(),
            nginx: default_nginx(),
        }
    }
}

/// Package names passed to apt-get on the remote host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagesConfig {
    pub docker: String,
    pub compose: String,
    pub proxy: String,
}

/// Where the host Nginx keeps its server blocks, and the image used when it runs in a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NginxConfig {
    pub sites_available: String,
    pub sites_enabled: String,
    pub image: String,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_branch() -> String {
    "main".to_string()
}

fn default_container_name() -> String {
    "myapp".to_string()
}

fn default_compose_command() -> String {
    "docker-compose".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ssh_port() -> u16 {
    22
}

fn default_packages() -> PackagesConfig {
    PackagesConfig {
        docker: "docker.io".to_string(),
        compose: "docker-compose".to_string(),
        proxy: "nginx".to_string(),
    }
}

fn default_nginx() -> NginxConfig {
    NginxConfig {
        sites_available: "/etc/nginx/sites-available".to_string(),
        sites_enabled: "/etc/nginx/sites-enabled".to_string(),
        image: "nginx:alpine".to_string(),
    }
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load defaults from dockhand.json, or the built-in defaults when the file is absent.
pub fn load_defaults() -> Result<Defaults> {
    let path = paths::dockhand_json()?;
    Ok(load_config_from(&path)?.defaults)
}

/// Load a dockhand.json file. A missing file yields the built-in config;
/// a file that exists but does not parse is an error.
pub fn load_config_from(path: &Path) -> Result<DockhandConfig> {
    if !path.exists() {
        return Ok(DockhandConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Get built-in defaults (ignoring any file config)
pub fn builtin_defaults() -> Defaults {
    Defaults::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("dockhand.json")).unwrap();
        assert_eq!(config.defaults.branch, "main");
        assert_eq!(config.defaults.container_name, "myapp");
        assert_eq!(config.defaults.proxy, ProxyTopology::Host);
        assert_eq!(config.defaults.runtime, Runtime::Compose);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dockhand.json");
        fs::write(
            &path,
            r#"{"defaults": {"proxy": "container", "composeCommand": "docker compose"}}"#,
        )
        .unwrap();

        let defaults = load_config_from(&path).unwrap().defaults;
        assert_eq!(defaults.proxy, ProxyTopology::Container);
        assert_eq!(defaults.compose_command, "docker compose");
        assert_eq!(defaults.ssh_port, 22);
        assert!(defaults.reset_directory);
        assert_eq!(defaults.nginx.image, "nginx:alpine");
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dockhand.json");
        fs::write(&path, "{not json").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");
    }
}
