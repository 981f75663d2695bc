//! Typed compose descriptor.
//!
//! Maps are `BTreeMap` so serialization order never depends on insertion
//! order or hashing; the same model always yields the same bytes.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

pub const COMPOSE_VERSION: &str = "3.8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeFile {
    pub version: String,
    pub services: BTreeMap<String, Service>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, Network>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub container_name: String,
    pub restart: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expose: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub driver: String,
}

impl ComposeFile {
    pub fn new() -> Self {
        Self {
            version: COMPOSE_VERSION.to_string(),
            services: BTreeMap::new(),
            networks: BTreeMap::new(),
        }
    }

    pub fn service(mut self, name: impl Into<String>, service: Service) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    pub fn bridge_network(mut self, name: impl Into<String>) -> Self {
        self.networks.insert(
            name.into(),
            Network {
                driver: "bridge".to_string(),
            },
        );
        self
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self)
            .map_err(|e| Error::internal_unexpected(format!("serialize compose file: {}", e)))
    }
}

impl Default for ComposeFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Service {
    fn empty(container_name: impl Into<String>) -> Self {
        Self {
            build: None,
            image: None,
            container_name: container_name.into(),
            restart: "unless-stopped".to_string(),
            ports: Vec::new(),
            expose: Vec::new(),
            volumes: Vec::new(),
            depends_on: Vec::new(),
            networks: Vec::new(),
        }
    }

    /// A service built from a Dockerfile in `context`.
    pub fn build(context: impl Into<String>, container_name: impl Into<String>) -> Self {
        let mut service = Self::empty(container_name);
        service.build = Some(context.into());
        service
    }

    /// A service run from a published image.
    pub fn image(image: impl Into<String>, container_name: impl Into<String>) -> Self {
        let mut service = Self::empty(container_name);
        service.image = Some(image.into());
        service
    }

    /// Publish `host` on the host, forwarding to `container`.
    pub fn port(mut self, host: u16, container: u16) -> Self {
        self.ports.push(format!("{}:{}", host, container));
        self
    }

    /// Make `port` reachable from sibling services only.
    pub fn expose(mut self, port: u16) -> Self {
        self.expose.push(port.to_string());
        self
    }

    pub fn volume(mut self, spec: impl Into<String>) -> Self {
        self.volumes.push(spec.into());
        self
    }

    pub fn depends_on(mut self, service: impl Into<String>) -> Self {
        self.depends_on.push(service.into());
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.networks.push(network.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn services_serialize_in_name_order() {
        let file = ComposeFile::new()
            .service("nginx", Service::image("nginx:alpine", "myapp-nginx"))
            .service("app", Service::build(".", "myapp"));

        let yaml = file.to_yaml().unwrap();
        let app = yaml.find("app:").unwrap();
        let nginx = yaml.find("nginx:").unwrap();
        assert!(app < nginx);
    }

    #[test]
    fn empty_lists_are_omitted() {
        let yaml = ComposeFile::new()
            .service("app", Service::build(".", "myapp"))
            .to_yaml()
            .unwrap();

        assert!(!yaml.contains("expose"));
        assert!(!yaml.contains("depends_on"));
        assert!(!yaml.contains("networks"));
        assert!(yaml.contains("container_name: myapp"));
    }

    #[test]
    fn bridge_network_is_declared() {
        let yaml = ComposeFile::new()
            .service("app", Service::build(".", "myapp").network("app-network"))
            .bridge_network("app-network")
            .to_yaml()
            .unwrap();

        let parsed: serde_yml::Value = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed["networks"]["app-network"]["driver"].as_str(),
            Some("bridge")
        );
    }
}
