//! Rendering of the compose and reverse-proxy descriptors.
//!
//! Output is a pure function of [`RenderParams`]: no timestamps, no host
//! lookups, no map iteration order. Identical params give identical bytes.

pub mod compose;
pub mod nginx;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::target::ProxyTopology;

use compose::{ComposeFile, Service};
use nginx::{ServerBlock, Upstream};

/// Compose service name of the application.
pub const APP_SERVICE: &str = "app";
/// Compose service name of the containerized proxy.
pub const PROXY_SERVICE: &str = "nginx";
/// Network shared by the application and the containerized proxy.
pub const APP_NETWORK: &str = "app-network";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderParams {
    pub app_port: u16,
    pub container_name: String,
    pub proxy: ProxyTopology,
    pub forward_proto: bool,
    pub nginx_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedConfig {
    pub compose: String,
    pub proxy: String,
}

impl RenderedConfig {
    /// SHA-256 over both descriptors, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.compose.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.proxy.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

pub fn compose_file(params: &RenderParams) -> ComposeFile {
    let app = Service::build(".", params.container_name.clone());

    match params.proxy {
        ProxyTopology::Host => ComposeFile::new().service(
            APP_SERVICE,
            app.port(params.app_port, params.app_port),
        ),
        ProxyTopology::Container => {
            let proxy = Service::image(
                params.nginx_image.clone(),
                format!("{}-nginx", params.container_name),
            )
            .port(80, 80)
            .volume("./nginx.conf:/etc/nginx/conf.d/default.conf:ro")
            .depends_on(APP_SERVICE)
            .network(APP_NETWORK);

            ComposeFile::new()
                .service(
                    APP_SERVICE,
                    app.expose(params.app_port).network(APP_NETWORK),
                )
                .service(PROXY_SERVICE, proxy)
                .bridge_network(APP_NETWORK)
        }
    }
}

pub fn server_block(params: &RenderParams) -> ServerBlock {
    let upstream = match params.proxy {
        ProxyTopology::Host => Upstream::Localhost {
            port: params.app_port,
        },
        ProxyTopology::Container => Upstream::Service {
            name: APP_SERVICE.to_string(),
            port: params.app_port,
        },
    };

    let block = ServerBlock::new(upstream);
    if params.forward_proto {
        block.forward_proto()
    } else {
        block
    }
}

pub fn render(params: &RenderParams) -> Result<RenderedConfig> {
    Ok(RenderedConfig {
        compose: compose_file(params).to_yaml()?,
        proxy: server_block(params).to_string(),
    })
}
