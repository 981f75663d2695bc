//! Typed Nginx reverse-proxy server block.

use std::fmt;

/// Where proxied requests are forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// The application publishes a port on the host itself.
    Localhost { port: u16 },
    /// The application is a sibling service on a compose network.
    Service { name: String, port: u16 },
}

impl Upstream {
    pub fn url(&self) -> String {
        match self {
            Upstream::Localhost { port } => format!("http://localhost:{}", port),
            Upstream::Service { name, port } => format!("http://{}:{}", name, port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBlock {
    pub listen: u16,
    pub server_name: String,
    pub upstream: Upstream,
    pub headers: Vec<(String, String)>,
}

impl ServerBlock {
    /// Server block on port 80 forwarding the standard proxy headers.
    pub fn new(upstream: Upstream) -> Self {
        Self {
            listen: 80,
            server_name: "_".to_string(),
            upstream,
            headers: vec![
                ("Host".to_string(), "$host".to_string()),
                ("X-Real-IP".to_string(), "$remote_addr".to_string()),
                (
                    "X-Forwarded-For".to_string(),
                    "$proxy_add_x_forwarded_for".to_string(),
                ),
            ],
        }
    }

    pub fn forward_proto(mut self) -> Self {
        self.headers
            .push(("X-Forwarded-Proto".to_string(), "$scheme".to_string()));
        self
    }
}

impl fmt::Display for ServerBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "server {{")?;
        writeln!(f, "    listen {};", self.listen)?;
        writeln!(f, "    server_name {};", self.server_name)?;
        writeln!(f)?;
        writeln!(f, "    location / {{")?;
        writeln!(f, "        proxy_pass {};", self.upstream.url())?;
        for (name, value) in &self.headers {
            writeln!(f, "        proxy_set_header {} {};", name, value)?;
        }
        writeln!(f, "    }}")?;
        writeln!(f, "}}")
    }
}
