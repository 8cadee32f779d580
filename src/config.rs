//! HTTP server configuration.

use anyhow::bail;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port; the web frontend talks to this one.
pub const DEFAULT_PORT: u16 = 5001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if self.port == 0 {
            bail!("port must be greater than 0");
        }
        if let Some(o) = self.cors_origins.iter().find(|o| o.trim().is_empty()) {
            bail!("invalid CORS origin: {:?}", o);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_url(&self) -> String {
        format!("http://{}", self.bind_addr())
    }
}
