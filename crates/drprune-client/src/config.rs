use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CATALOG_PAGE_SIZE: u32 = 100_000;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Accept invalid TLS certificates.
    pub skip_verify: bool,
    /// `n` sent with catalog requests.
    pub page_size: u32,
    pub connect_timeout: Duration,
}

impl RegistryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            skip_verify: false,
            page_size: DEFAULT_CATALOG_PAGE_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsulConfig {
    pub addr: String,
    pub token: Option<String>,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:8500".into(),
            token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NomadConfig {
    pub addr: String,
    pub token: Option<String>,
    /// `nomad` binary used for `alloc exec`.
    pub binary: String,
}

impl Default for NomadConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:4646".into(),
            token: None,
            binary: "nomad".into(),
        }
    }
}
