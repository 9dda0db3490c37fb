//! veapd configuration
//!
//! Loaded from an optional TOML file; every setting has a default.
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:2121"
//! url_prefix = ""
//! request_size_limit = 1048576
//! history_size_limit = 10000
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use veap_server::{DEFAULT_HISTORY_SIZE_LIMIT, DEFAULT_REQUEST_SIZE_LIMIT};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address of the HTTP server.
    pub listen: String,
    /// URL prefix the VEAP tree is mounted at, without a trailing slash.
    pub url_prefix: String,
    /// Maximum accepted request body size in bytes.
    pub request_size_limit: usize,
    /// Maximum number of history entries returned per request.
    pub history_size_limit: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:2121".to_string(),
            url_prefix: String::new(),
            request_size_limit: DEFAULT_REQUEST_SIZE_LIMIT,
            history_size_limit: DEFAULT_HISTORY_SIZE_LIMIT,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
    }
}
