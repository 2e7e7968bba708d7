use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the edge compose server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub template_root: PathBuf,
    pub default_timeout: Duration,
    pub debug: bool,
    pub debugger_link: String,
    pub gateway_bases: GatewayBases,
    pub static_cache_max_age: u64,
    pub enable_cors: bool,
}

/// Maps a `<fragment from="…">` gateway id to its base URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayBases(pub HashMap<String, String>);

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("failed to parse BIND_ADDR")?;

        let template_root = PathBuf::from(
            std::env::var("TEMPLATE_ROOT").unwrap_or_else(|_| "templates".to_string()),
        );

        let default_timeout = std::env::var("DEFAULT_FRAGMENT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(5_000));

        let debug = std::env::var("PUZZLE_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let debugger_link = std::env::var("PUZZLE_DEBUGGER_LINK")
            .unwrap_or_else(|_| "/__puzzle/debugger.js".to_string());

        let gateway_bases = std::env::var("GATEWAY_BASES_JSON")
            .ok()
            .and_then(|v| serde_json::from_str::<HashMap<String, String>>(&v).ok())
            .map(GatewayBases)
            .unwrap_or_default();

        let static_cache_max_age = std::env::var("STATIC_CACHE_MAX_AGE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(31_557_600);

        let enable_cors = std::env::var("ENABLE_CORS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            template_root,
            default_timeout,
            debug,
            debugger_link,
            gateway_bases,
            static_cache_max_age,
            enable_cors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_bases_default_to_empty() {
        let bases = GatewayBases::default();
        assert!(bases.0.is_empty());
    }
}
