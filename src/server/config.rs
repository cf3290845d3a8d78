use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::coordinator::{StoreConfig, TagReplayPolicy};
use crate::error::ServerIndex;
use crate::{Error, Result};

/// Node configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address to bind to.
    pub host: String,
    /// Port of server 0; server `i` listens on `base_port + i`.
    pub base_port: u16,
    /// Host peers are reached at when `peers` is empty.
    pub peer_host: String,
    /// Explicit peer base URLs in server index order.
    #[serde(default)]
    pub peers: Vec<String>,
    /// Bound on every call to a peer.
    pub rpc_timeout_ms: u64,
    /// Time to live of an authentication session.
    pub session_ttl_secs: u64,
    /// Interval of the expired-session sweep.
    pub cleanup_interval_secs: u64,
    /// Maximum number of live sessions.
    pub max_sessions: usize,
    /// Handling of a linkage tag that is bound a second time.
    pub tag_replay: TagReplayPolicy,
    /// Rate limiting of the client-facing endpoints.
    pub rate_limit: RateLimitSettings,
    /// Metrics exporter configuration.
    pub metrics: MetricsSettings,
}

/// Rate limiting settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum sustained requests per minute.
    pub requests_per_minute: u64,
    /// Burst capacity for short-term spikes.
    pub burst: u64,
}

/// Metrics exporter settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics export is enabled.
    pub enabled: bool,
    /// Hostname or IP address for metrics server.
    pub host: String,
    /// Port number for metrics server.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: 12345,
            peer_host: "127.0.0.1".to_string(),
            peers: Vec::new(),
            rpc_timeout_ms: 10_000,
            session_ttl_secs: 300,
            cleanup_interval_secs: 60,
            max_sessions: 10_000,
            tag_replay: TagReplayPolicy::Reject,
            rate_limit: RateLimitSettings {
                requests_per_minute: 600,
                burst: 50,
            },
            metrics: MetricsSettings {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 9090,
            },
        }
    }
}

impl ServerConfig {
    /// Loads configuration from defaults, `.env`, a TOML file and the environment.
    ///
    /// Priority, highest first:
    /// 1. Environment variables with the `DAGA_` prefix, `__` separating nested keys
    ///    (e.g. `DAGA_RATE_LIMIT__BURST=20`)
    /// 2. TOML file at `DAGA_CONFIG_PATH` (default `config/server.toml`), if present
    /// 3. `.env` file, if present
    /// 4. Built-in defaults
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> figment::error::Result<Self> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        let _ = dotenvy::dotenv();

        let config_path = std::env::var("DAGA_CONFIG_PATH")
            .unwrap_or_else(|_| "config/server.toml".to_string());

        Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("DAGA_").split("__"))
            .extract()
    }

    /// Rejects values the node cannot run with.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.rpc_timeout_ms == 0, "rpc_timeout_ms cannot be zero"),
            (self.session_ttl_secs == 0, "session_ttl_secs cannot be zero"),
            (self.cleanup_interval_secs == 0, "cleanup_interval_secs cannot be zero"),
            (self.max_sessions == 0, "max_sessions cannot be zero"),
            (
                self.rate_limit.requests_per_minute == 0,
                "Rate limit requests_per_minute cannot be zero",
            ),
            (self.rate_limit.burst == 0, "Rate limit burst cannot be zero"),
        ];
        if let Some((_, message)) = checks.iter().find(|(failed, _)| *failed) {
            return Err(Error::Config((*message).to_string()));
        }

        for peer in &self.peers {
            if !(peer.starts_with("http://") || peer.starts_with("https://")) {
                return Err(Error::Config(format!("Peer URL '{peer}' has no http scheme")));
            }
        }

        Ok(())
    }

    /// Checks that the configuration can address every server of a group of `servers`.
    pub fn validate_for_group(&self, servers: usize) -> Result<()> {
        if !self.peers.is_empty() && self.peers.len() != servers {
            return Err(Error::Config(format!(
                "{} peer URLs configured for a group of {servers} servers",
                self.peers.len()
            )));
        }
        if usize::from(self.base_port) + servers > usize::from(u16::MAX) + 1 {
            return Err(Error::Config(format!(
                "base_port {} leaves no room for {servers} servers",
                self.base_port
            )));
        }
        Ok(())
    }

    /// Listening port of server `index`.
    pub fn port_for(&self, index: ServerIndex) -> Result<u16> {
        u16::try_from(index)
            .ok()
            .and_then(|offset| self.base_port.checked_add(offset))
            .ok_or_else(|| Error::Config(format!("No port for server {index}")))
    }

    /// Socket address to listen on for server `index`, or `port` when given.
    pub fn listen_addr(&self, index: ServerIndex, port: Option<u16>) -> Result<SocketAddr> {
        let port = match port {
            Some(port) => port,
            None => self.port_for(index)?,
        };
        format!("{}:{}", self.host, port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address {}:{port}: {e}", self.host)))
    }

    /// Base URL of every server in index order.
    pub fn peer_urls(&self, servers: usize) -> Result<Vec<String>> {
        self.validate_for_group(servers)?;
        if !self.peers.is_empty() {
            return Ok(self
                .peers
                .iter()
                .map(|url| url.trim_end_matches('/').to_string())
                .collect());
        }
        (0..servers)
            .map(|index| Ok(format!("http://{}:{}", self.peer_host, self.port_for(index)?)))
            .collect()
    }

    /// Peer call timeout.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Interval of the expired-session sweep.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Session store settings.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            session_ttl: Duration::from_secs(self.session_ttl_secs),
            max_sessions: self.max_sessions,
            tag_replay: self.tag_replay,
        }
    }
}

impl MetricsSettings {
    /// Socket address of the metrics exporter.
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            Error::Config(format!(
                "Invalid metrics address {}:{}: {e}",
                self.host, self.port
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ServerConfig {
            rpc_timeout_ms: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn peer_urls_follow_base_port() {
        let config = ServerConfig::default();
        assert_eq!(
            config.peer_urls(3).unwrap(),
            vec![
                "http://127.0.0.1:12345",
                "http://127.0.0.1:12346",
                "http://127.0.0.1:12347",
            ]
        );
    }

    #[test]
    fn explicit_peers_must_cover_group() {
        let config = ServerConfig {
            peers: vec!["http://a:1/".to_string(), "http://b:2".to_string()],
            ..ServerConfig::default()
        };
        assert_eq!(config.peer_urls(2).unwrap(), vec!["http://a:1", "http://b:2"]);
        assert!(config.peer_urls(3).is_err());
    }

    #[test]
    fn listen_addr_uses_index_offset() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr(2, None).unwrap().port(), 12347);
        assert_eq!(config.listen_addr(2, Some(8080)).unwrap().port(), 8080);
    }

    #[test]
    fn store_config_carries_policy() {
        let config = ServerConfig {
            tag_replay: TagReplayPolicy::Overwrite,
            session_ttl_secs: 7,
            ..ServerConfig::default()
        };
        let store = config.store_config();
        assert_eq!(store.tag_replay, TagReplayPolicy::Overwrite);
        assert_eq!(store.session_ttl, Duration::from_secs(7));
    }
}
