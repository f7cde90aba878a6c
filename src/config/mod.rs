//! Server configuration.
//!
//! Configuration comes from three layers, highest priority first: YAML file,
//! environment variables (including those loaded from `.env` at startup),
//! then defaults. `from_env` skips the YAML layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod yaml;

use crate::auth::{CommandTokenSource, StaticTokenSource, TokenSource};
use crate::core::mcp::ToolServerConfig;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_SETUP_TIMEOUT_SECS: u64 = 10;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Covers the listener (host, port, TLS, CORS), the live bridge (setup
/// timeout, upstream credential strategy) and the MCP tool servers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    pub tls: Option<TlsConfig>,

    /// CORS allowed origins (comma-separated list or "*" for all).
    /// Default: None (same-origin only).
    pub cors_allowed_origins: Option<String>,

    /// How long `/ws/live` waits for the client's setup frame.
    pub setup_timeout: Duration,

    /// Fixed bearer token for upstream connections. Takes precedence over
    /// `token_command` when both are set.
    pub upstream_bearer_token: Option<String>,

    /// External command whose trimmed stdout becomes the upstream bearer
    /// token (e.g. `gcloud auth print-access-token`).
    pub token_command: Option<String>,

    /// MCP tool servers to route listings and calls across.
    pub tool_servers: Vec<ToolServerConfig>,
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults only.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::merge(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file layered over the environment.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = Self::merge(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn merge(yaml: Option<yaml::YamlConfig>) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml = yaml.unwrap_or_default();

        let host = yaml
            .host
            .or_else(|| std::env::var("HOST").ok())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match yaml.port {
            Some(port) => port,
            None => match std::env::var("PORT") {
                Ok(raw) => raw.parse().map_err(|_| format!("Invalid PORT: {raw}"))?,
                Err(_) => DEFAULT_PORT,
            },
        };

        let tls = match yaml.tls {
            Some(tls) => Some(TlsConfig {
                cert_path: PathBuf::from(tls.cert_path),
                key_path: PathBuf::from(tls.key_path),
            }),
            None => {
                let cert = std::env::var("TLS_CERT_PATH").ok();
                let key = std::env::var("TLS_KEY_PATH").ok();
                match (cert, key) {
                    (Some(cert), Some(key)) => Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    }),
                    (None, None) => None,
                    _ => {
                        return Err(
                            "TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()
                        );
                    }
                }
            }
        };

        let cors_allowed_origins = yaml
            .cors_allowed_origins
            .or_else(|| std::env::var("CORS_ALLOWED_ORIGINS").ok());

        let setup_timeout_seconds = match yaml.setup_timeout_seconds {
            Some(secs) => secs,
            None => match std::env::var("SETUP_TIMEOUT_SECONDS") {
                Ok(raw) => raw
                    .parse()
                    .map_err(|_| format!("Invalid SETUP_TIMEOUT_SECONDS: {raw}"))?,
                Err(_) => DEFAULT_SETUP_TIMEOUT_SECS,
            },
        };

        let upstream_bearer_token = yaml
            .upstream_bearer_token
            .or_else(|| std::env::var("UPSTREAM_BEARER_TOKEN").ok());

        let token_command = yaml
            .token_command
            .or_else(|| std::env::var("TOKEN_COMMAND").ok());

        Ok(Self {
            host,
            port,
            tls,
            cors_allowed_origins,
            setup_timeout: Duration::from_secs(setup_timeout_seconds),
            upstream_bearer_token,
            token_command,
            tool_servers: yaml.tool_servers,
        })
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.setup_timeout.is_zero() {
            return Err("setup_timeout_seconds must be greater than zero".into());
        }
        let mut names: Vec<&str> = self.tool_servers.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.tool_servers.len() {
            return Err("tool_servers entries must have unique names".into());
        }
        Ok(())
    }

    /// Get the server address as a string in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Build the token source for upstream connections.
    ///
    /// A configured static token wins, then a token command; with neither
    /// configured the `gcloud` credential helper is used.
    pub fn token_source(&self) -> Result<Arc<dyn TokenSource>, Box<dyn std::error::Error>> {
        if let Some(ref token) = self.upstream_bearer_token {
            return Ok(Arc::new(StaticTokenSource::new(token.clone())));
        }
        if let Some(ref command) = self.token_command {
            return Ok(Arc::new(CommandTokenSource::new(command)?));
        }
        Ok(Arc::new(CommandTokenSource::gcloud()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "localhost".to_string(),
            port: 3001,
            tls: None,
            cors_allowed_origins: None,
            setup_timeout: Duration::from_secs(10),
            upstream_bearer_token: None,
            token_command: None,
            tool_servers: Vec::new(),
        }
    }

    #[test]
    fn address_joins_host_and_port() {
        let config = test_config();
        assert_eq!(config.address(), "localhost:3001");
        assert!(!config.is_tls_enabled());
    }

    #[test]
    fn yaml_overrides_defaults() {
        let yaml = "host: 127.0.0.1\nport: 9999\nsetup_timeout_seconds: 3\n";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9999);
        assert_eq!(config.setup_timeout, Duration::from_secs(3));
    }

    #[test]
    fn zero_setup_timeout_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"setup_timeout_seconds: 0\n").unwrap();
        assert!(ServerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn duplicate_tool_server_names_are_rejected() {
        let yaml = "tool_servers:\n  - name: a\n    transport: http\n    url: http://x/mcp\n  - name: a\n    transport: http\n    url: http://y/mcp\n";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        assert!(ServerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn static_token_wins_over_command() {
        let mut config = test_config();
        config.upstream_bearer_token = Some("tok".to_string());
        config.token_command = Some("echo other".to_string());
        // Just confirm construction succeeds; the source type is opaque.
        assert!(config.token_source().is_ok());
    }
}
