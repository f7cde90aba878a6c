//! YAML configuration file loading.
//!
//! Every field is optional; anything absent falls back to the value the
//! environment (or a default) provided.

use std::path::Path;

use serde::Deserialize;

use crate::core::mcp::ToolServerConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<YamlTlsConfig>,
    pub cors_allowed_origins: Option<String>,
    /// Seconds to wait for a client's setup frame on `/ws/live`.
    pub setup_timeout_seconds: Option<u64>,
    /// Fixed bearer token for upstream connections.
    pub upstream_bearer_token: Option<String>,
    /// Command whose stdout is used as the upstream bearer token.
    pub token_command: Option<String>,
    #[serde(default)]
    pub tool_servers: Vec<ToolServerConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlTlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Invalid YAML in {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_config() {
        let yaml = r#"
host: 0.0.0.0
port: 8080
cors_allowed_origins: "*"
setup_timeout_seconds: 5
token_command: "gcloud auth print-access-token"
tool_servers:
  - name: files
    transport: stdio
    command: mcp-files
  - name: search
    transport: http
    url: http://localhost:9000/mcp
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = YamlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.setup_timeout_seconds, Some(5));
        assert_eq!(config.tool_servers.len(), 2);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hostt: typo\n").unwrap();
        assert!(YamlConfig::from_file(file.path()).is_err());
    }
}
