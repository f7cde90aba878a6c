//! Credential acquisition for upstream provider connections.
//!
//! When a client's setup message carries no bearer token, the bridge resolves
//! one from an injected [`TokenSource`]. Two implementations are provided: a
//! static token from configuration, and an external command (the Vertex AI
//! path uses `gcloud auth print-access-token` for short-lived credentials).

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors from credential acquisition.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token command failed: {0}")]
    Command(String),

    #[error("No credential available: {0}")]
    Missing(String),
}

/// Capability for resolving a bearer token for the upstream connection.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<String, AuthError>;
}

/// Serves a fixed token from configuration.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(&self) -> Result<String, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError::Missing("configured token is empty".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// Runs an external command and takes its trimmed stdout as the token.
pub struct CommandTokenSource {
    program: String,
    args: Vec<String>,
}

impl CommandTokenSource {
    /// Parse a shell-ish command line (whitespace-split, no quoting).
    pub fn new(command_line: &str) -> Result<Self, AuthError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| AuthError::Missing("token command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Default Vertex AI credential helper.
    pub fn gcloud() -> Self {
        Self {
            program: "gcloud".to_string(),
            args: vec!["auth".to_string(), "print-access-token".to_string()],
        }
    }
}

#[async_trait]
impl TokenSource for CommandTokenSource {
    async fn fetch(&self) -> Result<String, AuthError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| AuthError::Command(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuthError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(AuthError::Missing(format!(
                "{} produced no output",
                self.program
            )));
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_returns_token() {
        let source = StaticTokenSource::new("tok-123");
        assert_eq!(source.fetch().await.unwrap(), "tok-123");
    }

    #[tokio::test]
    async fn static_source_rejects_empty_token() {
        let source = StaticTokenSource::new("");
        assert!(matches!(
            source.fetch().await,
            Err(AuthError::Missing(_))
        ));
    }

    #[test]
    fn command_source_splits_command_line() {
        let source = CommandTokenSource::new("gcloud auth print-access-token").unwrap();
        assert_eq!(source.program, "gcloud");
        assert_eq!(source.args, ["auth", "print-access-token"]);
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(CommandTokenSource::new("   ").is_err());
    }

    #[tokio::test]
    async fn command_source_trims_stdout() {
        let source = CommandTokenSource::new("echo my-token").unwrap();
        assert_eq!(source.fetch().await.unwrap(), "my-token");
    }

    #[tokio::test]
    async fn failing_command_is_an_error() {
        let source = CommandTokenSource::new("false").unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(AuthError::Command(_))
        ));
    }
}
