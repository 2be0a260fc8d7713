//! Transport abstraction
//!
//! One contract, three backends, selected by the connection-configuration
//! discriminator. Every backend executes a statement sequence as a single
//! transaction (commit on success, rollback on failure) and reports
//! connection problems as [`GraphError::Connection`], which is fatal for
//! the import entry using that connection but leaves other entries alone.

pub mod embedded;
pub mod http;
pub mod session;

use crate::response::TransportResponse;
use crate::statement::Statement;
use crate::{GraphError, GraphResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use embedded::{EmbeddedHandleCache, EmbeddedTransport};
use http::HttpTransport;
use session::SessionTransport;

fn default_max_connections() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    300
}

/// Connection configuration, tagged by transport kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// Process-local store identified by a file-system path
    Embedded { path: PathBuf },
    /// Session/transaction protocol endpoint (driven through sqlx)
    Session {
        url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
    /// Transactional HTTP/JSON endpoint
    Http {
        /// Full URL of the transactional commit endpoint
        base_url: String,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        password: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl ConnectionConfig {
    /// Validate the configuration without touching the network
    pub fn validate(&self) -> GraphResult<()> {
        match self {
            ConnectionConfig::Embedded { path } => {
                if path.as_os_str().is_empty() {
                    return Err(GraphError::Connection(
                        "embedded store path must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
            ConnectionConfig::Session { url, .. } => {
                if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                    return Err(GraphError::Connection(format!(
                        "malformed session URL: {}",
                        url
                    )));
                }
                Ok(())
            }
            ConnectionConfig::Http { base_url, .. } => {
                reqwest::Url::parse(base_url)
                    .map_err(|e| GraphError::Connection(format!("malformed URL {}: {}", base_url, e)))?;
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionConfig::Embedded { path } => write!(f, "embedded:{}", path.display()),
            ConnectionConfig::Session { url, .. } => write!(f, "session:{}", url),
            ConnectionConfig::Http { base_url, .. } => write!(f, "http:{}", base_url),
        }
    }
}

/// Uniform "execute statements, get results" contract over all backends
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// Execute the statements as one transaction and return the lazy
    /// response. A failed statement rolls back the whole sequence.
    async fn execute(&self, statements: &[Statement]) -> GraphResult<TransportResponse>;

    /// Release the transport's resources. Cached embedded handles stay
    /// open for other holders of the same path.
    async fn close(&self) -> GraphResult<()>;
}

/// Explicitly constructed transport factory.
///
/// Owns the embedded handle cache so that two concurrent callers asking
/// for the same canonical path share exactly one handle. Passed down from
/// the composition root instead of living in a global.
#[derive(Default)]
pub struct TransportFactory {
    embedded_handles: EmbeddedHandleCache,
}

impl TransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the transport selected by the configuration discriminator
    pub async fn connect(&self, config: &ConnectionConfig) -> GraphResult<Box<dyn GraphTransport>> {
        config.validate()?;

        match config {
            ConnectionConfig::Embedded { path } => {
                let transport = EmbeddedTransport::open(&self.embedded_handles, path)?;
                Ok(Box::new(transport))
            }
            ConnectionConfig::Session {
                url,
                max_connections,
            } => {
                let transport = SessionTransport::connect(url, *max_connections).await?;
                Ok(Box::new(transport))
            }
            ConnectionConfig::Http {
                base_url,
                user,
                password,
                timeout_secs,
            } => {
                let transport =
                    HttpTransport::new(base_url, user.clone(), password.clone(), *timeout_secs)?;
                Ok(Box::new(transport))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_discriminator_deserializes() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"type": "http", "base_url": "http://localhost:7474/db/data/transaction/commit"}"#,
        )
        .unwrap();
        assert!(matches!(config, ConnectionConfig::Http { timeout_secs: 300, .. }));
    }

    #[test]
    fn test_malformed_http_url_is_a_connection_error() {
        let config = ConnectionConfig::Http {
            base_url: "not a url".to_string(),
            user: None,
            password: None,
            timeout_secs: 10,
        };
        assert!(matches!(config.validate(), Err(GraphError::Connection(_))));
    }

    #[test]
    fn test_malformed_session_url_is_a_connection_error() {
        let config = ConnectionConfig::Session {
            url: "mysql://nope".to_string(),
            max_connections: 1,
        };
        assert!(matches!(config.validate(), Err(GraphError::Connection(_))));
    }
}
