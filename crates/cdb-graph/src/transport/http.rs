//! Transactional HTTP transport
//!
//! Serializes the statement sequence as a JSON request body
//! (`{"statements": [{"statement", "parameters"}, ...]}`), posts it to
//! the configured commit endpoint and hands the chunked response body to
//! the streaming parser. The returned [`TransportResponse`] pulls bytes
//! from the wire only when the consumer asks for the next result.

use crate::response::TransportResponse;
use crate::statement::Statement;
use crate::transport::GraphTransport;
use crate::{GraphError, GraphResult};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct StatementsBody<'a> {
    statements: &'a [Statement],
}

/// Transport over a transactional HTTP/JSON endpoint
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    user: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        user: Option<String>,
        password: Option<String>,
        timeout_secs: u64,
    ) -> GraphResult<Self> {
        let endpoint = reqwest::Url::parse(base_url)
            .map_err(|e| GraphError::Connection(format!("malformed URL {}: {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GraphError::Connection(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            user,
            password,
        })
    }
}

#[async_trait]
impl GraphTransport for HttpTransport {
    async fn execute(&self, statements: &[Statement]) -> GraphResult<TransportResponse> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&StatementsBody { statements });

        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }

        debug!(count = statements.len(), "Posting statement batch");
        let response = request
            .send()
            .await
            .map_err(|e| GraphError::Connection(format!("endpoint unreachable: {}", e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(GraphError::Connection(format!(
                    "authentication failed ({})",
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(GraphError::Protocol(format!(
                    "endpoint returned {}",
                    status
                )));
            }
            _ => {}
        }

        let chunks = response
            .bytes_stream()
            .map_err(|e| GraphError::Protocol(format!("response body read failed: {}", e)))
            .boxed();

        Ok(TransportResponse::streaming(chunks))
    }

    async fn close(&self) -> GraphResult<()> {
        // Connections are pooled by the client and released on drop
        Ok(())
    }
}
