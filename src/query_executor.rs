use async_trait::async_trait;
use http::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{DEFAULT_TIMEOUT, Error, GraphQLRequest, GraphQLResponse, Result, http_client};

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Sends `request` unchanged to `endpoint` and decodes the reply.
    async fn execute(&self, endpoint: &str, request: &GraphQLRequest) -> Result<GraphQLResponse>;
}

pub struct HttpQueryExecutor {
    client: reqwest::Client,
}

impl HttpQueryExecutor {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(HttpQueryExecutor {
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl QueryExecutor for HttpQueryExecutor {
    async fn execute(&self, endpoint: &str, request: &GraphQLRequest) -> Result<GraphQLResponse> {
        debug!(endpoint, "forwarding request");

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint, error = %e, "failed to forward request");
                Error::connection(endpoint, e)
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::connection(endpoint, e))?;

        if status != 200 {
            warn!(endpoint, status, "backend returned non-200 status");
            return Err(Error::Protocol {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::decode(endpoint, status, e, body.as_str()))
    }
}
