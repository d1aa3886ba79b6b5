use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::field_extractor::{ExtractorKind, FieldExtractor, ParsedOperation};
use crate::query_executor::{HttpQueryExecutor, QueryExecutor};
use crate::schema_registry::{SchemaRegistry, ServerRecord};
use crate::{Error, GraphQLRequest, GraphQLResponse, Result};

/// Outcome of checking a query against the registered servers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueryValidation {
    pub can_serve: bool,
    /// Names of every active server advertising the field, in registration order.
    pub servers: Vec<String>,
}

pub struct QueryRouter {
    registry: Arc<dyn SchemaRegistry>,
    field_extractor: Box<dyn FieldExtractor + Send + Sync>,
    query_executor: Box<dyn QueryExecutor>,
}

impl QueryRouter {
    pub fn new(
        registry: Arc<dyn SchemaRegistry>,
        field_extractor: Box<dyn FieldExtractor + Send + Sync>,
        query_executor: Box<dyn QueryExecutor>,
    ) -> Self {
        QueryRouter {
            registry,
            field_extractor,
            query_executor,
        }
    }

    /// Router forwarding over HTTP with the given timeout.
    pub fn over_http(
        registry: Arc<dyn SchemaRegistry>,
        extractor: ExtractorKind,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self::new(
            registry,
            extractor.build(),
            Box::new(HttpQueryExecutor::with_timeout(timeout)?),
        ))
    }

    pub fn registry(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }

    pub fn parse_query(&self, query: &str) -> Result<ParsedOperation> {
        self.field_extractor.extract(query)
    }

    pub async fn route_request(&self, request: &GraphQLRequest) -> Result<GraphQLResponse> {
        let operation = self.parse_query(&request.query)?;
        let server = self.find_server_for_field(&operation.field_name).await?;

        info!(
            operation = %operation.operation_type,
            field = %operation.field_name,
            server = %server.id,
            "routing request"
        );
        self.query_executor.execute(&server.endpoint, request).await
    }

    /// Like [`route_request`](Self::route_request), with failures folded into
    /// a response carrying a single error and no data.
    pub async fn execute(&self, request: &GraphQLRequest) -> GraphQLResponse {
        match self.route_request(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "request could not be routed");
                GraphQLResponse::error(e.to_string())
            }
        }
    }

    /// Requests are routed one after another; the first failure aborts the batch.
    pub async fn batch_route_request(
        &self,
        requests: &[GraphQLRequest],
    ) -> Result<Vec<GraphQLResponse>> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(self.route_request(request).await?);
        }
        Ok(responses)
    }

    /// Resolves the active server owning `field_name`.
    ///
    /// The registry's root/type-name lookup is tried first; when it misses,
    /// or only finds an inactive server, active servers are scanned for a
    /// type or field with that exact name.
    pub async fn find_server_for_field(&self, field_name: &str) -> Result<ServerRecord> {
        match self.registry.find_server_by_field(field_name).await {
            Ok(server) if server.is_active => return Ok(server),
            Ok(server) => debug!(server = %server.id, field_name, "skipping inactive server"),
            Err(_) => {}
        }

        self.registry
            .active_servers()
            .await
            .into_iter()
            .find(|server| {
                server
                    .schema
                    .as_ref()
                    .is_some_and(|schema| schema.declares_type_or_field(field_name))
            })
            .ok_or_else(|| Error::NoServerFound(field_name.to_string()))
    }

    /// Root operation type names and declared type names, per active server name.
    pub async fn available_fields(&self) -> BTreeMap<String, Vec<String>> {
        self.registry
            .active_servers()
            .await
            .into_iter()
            .filter_map(|server| {
                let fields = server.schema.as_ref()?.available_fields();
                Some((server.name, fields))
            })
            .collect()
    }

    pub async fn validate_query(&self, query: &str) -> Result<QueryValidation> {
        let operation = self.parse_query(query)?;

        let servers: Vec<String> = self
            .registry
            .active_servers()
            .await
            .into_iter()
            .filter(|server| {
                server.schema.as_ref().is_some_and(|schema| {
                    schema
                        .available_fields()
                        .iter()
                        .any(|field| *field == operation.field_name)
                })
            })
            .map(|server| server.name)
            .collect();

        Ok(QueryValidation {
            can_serve: !servers.is_empty(),
            servers,
        })
    }
}
