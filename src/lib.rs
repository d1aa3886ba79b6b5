pub mod cli;
pub mod config;
pub mod error;
pub mod field_extractor;
pub mod introspection;
pub mod persistence;
pub mod query_executor;
pub mod registration;
pub mod router;
pub mod schema;
pub mod schema_registry;
pub mod server;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use field_extractor::{DocumentFieldExtractor, FieldExtractor, HeuristicFieldExtractor};
pub use introspection::{HttpIntrospectionClient, Introspector};
pub use persistence::RegistryManager;
pub use query_executor::{HttpQueryExecutor, QueryExecutor};
pub use router::QueryRouter;
pub use schema::Schema;
pub use schema_registry::{InMemorySchemaRegistry, SchemaRegistry, ServerRecord};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Timeout applied to every outbound call unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        GraphQLRequest {
            query: query.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(
        default,
        deserialize_with = "schema::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub errors: Vec<GraphQLError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQLResponse {
    /// A response carrying a single error and no data.
    pub fn error(message: impl Into<String>) -> Self {
        GraphQLResponse {
            errors: vec![GraphQLError::new(message)],
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(
        default,
        deserialize_with = "schema::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub locations: Vec<ErrorLocation>,
    #[serde(
        default,
        deserialize_with = "schema::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub path: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        GraphQLError {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

// Outbound transport shared by introspection and forwarding.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Error::HttpClient)
}
