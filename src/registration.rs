//! Adding a backend: validate, introspect, then insert.
//!
//! A server only reaches the registry with a complete schema; any failure
//! along the way leaves the registry as it was.

use tracing::info;

use crate::introspection::Introspector;
use crate::schema_registry::{SchemaRegistry, ServerRecord, ServerRegistration, ServerUpdate};
use crate::{Error, Result};

#[derive(Clone, Debug)]
pub struct RegistrationRequest {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub description: String,
}

pub async fn register_server(
    introspector: &dyn Introspector,
    registry: &dyn SchemaRegistry,
    request: RegistrationRequest,
) -> Result<ServerRecord> {
    // Fail fast before touching the network. The insert re-checks under the lock.
    if let Ok(existing) = registry.get_server(&request.id).await {
        return Err(Error::AlreadyExists(existing.id));
    }

    introspector.validate_endpoint(&request.endpoint).await?;
    info!(endpoint = %request.endpoint, "endpoint is accessible");

    let schema = introspector.introspect(&request.endpoint).await?;
    info!(
        endpoint = %request.endpoint,
        types = schema.types.len(),
        "introspection completed"
    );

    registry
        .register_server(ServerRegistration {
            id: request.id,
            name: request.name,
            endpoint: request.endpoint,
            description: request.description,
            schema,
        })
        .await
}

/// Re-introspects a registered server and swaps in the new schema snapshot.
pub async fn refresh_server(
    introspector: &dyn Introspector,
    registry: &dyn SchemaRegistry,
    id: &str,
) -> Result<ServerRecord> {
    let server = registry.get_server(id).await?;
    let schema = introspector.introspect(&server.endpoint).await?;
    registry.update_server(id, ServerUpdate::schema(schema)).await
}
