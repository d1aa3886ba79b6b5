use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::schema::Schema;
use crate::{Error, Result};

type ServerMap = HashMap<String, ServerRecord>;

/// A registered backend GraphQL server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schema: Option<Arc<Schema>>,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Everything needed to add a server. The schema comes from a prior
/// successful introspection.
#[derive(Clone, Debug)]
pub struct ServerRegistration {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub description: String,
    pub schema: Schema,
}

/// Partial update; fields left as `None` are not touched.
#[derive(Clone, Debug, Default)]
pub struct ServerUpdate {
    pub name: Option<String>,
    pub endpoint: Option<String>,
    pub description: Option<String>,
    pub schema: Option<Schema>,
    pub is_active: Option<bool>,
}

impl ServerUpdate {
    pub fn activation(is_active: bool) -> Self {
        ServerUpdate {
            is_active: Some(is_active),
            ..Default::default()
        }
    }

    pub fn schema(schema: Schema) -> Self {
        ServerUpdate {
            schema: Some(schema),
            ..Default::default()
        }
    }

    fn apply(self, server: &mut ServerRecord) {
        if let Some(name) = self.name {
            server.name = name;
        }
        if let Some(endpoint) = self.endpoint {
            server.endpoint = endpoint;
        }
        if let Some(description) = self.description {
            server.description = description;
        }
        if let Some(schema) = self.schema {
            server.schema = Some(Arc::new(schema));
        }
        if let Some(is_active) = self.is_active {
            server.is_active = is_active;
        }
        server.updated_at = Utc::now();
    }
}

#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Inserts a new active server; fails with `AlreadyExists` if the id is taken.
    async fn register_server(&self, registration: ServerRegistration) -> Result<ServerRecord>;
    async fn update_server(&self, id: &str, update: ServerUpdate) -> Result<ServerRecord>;
    async fn get_server(&self, id: &str) -> Result<ServerRecord>;
    async fn all_servers(&self) -> Vec<ServerRecord>;
    async fn active_servers(&self) -> Vec<ServerRecord>;
    async fn remove_server(&self, id: &str) -> Result<ServerRecord>;

    /// First server, active or not, whose root operation types or declared
    /// types carry exactly `field_name`.
    async fn find_server_by_field(&self, field_name: &str) -> Result<ServerRecord>;

    async fn export_registry(&self) -> Result<Vec<u8>>;
    /// Replaces the whole registry with the decoded map.
    async fn import_registry(&self, data: &[u8]) -> Result<()>;

    async fn server_count(&self) -> usize;
    async fn active_server_count(&self) -> usize;

    async fn activate_server(&self, id: &str) -> Result<ServerRecord> {
        self.update_server(id, ServerUpdate::activation(true)).await
    }

    async fn deactivate_server(&self, id: &str) -> Result<ServerRecord> {
        self.update_server(id, ServerUpdate::activation(false)).await
    }
}

/// Registry kept in process memory behind a single reader/writer lock.
///
/// Listings and lookups walk servers in registration order (`added_at`, then
/// `id`), so when two backends declare the same name the one registered
/// first wins.
#[derive(Clone, Debug, Default)]
pub struct InMemorySchemaRegistry {
    servers: Arc<RwLock<ServerMap>>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_registration_order(servers: &ServerMap) -> Vec<&ServerRecord> {
    let mut ordered: Vec<&ServerRecord> = servers.values().collect();
    ordered.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.id.cmp(&b.id)));
    ordered
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn register_server(&self, registration: ServerRegistration) -> Result<ServerRecord> {
        let now = Utc::now();
        let server = ServerRecord {
            id: registration.id,
            name: registration.name,
            endpoint: registration.endpoint,
            description: registration.description,
            schema: Some(Arc::new(registration.schema)),
            added_at: now,
            updated_at: now,
            is_active: true,
        };

        let mut servers = self.servers.write().await;
        if servers.contains_key(&server.id) {
            return Err(Error::AlreadyExists(server.id));
        }
        servers.insert(server.id.clone(), server.clone());
        drop(servers);

        info!(id = %server.id, endpoint = %server.endpoint, "registered server");
        Ok(server)
    }

    async fn update_server(&self, id: &str, update: ServerUpdate) -> Result<ServerRecord> {
        let mut servers = self.servers.write().await;
        let server = servers
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        update.apply(server);
        debug!(id, is_active = server.is_active, "updated server");
        Ok(server.clone())
    }

    async fn get_server(&self, id: &str) -> Result<ServerRecord> {
        let servers = self.servers.read().await;
        servers
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn all_servers(&self) -> Vec<ServerRecord> {
        let servers = self.servers.read().await;
        in_registration_order(&servers).into_iter().cloned().collect()
    }

    async fn active_servers(&self) -> Vec<ServerRecord> {
        let servers = self.servers.read().await;
        in_registration_order(&servers)
            .into_iter()
            .filter(|server| server.is_active)
            .cloned()
            .collect()
    }

    async fn remove_server(&self, id: &str) -> Result<ServerRecord> {
        let mut servers = self.servers.write().await;
        let removed = servers
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        info!(id, "removed server");
        Ok(removed)
    }

    async fn find_server_by_field(&self, field_name: &str) -> Result<ServerRecord> {
        let servers = self.servers.read().await;
        in_registration_order(&servers)
            .into_iter()
            .find(|server| {
                server
                    .schema
                    .as_ref()
                    .is_some_and(|schema| schema.declares_type(field_name))
            })
            .cloned()
            .ok_or_else(|| Error::NoServerFound(field_name.to_string()))
    }

    async fn export_registry(&self) -> Result<Vec<u8>> {
        let snapshot = self.servers.read().await.clone();
        serde_json::to_vec_pretty(&snapshot).map_err(Error::RegistryEncode)
    }

    async fn import_registry(&self, data: &[u8]) -> Result<()> {
        let imported: ServerMap = serde_json::from_slice(data).map_err(Error::RegistryDecode)?;
        // Every key must be its record's id.
        if let Some((key, server)) = imported.iter().find(|(key, server)| **key != server.id) {
            return Err(Error::RegistryDecode(serde::de::Error::custom(format!(
                "registry key {key:?} holds server with ID {:?}",
                server.id
            ))));
        }
        let count = imported.len();
        *self.servers.write().await = imported;
        info!(count, "imported registry");
        Ok(())
    }

    async fn server_count(&self) -> usize {
        self.servers.read().await.len()
    }

    async fn active_server_count(&self) -> usize {
        let servers = self.servers.read().await;
        servers.values().filter(|server| server.is_active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaType, TypeKind, TypeRef};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema_with_types(names: &[&str]) -> Schema {
        Schema {
            query_type: Some(TypeRef::named(TypeKind::Object, "Query")),
            types: names
                .iter()
                .map(|name| SchemaType {
                    kind: TypeKind::Object,
                    name: name.to_string(),
                    description: None,
                    fields: Vec::new(),
                    input_fields: Vec::new(),
                    interfaces: Vec::new(),
                    enum_values: Vec::new(),
                    possible_types: Vec::new(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn registration(id: &str, types: &[&str]) -> ServerRegistration {
        ServerRegistration {
            id: id.to_string(),
            name: format!("{id} service"),
            endpoint: format!("http://{id}.local/graphql"),
            description: format!("{id} backend"),
            schema: schema_with_types(types),
        }
    }

    #[tokio::test]
    async fn register_then_get_returns_the_inputs() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();

        let server = registry.get_server("users").await.unwrap();
        assert_eq!(server.name, "users service");
        assert_eq!(server.endpoint, "http://users.local/graphql");
        assert_eq!(server.description, "users backend");
        assert_eq!(server.schema.as_deref(), Some(&schema_with_types(&["User"])));
        assert!(server.is_active);
        assert_eq!(server.added_at, server.updated_at);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected_and_first_record_kept() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();

        let mut second = registration("users", &["Product"]);
        second.endpoint = "http://elsewhere/graphql".to_string();
        let err = registry.register_server(second).await.unwrap_err();

        assert!(matches!(err, Error::AlreadyExists(id) if id == "users"));
        let kept = registry.get_server("users").await.unwrap();
        assert_eq!(kept.endpoint, "http://users.local/graphql");
        assert_eq!(registry.server_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_registrations_of_one_id_admit_exactly_one() {
        let registry = InMemorySchemaRegistry::new();
        let attempts = (0..8).map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.register_server(registration("dup", &[])).await })
        });
        let results = futures::future::join_all(attempts).await;

        let successes = results
            .into_iter()
            .filter(|joined| matches!(joined, Ok(Ok(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(registry.server_count().await, 1);
    }

    #[tokio::test]
    async fn update_applies_only_present_fields() {
        let registry = InMemorySchemaRegistry::new();
        let original = registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();

        let update = ServerUpdate {
            name: Some("Accounts".to_string()),
            ..Default::default()
        };
        let updated = registry.update_server("users", update).await.unwrap();

        assert_eq!(updated.name, "Accounts");
        assert_eq!(updated.endpoint, original.endpoint);
        assert_eq!(updated.description, original.description);
        assert_eq!(updated.schema, original.schema);
        assert!(updated.is_active);
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(updated.added_at, original.added_at);
    }

    #[tokio::test]
    async fn update_replaces_the_schema_snapshot() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();

        registry
            .update_server("users", ServerUpdate::schema(schema_with_types(&["Account"])))
            .await
            .unwrap();

        let server = registry.get_server("users").await.unwrap();
        assert_eq!(server.schema.as_deref(), Some(&schema_with_types(&["Account"])));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let registry = InMemorySchemaRegistry::new();
        assert!(matches!(
            registry.get_server("ghost").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.update_server("ghost", ServerUpdate::default()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.remove_server("ghost").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.deactivate_server("ghost").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deactivated_servers_stay_listed_but_not_active() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();
        registry
            .register_server(registration("products", &["Product"]))
            .await
            .unwrap();

        registry.deactivate_server("users").await.unwrap();

        let active: Vec<String> = registry
            .active_servers()
            .await
            .into_iter()
            .map(|s| s.id)
            .collect();
        let all: Vec<String> = registry
            .all_servers()
            .await
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(active, vec!["products"]);
        assert!(all.contains(&"users".to_string()));
        assert_eq!(registry.server_count().await, 2);
        assert_eq!(registry.active_server_count().await, 1);

        registry.activate_server("users").await.unwrap();
        assert_eq!(registry.active_server_count().await, 2);
    }

    #[tokio::test]
    async fn remove_is_a_hard_delete() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();

        let removed = registry.remove_server("users").await.unwrap();
        assert_eq!(removed.id, "users");
        assert_eq!(registry.server_count().await, 0);
        assert!(registry.all_servers().await.is_empty());
    }

    #[tokio::test]
    async fn find_by_field_matches_roots_and_type_names_exactly() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();

        assert_eq!(registry.find_server_by_field("User").await.unwrap().id, "users");
        assert_eq!(registry.find_server_by_field("Query").await.unwrap().id, "users");
        assert!(matches!(
            registry.find_server_by_field("user").await,
            Err(Error::NoServerFound(_))
        ));
    }

    #[tokio::test]
    async fn find_by_field_also_scans_inactive_servers() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();
        registry.deactivate_server("users").await.unwrap();

        let found = registry.find_server_by_field("User").await.unwrap();
        assert!(!found.is_active);
    }

    #[tokio::test]
    async fn duplicate_ownership_resolves_to_first_registered() {
        let registry = InMemorySchemaRegistry::new();
        let data = json!({
            "zeta": {
                "id": "zeta", "name": "Zeta", "endpoint": "http://zeta/graphql",
                "description": "",
                "schema": { "types": [{ "kind": "OBJECT", "name": "Shared" }] },
                "added_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z",
                "is_active": true
            },
            "alpha": {
                "id": "alpha", "name": "Alpha", "endpoint": "http://alpha/graphql",
                "description": "",
                "schema": { "types": [{ "kind": "OBJECT", "name": "Shared" }] },
                "added_at": "2024-06-01T00:00:00Z",
                "updated_at": "2024-06-01T00:00:00Z",
                "is_active": true
            },
            "beta": {
                "id": "beta", "name": "Beta", "endpoint": "http://beta/graphql",
                "description": "",
                "schema": { "types": [{ "kind": "OBJECT", "name": "Other" }] },
                "added_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z",
                "is_active": true
            }
        });
        registry
            .import_registry(&serde_json::to_vec(&data).unwrap())
            .await
            .unwrap();

        assert_eq!(registry.find_server_by_field("Shared").await.unwrap().id, "zeta");
        let order: Vec<String> = registry
            .all_servers()
            .await
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(order, vec!["beta", "zeta", "alpha"]);
    }

    #[tokio::test]
    async fn export_then_import_round_trips() {
        let source = InMemorySchemaRegistry::new();
        source
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();
        source
            .register_server(registration("products", &["Product"]))
            .await
            .unwrap();
        source.deactivate_server("products").await.unwrap();

        let exported = source.export_registry().await.unwrap();
        let target = InMemorySchemaRegistry::new();
        target.import_registry(&exported).await.unwrap();

        assert_eq!(target.all_servers().await, source.all_servers().await);
        assert_eq!(target.active_server_count().await, 1);
    }

    #[tokio::test]
    async fn export_is_pretty_printed_with_two_spaces() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &[]))
            .await
            .unwrap();

        let exported = String::from_utf8(registry.export_registry().await.unwrap()).unwrap();
        assert!(exported.starts_with("{\n  \"users\": {\n    \"id\": \"users\""));
    }

    #[tokio::test]
    async fn import_replaces_state_and_failed_import_keeps_it() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();

        let err = registry.import_registry(b"not json").await.unwrap_err();
        assert!(matches!(err, Error::RegistryDecode(_)));
        assert_eq!(registry.server_count().await, 1);

        registry.import_registry(b"{}").await.unwrap();
        assert_eq!(registry.server_count().await, 0);
    }

    #[tokio::test]
    async fn import_rejects_keys_that_disagree_with_ids() {
        let registry = InMemorySchemaRegistry::new();
        registry
            .register_server(registration("users", &["User"]))
            .await
            .unwrap();
        let record = serde_json::to_value(registry.get_server("users").await.unwrap()).unwrap();
        let data = serde_json::to_vec(&serde_json::json!({ "a": record, "b": record })).unwrap();

        let err = registry.import_registry(&data).await.unwrap_err();

        assert!(matches!(err, Error::RegistryDecode(_)));
        assert_eq!(registry.server_count().await, 1);
        assert!(registry.get_server("users").await.is_ok());
    }
}
