// Shared fixtures for the integration tests.
#![allow(dead_code)]

use kastql::Schema;
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn field(name: &str) -> Value {
    json!({
        "name": name,
        "description": null,
        "args": [],
        "type": { "kind": "SCALAR", "name": "String", "ofType": null },
        "isDeprecated": false,
        "deprecationReason": null
    })
}

fn object(name: &str, fields: &[&str]) -> Value {
    json!({
        "kind": "OBJECT",
        "name": name,
        "description": null,
        "fields": fields.iter().map(|f| field(f)).collect::<Vec<_>>(),
        "inputFields": null,
        "interfaces": [],
        "enumValues": null,
        "possibleTypes": null
    })
}

/// `__schema` value for a service whose `Query` exposes `query_fields` and
/// which declares one object type per entry of `types`.
pub fn schema_json(query_fields: &[&str], types: &[&str]) -> Value {
    let mut all_types = vec![object("Query", query_fields)];
    all_types.extend(types.iter().map(|t| object(t, &["id"])));
    all_types.push(json!({
        "kind": "SCALAR",
        "name": "String",
        "description": null,
        "fields": null,
        "inputFields": null,
        "interfaces": null,
        "enumValues": null,
        "possibleTypes": null
    }));

    json!({
        "queryType": { "name": "Query" },
        "mutationType": null,
        "subscriptionType": null,
        "types": all_types,
        "directives": []
    })
}

pub fn schema(query_fields: &[&str], types: &[&str]) -> Schema {
    serde_json::from_value(schema_json(query_fields, types)).unwrap()
}

pub fn introspection_body(query_fields: &[&str], types: &[&str]) -> Value {
    json!({ "data": { "__schema": schema_json(query_fields, types) } })
}

/// A mock GraphQL service answering validation and introspection at `/graphql`.
pub async fn graphql_service(query_fields: &[&str], types: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("__schema"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(introspection_body(query_fields, types)),
        )
        .mount(&server)
        .await;
    server
}

pub fn endpoint(server: &MockServer) -> String {
    format!("{}/graphql", server.uri())
}

/// An address nothing is listening on.
pub fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/graphql")
}
