use async_trait::async_trait;
use http::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::schema::Schema;
use crate::{DEFAULT_TIMEOUT, Error, GraphQLError, Result, http_client};

/// Full introspection document. The `TypeRef` fragment unwraps seven levels
/// of `ofType`, enough for any realistic `NON_NULL`/`LIST` nesting.
pub const INTROSPECTION_QUERY: &str = r#"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types {
      ...FullType
    }
    directives {
      name
      description
      locations
      args {
        ...InputValue
      }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args {
      ...InputValue
    }
    type {
      ...TypeRef
    }
    isDeprecated
    deprecationReason
  }
  inputFields {
    ...InputValue
  }
  interfaces {
    ...TypeRef
  }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes {
    ...TypeRef
  }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// Minimal probe used to check that an endpoint speaks GraphQL.
pub const VALIDATION_QUERY: &str = "query { __schema { queryType { name } } }";

#[async_trait]
pub trait Introspector: Send + Sync {
    async fn validate_endpoint(&self, endpoint: &str) -> Result<()>;
    async fn introspect(&self, endpoint: &str) -> Result<Schema>;
}

#[derive(Deserialize)]
struct IntrospectionData {
    #[serde(rename = "__schema")]
    schema: Schema,
}

pub struct HttpIntrospectionClient {
    client: reqwest::Client,
}

impl HttpIntrospectionClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(HttpIntrospectionClient {
            client: http_client(timeout)?,
        })
    }

    // Single POST; returns the status and the raw body text.
    async fn post_query(&self, endpoint: &str, query: &str) -> Result<(u16, String)> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| Error::connection(endpoint, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::connection(endpoint, e))?;
        Ok((status, body))
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
impl Introspector for HttpIntrospectionClient {
    async fn validate_endpoint(&self, endpoint: &str) -> Result<()> {
        debug!(endpoint, "validating endpoint");
        let (status, body) = self.post_query(endpoint, VALIDATION_QUERY).await?;

        // A GraphQL answer is always a JSON object.
        let parsed = match serde_json::from_str::<Value>(&body) {
            Ok(parsed) if !parsed.is_object() && !is_success(status) => {
                return Err(Error::Protocol {
                    endpoint: endpoint.to_string(),
                    status,
                    body,
                });
            }
            Ok(parsed) if !parsed.is_object() => {
                return Err(Error::decode(endpoint, status, "expected a JSON object", body));
            }
            Ok(parsed) => parsed,
            Err(_) if !is_success(status) => {
                return Err(Error::Protocol {
                    endpoint: endpoint.to_string(),
                    status,
                    body,
                });
            }
            Err(e) => return Err(Error::decode(endpoint, status, e, body)),
        };

        // Any GraphQL-shaped answer proves the endpoint, even an error one.
        if parsed.get("data").is_some() || parsed.get("errors").is_some() || is_success(status)
        {
            return Ok(());
        }

        warn!(endpoint, status, "endpoint validation failed");
        Err(Error::Protocol {
            endpoint: endpoint.to_string(),
            status,
            body,
        })
    }

    async fn introspect(&self, endpoint: &str) -> Result<Schema> {
        info!(endpoint, "performing introspection");
        let (status, body) = self.post_query(endpoint, INTROSPECTION_QUERY).await?;

        if status != 200 {
            return Err(Error::Protocol {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        let mut response: Value =
            serde_json::from_str(&body).map_err(|e| Error::decode(endpoint, status, e, &body))?;

        if let Some(errors) = response.get("errors") {
            let errors: Vec<GraphQLError> = serde_json::from_value(errors.clone())
                .map_err(|e| Error::decode(endpoint, status, e, &body))?;
            if !errors.is_empty() {
                return Err(Error::GraphQL {
                    endpoint: endpoint.to_string(),
                    messages: errors.into_iter().map(|e| e.message).collect(),
                });
            }
        }

        let data = response
            .get_mut("data")
            .map(Value::take)
            .filter(|data| !data.is_null())
            .ok_or_else(|| Error::decode(endpoint, status, "response has no data", &body))?;
        let data: IntrospectionData =
            serde_json::from_value(data).map_err(|e| Error::decode(endpoint, status, e, &body))?;

        debug!(
            endpoint,
            types = data.schema.types.len(),
            "introspection completed"
        );
        Ok(data.schema)
    }
}
