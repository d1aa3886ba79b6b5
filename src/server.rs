use bytes::Bytes;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, HeaderValue, LOCATION,
};
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::router::QueryRouter;
use crate::schema_registry::ServerRecord;
use crate::{GraphQLRequest, GraphQLResponse};

type HttpResponse = Response<BoxBody<Bytes, hyper::Error>>;

// Create a response body from a string
fn full<T: Into<Bytes>>(value: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(value.into())
        .map_err(|never| match never {})
        .boxed()
}

const PLAYGROUND_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head>
  <title>GraphiQL - KastQL Gateway</title>
  <link href="https://unpkg.com/graphiql@1.5.0/graphiql.min.css" rel="stylesheet" />
  <style>
    body { margin: 0; padding: 0; height: 100vh; }
    #graphiql { height: 100vh; }
  </style>
</head>
<body>
  <div id="graphiql"></div>

  <script src="https://unpkg.com/react@17.0.2/umd/react.production.min.js"></script>
  <script src="https://unpkg.com/react-dom@17.0.2/umd/react-dom.production.min.js"></script>
  <script src="https://unpkg.com/graphiql@1.5.0/graphiql.min.js"></script>
  <script>
    function graphQLFetcher(graphQLParams) {
      return fetch('/graphql', {
        method: 'post',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(graphQLParams),
      }).then(response => response.json());
    }

    ReactDOM.render(
      React.createElement(GraphiQL, { fetcher: graphQLFetcher }),
      document.getElementById('graphiql')
    );
  </script>
</body>
</html>
"#;

#[derive(Serialize)]
struct SchemaInfo {
    servers: Vec<ServerRecord>,
    total_servers: usize,
}

/// Dispatches one request. Generic over the body so it can be driven
/// without a socket.
pub async fn handle_request<B>(
    req: Request<B>,
    router: Arc<QueryRouter>,
) -> Result<HttpResponse, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();
    debug!(method = %parts.method, path = parts.uri.path(), "incoming request");

    let response = match (&parts.method, parts.uri.path()) {
        (&Method::OPTIONS, "/graphql") => cors(empty_ok(), true),
        (&Method::POST, "/graphql") => {
            let body_bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!(error = %e, "failed to read request body");
                    return Ok(cors(
                        plain(StatusCode::BAD_REQUEST, "Failed to read request body"),
                        true,
                    ));
                }
            };
            cors(handle_graphql(&body_bytes, &router).await, true)
        }
        (_, "/graphql") => cors(
            plain(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
            true,
        ),

        (&Method::OPTIONS, "/health") => empty_ok(),
        (&Method::GET, "/health") => {
            let registry = router.registry();
            json_response(&json!({
                "status": "healthy",
                "servers": {
                    "total": registry.server_count().await,
                    "active": registry.active_server_count().await,
                }
            }))
        }

        (&Method::OPTIONS, "/schema") => cors(empty_ok(), false),
        (&Method::GET, "/schema") => {
            let servers = router.registry().active_servers().await;
            let info = SchemaInfo {
                total_servers: servers.len(),
                servers,
            };
            cors(json_response(&info), false)
        }

        (&Method::GET, "/playground") => Response::builder()
            .header(CONTENT_TYPE, "text/html")
            .body(full(PLAYGROUND_HTML))
            .unwrap_or_else(|_| internal_server_error()),

        (&Method::GET, "/") => Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, "/playground")
            .body(full(""))
            .unwrap_or_else(|_| internal_server_error()),

        _ => plain(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

async fn handle_graphql(body: &Bytes, router: &QueryRouter) -> HttpResponse {
    // A JSON array is a batch; it fails as a whole.
    if body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'[') {
        let requests: Vec<GraphQLRequest> = match serde_json::from_slice(body) {
            Ok(requests) => requests,
            Err(e) => return plain(StatusCode::BAD_REQUEST, format!("Invalid JSON: {e}")),
        };
        if requests.iter().any(|r| r.query.trim().is_empty()) {
            return plain(StatusCode::BAD_REQUEST, "Query is required");
        }
        return match router.batch_route_request(&requests).await {
            Ok(responses) => json_response(&responses),
            Err(e) => {
                warn!(error = %e, "batch could not be routed");
                json_response(&GraphQLResponse::error(e.to_string()))
            }
        };
    }

    let request: GraphQLRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => return plain(StatusCode::BAD_REQUEST, format!("Invalid JSON: {e}")),
    };
    if request.query.trim().is_empty() {
        return plain(StatusCode::BAD_REQUEST, "Query is required");
    }

    json_response(&router.execute(&request).await)
}

fn json_response<T: Serialize>(value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(json) => Response::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(full(json))
            .unwrap_or_else(|_| internal_server_error()),
        Err(e) => {
            warn!(error = %e, "failed to serialize response");
            internal_server_error()
        }
    }
}

fn plain(status: StatusCode, message: impl Into<Bytes>) -> HttpResponse {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(full(message))
        .unwrap_or_else(|_| internal_server_error())
}

fn empty_ok() -> HttpResponse {
    Response::new(full(""))
}

fn cors(mut response: HttpResponse, with_methods: bool) -> HttpResponse {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    if with_methods {
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, GET, OPTIONS"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        );
    }
    response
}

// Create a standard internal server error response
fn internal_server_error() -> HttpResponse {
    let mut response = Response::new(full("Internal Server Error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Accepts connections until the listener fails, one task per connection.
pub async fn serve(listener: TcpListener, router: Arc<QueryRouter>) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!("GraphQL endpoint: http://{addr}/graphql");
    info!("Playground: http://{addr}/playground");
    info!("Health check: http://{addr}/health");
    info!("Schema info: http://{addr}/schema");

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let router = Arc::clone(&router);

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, Arc::clone(&router)));

            if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                warn!(%peer, error = %e, "error processing connection");
            }
        });
    }
}
