//! Error type shared by the registry, the introspection client, the router
//! and the HTTP front.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The query has no extractable field token.
    #[error("failed to parse query: {0}")]
    Parse(String),

    /// A field was extracted but no active backend advertises it.
    #[error("no server found for field {0}")]
    NoServerFound(String),

    /// The backend could not be reached (DNS, connect, timeout, broken body).
    #[error("failed to reach {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with an HTTP status we do not accept.
    #[error("{endpoint} returned status {status}: {body}")]
    Protocol {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The backend answered with a non-empty GraphQL `errors` array.
    #[error("{endpoint} returned GraphQL errors: {}", .messages.join("; "))]
    GraphQL {
        endpoint: String,
        messages: Vec<String>,
    },

    /// The backend body is not JSON or does not have the expected shape.
    #[error("invalid response from {endpoint} (status {status}): {reason}")]
    Decode {
        endpoint: String,
        status: u16,
        reason: String,
        body: String,
    },

    #[error("server with ID {0} not found")]
    NotFound(String),

    #[error("server with ID {0} already exists")]
    AlreadyExists(String),

    #[error("failed to encode registry data: {0}")]
    RegistryEncode(#[source] serde_json::Error),

    #[error("failed to decode registry data: {0}")]
    RegistryDecode(#[source] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse config file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn connection(endpoint: &str, source: reqwest::Error) -> Self {
        Self::Connection {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    pub(crate) fn decode(
        endpoint: &str,
        status: u16,
        reason: impl ToString,
        body: impl Into<String>,
    ) -> Self {
        Self::Decode {
            endpoint: endpoint.to_string(),
            status,
            reason: reason.to_string(),
            body: body.into(),
        }
    }

    /// True when the backend was never reached, as opposed to reached but invalid.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// HTTP status the backend answered with, when one was received.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } | Self::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
