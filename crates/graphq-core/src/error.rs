//! Error types for query execution.

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

use crate::envelope::GraphQueryError;

/// Errors raised while fetching, parsing or decoding a query result.
#[derive(Error, Debug)]
pub enum Error {
    /// The transport failed without a usable response body.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-null `errors` array.
    #[error("query execution failed: {}", join_messages(.errors))]
    Execution {
        /// Server-supplied errors, in response order.
        errors: Vec<GraphQueryError>,
        /// The query text that was sent.
        query: String,
    },

    /// The envelope is missing `data` or the result alias.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The response body is not a JSON object.
    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// A custom scalar could not be decoded.
    #[error(transparent)]
    ScalarDecode(#[from] ScalarDecodeError),

    /// A result node does not match the target type.
    #[error("failed to decode result item: {0}")]
    Decode(#[source] serde_json::Error),

    /// The operation is not supported by this cursor.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl Error {
    /// Server errors carried by an [`Error::Execution`], if any.
    pub fn execution_errors(&self) -> Option<&[GraphQueryError]> {
        match self {
            Self::Execution { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

fn join_messages(errors: &[GraphQueryError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A failure reported by a [`Transport`](crate::transport::Transport).
///
/// HTTP-level failures may still carry the response body. When that body is
/// present the cursor parses it as the response instead of surfacing the
/// failure.
#[derive(Debug, Clone)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    status: Option<u16>,
    body: Option<Bytes>,
}

/// Coarse classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused or failed.
    Connection,
    /// The exchange timed out.
    Timeout,
    /// The server answered with a non-success status.
    Status,
    /// Anything else.
    Other,
}

impl TransportError {
    /// Create a transport error without a response body.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Create an error for a non-success HTTP status with its body.
    pub fn status(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            kind: TransportErrorKind::Status,
            message: format!("server returned HTTP {status}"),
            status: Some(status),
            body: Some(body.into()),
        }
    }

    /// Attach a response body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The HTTP status, when the failure came from one.
    pub fn http_status(&self) -> Option<u16> {
        self.status
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The response body, if one arrived and it is non-empty.
    pub fn usable_body(&self) -> Option<&Bytes> {
        self.body.as_ref().filter(|b| !b.is_empty())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportErrorKind::Connection => write!(f, "connection error: {}", self.message),
            TransportErrorKind::Timeout => write!(f, "request timed out: {}", self.message),
            TransportErrorKind::Status | TransportErrorKind::Other => {
                write!(f, "transport error: {}", self.message)
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Errors raised by custom scalar decoders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalarDecodeError {
    /// Null arrived for a non-nullable target.
    #[error("cannot convert null value to {0}")]
    UnexpectedNull(&'static str),

    /// The token kind is not accepted by the decoder.
    #[error("unexpected token parsing date: expected integer or string, got {0}")]
    UnexpectedToken(&'static str),

    /// Epoch seconds before 1970-01-01T00:00:00Z.
    #[error("cannot convert value {0} that is before the unix epoch of 00:00:00 UTC on 1 January 1970")]
    BeforeEpoch(i128),

    /// Epoch seconds beyond the representable date range.
    #[error("epoch value {0} is out of the representable date range")]
    OutOfRange(i128),

    /// A date string that no supported format accepts.
    #[error("invalid date string '{0}'")]
    InvalidDate(String),
}

/// A specialized Result type for query operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_is_not_usable() {
        let err = TransportError::status(502, Bytes::new());
        assert_eq!(err.http_status(), Some(502));
        assert!(err.usable_body().is_none());
        assert!(err.body().is_some());
    }

    #[test]
    fn test_execution_display_joins_messages() {
        let err = Error::Execution {
            errors: vec![
                GraphQueryError::new("bad field"),
                GraphQueryError::new("no access"),
            ],
            query: "{ x }".into(),
        };
        assert_eq!(err.to_string(), "query execution failed: bad field; no access");
        assert_eq!(err.execution_errors().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_transport_display() {
        let err = TransportError::new(TransportErrorKind::Timeout, "after 30s");
        assert_eq!(err.to_string(), "request timed out: after 30s");
    }
}
