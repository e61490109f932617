//! Response envelope parsing.
//!
//! A GraphQL response is a JSON object with an optional `data` object and an
//! optional `errors` array. The parser splits a body into one of two
//! outcomes: the server-reported errors, or the result nodes found under the
//! query's result alias inside `data`.
//!
//! Result nodes stay in their raw serialized form until the cursor decodes
//! them one at a time.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use crate::error::{Error, Result};

const DATA_KEY: &str = "data";
const ERRORS_KEY: &str = "errors";

/// A GraphQL error returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQueryError {
    /// The error message.
    pub message: String,

    /// Locations in the document where the error occurred.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ErrorLocation>,

    /// Path to the field that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,

    /// Additional error metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQueryError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
        }
    }
}

impl fmt::Display for GraphQueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref path) = self.path {
            write!(f, " (at ")?;
            for (i, segment) in path.iter().enumerate() {
                match segment {
                    PathSegment::Field(name) if i > 0 => write!(f, ".{name}")?,
                    PathSegment::Field(name) => write!(f, "{name}")?,
                    PathSegment::Index(idx) => write!(f, "[{idx}]")?,
                }
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for GraphQueryError {}

/// A location in a query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
}

/// A segment in an error path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A field name.
    Field(String),
    /// An array index.
    Index(usize),
}

/// One undecoded item extracted from the envelope.
#[derive(Debug, Clone)]
pub struct ResultNode(Box<RawValue>);

impl ResultNode {
    /// The node's JSON text exactly as the server sent it.
    pub fn raw(&self) -> &str {
        self.0.get()
    }

    /// Parse the node into a JSON value tree.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::from_str(self.0.get()).map_err(Error::Decode)
    }
}

/// What a response body turned out to contain.
#[derive(Debug)]
pub enum EnvelopeOutcome {
    /// Result nodes in response order.
    Items(Vec<ResultNode>),
    /// Server-reported errors in response order.
    Errors(Vec<GraphQueryError>),
}

/// Splits raw response bytes into result nodes or server errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseEnvelopeParser;

impl ResponseEnvelopeParser {
    /// Parse `body`, locating the result under `result_alias`.
    ///
    /// A non-null `errors` entry wins over `data`, even when `data` holds a
    /// well-formed result. A result array yields one node per element; any
    /// other value yields a single node.
    pub fn parse(&self, body: &[u8], result_alias: &str) -> Result<EnvelopeOutcome> {
        let root: HashMap<String, &RawValue> =
            serde_json::from_slice(body).map_err(Error::MalformedEnvelope)?;

        if let Some(errors) = root.get(ERRORS_KEY).filter(|raw| !is_null(raw)) {
            let errors: Vec<GraphQueryError> =
                serde_json::from_str(errors.get()).map_err(Error::MalformedEnvelope)?;
            return Ok(EnvelopeOutcome::Errors(errors));
        }

        let data = root
            .get(DATA_KEY)
            .filter(|raw| !is_null(raw))
            .ok_or_else(|| {
                Error::ProtocolViolation(format!("response has no '{DATA_KEY}' object"))
            })?;
        let data: HashMap<String, &RawValue> =
            serde_json::from_str(data.get()).map_err(|e| {
                Error::ProtocolViolation(format!("'{DATA_KEY}' is not an object: {e}"))
            })?;

        let result = data.get(result_alias).ok_or_else(|| {
            Error::ProtocolViolation(format!(
                "'{DATA_KEY}' has no result under alias '{result_alias}'"
            ))
        })?;

        let nodes = if result.get().trim_start().starts_with('[') {
            let elements: Vec<Box<RawValue>> =
                serde_json::from_str(result.get()).map_err(Error::MalformedEnvelope)?;
            elements.into_iter().map(ResultNode).collect()
        } else {
            vec![ResultNode(RawValue::from_string(result.get().to_owned())
                .map_err(Error::MalformedEnvelope)?)]
        };

        Ok(EnvelopeOutcome::Items(nodes))
    }
}

fn is_null(raw: &RawValue) -> bool {
    raw.get().trim() == "null"
}
