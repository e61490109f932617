//! Query documents consumed by cursors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::logging::targets;

/// A query as seen by the cursor: wire bytes plus the result alias.
///
/// Builders produce implementations of this trait; the cursor never builds
/// documents itself.
pub trait QueryDocument {
    /// The request body to send.
    fn document(&self) -> Vec<u8>;

    /// The query text, reported back in execution errors.
    fn query_text(&self) -> &str;

    /// The key under `data` that holds this query's result.
    fn result_alias(&self) -> &str;
}

/// A query request in the standard GraphQL-over-HTTP JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQuery {
    /// The GraphQL query string.
    pub query: String,

    /// Optional variables for the query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,

    /// Optional operation name (for documents with multiple operations).
    #[serde(skip_serializing_if = "Option::is_none", rename = "operationName")]
    pub operation_name: Option<String>,

    #[serde(skip)]
    result_alias: String,
}

impl GraphQuery {
    /// Create a query whose result lives under `result_alias`.
    pub fn new(query: impl Into<String>, result_alias: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            operation_name: None,
            result_alias: result_alias.into(),
        }
    }

    /// Set a variable value.
    ///
    /// A value that fails to serialize is skipped with a warning; use
    /// [`try_variable`](Self::try_variable) to get the error instead.
    pub fn variable(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let name = name.into();
        if let Err(e) = self.insert_variable(&name, value) {
            tracing::warn!(
                target: targets::QUERY,
                variable = %name,
                error = %e,
                "query variable could not be serialized and was left out"
            );
        }
        self
    }

    /// Set a variable value, failing when it cannot be serialized.
    pub fn try_variable(mut self, name: impl Into<String>, value: impl Serialize) -> Result<Self> {
        let name = name.into();
        self.insert_variable(&name, value).map_err(|e| {
            Error::Configuration(format!("query variable '{name}' cannot be serialized: {e}"))
        })?;
        Ok(self)
    }

    fn insert_variable(&mut self, name: &str, value: impl Serialize) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        let variables = self
            .variables
            .get_or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(map) = variables {
            map.insert(name.to_owned(), value);
        }
        Ok(())
    }

    /// Replace all variables with a JSON object.
    pub fn variables(mut self, variables: serde_json::Map<String, Value>) -> Self {
        self.variables = Some(Value::Object(variables));
        self
    }

    /// Set the operation name.
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

impl QueryDocument for GraphQuery {
    fn document(&self) -> Vec<u8> {
        // A struct of strings and JSON values always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }

    fn query_text(&self) -> &str {
        &self.query
    }

    fn result_alias(&self) -> &str {
        &self.result_alias
    }
}
