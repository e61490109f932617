//! Query signatures, argument binding and query text generation.
//!
//! A [`QuerySignature`] is the static schema of one root query field: its name
//! and its parameters with GraphQL types. Arguments are bound against it
//! explicitly, either by position or by name, and [`QueryBuilder`] renders the
//! bound arguments and a field selection into a [`GraphQuery`] whose result
//! lives under [`RESULT_ALIAS`].
//!
//! ```ignore
//! let users = QuerySignature::new("users")
//!     .param("first", "Int")
//!     .param("role", "Role!");
//!
//! let query = QueryBuilder::new(&users)
//!     .arguments(users.bind([json!(10), json!("ADMIN")])?)
//!     .field("id")
//!     .object("profile", |s| s.field("displayName"))
//!     .build();
//! // query users($first: Int, $role: Role!) {
//! //   result: users(first: $first, role: $role) { id profile { displayName } }
//! // }
//! ```

use std::fmt::Write as _;

use graphq_core::{Error, GraphQuery, Result};
use serde_json::{Map, Value};

/// Alias under which generated queries place their result.
pub const RESULT_ALIAS: &str = "result";

/// One declared query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    graphql_type: String,
}

impl Parameter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graphql_type(&self) -> &str {
        &self.graphql_type
    }

    /// Non-null parameters (`Type!`) must be bound.
    pub fn is_required(&self) -> bool {
        self.graphql_type.ends_with('!')
    }
}

/// The parameter schema of a root query field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySignature {
    field: String,
    params: Vec<Parameter>,
}

impl QuerySignature {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            params: Vec::new(),
        }
    }

    /// Declare a parameter with its GraphQL type, e.g. `"Int"` or `"[ID!]!"`.
    pub fn param(mut self, name: impl Into<String>, graphql_type: impl Into<String>) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            graphql_type: graphql_type.into(),
        });
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Bind arguments by position.
    ///
    /// Fewer values than parameters leave the trailing ones unbound; more
    /// values than parameters is an error.
    pub fn bind(&self, values: impl IntoIterator<Item = Value>) -> Result<BoundArguments> {
        let values: Vec<Value> = values.into_iter().collect();
        if values.len() > self.params.len() {
            return Err(Error::Configuration(format!(
                "query '{}' takes {} arguments, got {}",
                self.field,
                self.params.len(),
                values.len()
            )));
        }
        let mut values = values.into_iter();
        self.finish(|_| values.next())
    }

    /// Bind arguments by name.
    pub fn bind_named(&self, values: impl IntoIterator<Item = (String, Value)>) -> Result<BoundArguments> {
        let mut values: Map<String, Value> = values.into_iter().collect();
        if let Some(unknown) = values
            .keys()
            .find(|name| !self.params.iter().any(|p| &p.name == *name))
        {
            return Err(Error::Configuration(format!(
                "query '{}' has no parameter '{unknown}'",
                self.field
            )));
        }
        self.finish(|param| values.remove(&param.name))
    }

    fn finish(&self, mut value_for: impl FnMut(&Parameter) -> Option<Value>) -> Result<BoundArguments> {
        let mut bound = Vec::with_capacity(self.params.len());
        for param in &self.params {
            match value_for(param) {
                Some(Value::Null) | None if param.is_required() => {
                    return Err(Error::Configuration(format!(
                        "query '{}' requires argument '{}' of type {}",
                        self.field, param.name, param.graphql_type
                    )));
                }
                Some(value) => bound.push((param.clone(), value)),
                None => {}
            }
        }
        Ok(BoundArguments { bound })
    }
}

/// Arguments checked against a [`QuerySignature`], in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    bound: Vec<(Parameter, Value)>,
}

impl BoundArguments {
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bound
            .iter()
            .find(|(param, _)| param.name == name)
            .map(|(_, value)| value)
    }

    fn variables(&self) -> Map<String, Value> {
        self.bound
            .iter()
            .map(|(param, value)| (param.name.clone(), value.clone()))
            .collect()
    }
}

/// A field in a selection set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A scalar or enum field.
    Field(String),
    /// An object field with its own selection set.
    Object(String, Vec<Selection>),
}

/// Builds a nested selection set.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    fields: Vec<Selection>,
}

impl SelectionSet {
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(Selection::Field(name.into()));
        self
    }

    pub fn object(mut self, name: impl Into<String>, build: impl FnOnce(Self) -> Self) -> Self {
        let nested = build(Self::default());
        self.fields.push(Selection::Object(name.into(), nested.fields));
        self
    }
}

/// Renders a signature, bound arguments and a selection into a query.
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    signature: &'a QuerySignature,
    arguments: BoundArguments,
    selection: SelectionSet,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(signature: &'a QuerySignature) -> Self {
        Self {
            signature,
            arguments: BoundArguments::default(),
            selection: SelectionSet::default(),
        }
    }

    pub fn arguments(mut self, arguments: BoundArguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Select a scalar field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.selection = self.selection.field(name);
        self
    }

    /// Select several scalar fields.
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.selection = self.selection.field(name);
        }
        self
    }

    /// Select an object field with a nested selection.
    pub fn object(mut self, name: impl Into<String>, build: impl FnOnce(SelectionSet) -> SelectionSet) -> Self {
        self.selection = self.selection.object(name, build);
        self
    }

    /// Render the query text.
    pub fn query_text(&self) -> String {
        let field = self.signature.field();
        let mut text = format!("query {field}");

        if !self.arguments.is_empty() {
            let declarations: Vec<String> = self
                .arguments
                .bound
                .iter()
                .map(|(p, _)| format!("${}: {}", p.name, p.graphql_type))
                .collect();
            let _ = write!(text, "({})", declarations.join(", "));
        }

        let _ = write!(text, " {{ {RESULT_ALIAS}: {field}");
        if !self.arguments.is_empty() {
            let uses: Vec<String> = self
                .arguments
                .bound
                .iter()
                .map(|(p, _)| format!("{0}: ${0}", p.name))
                .collect();
            let _ = write!(text, "({})", uses.join(", "));
        }
        render_selection(&mut text, &self.selection.fields);
        text.push_str(" }");
        text
    }

    /// Build the query document.
    pub fn build(self) -> GraphQuery {
        let query = GraphQuery::new(self.query_text(), RESULT_ALIAS);
        if self.arguments.is_empty() {
            query
        } else {
            query.variables(self.arguments.variables())
        }
    }
}

fn render_selection(out: &mut String, fields: &[Selection]) {
    if fields.is_empty() {
        return;
    }
    out.push_str(" {");
    for field in fields {
        match field {
            Selection::Field(name) => {
                out.push(' ');
                out.push_str(name);
            }
            Selection::Object(name, nested) => {
                out.push(' ');
                out.push_str(name);
                render_selection(out, nested);
            }
        }
    }
    out.push_str(" }");
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphq_core::QueryDocument;
    use serde_json::json;

    fn users() -> QuerySignature {
        QuerySignature::new("users")
            .param("first", "Int")
            .param("role", "Role!")
    }

    #[test]
    fn test_positional_binding() {
        let args = users().bind([json!(10), json!("ADMIN")]).unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args.get("first"), Some(&json!(10)));
        assert_eq!(args.get("role"), Some(&json!("ADMIN")));
    }

    #[test]
    fn test_surplus_positional_arguments_fail() {
        let err = users().bind([json!(1), json!("A"), json!(true)]).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("takes 2 arguments")));
    }

    #[test]
    fn test_missing_required_argument_fails() {
        let err = users().bind([json!(5)]).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("'role'")));

        let err = users().bind([json!(5), Value::Null]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_optional_arguments_may_be_omitted() {
        let args = users()
            .bind_named([("role".to_string(), json!("USER"))])
            .unwrap();
        assert_eq!(args.len(), 1);
        assert!(args.get("first").is_none());
    }

    #[test]
    fn test_unknown_named_argument_fails() {
        let err = users()
            .bind_named([("last".to_string(), json!(3))])
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("'last'")));
    }

    #[test]
    fn test_query_text_with_arguments_and_nested_selection() {
        let signature = users();
        let query = QueryBuilder::new(&signature)
            .arguments(signature.bind([json!(10), json!("ADMIN")]).unwrap())
            .fields(["id", "name"])
            .object("profile", |s| s.field("displayName").object("avatar", |s| s.field("url")))
            .build();

        assert_eq!(
            query.query_text(),
            "query users($first: Int, $role: Role!) { result: users(first: $first, role: $role) \
             { id name profile { displayName avatar { url } } } }"
        );
        assert_eq!(query.result_alias(), RESULT_ALIAS);
        assert_eq!(query.variables, Some(json!({"first": 10, "role": "ADMIN"})));
    }

    #[test]
    fn test_query_text_without_arguments() {
        let signature = QuerySignature::new("viewer");
        let query = QueryBuilder::new(&signature).field("login").build();
        assert_eq!(query.query_text(), "query viewer { result: viewer { login } }");
        assert!(query.variables.is_none());
    }

    #[test]
    fn test_scalar_result_has_no_selection() {
        let signature = QuerySignature::new("userCount").param("active", "Boolean");
        let query = QueryBuilder::new(&signature)
            .arguments(signature.bind([json!(true)]).unwrap())
            .build();
        assert_eq!(
            query.query_text(),
            "query userCount($active: Boolean) { result: userCount(active: $active) }"
        );
    }
}
