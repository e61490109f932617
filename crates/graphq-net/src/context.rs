//! Connection context and query handles.
//!
//! A [`GraphContext`] holds everything a query needs besides the query itself:
//! the endpoint, credentials, decode options and the transport. It is cheap to
//! clone and hands out [`CollectionQuery`] and [`ItemQuery`] handles. Every
//! cursor a handle creates performs its own single exchange, so iterating a
//! handle twice runs the query twice.
//!
//! ```ignore
//! let context = GraphContext::builder("https://api.example.com/graphql")
//!     .bearer_auth("my-token")
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! for user in context.collection_query::<User>(query) {
//!     println!("{}", user?.name);
//! }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use graphq_core::{
    DecodeOptions, Endpoint, Error, GraphQuery, QueryCursor, QueryDocument, Result,
    SharedTransport,
};
use http::HeaderValue;
use serde::de::DeserializeOwned;

use crate::http::HttpTransportBuilder;

const TARGET: &str = "graphq_net::context";

/// Builder for [`GraphContext`].
pub struct GraphContextBuilder {
    url: String,
    authorization: Option<String>,
    transport: Option<SharedTransport>,
    http: HttpTransportBuilder,
    headers: Vec<(String, String)>,
    options: DecodeOptions,
}

impl GraphContextBuilder {
    /// Create a new builder for the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            authorization: None,
            transport: None,
            http: HttpTransportBuilder::new(),
            headers: Vec::new(),
            options: DecodeOptions::default(),
        }
    }

    /// Set the raw `Authorization` header value.
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Set bearer token authentication.
    pub fn bearer_auth(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.authorization(value)
    }

    /// Set the request timeout of the built-in HTTP transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.timeout(timeout);
        self
    }

    /// Set the connect timeout of the built-in HTTP transport.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.connect_timeout(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.http = self.http.user_agent(user_agent);
        self
    }

    /// Route this context's requests through a proxy.
    ///
    /// The proxy applies to this context only.
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.http = self.http.proxy(proxy_url);
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the options used to decode result nodes.
    pub fn decode_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a custom transport instead of the built-in HTTP one.
    ///
    /// HTTP settings on this builder are ignored when a transport is given.
    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the context.
    pub fn build(self) -> Result<GraphContext> {
        url::Url::parse(&self.url)
            .map_err(|e| Error::Configuration(format!("invalid endpoint URL '{}': {e}", self.url)))?;

        let mut endpoint = Endpoint::new(self.url);
        if let Some(authorization) = self.authorization {
            HeaderValue::from_str(&authorization).map_err(|e| {
                Error::Configuration(format!("invalid authorization header value: {e}"))
            })?;
            endpoint = endpoint.authorization(authorization);
        }

        let transport: SharedTransport = match self.transport {
            Some(transport) => transport,
            None => {
                let mut http = self.http;
                for (name, value) in &self.headers {
                    http = http.default_header(name, value)?;
                }
                Arc::new(http.build()?)
            }
        };

        tracing::debug!(
            target: TARGET,
            endpoint = endpoint.url(),
            authorized = endpoint.authorization_header().is_some(),
            "query context created"
        );

        Ok(GraphContext {
            inner: Arc::new(GraphContextInner {
                endpoint,
                transport,
                options: self.options,
            }),
        })
    }
}

impl fmt::Debug for GraphContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphContextBuilder")
            .field("url", &self.url)
            .field("has_authorization", &self.authorization.is_some())
            .field("custom_transport", &self.transport.is_some())
            .field("options", &self.options)
            .finish()
    }
}

struct GraphContextInner {
    endpoint: Endpoint,
    transport: SharedTransport,
    options: DecodeOptions,
}

/// Connection settings shared by the queries run against one endpoint.
#[derive(Clone)]
pub struct GraphContext {
    inner: Arc<GraphContextInner>,
}

impl GraphContext {
    /// Create a context with default settings.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        GraphContextBuilder::new(url).build()
    }

    pub fn builder(url: impl Into<String>) -> GraphContextBuilder {
        GraphContextBuilder::new(url)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn decode_options(&self) -> &DecodeOptions {
        &self.inner.options
    }

    /// A query whose result is a sequence of `T`.
    pub fn collection_query<T>(&self, query: GraphQuery) -> CollectionQuery<T>
    where
        T: DeserializeOwned + 'static,
    {
        CollectionQuery {
            context: self.clone(),
            query,
            _item: PhantomData,
        }
    }

    /// A query whose result is a single `T`.
    pub fn item_query<T>(&self, query: GraphQuery) -> ItemQuery<T>
    where
        T: DeserializeOwned + 'static,
    {
        ItemQuery {
            inner: self.collection_query(query),
        }
    }

    fn cursor<T, S>(&self, query: GraphQuery, mapper: impl Fn(S) -> T + Send + 'static) -> QueryCursor<T, S>
    where
        S: DeserializeOwned + 'static,
        T: 'static,
    {
        QueryCursor::with_mapper(
            Arc::clone(&self.inner.transport),
            self.inner.endpoint.clone(),
            query,
            self.inner.options.clone(),
            mapper,
        )
    }
}

impl fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphContext")
            .field("endpoint", &self.inner.endpoint.url())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// A query returning many items.
///
/// Nothing is sent until a cursor created from it is advanced.
pub struct CollectionQuery<T> {
    context: GraphContext,
    query: GraphQuery,
    _item: PhantomData<fn() -> T>,
}

impl<T> CollectionQuery<T>
where
    T: DeserializeOwned + 'static,
{
    /// A fresh cursor over this query's items.
    pub fn cursor(&self) -> QueryCursor<T> {
        self.context.cursor(self.query.clone(), |item| item)
    }

    /// A fresh cursor that maps each decoded item.
    pub fn select<U: 'static>(&self, mapper: impl Fn(T) -> U + Send + 'static) -> QueryCursor<U, T> {
        self.context.cursor(self.query.clone(), mapper)
    }

    /// Run the query and collect every item.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.cursor().collect()
    }

    pub fn query(&self) -> &GraphQuery {
        &self.query
    }
}

impl<T> IntoIterator for CollectionQuery<T>
where
    T: DeserializeOwned + 'static,
{
    type Item = Result<T>;
    type IntoIter = QueryCursor<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.context.cursor(self.query, |item| item)
    }
}

impl<T> IntoIterator for &CollectionQuery<T>
where
    T: DeserializeOwned + 'static,
{
    type Item = Result<T>;
    type IntoIter = QueryCursor<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.cursor()
    }
}

impl<T> fmt::Debug for CollectionQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionQuery")
            .field("endpoint", &self.context.endpoint().url())
            .field("query", &self.query.query_text())
            .finish()
    }
}

/// A query returning exactly one item.
pub struct ItemQuery<T> {
    inner: CollectionQuery<T>,
}

impl<T> ItemQuery<T>
where
    T: DeserializeOwned + 'static,
{
    /// Run the query and return its item.
    ///
    /// A result with no items is a protocol violation. Only the first item of
    /// an array result is decoded.
    pub fn fetch(&self) -> Result<T> {
        let mut cursor = self.inner.cursor();
        let item = cursor.next().unwrap_or_else(|| {
            Err(Error::ProtocolViolation(format!(
                "query for '{}' returned no item",
                self.inner.query.result_alias()
            )))
        });
        cursor.dispose();
        item
    }

    pub fn query(&self) -> &GraphQuery {
        &self.inner.query
    }
}

impl<T> fmt::Debug for ItemQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemQuery")
            .field("endpoint", &self.inner.context.endpoint().url())
            .field("query", &self.inner.query.query_text())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_rejected() {
        let err = GraphContext::new("not a url").unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("endpoint URL")));
    }

    #[test]
    fn test_invalid_authorization_is_rejected() {
        let err = GraphContext::builder("http://localhost/graphql")
            .authorization("Bearer a\r\nb")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("authorization")));
    }

    #[test]
    fn test_bearer_auth_sets_endpoint_header() {
        let context = GraphContext::builder("http://localhost/graphql")
            .bearer_auth("secret")
            .build()
            .unwrap();
        assert_eq!(context.endpoint().authorization_header(), Some("Bearer secret"));
        assert_eq!(context.endpoint().url(), "http://localhost/graphql");
    }

    #[test]
    fn test_invalid_header_is_rejected_at_build() {
        let err = GraphContext::builder("http://localhost/graphql")
            .header("Bad Header", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
