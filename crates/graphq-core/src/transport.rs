//! The seam between cursors and the network.

use bytes::Bytes;

use crate::error::TransportError;

/// Where a query document goes and how it is authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    authorization: Option<String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            authorization: None,
        }
    }

    /// Set the raw `Authorization` header value.
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into()).filter(|v: &String| !v.is_empty());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn authorization_header(&self) -> Option<&str> {
        self.authorization.as_deref()
    }
}

/// One outgoing exchange.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    /// The serialized query document.
    pub document: &'a [u8],
    /// Target URL.
    pub endpoint: &'a str,
    /// Optional `Authorization` header value.
    pub authorization: Option<&'a str>,
}

/// Sends one query document and returns the raw response body.
///
/// Proxy and credential settings belong to the implementation and are fixed
/// at construction. A failure that still carries a response body (e.g. an
/// HTTP 400 whose body is a GraphQL error envelope) should attach it via
/// [`TransportError::with_body`].
pub trait Transport {
    fn send(&self, request: TransportRequest<'_>) -> Result<Bytes, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: TransportRequest<'_>) -> Result<Bytes, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: TransportRequest<'_>) -> Result<Bytes, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: TransportRequest<'_>) -> Result<Bytes, TransportError> {
        (**self).send(request)
    }
}
