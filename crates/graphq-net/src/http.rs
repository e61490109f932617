//! Blocking HTTP transport.
//!
//! Posts query documents as `application/json` and hands the raw body back to
//! the cursor. Non-success statuses become a [`TransportError`] that still
//! carries the body, so GraphQL error envelopes sent with a 4xx/5xx status
//! are not lost.

use std::time::Duration;

use bytes::Bytes;
use graphq_core::{Error, Result, Transport, TransportError, TransportErrorKind, TransportRequest};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;

const TARGET: &str = "graphq_net::http";

/// Configuration for the HTTP transport.
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
    /// Default user agent.
    pub user_agent: Option<String>,
    /// Proxy URL, scoped to this transport.
    pub proxy: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            follow_redirects: true,
            max_redirects: 10,
            user_agent: Some(format!("graphq/{} (Rust)", env!("CARGO_PKG_VERSION"))),
            proxy: None,
        }
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Default)]
pub struct HttpTransportBuilder {
    config: HttpTransportConfig,
    default_headers: HeaderMap,
}

impl HttpTransportBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Disable redirect following.
    pub fn no_redirects(mut self) -> Self {
        self.config.follow_redirects = false;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Route requests through a proxy.
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy_url.into());
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Configuration(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Configuration(format!("invalid value for header '{name}': {e}")))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Build the transport.
    pub fn build(self) -> Result<HttpTransport> {
        let mut builder = reqwest::blocking::Client::builder();

        // Timeouts
        builder = builder.timeout(self.config.timeout);
        if let Some(connect_timeout) = self.config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        // Redirect policy
        if self.config.follow_redirects {
            builder = builder.redirect(Policy::limited(self.config.max_redirects));
        } else {
            builder = builder.redirect(Policy::none());
        }

        if let Some(ref ua) = self.config.user_agent {
            builder = builder.user_agent(ua);
        }

        if let Some(ref proxy_url) = self.config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::Configuration(format!("invalid proxy '{proxy_url}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        if !self.default_headers.is_empty() {
            builder = builder.default_headers(self.default_headers);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpTransport {
            client,
            config: self.config,
        })
    }
}

/// A [`Transport`] backed by a blocking `reqwest` client.
///
/// Each call blocks the calling thread until the response body has been read
/// or the configured timeout fires. Do not call it from inside an async
/// runtime worker.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a transport with default settings.
    pub fn new() -> Result<Self> {
        HttpTransportBuilder::new().build()
    }

    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: TransportRequest<'_>) -> std::result::Result<Bytes, TransportError> {
        let mut req = self
            .client
            .post(request.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(request.document.to_vec());

        if let Some(authorization) = request.authorization {
            req = req.header(AUTHORIZATION, authorization);
        }

        let response = req.send().map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().map_err(transport_error)?;

        tracing::debug!(
            target: TARGET,
            endpoint = request.endpoint,
            status = status.as_u16(),
            bytes = body.len(),
            "query exchange finished"
        );

        if status.is_success() {
            Ok(body)
        } else {
            Err(TransportError::status(status.as_u16(), body))
        }
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connection
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert!(config.follow_redirects);
        assert!(config.user_agent.unwrap().starts_with("graphq/"));
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let transport = HttpTransport::builder()
            .timeout(Duration::from_secs(5))
            .no_redirects()
            .user_agent("Tests/1.0")
            .build()
            .unwrap();

        assert_eq!(transport.config().timeout, Some(Duration::from_secs(5)));
        assert!(!transport.config().follow_redirects);
        assert_eq!(transport.config().user_agent.as_deref(), Some("Tests/1.0"));
    }

    #[test]
    fn test_invalid_default_header_is_rejected() {
        let err = HttpTransport::builder()
            .default_header("X-Trace", "line\nbreak")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let err = HttpTransport::builder().proxy("not a url").build().unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("proxy")));
    }
}
