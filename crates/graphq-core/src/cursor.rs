//! Lazy, single-pass query cursors.
//!
//! A [`QueryCursor`] owns exactly one network exchange. Nothing is sent until
//! the first [`advance`](QueryCursor::advance); that call sends the document,
//! parses the envelope and keeps the result nodes for the rest of the
//! cursor's life. Each later advance decodes one node.
//!
//! ```ignore
//! let mut cursor: QueryCursor<User> =
//!     QueryCursor::new(transport, endpoint, query, DecodeOptions::default());
//! while cursor.advance()? {
//!     println!("{}", cursor.current().name);
//! }
//! cursor.dispose();
//! ```

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::decode::{DecodeOptions, decode_node};
use crate::envelope::{EnvelopeOutcome, ResponseEnvelopeParser, ResultNode};
use crate::error::{Error, Result};
use crate::logging::targets;
use crate::query::QueryDocument;
use crate::transport::{Endpoint, Transport, TransportRequest};

/// Shared handle to a transport.
pub type SharedTransport = Arc<dyn Transport + Send + Sync>;

/// Observable cursor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No exchange has happened yet.
    NotStarted,
    /// The response is held and items are being walked.
    Fetched,
    /// All items were consumed, the fetch failed, or the cursor was disposed.
    Exhausted,
}

/// The parsed response kept alive while items are walked.
struct Document {
    nodes: std::vec::IntoIter<ResultNode>,
}

enum State {
    NotStarted,
    Fetched(Document),
    Exhausted,
}

/// A forward-only cursor over the items of one query.
///
/// `S` is the type each result node decodes into; `T` is what the caller
/// sees after the mapping function runs. Without a mapper both are the same.
pub struct QueryCursor<T, S = T> {
    transport: SharedTransport,
    endpoint: Endpoint,
    query: Box<dyn QueryDocument + Send>,
    options: DecodeOptions,
    mapper: Box<dyn Fn(S) -> T + Send>,
    state: State,
    current: Option<T>,
}

impl<T> QueryCursor<T, T>
where
    T: DeserializeOwned + 'static,
{
    /// Create a cursor that decodes each node straight into `T`.
    ///
    /// No exchange happens until the first advance.
    pub fn new(
        transport: SharedTransport,
        endpoint: Endpoint,
        query: impl QueryDocument + Send + 'static,
        options: DecodeOptions,
    ) -> Self {
        Self::with_mapper(transport, endpoint, query, options, |item| item)
    }
}

impl<T, S> QueryCursor<T, S>
where
    S: DeserializeOwned + 'static,
    T: 'static,
{
    /// Create a cursor that decodes each node into `S` and maps it to `T`.
    pub fn with_mapper(
        transport: SharedTransport,
        endpoint: Endpoint,
        query: impl QueryDocument + Send + 'static,
        options: DecodeOptions,
        mapper: impl Fn(S) -> T + Send + 'static,
    ) -> Self {
        Self {
            transport,
            endpoint,
            query: Box::new(query),
            options,
            mapper: Box::new(mapper),
            state: State::NotStarted,
            current: None,
        }
    }

    /// Chain another mapping step after the current one.
    pub fn select<U: 'static>(self, mapper: impl Fn(T) -> U + Send + 'static) -> QueryCursor<U, S> {
        let current = self.current.map(&mapper);
        let first = self.mapper;
        QueryCursor {
            transport: self.transport,
            endpoint: self.endpoint,
            query: self.query,
            options: self.options,
            mapper: Box::new(move |source| mapper(first(source))),
            state: self.state,
            current,
        }
    }

    /// Move to the next item.
    ///
    /// The first call performs the exchange. Returns `Ok(false)` once the
    /// items are used up, and keeps returning it afterwards. A failed fetch
    /// also exhausts the cursor: the exchange is never repeated.
    pub fn advance(&mut self) -> Result<bool> {
        if matches!(self.state, State::NotStarted) {
            self.state = State::Exhausted;
            let document = self.fetch()?;
            tracing::debug!(
                target: targets::CURSOR,
                items = document.nodes.len(),
                "query result fetched"
            );
            self.state = State::Fetched(document);
        }

        self.current = None;
        let State::Fetched(document) = &mut self.state else {
            return Ok(false);
        };

        match document.nodes.next() {
            Some(node) => {
                let source: S = decode_node(&node, &self.options)?;
                self.current = Some((self.mapper)(source));
                Ok(true)
            }
            None => {
                tracing::trace!(target: targets::CURSOR, "query cursor exhausted");
                self.state = State::Exhausted;
                Ok(false)
            }
        }
    }

    /// The item at the cursor position.
    ///
    /// # Panics
    ///
    /// Panics when there is no current item: before a successful
    /// [`advance`](Self::advance), after exhaustion, or after a failed one.
    pub fn current(&self) -> &T {
        match self.current {
            Some(ref item) => item,
            None => panic!("QueryCursor::current called without a current item"),
        }
    }

    /// The item at the cursor position, if any.
    pub fn try_current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Release the held response.
    ///
    /// Safe to call at any point and any number of times. A cursor disposed
    /// before its first advance never performs the exchange.
    pub fn dispose(&mut self) {
        self.current = None;
        if let State::Fetched(document) = std::mem::replace(&mut self.state, State::Exhausted) {
            tracing::trace!(
                target: targets::CURSOR,
                remaining = document.nodes.len(),
                "query document released"
            );
        }
    }

    /// Restarting a cursor is not supported; run the query again instead.
    pub fn reset(&mut self) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "query cursors are single-pass and cannot be reset",
        ))
    }

    pub fn state(&self) -> CursorState {
        match self.state {
            State::NotStarted => CursorState::NotStarted,
            State::Fetched(_) => CursorState::Fetched,
            State::Exhausted => CursorState::Exhausted,
        }
    }

    /// The query text this cursor sends.
    pub fn query_text(&self) -> &str {
        self.query.query_text()
    }

    fn fetch(&self) -> Result<Document> {
        let document = self.query.document();
        let alias = self.query.result_alias();
        tracing::debug!(
            target: targets::CURSOR,
            endpoint = self.endpoint.url(),
            alias,
            "executing query"
        );

        let request = TransportRequest {
            document: &document,
            endpoint: self.endpoint.url(),
            authorization: self.endpoint.authorization_header(),
        };

        let outcome = match self.transport.send(request) {
            Ok(body) => ResponseEnvelopeParser.parse(&body, alias)?,
            Err(err) => {
                let Some(body) = err.usable_body() else {
                    return Err(err.into());
                };
                // Only a body that reads as an envelope replaces the failure.
                match ResponseEnvelopeParser.parse(body, alias) {
                    Ok(outcome) => {
                        tracing::warn!(
                            target: targets::ENVELOPE,
                            status = err.http_status(),
                            "transport failed but returned a response envelope, using it"
                        );
                        outcome
                    }
                    Err(_) => return Err(err.into()),
                }
            }
        };

        match outcome {
            EnvelopeOutcome::Items(nodes) => Ok(Document {
                nodes: nodes.into_iter(),
            }),
            EnvelopeOutcome::Errors(errors) => {
                tracing::debug!(
                    target: targets::CURSOR,
                    count = errors.len(),
                    "server reported query errors"
                );
                Err(Error::Execution {
                    errors,
                    query: self.query.query_text().to_owned(),
                })
            }
        }
    }
}

impl<T, S> Iterator for QueryCursor<T, S>
where
    S: DeserializeOwned + 'static,
    T: 'static,
{
    type Item = Result<T>;

    /// Yields items until exhaustion; after an error the cursor is disposed
    /// and yields nothing more.
    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => self.current.take().map(Ok),
            Ok(false) => None,
            Err(err) => {
                self.dispose();
                Some(Err(err))
            }
        }
    }
}

impl<T, S> FusedIterator for QueryCursor<T, S>
where
    S: DeserializeOwned + 'static,
    T: 'static,
{
}

impl<T, S> fmt::Debug for QueryCursor<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::NotStarted => "NotStarted",
            State::Fetched(_) => "Fetched",
            State::Exhausted => "Exhausted",
        };
        f.debug_struct("QueryCursor")
            .field("endpoint", &self.endpoint.url())
            .field("alias", &self.query.result_alias())
            .field("state", &state)
            .field("has_current", &self.current.is_some())
            .finish()
    }
}
