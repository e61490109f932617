//! Lazy query execution for GraphQL-style APIs.
//!
//! This crate provides the client-side core of graphq:
//!
//! - **Query cursors**: a query is described up front but nothing is sent
//!   until the first item is requested; one cursor performs at most one
//!   exchange
//! - **Envelope parsing**: `data` vs `errors` discrimination and single vs
//!   array result normalization
//! - **Typed decoding**: options-aware decoding of result nodes, including
//!   GraphQL enum names and custom scalars such as epoch-second dates
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use graphq_core::{DecodeOptions, Endpoint, GraphQuery, QueryCursor};
//!
//! let query = GraphQuery::new("query { result: users { id name } }", "result");
//! let mut cursor: QueryCursor<User> = QueryCursor::new(
//!     Arc::new(my_transport),
//!     Endpoint::new("https://api.example.com/graphql"),
//!     query,
//!     DecodeOptions::default(),
//! );
//!
//! // The request is sent here.
//! while cursor.advance()? {
//!     println!("{:?}", cursor.current());
//! }
//! ```
//!
//! Cursors are also iterators over `Result<T>`:
//!
//! ```ignore
//! let names: Vec<String> = cursor
//!     .select(|user: User| user.name)
//!     .collect::<Result<_, _>>()?;
//! ```
//!
//! # Logging
//!
//! The crate logs through `tracing` under the targets in [`logging::targets`].
//! Install a subscriber in the application to see them.

pub mod cursor;
pub mod decode;
pub mod envelope;
mod error;
pub mod logging;
pub mod query;
pub mod scalar;
pub mod transport;

pub use cursor::{CursorState, QueryCursor, SharedTransport};
pub use decode::DecodeOptions;
pub use envelope::{
    EnvelopeOutcome, ErrorLocation, GraphQueryError, PathSegment, ResponseEnvelopeParser,
    ResultNode,
};
pub use error::{Error, Result, ScalarDecodeError, TransportError, TransportErrorKind};
pub use query::{GraphQuery, QueryDocument};
pub use scalar::{ScalarConverter, UnixDateTime, UnixDateTimeConverter};
pub use transport::{Endpoint, Transport, TransportRequest};
