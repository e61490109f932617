//! HTTP plumbing for graphq query cursors.
//!
//! - [`HttpTransport`]: a blocking `reqwest` transport that keeps error
//!   bodies so GraphQL error envelopes survive non-2xx statuses
//! - [`GraphContext`]: endpoint, credentials and decode options shared by the
//!   queries run against one API
//! - [`QuerySignature`] and [`QueryBuilder`]: explicit argument binding and
//!   query text generation
//!
//! # Example
//!
//! ```ignore
//! use graphq_net::{GraphContext, QueryBuilder, QuerySignature};
//! use serde_json::json;
//!
//! let context = GraphContext::builder("https://api.example.com/graphql")
//!     .bearer_auth("my-token")
//!     .build()?;
//!
//! let users = QuerySignature::new("users").param("first", "Int");
//! let query = QueryBuilder::new(&users)
//!     .arguments(users.bind([json!(20)])?)
//!     .fields(["id", "name"])
//!     .build();
//!
//! for user in context.collection_query::<User>(query) {
//!     println!("{:?}", user?);
//! }
//! ```
//!
//! Transport calls block the calling thread. From async code, run cursors
//! inside `tokio::task::spawn_blocking` or a dedicated thread.

pub mod builder;
pub mod context;
pub mod http;

pub use builder::{BoundArguments, Parameter, QueryBuilder, QuerySignature, RESULT_ALIAS, Selection, SelectionSet};
pub use context::{CollectionQuery, GraphContext, GraphContextBuilder, ItemQuery};
pub use http::{HttpTransport, HttpTransportBuilder, HttpTransportConfig};

pub use graphq_core::{DecodeOptions, Error, GraphQuery, QueryCursor, Result};
