//! Tracing targets used by the query pipeline.
//!
//! Use these with `tracing` directives to filter logs by subsystem, e.g.
//! `RUST_LOG=graphq_core::cursor=debug`.

/// Target names for log filtering.
pub mod targets {
    /// Cursor lifecycle: fetch, exhaustion, disposal.
    pub const CURSOR: &str = "graphq_core::cursor";
    /// Envelope parsing and transport body recovery.
    pub const ENVELOPE: &str = "graphq_core::envelope";
    /// Item decoding and scalar converters.
    pub const DECODE: &str = "graphq_core::decode";
    /// Query document construction.
    pub const QUERY: &str = "graphq_core::query";
}
