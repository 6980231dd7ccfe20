//! # tagflow-rs
//!
//! Streaming control-tag filter for conversational LLM backends.
//!
//! Language models in this system interleave machine-readable control tags
//! (e.g. `<trip_update>{"field":...}</trip_update>`) with user-visible prose
//! in a single token stream. tagflow-rs removes those tag regions from what
//! the client sees, extracts and dispatches their payloads, and forwards
//! everything else with minimal added latency - even when a tag is split
//! one character per fragment across chunk boundaries.
//!
//! ## Features
//!
//! - **Chunk-invariant filtering**: the same clean output and payloads for
//!   any fragmentation of the input
//! - **Closed marker set**: recognized tag types are a fixed enum, not
//!   string literals scattered across call sites
//! - **Turn orchestration**: ordered `token` events, deferred
//!   `payload_applied` events, a single `complete` per turn
//! - **`SQLite` persistence**: read-modify-write field updates keyed by
//!   subject id

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod cli;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod marker;
pub mod session;
pub mod store;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export marker types
pub use marker::{
    FieldUpdate, MarkerDef, MarkerKind, MarkerRegistry, PhotoRequest, RawPayload, scan_text,
};

// Re-export filter types
pub use filter::{FilterOutput, FilterState, StreamFilter, filter_text};

// Re-export dispatch types
pub use dispatch::{
    DispatchOutcome, NullPhotoResolver, OutcomeDetail, PayloadDispatcher, PhotoResolver,
    ResolvedPhoto,
};

// Re-export session types
pub use session::{
    SessionHandle, SessionRegistry, SourceError, StreamSession, TransportSink, TurnEvent,
    TurnSummary,
};

// Re-export storage types
pub use store::{FieldStore, MemoryStore, SqliteStore};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
