//! Turn event wire types.
//!
//! The transport collaborator receives the turn as an ordered sequence of
//! typed events, tagged the way the original WebSocket messages were.

use crate::dispatch::DispatchOutcome;
use serde::Serialize;

/// One event in a turn's outbound sequence.
///
/// Ordering contract per turn: one `thinking`, zero or more `token` events
/// preserving input order, zero or more `payload_applied` events only after
/// every `token`, then exactly one `complete` - or `error` in its place
/// when the turn cannot finish.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// The model is working; emitted once before the first fragment.
    Thinking,

    /// One clean (marker-free) text fragment.
    Token {
        /// The fragment text.
        token: String,
    },

    /// A payload was dispatched; carries the decoded fields.
    PayloadApplied {
        /// Outcome of the dispatch.
        #[serde(flatten)]
        outcome: DispatchOutcome,
    },

    /// The turn finished; carries the full reconstructed clean text.
    Complete {
        /// Concatenation of every clean fragment in the turn.
        content: String,
    },

    /// The turn cannot finish.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}
