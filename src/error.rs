//! Error types for tagflow operations.
//!
//! This module provides a comprehensive error hierarchy using `thiserror` for
//! all tagflow operations including filtering, dispatch, sessions, and
//! persistence.

use thiserror::Error;

/// Result type alias for tagflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for tagflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Filter-related errors (marker registry, state machine).
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// Dispatch-related errors (payload decoding and actions).
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Session-related errors (turn orchestration, transport).
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Storage-related errors (subject record persistence).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors (file operations in the CLI).
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Filter-specific errors for the marker registry and state machine.
#[derive(Error, Debug)]
pub enum FilterError {
    /// A marker definition has an empty delimiter.
    #[error("marker {name} has an empty delimiter")]
    EmptyDelimiter {
        /// Name of the offending marker.
        name: String,
    },

    /// Two marker definitions share a delimiter string.
    #[error("delimiter {delimiter:?} is used by more than one marker")]
    DuplicateDelimiter {
        /// The duplicated delimiter string.
        delimiter: String,
    },

    /// A marker uses the same string for open and close.
    #[error("marker {name} uses the same open and close delimiter")]
    IdenticalDelimiters {
        /// Name of the offending marker.
        name: String,
    },

    /// The registry contains no marker definitions.
    #[error("marker registry is empty")]
    EmptyRegistry,

    /// Regex compilation error in whole-text extraction.
    #[error("regex error: {0}")]
    Regex(String),
}

/// Dispatch-specific errors for payload decoding and actions.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Payload text is not valid structured data for its marker kind.
    #[error("undecodable {kind} payload: {reason}")]
    Decode {
        /// Marker kind name.
        kind: String,
        /// Why decoding failed.
        reason: String,
    },

    /// A decoded field update is missing its field name.
    #[error("field update has an empty field name")]
    EmptyField,

    /// Photo lookup failed.
    #[error("photo lookup failed for {query:?}: {reason}")]
    PhotoLookup {
        /// The lookup query.
        query: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// A dispatch task was cancelled before completing.
    #[error("dispatch task cancelled")]
    Cancelled,
}

/// Session-specific errors for turn orchestration.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The model-output source failed mid-turn.
    #[error("token source failed: {0}")]
    Source(String),

    /// Sending an event to the transport sink failed.
    #[error("transport send failed: {0}")]
    Transport(String),

    /// The turn was cancelled (client disconnect or shutdown).
    #[error("turn cancelled")]
    Cancelled,

    /// A session with this id is already registered.
    #[error("session already active: {id}")]
    AlreadyActive {
        /// Conversation id of the duplicate session.
        id: String,
    },

    /// No session registered under this id.
    #[error("session not found: {id}")]
    NotFound {
        /// Conversation id that was not found.
        id: String,
    },
}

/// Storage-specific errors for subject record persistence.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Subject record not found.
    #[error("subject not found: {subject_id}")]
    SubjectNotFound {
        /// Subject id that was not found.
        subject_id: String,
    },

    /// Serialization/deserialization error for the fields column.
    #[error("serialization error: {0}")]
    Serialization(String),
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<regex::Error> for FilterError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config {
            message: "bad retention limit".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad retention limit");
    }

    #[test]
    fn test_filter_error_display() {
        let err = FilterError::EmptyDelimiter {
            name: "trip_update".to_string(),
        };
        assert_eq!(err.to_string(), "marker trip_update has an empty delimiter");

        let err = FilterError::DuplicateDelimiter {
            delimiter: "<photo>".to_string(),
        };
        assert!(err.to_string().contains("<photo>"));

        let err = FilterError::EmptyRegistry;
        assert_eq!(err.to_string(), "marker registry is empty");
    }

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::Decode {
            kind: "photo".to_string(),
            reason: "expected object".to_string(),
        };
        assert!(err.to_string().contains("photo"));
        assert!(err.to_string().contains("expected object"));

        let err = DispatchError::EmptyField;
        assert!(err.to_string().contains("empty field name"));
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::Source("connection reset".to_string());
        assert!(err.to_string().contains("connection reset"));

        let err = SessionError::NotFound {
            id: "conv-42".to_string(),
        };
        assert_eq!(err.to_string(), "session not found: conv-42");

        let err = SessionError::Cancelled;
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::SubjectNotFound {
            subject_id: "rec-1".to_string(),
        };
        assert_eq!(err.to_string(), "subject not found: rec-1");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_filter() {
        let filter_err = FilterError::EmptyRegistry;
        let err: Error = filter_err.into();
        assert!(matches!(err, Error::Filter(_)));
    }

    #[test]
    fn test_error_from_dispatch() {
        let dispatch_err = DispatchError::Cancelled;
        let err: Error = dispatch_err.into();
        assert!(matches!(err, Error::Dispatch(_)));
    }

    #[test]
    fn test_error_from_session() {
        let session_err = SessionError::Cancelled;
        let err: Error = session_err.into();
        assert!(matches!(err, Error::Session(_)));
    }

    #[test]
    fn test_error_from_store() {
        let store_err = StoreError::Database("locked".to_string());
        let err: Error = store_err.into();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_from_rusqlite_error_to_store_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: StoreError = rusqlite_err.into();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_from_serde_json_error_to_store_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    #[allow(clippy::invalid_regex)]
    fn test_from_regex_error_to_filter_error() {
        let regex_err = regex::Regex::new("[invalid").unwrap_err();
        let err: FilterError = regex_err.into();
        assert!(matches!(err, FilterError::Regex(_)));
    }
}
