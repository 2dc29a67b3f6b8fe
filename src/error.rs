//! Bridge error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by handlers registered through `on_event`.
///
/// Handler failures are recovered at the dispatch boundary and reported via
/// `tracing`; they never propagate into the bridge or the scheduler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while bridging platform events.
#[derive(Error, Debug)]
pub enum Error {
    /// An operation that requires a live connection was invoked before
    /// `initialize` completed.
    #[error("Bridge has not been initialized: call initialize first")]
    Uninitialized,

    /// `initialize` was invoked a second time on the same bridge.
    #[error("Bridge is already initialized for channel {0}")]
    AlreadyInitialized(String),

    /// A textual field from the platform failed to parse. Scoped to the
    /// single originating event; the event is dropped with a diagnostic.
    #[error("Malformed {field} field: {value:?}")]
    MalformedField {
        field: &'static str,
        value: String,
    },

    /// Platform client connection errors (IRC, pubsub, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Detected breach of the batch store's locking invariants. Should never
    /// occur; fatal to the offending operation, never silently ignored.
    #[error("Concurrency violation: {0}")]
    Concurrency(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a malformed-field error.
    pub fn malformed_field(field: &'static str, value: impl Into<String>) -> Self {
        Self::MalformedField {
            field,
            value: value.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
