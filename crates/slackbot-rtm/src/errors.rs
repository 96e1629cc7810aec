//! Error types for session bootstrap, the event stream, and dispatch.

use thiserror::Error;

/// Errors surfaced to the embedder by [`crate::Client`].
#[derive(Debug, Error)]
pub enum BotError {
    /// The client was configured with unusable values (e.g. an empty token).
    #[error("configuration error: {0}")]
    Config(String),

    /// A handler pattern failed to compile.
    #[error("invalid handler pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern as registered.
        pattern: String,
        /// Compilation failure.
        #[source]
        source: regex::Error,
    },

    /// Network or HTTP failure while bootstrapping or connecting.
    #[error("transport error: {0}")]
    Transport(String),

    /// A response did not have the expected structure.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The gateway explicitly declined the session.
    #[error("session rejected: {reason}")]
    Rejected {
        /// Reason string supplied by the gateway.
        reason: String,
    },

    /// The established stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl BotError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::Rejected { .. } => "rejected",
            Self::Stream(_) => "stream",
        }
    }
}

/// Read or write failure on an established stream.
///
/// `Clone` so the writer can report one failure to the dispatch that
/// triggered it and keep its own copy.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// Reading a frame failed.
    #[error("stream read failed: {0}")]
    Read(String),
    /// Writing a frame failed.
    #[error("stream write failed: {0}")]
    Write(String),
    /// The peer closed the stream.
    #[error("stream closed by peer")]
    Closed,
    /// An outbound frame could not be encoded.
    #[error("failed to encode frame: {0}")]
    Encode(String),
    /// The outbound writer is no longer running.
    #[error("outbound writer stopped")]
    WriterStopped,
}

/// Failure of a single dispatch task. Never escapes the task's own scope
/// beyond a log line.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The handler returned an error.
    #[error("handler for '{pattern}' failed: {source}")]
    Handler {
        /// Pattern of the selected binding.
        pattern: String,
        /// The handler's error.
        #[source]
        source: anyhow::Error,
    },
    /// The handler panicked.
    #[error("handler for '{pattern}' panicked")]
    HandlerPanicked {
        /// Pattern of the selected binding.
        pattern: String,
    },
    /// The reply could not be written.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
