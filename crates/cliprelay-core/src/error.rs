//! Unified error type for cliprelay.
//!
//! Producer and consumer failures all funnel into [`Error`]. Callers use
//! [`Error::is_disconnect`] to tell a peer going away from a real fault.

use std::io;

/// Unified error type covering all failure modes in cliprelay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation on a socket or child process failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// A peer sent bytes that do not form a valid response frame.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A client request did not carry a valid segment identifier.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The capture collaborator failed; fatal to the capture loop.
    #[error("Capture error [{source_name}]: {message}")]
    Capture {
        /// Name of the capture source that failed.
        source_name: String,
        /// Human-readable error description.
        message: String,
    },

    /// The render sink rejected a segment or failed to play it.
    #[error("Render error [{sink}]: {message}")]
    Render {
        /// Name of the sink that failed.
        sink: String,
        /// Human-readable error description.
        message: String,
    },

    /// Configuration could not be parsed or is unusable.
    #[error("Config error: {0}")]
    Config(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Capture`].
    pub fn capture(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Capture {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Render`].
    pub fn render(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Render {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the remote end went away (EOF, reset,
    /// broken pipe) rather than a genuine fault.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
