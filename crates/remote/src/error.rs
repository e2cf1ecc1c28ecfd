//! Error types for the remote client layer.

use thiserror::Error;

/// Errors reported by a remote client or the connection pool.
///
/// Mutation operations (`delete_file`, `rename`, ...) distinguish *refusal*
/// (`Ok(false)`) from transport failure (`Err`); only the latter is
/// represented here.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Establishing a connection to the host failed.
    #[error("connection to remote host failed: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// The host answered with something the client could not handle.
    #[error("remote protocol error for {path}: {message}")]
    Protocol {
        /// Remote path the operation targeted.
        path: String,
        /// Description of the protocol failure.
        message: String,
    },

    /// IO error on an open content stream.
    #[error("remote stream IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: std::io::Error,
    },
}
