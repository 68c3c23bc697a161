//! Error taxonomy for the RPC transport and marshalling core.
//!
//! Each variant corresponds to one of the error kinds in the protocol
//! design: transport-level failures, frame/message decode failures,
//! encode-time argument rejection, and syscall errors reported by the
//! server.

/// Errors produced anywhere in the client stub, server dispatcher, or the
/// shared codec/framer/transport layers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The underlying stream failed outright (refused, reset, or any other
    /// I/O error not otherwise classified below).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The connection was lost or a message was abandoned mid-transit.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The length-prefixed envelope could not be parsed (missing `:`,
    /// non-numeric length, or a length past the configured limit).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The framed payload could not be parsed as a request, response, or
    /// directory-tree node (missing header, slot-count mismatch, or a
    /// size that doesn't match the bytes available).
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A value could not be encoded onto the wire (for example, a
    /// directory entry name containing the line terminator).
    #[error("malformed argument: {0}")]
    MalformedArgument(String),

    /// The real system call ran and failed; `errno` is the value the
    /// server's invocation reported.
    #[error("remote syscall failed, errno={errno}")]
    RemoteSyscallError {
        /// The errno value reported by the server's syscall.
        errno: i32,
    },

    /// The server received a request with an opcode it doesn't recognize.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u8),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the errno this error should be surfaced to a caller as,
    /// following the propagation policy: transport/framing/decode errors
    /// become a transport-appropriate errno (`EIO`), while syscall errors
    /// pass their errno through unchanged.
    pub fn as_errno(&self) -> i32 {
        match self {
            Error::RemoteSyscallError { errno } => *errno,
            Error::Io(e) => e.raw_os_error().unwrap_or(libc_eio()),
            _ => libc_eio(),
        }
    }
}

#[cfg(unix)]
fn libc_eio() -> i32 {
    libc::EIO
}

#[cfg(not(unix))]
fn libc_eio() -> i32 {
    5 // EIO on every platform this protocol targets
}
