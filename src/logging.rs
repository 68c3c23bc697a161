//! Diagnostics for the transport, framing, and dispatch layers.
//!
//! This is deliberately small: connection accept/teardown, decode
//! failures, unknown opcodes, and syscall errors are the events worth
//! surfacing. When the `logwise` feature is enabled, events are routed
//! through `logwise`'s structured macros; otherwise they fall back to
//! `eprintln!`, mirroring the plain stderr shim every caller gets when
//! no logging framework is wired up.

/// Logs an informational event (connection accepted, session closed cleanly).
pub fn info(msg: &str) {
    #[cfg(feature = "logwise")]
    {
        logwise::info_sync!("{msg}", msg = msg);
    }
    #[cfg(not(feature = "logwise"))]
    {
        eprintln!("[fsrpc] {msg}");
    }
}

/// Logs a warning-level event (a connection was dropped mid-message, a
/// syscall handler saw an unusual error).
pub fn warn(msg: &str) {
    #[cfg(feature = "logwise")]
    {
        logwise::warn_sync!("{msg}", msg = msg);
    }
    #[cfg(not(feature = "logwise"))]
    {
        eprintln!("[fsrpc] warn: {msg}");
    }
}

/// Logs an error-level event (a frame or message failed to decode, an
/// unknown opcode arrived).
pub fn error(msg: &str) {
    #[cfg(feature = "logwise")]
    {
        logwise::error_sync!("{msg}", msg = msg);
    }
    #[cfg(not(feature = "logwise"))]
    {
        eprintln!("[fsrpc] error: {msg}");
    }
}
