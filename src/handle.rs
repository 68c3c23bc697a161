//! Handle translator (C4): the bijection between the client-visible handle
//! namespace and the server's native handle namespace.
//!
//! Local handles occupy `[0, OFFSET)`; remote handles occupy
//! `[OFFSET, +∞)`. A client-visible remote handle `h` corresponds to
//! server-local handle `h - OFFSET`.

/// The additive offset separating the local and remote handle bands.
///
/// Do not change without a coordinated client+server upgrade (§6).
pub const OFFSET: i64 = 12345;

/// Translates a server-native handle to the client-visible remote handle.
pub fn to_client(native: i64) -> i64 {
    native + OFFSET
}

/// Translates a client-visible remote handle back to the server-native handle.
pub fn to_server(client_visible: i64) -> i64 {
    client_visible - OFFSET
}

/// Returns true when `h` names a local handle rather than a remote one.
pub fn is_local(h: i64) -> bool {
    h < OFFSET
}
