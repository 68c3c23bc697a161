//! Transparent remote execution of file-oriented system calls.
//!
//! A client library interposes ten file-oriented operations and forwards
//! the ones that target a remote handle to a server over a
//! length-prefixed, self-describing text protocol. See each module for
//! its piece of the pipeline: [`transport`] and [`framer`] carry bytes,
//! [`codec`] gives them shape, [`handle`] and [`opcode`] are the shared
//! vocabulary, and [`client`]/[`server`] are the two ends of the wire.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod framer;
pub mod handle;
pub mod logging;
pub mod opcode;
pub mod server;
pub mod transport;

pub use error::{Error, Result};
