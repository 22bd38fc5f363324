//! Runtime error types.

use tapgate_core::{AuthError, BusError, IdentityError};
use tapgate_reader::ReaderError;
use thiserror::Error;

/// Errors that can occur while running the gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Bus error while wiring the runtime
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// Reader failed to start
    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),

    /// Authentication flow aborted
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Identity store error outside a flow
    #[error("identity store error: {0}")]
    Identity(#[from] IdentityError),

    /// Console I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
