//! Tapgate runtime.
//!
//! This crate runs the rendezvous server and the reader side together:
//! - Tokio for the async runtime
//! - An in-process bus between the two sides
//! - System time via [`SystemEnv`]
//!
//! ## Architecture
//!
//! ```text
//! tapgate-server
//!   ├─ SystemEnv          (production Environment impl)
//!   ├─ GateConfig         (mailbox, rendezvous, auth and reader settings)
//!   ├─ Gate               (subscriber + authenticator + reader wiring)
//!   └─ Command            (console line protocol)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
mod config;
mod error;
mod gate;
mod system_env;

pub use command::{Command, CommandError, HELP};
pub use config::GateConfig;
pub use error::GateError;
pub use gate::{Gate, Reply};
pub use system_env::SystemEnv;
