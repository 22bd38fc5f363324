//! Deterministic simulation harness for tapgate testing.
//!
//! Paused-clock implementation of the Environment trait, a fault-injecting
//! bus and a scripted tag reader, for reproducible tests of the whole scan
//! path under transport failures.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the scan
//! mailbox. Operations are applied to both the model and the real mailbox,
//! and their observable results are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaotic_bus;
pub mod model;
pub mod sim_env;
pub mod tag;

pub use chaotic_bus::ChaoticBus;
pub use model::{ModelCard, ModelMailbox, Operation, OperationResult};
pub use sim_env::{SimEnv, paused_runtime};
pub use tag::{Presence, ScriptedTagReader};
