//! Reference model for model-based testing.
//!
//! The model is a simplified mailbox that keeps time as a plain millisecond
//! counter. It serves as the oracle against which `ScanMailbox` is verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Deterministic: Same inputs produce same outputs

mod mailbox;
pub mod operation;

pub use mailbox::ModelMailbox;
pub use operation::{ModelCard, Operation, OperationResult};
