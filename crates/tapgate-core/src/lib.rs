//! Tapgate core.
//!
//! Correlates asynchronously arriving RFID scans with synchronous requests
//! ("scan your card now") under a time budget.
//!
//! # Architecture
//!
//! ```text
//! bus (rfid/scan) ──► ScanSubscriber ──► ScanMailbox ──► RendezvousWaiter ──► Authenticator
//!                                                                                   │
//! bus (rfid/control) ◄──────────────── ScanControl ◄────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ScanMailbox`]: TTL-bounded, exactly-once store of recent scans
//! - [`RendezvousWaiter`]: wait-with-predicate-and-timeout over the mailbox
//! - [`ScanControl`]: start/stop directives to the reader
//! - [`ScanSubscriber`]: bus → mailbox pump
//! - [`Authenticator`]: login, identify and registration flows
//! - [`Environment`]: clock seam for deterministic tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod bus;
pub mod card;
pub mod control;
pub mod env;
pub mod error;
pub mod identity;
pub mod mailbox;
pub mod rendezvous;
pub mod subscriber;

pub use auth::{AuthConfig, AuthError, Authenticator, LoginOutcome, RegisterOutcome};
pub use bus::{Bus, BusError, CONTROL_TOPIC, MemoryBus, QoS, SCAN_TOPIC, Subscription};
pub use card::{CardId, ScanEvent};
pub use control::{Directive, ScanControl};
pub use env::Environment;
pub use error::PayloadError;
pub use identity::{Attempt, IdentityError, IdentityStore, MemoryIdentityStore};
pub use mailbox::{MailboxConfig, ScanMailbox};
pub use rendezvous::{RendezvousConfig, RendezvousWaiter};
pub use subscriber::ScanSubscriber;
