//! Tapgate reader.
//!
//! Runs next to the RFID antenna: polls the tag reader, suppresses repeated
//! reads of a resting card, honours start/stop directives from the server,
//! and publishes accepted scans without ever blocking the poll loop on the
//! network.
//!
//! ```text
//! TagReader ──► Debouncer ──► ScanQueue ──► ScanPublisher ──► bus (rfid/scan)
//!                   ▲
//! bus (rfid/control) ──► ControlState
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod debounce;
pub mod gate;
pub mod publisher;
pub mod reader;
pub mod tag;

pub use debounce::Debouncer;
pub use gate::ControlState;
pub use publisher::{
    EnqueueError, PublishOutcome, PublishPolicy, PublishStats, ScanPublisher, ScanQueue,
};
pub use reader::{PollOutcome, ReaderConfig, ReaderError, ReaderHandle, ReaderLoop, spawn_reader};
pub use tag::{ChannelTagReader, DEFAULT_PRESENCE, TAP_BACKLOG, TagFeed, TagReader, TapRejected};
