//! Tapgate console binary.
//!
//! Runs the rendezvous server and a simulated reader over an in-process bus,
//! taking one command per stdin line.
//!
//! # Usage
//!
//! ```bash
//! tapgate --login-timeout-secs 20 --debounce-ms 1500
//! > register alice
//! > tap 1234
//! > login alice
//! > tap 1234
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tapgate_core::{
    AuthConfig, MailboxConfig, MemoryBus, MemoryIdentityStore, RendezvousConfig,
};
use tapgate_reader::ReaderConfig;
use tapgate_server::{Command, Gate, GateConfig, SystemEnv};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Tapgate RFID rendezvous console
#[derive(Parser, Debug)]
#[command(name = "tapgate")]
#[command(about = "RFID scan rendezvous over an in-process bus")]
#[command(version)]
struct Args {
    /// Age after which an unclaimed scan is discarded
    #[arg(long, default_value = "5000")]
    card_ttl_ms: u64,

    /// Upper bound on how long a waiter sleeps between mailbox checks
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// Time budget for login, identify and each registration round
    #[arg(long, default_value = "10")]
    login_timeout_secs: u64,

    /// Registration rounds before giving up
    #[arg(long, default_value = "3")]
    register_attempts: u32,

    /// Scans the mailbox holds before evicting the oldest
    #[arg(long, default_value = "64")]
    mailbox_capacity: usize,

    /// Cooldown for repeated reads of the same card
    #[arg(long, default_value = "2000")]
    debounce_ms: u64,

    /// Delay between two tag polls
    #[arg(long, default_value = "50")]
    reader_poll_ms: u64,

    /// Scans the reader's publish queue holds
    #[arg(long, default_value = "32")]
    queue_capacity: usize,

    /// How long a tapped card stays readable by the antenna
    #[arg(long, default_value = "500")]
    tap_presence_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn gate_config(&self) -> GateConfig {
        let login_timeout = Duration::from_secs(self.login_timeout_secs);

        GateConfig {
            mailbox: MailboxConfig {
                ttl: Duration::from_millis(self.card_ttl_ms),
                capacity: self.mailbox_capacity,
            },
            rendezvous: RendezvousConfig {
                poll_interval: Duration::from_millis(self.poll_interval_ms),
            },
            auth: AuthConfig {
                login_timeout,
                register_timeout: login_timeout,
                register_attempts: self.register_attempts,
            },
            reader: ReaderConfig {
                poll_interval: Duration::from_millis(self.reader_poll_ms),
                debounce_window: Duration::from_millis(self.debounce_ms),
                queue_capacity: self.queue_capacity,
                ..ReaderConfig::default()
            },
            tap_presence: Duration::from_millis(self.tap_presence_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Tapgate starting");

    let bus = Arc::new(MemoryBus::new());
    let store = Arc::new(MemoryIdentityStore::new());
    let gate = Gate::start(SystemEnv::new(), bus, store, args.gate_config()).await?;

    tracing::info!("{}", tapgate_server::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };

        let Some(line) = line else {
            break;
        };

        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(command) => {
                gate.dispatch(command).await;
            },
            Err(e) => tracing::warn!(line = %line.trim(), error = %e, "not a command"),
        }
    }

    gate.shutdown().await;

    Ok(())
}
