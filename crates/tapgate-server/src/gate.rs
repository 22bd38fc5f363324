//! Gate runtime.
//!
//! Wires both sides of the system over one bus:
//!
//! ```text
//! console ──► Gate::execute ──► Authenticator ──► rfid/control ──► reader
//!    │                               ▲                               │
//!    └── tap ──► TagFeed             └── mailbox ◄── rfid/scan ◄─────┘
//! ```

use std::{fmt, sync::Arc};

use tapgate_core::{
    Authenticator, Bus, CardId, Environment, IdentityStore, LoginOutcome, RegisterOutcome,
    RendezvousWaiter, ScanControl, ScanMailbox, ScanSubscriber,
};
use tapgate_reader::{ChannelTagReader, PublishStats, ReaderHandle, TagFeed, spawn_reader};
use tokio::task::JoinHandle;

use crate::{
    GateConfig, GateError,
    command::{Command, HELP},
};

/// Result of one console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A login or identify request finished.
    Login(LoginOutcome),
    /// A registration request finished.
    Register(RegisterOutcome),
    /// A card was placed on the antenna.
    Tapped {
        /// Card presented.
        card: CardId,
    },
    /// A card was banned.
    Banned {
        /// Card banned.
        card: CardId,
    },
    /// Usage text.
    Help,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login(LoginOutcome::Granted { username, card }) => {
                write!(f, "welcome {username} (card {card})")
            },
            Self::Login(LoginOutcome::UnknownUser) => write!(f, "unknown user"),
            Self::Login(LoginOutcome::UnknownCard { card }) => {
                write!(f, "card {card} is not registered")
            },
            Self::Login(LoginOutcome::Banned { card })
            | Self::Register(RegisterOutcome::Banned { card }) => {
                write!(f, "card {card} is banned")
            },
            Self::Login(LoginOutcome::NoScan) => write!(f, "no card scanned in time"),
            Self::Register(RegisterOutcome::Registered { card }) => {
                write!(f, "card {card} registered")
            },
            Self::Register(RegisterOutcome::DuplicateCard { card }) => {
                write!(f, "card {card} already belongs to another user")
            },
            Self::Register(RegisterOutcome::DuplicateUsername) => {
                write!(f, "username already has a card")
            },
            Self::Register(RegisterOutcome::InvalidUsername) => write!(f, "invalid username"),
            Self::Register(RegisterOutcome::NoScan { attempts }) => {
                write!(f, "no card scanned after {attempts} attempts")
            },
            Self::Tapped { card } => write!(f, "card {card} presented"),
            Self::Banned { card } => write!(f, "card {card} banned"),
            Self::Help => f.write_str(HELP),
        }
    }
}

struct Requests<E: Environment, B: Bus, S: IdentityStore> {
    auth: Arc<Authenticator<E, B, S>>,
    feed: TagFeed<E>,
}

impl<E: Environment, B: Bus, S: IdentityStore> Clone for Requests<E, B, S> {
    fn clone(&self) -> Self {
        Self { auth: Arc::clone(&self.auth), feed: self.feed.clone() }
    }
}

impl<E: Environment, B: Bus, S: IdentityStore> Requests<E, B, S> {
    async fn execute(&self, command: Command) -> Result<Reply, GateError> {
        match command {
            Command::Login { username } => Ok(Reply::Login(self.auth.login(&username).await?)),
            Command::Identify => Ok(Reply::Login(self.auth.identify().await?)),
            Command::Register { username } => {
                Ok(Reply::Register(self.auth.register(&username).await?))
            },
            Command::Tap { card } => {
                if let Err(e) = self.feed.present(card) {
                    tracing::warn!(card = %card, error = %e, "tap lost");
                }
                Ok(Reply::Tapped { card })
            },
            Command::Ban { card } => {
                self.auth.store().ban(card)?;
                tracing::info!(card = %card, "card banned");
                Ok(Reply::Banned { card })
            },
            Command::Help => Ok(Reply::Help),
        }
    }
}

/// Running server and reader sharing one bus.
pub struct Gate<E: Environment, B: Bus, S: IdentityStore> {
    requests: Requests<E, B, S>,
    mailbox: Arc<ScanMailbox<E>>,
    reader: ReaderHandle,
    subscriber: JoinHandle<()>,
}

impl<E, B, S> Gate<E, B, S>
where
    E: Environment,
    B: Bus,
    S: IdentityStore,
{
    /// Validate `config`, then start the scan subscriber and the reader.
    pub async fn start(
        env: E,
        bus: Arc<B>,
        store: Arc<S>,
        config: GateConfig,
    ) -> Result<Self, GateError> {
        config.validate()?;

        let mailbox = Arc::new(ScanMailbox::new(env.clone(), config.mailbox));
        let subscriber = ScanSubscriber::attach(bus.as_ref(), Arc::clone(&mailbox)).await?;
        let subscriber = tokio::spawn(subscriber.run());

        let waiter = RendezvousWaiter::new(env.clone(), Arc::clone(&mailbox), config.rendezvous);
        let control = ScanControl::new(Arc::clone(&bus));
        let auth = Arc::new(Authenticator::new(waiter, control, store, config.auth));

        let (feed, tag) = ChannelTagReader::new(env.clone(), config.tap_presence);
        let reader = match spawn_reader(env, bus, tag, config.reader).await {
            Ok(reader) => reader,
            Err(e) => {
                subscriber.abort();
                return Err(e.into());
            },
        };

        tracing::info!(
            ttl = ?config.mailbox.ttl,
            capacity = config.mailbox.capacity,
            "gate started"
        );

        Ok(Self { requests: Requests { auth, feed }, mailbox, reader, subscriber })
    }

    /// Scans waiting to be claimed.
    pub fn mailbox(&self) -> &Arc<ScanMailbox<E>> {
        &self.mailbox
    }

    /// Whether the reader is currently reporting scans.
    pub fn is_scanning(&self) -> bool {
        self.reader.is_enabled()
    }

    /// Run `command` to completion.
    pub async fn execute(&self, command: Command) -> Result<Reply, GateError> {
        self.requests.execute(command).await
    }

    /// Run `command` and log the reply.
    ///
    /// Commands that wait for a scan run on their own task, concurrently with
    /// later commands, and their handle is returned. Everything else finishes
    /// before this returns.
    pub async fn dispatch(&self, command: Command) -> Option<JoinHandle<()>> {
        let line = command.to_string();

        if !command.needs_scan() {
            log_reply(&line, self.requests.execute(command).await);
            return None;
        }

        let requests = self.requests.clone();
        Some(tokio::spawn(async move {
            log_reply(&line, requests.execute(command).await);
        }))
    }

    /// Stop the subscriber and the reader, returning the publish totals.
    pub async fn shutdown(self) -> PublishStats {
        self.subscriber.abort();
        let stats = self.reader.shutdown().await;
        tracing::info!(?stats, "gate stopped");
        stats
    }
}

fn log_reply(line: &str, reply: Result<Reply, GateError>) {
    match reply {
        Ok(reply) => tracing::info!(command = %line, %reply, "done"),
        Err(e) => tracing::error!(command = %line, error = %e, "command failed"),
    }
}

impl<E, B, S> fmt::Debug for Gate<E, B, S>
where
    E: Environment,
    B: Bus,
    S: IdentityStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("mailbox", &self.mailbox)
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}
