//! Authentication flows.
//!
//! Each flow follows the same contract: open a scan window, wait for a card,
//! close the window, then consult the identity store. Usernames are trimmed
//! before any lookup or insert. Outcomes are plain
//! values; only identity-store outages surface as errors.

use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    bus::Bus,
    card::CardId,
    control::ScanControl,
    env::Environment,
    identity::{IdentityError, IdentityStore},
    rendezvous::RendezvousWaiter,
};

/// Flow timeouts and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthConfig {
    /// Time budget for the login scan.
    pub login_timeout: Duration,
    /// Time budget for each registration round.
    pub register_timeout: Duration,
    /// Registration rounds before giving up.
    pub register_attempts: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_timeout: Duration::from_secs(10),
            register_timeout: Duration::from_secs(10),
            register_attempts: 3,
        }
    }
}

/// Result of a login or identify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The card was accepted.
    Granted {
        /// Authenticated user.
        username: String,
        /// Card that was presented.
        card: CardId,
    },
    /// The username has no registered card.
    UnknownUser,
    /// The scanned card is not registered.
    UnknownCard {
        /// Card that was presented.
        card: CardId,
    },
    /// The scanned card is banned.
    Banned {
        /// Card that was presented.
        card: CardId,
    },
    /// No matching card was scanned in time.
    NoScan,
}

/// Result of a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The card is now mapped to the username.
    Registered {
        /// Card that was registered.
        card: CardId,
    },
    /// The scanned card already belongs to someone.
    DuplicateCard {
        /// Card that was presented.
        card: CardId,
    },
    /// The username already has a card.
    DuplicateUsername,
    /// The scanned card is banned.
    Banned {
        /// Card that was presented.
        card: CardId,
    },
    /// The username is empty or blank.
    InvalidUsername,
    /// Every round timed out.
    NoScan {
        /// Rounds attempted.
        attempts: u32,
    },
}

/// Errors that abort a flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The identity store failed.
    #[error("identity store error: {0}")]
    Store(#[from] IdentityError),
}

/// Runs login, identify and registration requests against the rendezvous.
pub struct Authenticator<E: Environment, B: Bus, S: IdentityStore> {
    waiter: RendezvousWaiter<E>,
    control: ScanControl<B>,
    store: Arc<S>,
    config: AuthConfig,
}

impl<E, B, S> Authenticator<E, B, S>
where
    E: Environment,
    B: Bus,
    S: IdentityStore,
{
    /// Create an authenticator.
    pub fn new(
        waiter: RendezvousWaiter<E>,
        control: ScanControl<B>,
        store: Arc<S>,
        config: AuthConfig,
    ) -> Self {
        Self { waiter, control, store, config }
    }

    /// The identity store behind this authenticator.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Log `username` in with their registered card.
    ///
    /// Only a scan of the user's own card completes the rendezvous; other
    /// cards stay in the mailbox for other requests.
    pub async fn login(&self, username: &str) -> Result<LoginOutcome, AuthError> {
        let username = username.trim();
        let Some(expected) = self.store.card_for_username(username)? else {
            tracing::info!(username, "login for unknown user");
            return Ok(LoginOutcome::UnknownUser);
        };

        let Some(card) =
            self.rendezvous(self.config.login_timeout, move |card| card == expected).await
        else {
            tracing::info!(username, "login timed out waiting for card");
            return Ok(LoginOutcome::NoScan);
        };

        if self.store.is_banned(card)? {
            self.store.record_attempt(card, false)?;
            tracing::warn!(username, card = %card, "login with banned card");
            return Ok(LoginOutcome::Banned { card });
        }

        self.store.record_attempt(card, true)?;
        tracing::info!(username, card = %card, "login granted");
        Ok(LoginOutcome::Granted { username: username.to_string(), card })
    }

    /// Identify whoever taps next.
    pub async fn identify(&self) -> Result<LoginOutcome, AuthError> {
        let Some(card) = self.rendezvous(self.config.login_timeout, |_| true).await else {
            tracing::info!("identify timed out waiting for card");
            return Ok(LoginOutcome::NoScan);
        };

        if self.store.is_banned(card)? {
            self.store.record_attempt(card, false)?;
            tracing::warn!(card = %card, "identify with banned card");
            return Ok(LoginOutcome::Banned { card });
        }

        let Some(username) = self.store.username_for_card(card)? else {
            self.store.record_attempt(card, false)?;
            tracing::info!(card = %card, "identify with unregistered card");
            return Ok(LoginOutcome::UnknownCard { card });
        };

        self.store.record_attempt(card, true)?;
        tracing::info!(username = %username, card = %card, "identify granted");
        Ok(LoginOutcome::Granted { username, card })
    }

    /// Register the next tapped card to `username`.
    ///
    /// Runs up to `register_attempts` rounds; a round that sees no card moves
    /// on to the next. The first scanned card decides the outcome.
    pub async fn register(&self, username: &str) -> Result<RegisterOutcome, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Ok(RegisterOutcome::InvalidUsername);
        }

        for attempt in 1..=self.config.register_attempts {
            tracing::info!(username, attempt, "waiting for card to register");

            let Some(card) = self.rendezvous(self.config.register_timeout, |_| true).await else {
                continue;
            };

            if self.store.is_banned(card)? {
                tracing::warn!(username, card = %card, "registration with banned card");
                return Ok(RegisterOutcome::Banned { card });
            }

            return match self.store.insert_card_mapping(card, username) {
                Ok(()) => {
                    tracing::info!(username, card = %card, "card registered");
                    Ok(RegisterOutcome::Registered { card })
                },
                Err(IdentityError::DuplicateCard { card }) => {
                    tracing::info!(username, card = %card, "card already registered");
                    Ok(RegisterOutcome::DuplicateCard { card })
                },
                Err(IdentityError::DuplicateUsername { .. }) => {
                    tracing::info!(username, "username already registered");
                    Ok(RegisterOutcome::DuplicateUsername)
                },
                Err(e) => Err(e.into()),
            };
        }

        tracing::info!(username, attempts = self.config.register_attempts, "registration gave up");
        Ok(RegisterOutcome::NoScan { attempts: self.config.register_attempts })
    }

    async fn rendezvous<P>(&self, timeout: Duration, predicate: P) -> Option<CardId>
    where
        P: Fn(CardId) -> bool + Send + Sync,
    {
        self.control.begin_scan().await;
        let card = self.waiter.await_card(timeout, predicate).await;
        self.control.end_scan().await;
        card
    }
}

impl<E, B, S> std::fmt::Debug for Authenticator<E, B, S>
where
    E: Environment,
    B: Bus,
    S: IdentityStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("waiter", &self.waiter)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::{CONTROL_TOPIC, MemoryBus, Subscription},
        env::test_env::PausedEnv,
        identity::{Attempt, MemoryIdentityStore},
        mailbox::{MailboxConfig, ScanMailbox},
        rendezvous::RendezvousConfig,
    };

    struct Fixture {
        auth: Authenticator<PausedEnv, MemoryBus, MemoryIdentityStore>,
        mailbox: Arc<ScanMailbox<PausedEnv>>,
        store: Arc<MemoryIdentityStore>,
        control: Subscription,
    }

    async fn fixture() -> Fixture {
        let bus = Arc::new(MemoryBus::new());
        let control = bus.subscribe(CONTROL_TOPIC).await.unwrap();
        let mailbox = Arc::new(ScanMailbox::new(PausedEnv, MailboxConfig::default()));
        let store = Arc::new(MemoryIdentityStore::new());
        let waiter =
            RendezvousWaiter::new(PausedEnv, Arc::clone(&mailbox), RendezvousConfig::default());
        let auth = Authenticator::new(
            waiter,
            ScanControl::new(bus),
            Arc::clone(&store),
            AuthConfig::default(),
        );

        Fixture { auth, mailbox, store, control }
    }

    fn drain(sub: &mut Subscription) -> Vec<String> {
        let mut seen = Vec::new();
        while let Ok(Some(payload)) = sub.receive_once() {
            seen.push(String::from_utf8_lossy(&payload).into_owned());
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn login_granted_with_own_card() {
        let mut fx = fixture().await;
        fx.store.insert_card_mapping(CardId::new(7), "ada").unwrap();
        fx.mailbox.insert(CardId::new(7));

        let outcome = fx.auth.login("ada").await.unwrap();

        assert_eq!(outcome, LoginOutcome::Granted { username: "ada".into(), card: CardId::new(7) });
        assert_eq!(fx.store.attempts(), vec![Attempt { card: CardId::new(7), successful: true }]);
        assert_eq!(drain(&mut fx.control), vec!["start", "stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn login_ignores_other_cards() {
        let fx = fixture().await;
        fx.store.insert_card_mapping(CardId::new(7), "ada").unwrap();
        fx.mailbox.insert(CardId::new(8));

        let outcome = fx.auth.login("ada").await.unwrap();

        assert_eq!(outcome, LoginOutcome::NoScan);
        assert!(fx.store.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn login_for_unknown_user_does_not_scan() {
        let mut fx = fixture().await;

        assert_eq!(fx.auth.login("nobody").await.unwrap(), LoginOutcome::UnknownUser);
        assert!(drain(&mut fx.control).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn login_with_banned_card_is_refused_and_logged() {
        let fx = fixture().await;
        fx.store.insert_card_mapping(CardId::new(7), "ada").unwrap();
        fx.store.ban(CardId::new(7)).unwrap();
        fx.mailbox.insert(CardId::new(7));

        assert_eq!(fx.auth.login("ada").await.unwrap(), LoginOutcome::Banned { card: CardId::new(7) });
        assert_eq!(fx.store.attempts(), vec![Attempt { card: CardId::new(7), successful: false }]);
    }

    #[tokio::test(start_paused = true)]
    async fn padded_username_logs_in_after_padded_registration() {
        let fx = fixture().await;
        fx.mailbox.insert(CardId::new(7));
        assert_eq!(
            fx.auth.register(" bob ").await.unwrap(),
            RegisterOutcome::Registered { card: CardId::new(7) }
        );

        fx.mailbox.insert(CardId::new(7));
        assert_eq!(
            fx.auth.login(" bob ").await.unwrap(),
            LoginOutcome::Granted { username: "bob".into(), card: CardId::new(7) }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_flows_keep_scanning_until_the_last_one_ends() {
        let mut fx = fixture().await;
        fx.store.insert_card_mapping(CardId::new(1), "ada").unwrap();
        let auth = Arc::new(fx.auth);

        let identify = tokio::spawn({
            let auth = Arc::clone(&auth);
            async move { auth.identify().await }
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        let login = tokio::spawn({
            let auth = Arc::clone(&auth);
            async move { auth.login("ada").await }
        });

        assert_eq!(identify.await.unwrap().unwrap(), LoginOutcome::NoScan);
        assert_eq!(drain(&mut fx.control), vec!["start"]);

        fx.mailbox.insert(CardId::new(1));
        assert_eq!(
            login.await.unwrap().unwrap(),
            LoginOutcome::Granted { username: "ada".into(), card: CardId::new(1) }
        );
        assert_eq!(drain(&mut fx.control), vec!["stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn identify_maps_card_to_user() {
        let fx = fixture().await;
        fx.store.insert_card_mapping(CardId::new(3), "bob").unwrap();
        fx.mailbox.insert(CardId::new(3));

        assert_eq!(
            fx.auth.identify().await.unwrap(),
            LoginOutcome::Granted { username: "bob".into(), card: CardId::new(3) }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn identify_rejects_unregistered_card() {
        let fx = fixture().await;
        fx.mailbox.insert(CardId::new(4));

        assert_eq!(fx.auth.identify().await.unwrap(), LoginOutcome::UnknownCard { card: CardId::new(4) });
        assert_eq!(fx.store.attempts(), vec![Attempt { card: CardId::new(4), successful: false }]);
    }

    #[tokio::test(start_paused = true)]
    async fn register_takes_first_available_card() {
        let fx = fixture().await;
        fx.mailbox.insert(CardId::new(11));

        assert_eq!(
            fx.auth.register("cy").await.unwrap(),
            RegisterOutcome::Registered { card: CardId::new(11) }
        );
        assert_eq!(fx.store.card_for_username("cy").unwrap(), Some(CardId::new(11)));
    }

    #[tokio::test(start_paused = true)]
    async fn register_reports_duplicate_card() {
        let fx = fixture().await;
        fx.store.insert_card_mapping(CardId::new(11), "ada").unwrap();
        fx.mailbox.insert(CardId::new(11));

        assert_eq!(
            fx.auth.register("cy").await.unwrap(),
            RegisterOutcome::DuplicateCard { card: CardId::new(11) }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn register_reports_duplicate_username() {
        let fx = fixture().await;
        fx.store.insert_card_mapping(CardId::new(1), "cy").unwrap();
        fx.mailbox.insert(CardId::new(2));

        assert_eq!(fx.auth.register("cy").await.unwrap(), RegisterOutcome::DuplicateUsername);
    }

    #[tokio::test(start_paused = true)]
    async fn register_rejects_blank_username() {
        let mut fx = fixture().await;

        assert_eq!(fx.auth.register("  ").await.unwrap(), RegisterOutcome::InvalidUsername);
        assert!(drain(&mut fx.control).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn register_gives_up_after_configured_rounds() {
        let mut fx = fixture().await;

        let start = tokio::time::Instant::now();
        let outcome = fx.auth.register("cy").await.unwrap();

        assert_eq!(outcome, RegisterOutcome::NoScan { attempts: 3 });
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(drain(&mut fx.control), vec!["start", "stop", "start", "stop", "start", "stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn register_succeeds_on_a_later_round() {
        let fx = fixture().await;
        let mailbox = Arc::clone(&fx.mailbox);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            mailbox.insert(CardId::new(21));
        });

        assert_eq!(
            fx.auth.register("dee").await.unwrap(),
            RegisterOutcome::Registered { card: CardId::new(21) }
        );
    }
}
