//! Reader poll loop.
//!
//! Each iteration:
//!
//! 1. Pump every pending control directive into [`ControlState`].
//! 2. If scanning is disabled, stop here.
//! 3. Poll the tag reader; no tag means nothing to do.
//! 4. Run the read through the [`Debouncer`]; suppressed reads stop here.
//! 5. Queue the scan for the publish worker without waiting.

use std::{sync::Arc, time::Duration};

use tapgate_core::{Bus, BusError, CONTROL_TOPIC, CardId, Directive, Environment, Subscription};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::{
    debounce::Debouncer,
    gate::ControlState,
    publisher::{EnqueueError, PublishPolicy, PublishStats, ScanPublisher, ScanQueue},
    tag::TagReader,
};

/// Errors raised while starting a reader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    /// Subscribing to the control topic failed.
    #[error("control subscription failed: {0}")]
    Subscribe(#[from] BusError),
}

/// Reader tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Delay between two tag polls.
    pub poll_interval: Duration,
    /// Cooldown for repeated reads of the same card.
    pub debounce_window: Duration,
    /// Scans the publish queue can hold.
    pub queue_capacity: usize,
    /// Scanning state before the first directive arrives.
    pub initially_enabled: bool,
    /// Clear debounce history when scanning is switched on.
    pub reset_debounce_on_start: bool,
    /// Retry policy of the publish worker.
    pub publish: PublishPolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            debounce_window: Duration::from_millis(2_000),
            queue_capacity: 32,
            initially_enabled: false,
            reset_debounce_on_start: true,
            publish: PublishPolicy::default(),
        }
    }
}

/// Result of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Scanning is disabled; the tag reader was not polled.
    Disabled,
    /// No tag in the field.
    Idle,
    /// Same card inside the debounce window.
    Suppressed(CardId),
    /// Queued for publishing.
    Reported(CardId),
    /// Accepted but the queue was full.
    QueueFull(CardId),
    /// The publish worker is gone.
    QueueClosed,
}

/// Reader-side poll loop.
pub struct ReaderLoop<E: Environment, T: TagReader> {
    env: E,
    tag: T,
    debouncer: Debouncer,
    control: Arc<ControlState>,
    directives: Option<Subscription>,
    queue: ScanQueue,
    config: ReaderConfig,
}

impl<E: Environment, T: TagReader> ReaderLoop<E, T> {
    /// Create a loop reading from `tag`, steered by `directives` and feeding
    /// `queue`.
    pub fn new(
        env: E,
        tag: T,
        directives: Subscription,
        queue: ScanQueue,
        config: ReaderConfig,
    ) -> Self {
        Self {
            env,
            tag,
            debouncer: Debouncer::new(config.debounce_window),
            control: Arc::new(ControlState::new(config.initially_enabled)),
            directives: Some(directives),
            queue,
            config,
        }
    }

    /// Shared view of the scanning flag.
    pub fn control(&self) -> Arc<ControlState> {
        Arc::clone(&self.control)
    }

    /// Run one iteration.
    pub fn step(&mut self) -> PollOutcome {
        self.pump_directives();

        if !self.control.is_enabled() {
            return PollOutcome::Disabled;
        }

        let Some(card) = self.tag.poll_tag() else {
            return PollOutcome::Idle;
        };

        if !self.debouncer.observe(card, self.env.now()) {
            tracing::trace!(card = %card, "read suppressed");
            return PollOutcome::Suppressed(card);
        }

        match self.queue.enqueue(card) {
            Ok(()) => {
                tracing::debug!(card = %card, "scan accepted");
                PollOutcome::Reported(card)
            },
            Err(EnqueueError::Full) => {
                tracing::warn!(card = %card, "publish queue full, dropping scan");
                PollOutcome::QueueFull(card)
            },
            Err(EnqueueError::Closed) => PollOutcome::QueueClosed,
        }
    }

    /// Poll until the publish worker goes away.
    pub async fn run(mut self) {
        loop {
            if self.step() == PollOutcome::QueueClosed {
                tracing::info!("publish worker gone, reader loop stopping");
                return;
            }
            self.env.sleep(self.config.poll_interval).await;
        }
    }

    fn pump_directives(&mut self) {
        let Some(directives) = self.directives.as_mut() else {
            return;
        };

        loop {
            let payload = match directives.receive_once() {
                Ok(Some(payload)) => payload,
                Ok(None) => return,
                Err(BusError::Closed) => {
                    tracing::warn!("control subscription closed, keeping last directive");
                    self.directives = None;
                    return;
                },
                Err(e) => {
                    tracing::warn!(error = %e, "control receive failed");
                    return;
                },
            };

            let directive = match Directive::from_payload(&payload) {
                Ok(directive) => directive,
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring control message");
                    continue;
                },
            };

            let started = self.control.apply(directive);
            tracing::info!(%directive, "control directive applied");

            if started && self.config.reset_debounce_on_start {
                self.debouncer.reset();
            }
        }
    }
}

impl<E: Environment, T: TagReader> std::fmt::Debug for ReaderLoop<E, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderLoop")
            .field("enabled", &self.control.is_enabled())
            .field("debouncer", &self.debouncer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Running reader: poll loop plus publish worker.
#[derive(Debug)]
pub struct ReaderHandle {
    control: Arc<ControlState>,
    poll: JoinHandle<()>,
    worker: JoinHandle<PublishStats>,
}

impl ReaderHandle {
    /// Whether the reader currently reports scans.
    pub fn is_enabled(&self) -> bool {
        self.control.is_enabled()
    }

    /// Stop polling, let the worker drain what is queued, and return its
    /// totals.
    pub async fn shutdown(self) -> PublishStats {
        self.poll.abort();
        let _ = self.poll.await;

        match self.worker.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "publish worker did not finish cleanly");
                PublishStats::default()
            },
        }
    }
}

/// Subscribe to [`CONTROL_TOPIC`], then spawn the poll loop and its publish
/// worker on the current runtime.
pub async fn spawn_reader<E, B, T>(
    env: E,
    bus: Arc<B>,
    tag: T,
    config: ReaderConfig,
) -> Result<ReaderHandle, ReaderError>
where
    E: Environment,
    B: Bus,
    T: TagReader,
{
    let directives = bus.subscribe(CONTROL_TOPIC).await?;
    let (queue, rx) = ScanQueue::bounded(config.queue_capacity);

    let reader = ReaderLoop::new(env, tag, directives, queue, config);
    let control = reader.control();

    let worker = tokio::spawn(ScanPublisher::new(bus, config.publish).run(rx));
    let poll = tokio::spawn(reader.run());

    tracing::info!(
        poll_interval = ?config.poll_interval,
        debounce_window = ?config.debounce_window,
        "reader started"
    );

    Ok(ReaderHandle { control, poll, worker })
}

#[cfg(test)]
mod tests {
    use std::{future::Future, time::Instant};

    use tapgate_core::MemoryBus;
    use tokio::sync::mpsc;

    use super::*;
    use crate::tag::{ChannelTagReader, DEFAULT_PRESENCE, TagFeed};

    #[derive(Clone)]
    struct PausedEnv;

    impl Environment for PausedEnv {
        fn now(&self) -> Instant {
            tokio::time::Instant::now().into_std()
        }

        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            tokio::time::sleep(duration)
        }
    }

    struct Fixture {
        bus: Arc<MemoryBus>,
        feed: TagFeed<PausedEnv>,
        reader: ReaderLoop<PausedEnv, ChannelTagReader<PausedEnv>>,
        published: mpsc::Receiver<CardId>,
    }

    async fn fixture(config: ReaderConfig) -> Fixture {
        let bus = Arc::new(MemoryBus::new());
        let directives = bus.subscribe(CONTROL_TOPIC).await.unwrap();
        let (feed, tag) = ChannelTagReader::new(PausedEnv, DEFAULT_PRESENCE);
        let (queue, published) = ScanQueue::bounded(config.queue_capacity);
        let reader = ReaderLoop::new(PausedEnv, tag, directives, queue, config);
        Fixture { bus, feed, reader, published }
    }

    async fn send(bus: &MemoryBus, directive: Directive) {
        bus.publish(CONTROL_TOPIC, directive.to_payload(), tapgate_core::QoS::AtLeastOnce)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_reader_does_not_poll() {
        let mut f = fixture(ReaderConfig::default()).await;
        f.feed.present(CardId::new(1)).unwrap();

        assert_eq!(f.reader.step(), PollOutcome::Disabled);

        send(&f.bus, Directive::Start).await;
        // The card presented while disabled is still in the field
        assert_eq!(f.reader.step(), PollOutcome::Reported(CardId::new(1)));
        assert_eq!(f.published.try_recv().ok(), Some(CardId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn tap_made_while_disabled_is_gone_once_it_leaves_the_field() {
        let mut f = fixture(ReaderConfig::default()).await;
        f.feed.present(CardId::new(666)).unwrap();
        assert_eq!(f.reader.step(), PollOutcome::Disabled);

        tokio::time::advance(Duration::from_secs(3_600)).await;
        send(&f.bus, Directive::Start).await;

        assert_eq!(f.reader.step(), PollOutcome::Idle);
        assert!(f.published.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_directive_silences_reader() {
        let config = ReaderConfig { initially_enabled: true, ..ReaderConfig::default() };
        let mut f = fixture(config).await;

        send(&f.bus, Directive::Stop).await;
        f.feed.present(CardId::new(1)).unwrap();

        assert_eq!(f.reader.step(), PollOutcome::Disabled);
        assert!(f.published.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn last_directive_in_a_batch_wins() {
        let mut f = fixture(ReaderConfig::default()).await;
        send(&f.bus, Directive::Start).await;
        send(&f.bus, Directive::Stop).await;
        send(&f.bus, Directive::Start).await;

        assert_eq!(f.reader.step(), PollOutcome::Idle);
        assert!(f.reader.control().is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn garbage_control_payload_is_ignored() {
        let mut f = fixture(ReaderConfig::default()).await;
        f.bus
            .publish(CONTROL_TOPIC, bytes::Bytes::from_static(b"pause"), tapgate_core::QoS::AtLeastOnce)
            .await
            .unwrap();

        assert_eq!(f.reader.step(), PollOutcome::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_reads_are_debounced_on_virtual_clock() {
        let config = ReaderConfig { initially_enabled: true, ..ReaderConfig::default() };
        let mut f = fixture(config).await;
        let card = CardId::new(9);

        let mut outcomes = Vec::new();
        for ms in [0, 500, 500, 1_500] {
            tokio::time::advance(Duration::from_millis(ms)).await;
            f.feed.present(card).unwrap();
            outcomes.push(f.reader.step());
        }

        assert_eq!(
            outcomes,
            vec![
                PollOutcome::Reported(card),
                PollOutcome::Suppressed(card),
                PollOutcome::Suppressed(card),
                PollOutcome::Reported(card),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_clears_debounce_history() {
        let config = ReaderConfig { initially_enabled: true, ..ReaderConfig::default() };
        let mut f = fixture(config).await;
        let card = CardId::new(9);

        f.feed.present(card).unwrap();
        assert_eq!(f.reader.step(), PollOutcome::Reported(card));

        send(&f.bus, Directive::Stop).await;
        send(&f.bus, Directive::Start).await;
        tokio::time::advance(Duration::from_millis(100)).await;
        f.feed.present(card).unwrap();

        assert_eq!(f.reader.step(), PollOutcome::Reported(card));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_keeps_history_when_reset_disabled() {
        let config = ReaderConfig {
            initially_enabled: true,
            reset_debounce_on_start: false,
            ..ReaderConfig::default()
        };
        let mut f = fixture(config).await;
        let card = CardId::new(9);

        f.feed.present(card).unwrap();
        assert_eq!(f.reader.step(), PollOutcome::Reported(card));

        send(&f.bus, Directive::Stop).await;
        send(&f.bus, Directive::Start).await;
        f.feed.present(card).unwrap();

        assert_eq!(f.reader.step(), PollOutcome::Suppressed(card));
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_scan_without_blocking() {
        let config =
            ReaderConfig { initially_enabled: true, queue_capacity: 1, ..ReaderConfig::default() };
        let mut f = fixture(config).await;

        f.feed.present(CardId::new(1)).unwrap();
        assert_eq!(f.reader.step(), PollOutcome::Reported(CardId::new(1)));
        f.feed.present(CardId::new(2)).unwrap();
        assert_eq!(f.reader.step(), PollOutcome::QueueFull(CardId::new(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_control_subscription_keeps_last_state() {
        let config = ReaderConfig { initially_enabled: true, ..ReaderConfig::default() };
        let mut f = fixture(config).await;

        f.bus.close();
        f.feed.present(CardId::new(3)).unwrap();

        assert_eq!(f.reader.step(), PollOutcome::Reported(CardId::new(3)));
        assert!(f.reader.control().is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_worker_is_gone() {
        let config = ReaderConfig { initially_enabled: true, ..ReaderConfig::default() };
        let f = fixture(config).await;
        f.feed.present(CardId::new(1)).unwrap();
        drop(f.published);

        tokio::time::timeout(Duration::from_secs(1), f.reader.run()).await.unwrap();
    }
}
