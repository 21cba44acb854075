//! Background session monitoring.
//!
//! While a user is signed in, one task per client re-validates the cached
//! session against the authority on a fixed interval. That is how a device
//! learns that another device took its session over, or that the session
//! simply ran out.
//!
//! # Task model
//!
//! ```text
//!   SessionMonitor (owned by the client)
//!       │ start()                          stop()
//!       ▼                                    │ watch::Sender
//!   tokio::spawn(run_checks) ◄───────────────┘
//!       │
//!       └─ loop { select! { stop → break, tick → check() } }
//! ```
//!
//! Each `start()` takes a fresh generation number. A check that finishes
//! after `stop()` or after a restart sees that its generation is no longer
//! the active one and throws its result away without touching the cache
//! or emitting anything.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use fleetdesk_model::{SessionEvent, SessionToken};
use fleetdesk_session::{
    Clock, EventNotifier, LocalSessionCache, SessionAuthority, SystemClock, Validation,
};
use fleetdesk_store::SessionRecordStore;
use fleetdesk_tick::TickScheduler;
use tokio::sync::watch;

use crate::MonitorConfig;

/// Generation value meaning "no run is active".
const STOPPED: u64 = 0;

/// Whether the monitor currently has a live ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// Periodically validates this device's session and reacts when it ends.
///
/// On every terminal verdict (expired, replaced, deactivated, user gone)
/// the monitor clears the local cache, emits the matching
/// [`SessionEvent`], and stops itself. Store failures are logged and the
/// next tick retries.
pub struct SessionMonitor<S, C = SystemClock> {
    shared: Arc<Shared<S, C>>,
    config: MonitorConfig,
    next_generation: AtomicU64,
    /// Dropping the sender also ends the task, so dropping the monitor
    /// stops it.
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

/// State the spawned task needs, shared with the owning monitor.
struct Shared<S, C> {
    authority: Arc<SessionAuthority<S, C>>,
    cache: Arc<LocalSessionCache>,
    notifier: EventNotifier,
    /// Generation of the run allowed to act, or [`STOPPED`].
    active: AtomicU64,
    /// Checks completed by the active run.
    ticks: AtomicU64,
}

/// What the task loop does after a check.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

impl<S, C> SessionMonitor<S, C>
where
    S: SessionRecordStore,
    C: Clock + Clone,
{
    pub fn new(
        authority: Arc<SessionAuthority<S, C>>,
        cache: Arc<LocalSessionCache>,
        notifier: EventNotifier,
        config: MonitorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                authority,
                cache,
                notifier,
                active: AtomicU64::new(STOPPED),
                ticks: AtomicU64::new(0),
            }),
            config: config.validated(),
            next_generation: AtomicU64::new(STOPPED),
            stop_tx: Mutex::new(None),
        }
    }

    /// Starts checking: once right away, then every interval.
    ///
    /// If a ticker is already running it is cancelled first, so there is
    /// never more than one. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = watch::channel(false);

        {
            let mut stop_tx = self.stop_tx.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(old) = stop_tx.replace(tx) {
                let _ = old.send(true);
                tracing::debug!("session monitor restarting, previous ticker cancelled");
            }
        }

        self.shared.ticks.store(0, Ordering::SeqCst);
        self.shared.active.store(generation, Ordering::SeqCst);

        let scheduler = TickScheduler::new(self.config.tick_config());
        tokio::spawn(run_checks(Arc::clone(&self.shared), generation, rx, scheduler));

        tracing::info!(
            generation,
            interval_secs = self.config.interval_secs,
            "session monitor started"
        );
    }

    /// Cancels future checks. Idempotent.
    ///
    /// A check already in flight is not aborted; its result is discarded.
    pub fn stop(&self) {
        let was = self.shared.active.swap(STOPPED, Ordering::SeqCst);
        let tx = self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(true);
        }
        if was != STOPPED {
            tracing::info!(generation = was, "session monitor stopped");
        }
    }

    pub fn state(&self) -> MonitorState {
        if self.shared.active.load(Ordering::SeqCst) == STOPPED {
            MonitorState::Stopped
        } else {
            MonitorState::Running
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Checks completed since the last `start()`.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

async fn run_checks<S, C>(
    shared: Arc<Shared<S, C>>,
    generation: u64,
    mut stop_rx: watch::Receiver<bool>,
    mut scheduler: TickScheduler,
) where
    S: SessionRecordStore,
    C: Clock + Clone,
{
    loop {
        tokio::select! {
            biased;

            // Fires on an explicit stop and when the sender is dropped.
            _ = stop_rx.changed() => break,

            info = scheduler.wait_for_tick() => {
                if !shared.is_current(generation) {
                    break;
                }
                tracing::trace!(tick = info.tick, generation, "session check");

                let flow = shared.check(generation).await;
                scheduler.record_tick_end();

                if shared.is_current(generation) {
                    shared.ticks.fetch_add(1, Ordering::SeqCst);
                }
                if flow == Flow::Stop {
                    break;
                }
            }
        }
    }
    tracing::debug!(generation, "session monitor task exiting");
}

impl<S, C> Shared<S, C>
where
    S: SessionRecordStore,
    C: Clock + Clone,
{
    fn is_current(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) == generation
    }

    async fn check(&self, generation: u64) -> Flow {
        let snapshot = match self.cache.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!("no local session, nothing to check");
                return Flow::Continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read local session, will retry");
                return Flow::Continue;
            }
        };
        let user_id = snapshot.user_id;

        if snapshot.is_expired_at(self.authority.clock().now()) {
            return self.conclude(generation, &snapshot.token, SessionEvent::Expired { user_id });
        }

        match self.authority.validate(user_id, &snapshot.token).await {
            Ok(Validation::Valid(_)) => {
                tracing::debug!(%user_id, "session still valid");
                Flow::Continue
            }
            Ok(Validation::Replaced | Validation::UserNotFound) => {
                self.conclude(generation, &snapshot.token, SessionEvent::Replaced { user_id })
            }
            Ok(Validation::Expired | Validation::Deactivated) => {
                self.conclude(generation, &snapshot.token, SessionEvent::Expired { user_id })
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "session check failed, will retry");
                Flow::Continue
            }
        }
    }

    /// Ends the session locally, but only if this run still owns the
    /// monitor. Claiming the generation and stopping are one atomic step.
    /// The event is emitted only if the cache still held `token`, so a
    /// `get_session` that ended the same session first isn't echoed.
    fn conclude(&self, generation: u64, token: &SessionToken, event: SessionEvent) -> Flow {
        if self
            .active
            .compare_exchange(generation, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(generation, "discarding result of a cancelled check");
            return Flow::Stop;
        }

        match self.cache.clear_if_token(token) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(generation, "session end already reported");
                return Flow::Stop;
            }
            Err(e) => tracing::warn!(error = %e, "failed to clear local session"),
        }
        tracing::info!(
            user_id = %event.user_id(),
            event = event.name(),
            "session ended, monitor stopping"
        );
        self.notifier.notify(event);
        Flow::Stop
    }
}
