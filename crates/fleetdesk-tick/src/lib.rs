//! Fixed-interval tick scheduler for Fleetdesk background checks.
//!
//! Drives recurring work that must never overlap itself, such as the
//! session monitor's reconciliation against the remote user table. The
//! caller awaits [`TickScheduler::wait_for_tick`], does its work, then
//! reports completion with [`TickScheduler::record_tick_end`]. Because the
//! next tick is only awaited after the work finishes, two ticks can never
//! run at once; deadlines that pass while work is still running are
//! handled by the configured [`TickPolicy`].
//!
//! # Integration
//!
//! The scheduler is designed to sit inside a task's `tokio::select!` loop
//! next to a stop signal:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = stop_rx.changed() => break,
//!         info = scheduler.wait_for_tick() => {
//!             check(info).await;
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! All timing uses `tokio::time`, so tests can drive it with
//! `tokio::time::pause()`.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do with deadlines that passed while the previous tick's work
/// was still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Keep the original grid (`start + k × interval`). Missed grid points
    /// are dropped and the next tick fires at the first grid point that is
    /// still in the future. Never bursts.
    #[default]
    Skip,
    /// Restart the interval from the moment the previous tick's work ended.
    /// The gap between the end of one check and the start of the next is
    /// always one full interval.
    Delay,
}

/// When the first tick fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirstTick {
    /// Fire as soon as the scheduler is first awaited.
    #[default]
    Immediate,
    /// Wait one interval (plus jitter) before the first tick.
    AfterInterval,
}

/// Full configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Missed-deadline handling.
    pub policy: TickPolicy,
    /// Whether the first tick waits an interval.
    pub first_tick: FirstTick,
    /// Fraction of the interval (0.0–1.0) a tick's work may take before a
    /// "slow tick" warning is logged. Default: 0.5.
    pub slow_tick_threshold: f64,
    /// Random jitter (0–max ms) added to a delayed first tick, so clients
    /// that all start at once (e.g. after a deploy) don't poll in lockstep.
    pub initial_jitter_ms: u64,
    /// Collect per-tick timing metrics.
    pub metrics_enabled: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            policy: TickPolicy::default(),
            first_tick: FirstTick::default(),
            slow_tick_threshold: 0.5,
            initial_jitter_ms: 0,
            metrics_enabled: true,
        }
    }
}

impl TickConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// A config ticking every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`]. Rules:
    /// - `interval` raised to at least [`Self::MIN_INTERVAL`].
    /// - `slow_tick_threshold` clamped to `0.0..=1.0`.
    /// - `initial_jitter_ms` capped to the interval.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "tick interval below minimum, raising"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self.slow_tick_threshold = self.slow_tick_threshold.clamp(0.0, 1.0);
        let interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);
        self.initial_jitter_ms = self.initial_jitter_ms.min(interval_ms);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// How far past its deadline the tick actually fired.
    pub late_by: Duration,
    /// Grid points dropped before this tick because the previous tick's
    /// work was still running ([`TickPolicy::Skip`] only).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics for the tick scheduler.
///
/// Timing values refer to the work reported via
/// [`TickScheduler::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    /// Total ticks fired.
    pub total_ticks: u64,
    /// Total grid points skipped.
    pub total_skipped: u64,
    /// Ticks whose work exceeded the slow threshold.
    pub slow_ticks: u64,
    /// Exponential moving average of tick work time (α = 0.1).
    pub avg_tick_time: Duration,
    /// Longest tick work time observed.
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick scheduler. One per recurring task.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// When the next tick should fire.
    next_tick: Instant,
    /// When the current tick fired. Set by `wait_for_tick`, consumed by
    /// `record_tick_end`.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Create a new scheduler from config.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let now = Instant::now();

        let next_tick = match config.first_tick {
            FirstTick::Immediate => now,
            FirstTick::AfterInterval => {
                let jitter = if config.initial_jitter_ms > 0 {
                    let ms = rand::rng().random_range(0..config.initial_jitter_ms);
                    Duration::from_millis(ms)
                } else {
                    Duration::ZERO
                };
                now + config.interval + jitter
            }
        };

        debug!(
            interval_ms = config.interval.as_millis() as u64,
            policy = ?config.policy,
            first_tick = ?config.first_tick,
            "tick scheduler created"
        );

        Self {
            config,
            tick_count: 0,
            next_tick,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Create a scheduler ticking every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Wait until the next tick is due. Returns [`TickInfo`] for the tick.
    ///
    /// Cancel-safe: dropping the future before it resolves (e.g. when a
    /// `select!` stop branch wins) loses no tick.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let interval = self.config.interval;
        let mut ticks_skipped = 0u64;

        // Deadlines that passed while the caller was busy with the previous
        // tick are dropped under Skip, keeping the original grid.
        if self.config.policy == TickPolicy::Skip && self.tick_count > 0 {
            let now = Instant::now();
            if now > self.next_tick {
                let behind = now.duration_since(self.next_tick);
                let missed = behind.as_nanos().div_ceil(interval.as_nanos());
                let missed = u32::try_from(missed).unwrap_or(u32::MAX);
                ticks_skipped = u64::from(missed);
                self.next_tick += interval * missed;
                warn!(
                    tick = self.tick_count,
                    skipped = missed,
                    "previous tick overran its interval, skipping ahead"
                );
            }
        }

        time::sleep_until(self.next_tick).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.next_tick);
        self.tick_count += 1;
        self.tick_start = Some(now);

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => self.next_tick + interval,
            // Provisional; `record_tick_end` moves it to `end + interval`.
            TickPolicy::Delay => now + interval,
        };

        self.metrics.total_ticks += 1;
        self.metrics.total_skipped += ticks_skipped;

        trace!(tick = self.tick_count, ticks_skipped, "tick fired");

        TickInfo {
            tick: self.tick_count,
            late_by,
            ticks_skipped,
        }
    }

    /// Record that the work for the current tick has finished.
    ///
    /// Feeds the slow-tick warning and metrics, and under
    /// [`TickPolicy::Delay`] schedules the next tick one interval from now.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(start);
        let interval = self.config.interval;

        if self.config.policy == TickPolicy::Delay {
            self.next_tick = now + interval;
        }

        let utilization = elapsed.as_secs_f64() / interval.as_secs_f64();
        if utilization >= self.config.slow_tick_threshold && !elapsed.is_zero() {
            self.metrics.slow_ticks += 1;
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                interval_ms = interval.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "slow tick"
            );
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_tick_time {
                self.metrics.max_tick_time = elapsed;
            }
            // Exponential moving average (α = 0.1).
            let alpha = 0.1;
            let prev = self.metrics.avg_tick_time.as_secs_f64();
            let curr = elapsed.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// The configured missed-deadline policy.
    pub fn policy(&self) -> TickPolicy {
        self.config.policy
    }
}
