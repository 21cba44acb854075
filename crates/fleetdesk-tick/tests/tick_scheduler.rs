//! Integration tests for the fixed-interval tick scheduler.
//!
//! Uses `start_paused = true` so Tokio time only moves when the runtime is
//! idle or we call `advance`. "Work" inside a tick is simulated with
//! `tokio::time::advance`, which the scheduler observes through
//! `tokio::time::Instant`.

use std::time::Duration;

use fleetdesk_tick::{FirstTick, TickConfig, TickPolicy, TickScheduler};
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

fn every_minute() -> TickConfig {
    TickConfig::every(Duration::from_secs(60))
}

/// The timer wheel has millisecond resolution, so allow a few ms of slack.
fn assert_elapsed_near(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    let slack = Duration::from_millis(5);
    assert!(
        elapsed + slack >= expected && elapsed <= expected + slack,
        "expected ~{expected:?}, got {elapsed:?}"
    );
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_one_minute_skip_immediate() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.interval, Duration::from_secs(60));
    assert_eq!(cfg.policy, TickPolicy::Skip);
    assert_eq!(cfg.first_tick, FirstTick::Immediate);
}

#[test]
fn test_validated_raises_tiny_interval() {
    let cfg = TickConfig::every(Duration::from_millis(1)).validated();
    assert_eq!(cfg.interval, TickConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_clamps_threshold_and_jitter() {
    let cfg = TickConfig {
        slow_tick_threshold: 3.0,
        initial_jitter_ms: 1_000_000,
        ..every_minute()
    }
    .validated();
    assert_eq!(cfg.slow_tick_threshold, 1.0);
    assert_eq!(cfg.initial_jitter_ms, 60_000);
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_tick_immediate_fires_without_waiting() {
    let mut s = TickScheduler::new(every_minute());
    let start = Instant::now();

    let info = s.wait_for_tick().await;

    assert_eq!(info.tick, 1);
    assert_elapsed_near(start, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_after_interval_waits_one_interval() {
    let mut s = TickScheduler::new(TickConfig {
        first_tick: FirstTick::AfterInterval,
        ..every_minute()
    });
    let start = Instant::now();

    s.wait_for_tick().await;

    assert_elapsed_near(start, Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_follow_interval() {
    let mut s = TickScheduler::new(every_minute());
    let start = Instant::now();

    for expected in 1..=4u64 {
        let info = s.wait_for_tick().await;
        s.record_tick_end();
        assert_eq!(info.tick, expected);
    }

    // Immediate first tick + three intervals.
    assert_elapsed_near(start, Duration::from_secs(180));
    assert_eq!(s.tick_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_pending_tick_times_out_before_interval() {
    let mut s = TickScheduler::new(every_minute());
    s.wait_for_tick().await;
    s.record_tick_end();

    let result =
        tokio::time::timeout(Duration::from_secs(59), s.wait_for_tick()).await;

    assert!(result.is_err(), "second tick must not fire before 60s");
}

// =========================================================================
// Missed deadlines
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_drops_grid_points_missed_by_slow_work() {
    let mut s = TickScheduler::new(every_minute());
    let start = Instant::now();

    s.wait_for_tick().await;
    // Work overruns the 60s deadline by 10s.
    tokio::time::advance(Duration::from_secs(70)).await;
    s.record_tick_end();

    let info = s.wait_for_tick().await;

    // Next grid point after 70s is 120s, with one point (60s) skipped.
    assert_eq!(info.ticks_skipped, 1);
    assert_elapsed_near(start, Duration::from_secs(120));
    assert_eq!(s.metrics().total_skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn test_skip_policy_on_time_work_skips_nothing() {
    let mut s = TickScheduler::new(every_minute());

    s.wait_for_tick().await;
    tokio::time::advance(Duration::from_secs(5)).await;
    s.record_tick_end();
    let info = s.wait_for_tick().await;

    assert_eq!(info.ticks_skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_delay_policy_restarts_interval_after_work() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Delay,
        ..every_minute()
    });
    let start = Instant::now();

    s.wait_for_tick().await;
    tokio::time::advance(Duration::from_secs(70)).await;
    s.record_tick_end();
    let info = s.wait_for_tick().await;

    // 70s of work, then one full interval.
    assert_elapsed_near(start, Duration::from_secs(130));
    assert_eq!(info.ticks_skipped, 0);
}

// =========================================================================
// Metrics
// =========================================================================

#[test]
fn test_initial_metrics_are_zero() {
    let s = TickScheduler::new(every_minute());
    let m = s.metrics();
    assert_eq!(m.total_ticks, 0);
    assert_eq!(m.total_skipped, 0);
    assert_eq!(m.slow_ticks, 0);
    assert_eq!(m.max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut s = TickScheduler::new(every_minute());
    s.record_tick_end();
    assert_eq!(s.metrics().total_ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_work_counted_and_max_tracked() {
    let mut s = TickScheduler::new(every_minute());

    s.wait_for_tick().await;
    // 40s of 60s = 66% > default 50% threshold.
    tokio::time::advance(Duration::from_secs(40)).await;
    s.record_tick_end();

    assert_eq!(s.metrics().slow_ticks, 1);
    assert_eq!(s.metrics().max_tick_time, Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_skips_timing_update() {
    let mut s = TickScheduler::new(TickConfig {
        metrics_enabled: false,
        ..every_minute()
    });

    s.wait_for_tick().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    s.record_tick_end();

    assert_eq!(s.metrics().avg_tick_time, Duration::ZERO);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
    assert_eq!(s.metrics().total_ticks, 1);
}

// =========================================================================
// select! loop pattern (mirrors the session monitor)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_stops_on_signal() {
    let mut s = TickScheduler::new(every_minute());
    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        // Immediate tick + ticks at 60s, 120s; stop at 150s.
        tokio::time::sleep(Duration::from_secs(150)).await;
        stop_tx.send(true).ok();
    });

    let mut ticks_fired = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            info = s.wait_for_tick() => {
                ticks_fired += 1;
                s.record_tick_end();
                assert_eq!(info.tick, ticks_fired);
            }
        }
    }

    assert_eq!(ticks_fired, 3);
}
