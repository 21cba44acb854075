//! Client configuration.
//!
//! Every field has a default, and deserialization fills in whatever a
//! config file leaves out:
//!
//! ```json
//! { "session": { "session_duration_secs": 3600 }, "monitor": { "interval_secs": 30 } }
//! ```

use std::time::Duration;

use fleetdesk_session::SessionConfig;
use fleetdesk_tick::{FirstTick, TickConfig, TickPolicy};
use serde::Deserialize;

use crate::FleetdeskError;

/// How often, and how patiently, the session monitor checks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between the end of one check and the start of the next.
    ///
    /// Default: 60.
    pub interval_secs: u64,

    /// Fraction of the interval (0.0–1.0) a single check may take before
    /// it is logged as slow. Default: 0.5.
    pub slow_check_threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            slow_check_threshold: 0.5,
        }
    }
}

impl MonitorConfig {
    /// Clamp out-of-range values.
    ///
    /// - `interval_secs` raised to at least 1.
    /// - `slow_check_threshold` clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.interval_secs == 0 {
            tracing::warn!("monitor interval of 0s requested, using 1s");
            self.interval_secs = 1;
        }
        self.slow_check_threshold = self.slow_check_threshold.clamp(0.0, 1.0);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// The scheduler settings the monitor runs on: first check right away,
    /// then one interval after each check finishes.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            interval: self.interval(),
            policy: TickPolicy::Delay,
            first_tick: FirstTick::Immediate,
            slow_tick_threshold: self.slow_check_threshold,
            ..TickConfig::default()
        }
    }
}

/// Everything a [`SessionClient`](crate::SessionClient) can be tuned with.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FleetdeskConfig {
    pub session: SessionConfig,
    pub monitor: MonitorConfig,
}

impl FleetdeskConfig {
    /// Parses a JSON config. Missing fields take their defaults; the
    /// result is already [validated](Self::validated).
    pub fn from_json(json: &str) -> Result<Self, FleetdeskError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    pub fn validated(self) -> Self {
        Self {
            session: self.session.validated(),
            monitor: self.monitor.validated(),
        }
    }
}
