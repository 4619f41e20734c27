//! Per-invocation analysis settings.
//!
//! Nothing here is global: each call to the pipeline receives its own
//! [`AnalysisConfig`], so concurrent requests can use different settings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wall-clock bound on cycle enumeration.
pub const DEFAULT_CYCLE_DEADLINE: Duration = Duration::from_secs(30);

/// Default DFS expansion budget for cycle enumeration.
pub const DEFAULT_MAX_CYCLE_EXPANSIONS: u64 = 5_000_000;

/// Score cut points for risk bands.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Scores at or above this are critical.
    pub critical: f64,
    /// Scores at or above this (and below `critical`) are high.
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: 85.0,
            high: 65.0,
        }
    }
}

/// Settings for one analysis run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Seed for the deterministic score jitter.
    pub seed: u64,
    /// Run the cycle detector.
    pub detect_cycles: bool,
    /// Run the fan-in / fan-out detector.
    pub detect_smurfing: bool,
    /// Run the shell-account detector.
    pub detect_shells: bool,
    /// Wall-clock bound for cycle enumeration; `None` disables it.
    pub cycle_deadline: Option<Duration>,
    /// DFS expansion budget for cycle enumeration; `None` disables it.
    pub max_cycle_expansions: Option<u64>,
    /// Run the three detectors concurrently.
    pub parallel_detectors: bool,
    /// Risk band cut points used for reporting.
    pub risk_thresholds: RiskThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            detect_cycles: true,
            detect_smurfing: true,
            detect_shells: true,
            cycle_deadline: Some(DEFAULT_CYCLE_DEADLINE),
            max_cycle_expansions: Some(DEFAULT_MAX_CYCLE_EXPANSIONS),
            parallel_detectors: true,
            risk_thresholds: RiskThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Default settings with the given jitter seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

/// Cooperative cancellation flag shared between the caller and the cycle search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns true once [`CancelToken::cancel`] has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
