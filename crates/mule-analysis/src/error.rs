//! Error taxonomy for the detection engine.
//!
//! Detector failures are recoverable: the pipeline records them and keeps
//! going with whatever findings are available. Invariant violations are
//! defects and are always returned to the caller.

use std::fmt;

use thiserror::Error;

/// The three independent detectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Detector {
    /// Bounded cycle enumeration.
    Cycle,
    /// Fan-in / fan-out counterparty counting.
    Smurfing,
    /// Low-activity pass-through accounts.
    Shell,
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Detector::Cycle => "cycle",
            Detector::Smurfing => "smurfing",
            Detector::Shell => "shell",
        };
        f.write_str(name)
    }
}

/// Why a detector stopped before finishing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// The wall-clock deadline passed.
    DeadlineExceeded,
    /// The DFS expansion budget ran out.
    BudgetExhausted,
    /// A [`crate::CancelToken`] was triggered.
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AbortReason::DeadlineExceeded => "deadline exceeded",
            AbortReason::BudgetExhausted => "expansion budget exhausted",
            AbortReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// A single detector failed; the others are unaffected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// The detector stopped early. Findings gathered so far may still be used.
    #[error("{detector} detector aborted after {expansions} expansions: {reason}")]
    Aborted {
        detector: Detector,
        reason: AbortReason,
        expansions: u64,
    },
    /// The detector panicked.
    #[error("{detector} detector panicked: {message}")]
    Panicked { detector: Detector, message: String },
}

impl DetectorError {
    /// Detector that produced this failure.
    pub fn detector(&self) -> Detector {
        match self {
            DetectorError::Aborted { detector, .. } | DetectorError::Panicked { detector, .. } => {
                *detector
            }
        }
    }
}

/// Engine-level failures.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EngineError {
    /// A result broke an engine invariant (duplicate ring id, score out of range, ...).
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
    /// Strict mode only: at least one detector did not complete.
    #[error("analysis aborted: {}", describe(.failures))]
    Incomplete { failures: Vec<DetectorError> },
}

fn describe(failures: &[DetectorError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
