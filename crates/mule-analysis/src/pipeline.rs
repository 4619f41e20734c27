//! End-to-end detection pipeline.
//!
//! transactions -> [`TransactionGraph`] -> {cycle, smurfing, shell detectors}
//! -> [`RingAssembler`] -> summary.
//!
//! The three detectors only read the graph, so they run concurrently when
//! [`AnalysisConfig::parallel_detectors`] is set. Their outputs are joined
//! before assembly, which is sequential. A detector that aborts or panics
//! does not stop the others: the result is built from whatever findings are
//! available and the report is marked [`Completeness::Degraded`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use mule_data::types::{AnalysisResult, Transaction};
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, CancelToken};
use crate::cycles::{Cycle, CycleDetector, SearchLimits};
use crate::error::{Detector, DetectorError, EngineError};
use crate::graph::{AccountIx, TransactionGraph};
use crate::rings::{DetectorFindings, RingAssembler};
use crate::scoring::Jitter;
use crate::shell::detect_shell_accounts;
use crate::smurfing::{detect_smurfing, SmurfingFindings};
use crate::summary::{summarize, validate_result};

/// Whether every enabled detector ran to completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completeness {
    /// All enabled detectors finished.
    Complete,
    /// At least one detector failed; its findings are partial or missing.
    Degraded { failures: Vec<DetectorError> },
}

/// Result document plus completeness flag.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisReport {
    /// The contract-shaped result.
    pub result: AnalysisResult,
    /// Completeness of the findings behind `result`.
    pub completeness: Completeness,
}

impl AnalysisReport {
    /// True when no detector failed.
    pub fn is_complete(&self) -> bool {
        self.completeness == Completeness::Complete
    }

    /// Detector failures, empty when complete.
    pub fn failures(&self) -> &[DetectorError] {
        match &self.completeness {
            Completeness::Complete => &[],
            Completeness::Degraded { failures } => failures,
        }
    }

    /// Convert to a plain result, turning degraded completeness into an error.
    ///
    /// # Errors
    /// Returns [`EngineError::Incomplete`] if any detector failed.
    pub fn into_strict(self) -> Result<AnalysisResult, EngineError> {
        match self.completeness {
            Completeness::Complete => Ok(self.result),
            Completeness::Degraded { failures } => Err(EngineError::Incomplete { failures }),
        }
    }
}

/// Run the full pipeline.
///
/// # Errors
/// Returns [`EngineError::InvariantViolation`] if the assembled result breaks
/// an engine invariant. Detector failures are reported through
/// [`AnalysisReport::completeness`], not as errors.
pub fn analyze(
    transactions: &[Transaction],
    config: &AnalysisConfig,
) -> Result<AnalysisReport, EngineError> {
    analyze_with_cancel(transactions, config, &CancelToken::new())
}

/// Run the full pipeline and fail if any detector did not complete.
///
/// # Errors
/// Returns [`EngineError::Incomplete`] on a degraded run, or
/// [`EngineError::InvariantViolation`] on a broken result.
pub fn analyze_strict(
    transactions: &[Transaction],
    config: &AnalysisConfig,
) -> Result<AnalysisResult, EngineError> {
    analyze(transactions, config)?.into_strict()
}

/// Run the full pipeline, aborting cycle enumeration when `cancel` fires.
///
/// # Errors
/// See [`analyze`].
#[tracing::instrument(skip_all, fields(transactions = transactions.len(), seed = config.seed))]
pub fn analyze_with_cancel(
    transactions: &[Transaction],
    config: &AnalysisConfig,
    cancel: &CancelToken,
) -> Result<AnalysisReport, EngineError> {
    let started = Instant::now();

    if transactions.is_empty() {
        debug!("no transactions; returning empty result");
        return Ok(AnalysisReport {
            result: AnalysisResult::default(),
            completeness: Completeness::Complete,
        });
    }

    let graph = TransactionGraph::from_transactions(transactions);
    debug!(
        accounts = graph.node_count(),
        edges = graph.edge_count(),
        "transaction graph built"
    );

    let limits = SearchLimits::from_config(config, started);
    let (findings, failures) = run_detectors(&graph, config, limits, cancel);
    debug!(
        cycles = findings.cycles.len(),
        fan_in = findings.smurfing.fan_in.len(),
        fan_out = findings.smurfing.fan_out.len(),
        shells = findings.shells.len(),
        "detectors joined"
    );

    let assembly = RingAssembler::new(&graph, Jitter::new(config.seed)).assemble(&findings);
    let result = summarize(graph.node_count(), assembly, started.elapsed());
    validate_result(&result)?;

    for failure in &failures {
        warn!(error = %failure, "detector did not complete; findings are partial");
    }
    info!(
        accounts = result.summary.total_accounts_analyzed,
        suspicious = result.summary.suspicious_accounts_flagged,
        rings = result.summary.fraud_rings_detected,
        elapsed_ms = started.elapsed().as_millis() as u64,
        degraded = !failures.is_empty(),
        "analysis complete"
    );

    let completeness = if failures.is_empty() {
        Completeness::Complete
    } else {
        Completeness::Degraded { failures }
    };
    Ok(AnalysisReport {
        result,
        completeness,
    })
}

type DetectorRun<T> = (T, Option<DetectorError>);

fn run_detectors(
    graph: &TransactionGraph,
    config: &AnalysisConfig,
    limits: SearchLimits,
    cancel: &CancelToken,
) -> (DetectorFindings, Vec<DetectorError>) {
    let cycles = || -> DetectorRun<Vec<Cycle>> {
        if !config.detect_cycles {
            return (Vec::new(), None);
        }
        guarded(Detector::Cycle, || {
            let mut detector = CycleDetector::new(graph)
                .with_limits(limits)
                .with_cancel(cancel.clone());
            let outcome = detector.run();
            (detector.into_cycles(), outcome.err())
        })
    };
    let smurfing = || -> DetectorRun<SmurfingFindings> {
        if !config.detect_smurfing {
            return (SmurfingFindings::default(), None);
        }
        guarded(Detector::Smurfing, || (detect_smurfing(graph), None))
    };
    let shells = || -> DetectorRun<Vec<AccountIx>> {
        if !config.detect_shells {
            return (Vec::new(), None);
        }
        guarded(Detector::Shell, || (detect_shell_accounts(graph), None))
    };

    let ((cycles, cycle_err), ((smurfing, smurf_err), (shells, shell_err))) =
        if config.parallel_detectors {
            rayon::join(cycles, || rayon::join(smurfing, shells))
        } else {
            (cycles(), (smurfing(), shells()))
        };

    let failures = [cycle_err, smurf_err, shell_err]
        .into_iter()
        .flatten()
        .collect();
    (
        DetectorFindings {
            cycles,
            smurfing,
            shells,
        },
        failures,
    )
}

/// Run one detector, converting a panic into [`DetectorError::Panicked`].
fn guarded<T, F>(detector: Detector, run: F) -> DetectorRun<T>
where
    T: Default,
    F: FnOnce() -> DetectorRun<T>,
{
    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            (
                T::default(),
                Some(DetectorError::Panicked { detector, message }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AbortReason;

    fn txs(edges: &[(&str, &str)]) -> Vec<Transaction> {
        edges
            .iter()
            .map(|(from, to)| Transaction::transfer(*from, *to))
            .collect()
    }

    fn triangle_plus_fan_in() -> Vec<Transaction> {
        txs(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "A"),
            ("S1", "M"),
            ("S2", "M"),
            ("S3", "M"),
            ("S4", "M"),
            ("S5", "M"),
        ])
    }

    #[test]
    fn empty_input_is_complete_and_zeroed() {
        let report = analyze(&[], &AnalysisConfig::default()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.result, AnalysisResult::default());
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let input = triangle_plus_fan_in();
        let parallel = analyze(&input, &AnalysisConfig::with_seed(5)).unwrap();
        let sequential = analyze(
            &input,
            &AnalysisConfig {
                parallel_detectors: false,
                ..AnalysisConfig::with_seed(5)
            },
        )
        .unwrap();
        assert_eq!(
            parallel.result.suspicious_accounts,
            sequential.result.suspicious_accounts
        );
        assert_eq!(parallel.result.fraud_rings, sequential.result.fraud_rings);
    }

    #[test]
    fn disabled_detectors_contribute_nothing() {
        let config = AnalysisConfig {
            detect_cycles: false,
            detect_shells: false,
            ..AnalysisConfig::default()
        };
        let report = analyze(&triangle_plus_fan_in(), &config).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.result.fraud_rings.len(), 1);
        assert_eq!(report.result.fraud_rings[0].pattern_type, "fan_in");
        assert_eq!(report.result.suspicious_accounts.len(), 1);
    }

    #[test]
    fn aborted_cycles_degrade_but_keep_other_findings() {
        let config = AnalysisConfig {
            max_cycle_expansions: Some(1),
            ..AnalysisConfig::default()
        };
        let report = analyze(&triangle_plus_fan_in(), &config).unwrap();
        assert!(!report.is_complete());
        assert!(matches!(
            report.failures(),
            [DetectorError::Aborted {
                detector: Detector::Cycle,
                reason: AbortReason::BudgetExhausted,
                ..
            }]
        ));
        // The fan-in ring still comes through, now as RING_001.
        assert!(report
            .result
            .fraud_rings
            .iter()
            .any(|ring| ring.pattern_type == "fan_in" && ring.ring_id == "RING_001"));
        assert!(!report
            .result
            .fraud_rings
            .iter()
            .any(|ring| ring.pattern_type.starts_with("cycle_length")));
    }

    #[test]
    fn cancelled_run_is_distinguishable_from_clean() {
        let input = txs(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let token = CancelToken::new();
        token.cancel();

        let report = analyze_with_cancel(&input, &AnalysisConfig::default(), &token).unwrap();
        assert!(!report.is_complete());
        let err = report.into_strict().unwrap_err();
        assert!(matches!(err, EngineError::Incomplete { .. }));
    }

    #[test]
    fn strict_passes_clean_runs() {
        let result = analyze_strict(&triangle_plus_fan_in(), &AnalysisConfig::default()).unwrap();
        assert_eq!(result.summary.fraud_rings_detected, 2);
    }

    #[test]
    fn panicking_detector_is_contained() {
        let (value, err): DetectorRun<Vec<u32>> =
            guarded(Detector::Shell, || panic!("shell detector exploded"));
        assert!(value.is_empty());
        assert_eq!(
            err,
            Some(DetectorError::Panicked {
                detector: Detector::Shell,
                message: "shell detector exploded".to_string(),
            })
        );
    }
}
