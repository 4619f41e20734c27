//! Summary aggregation and result validation.

use std::collections::HashSet;
use std::time::Duration;

use mule_data::types::{AnalysisResult, AnalysisSummary};

use crate::cycles::{MAX_CYCLE_LEN, MIN_CYCLE_LEN};
use crate::error::EngineError;
use crate::rings::Assembly;
use crate::scoring::round2;

/// Build the final result document from an assembly.
pub fn summarize(total_accounts: usize, assembly: Assembly, elapsed: Duration) -> AnalysisResult {
    let summary = AnalysisSummary {
        total_accounts_analyzed: total_accounts,
        suspicious_accounts_flagged: assembly.suspicious_accounts.len(),
        fraud_rings_detected: assembly.fraud_rings.len(),
        processing_time_seconds: round2(elapsed.as_secs_f64()),
    };
    AnalysisResult {
        suspicious_accounts: assembly.suspicious_accounts,
        fraud_rings: assembly.fraud_rings,
        summary,
    }
}

fn in_score_range(score: f64) -> bool {
    (0.0..=100.0).contains(&score)
}

/// Check the invariants every result must satisfy.
///
/// # Errors
/// Returns [`EngineError::InvariantViolation`] describing the first broken rule.
pub fn validate_result(result: &AnalysisResult) -> Result<(), EngineError> {
    let violation = |msg: String| Err(EngineError::InvariantViolation(msg));

    let mut ring_ids = HashSet::new();
    for ring in &result.fraud_rings {
        if !ring_ids.insert(ring.ring_id.as_str()) {
            return violation(format!("duplicate ring id {}", ring.ring_id));
        }
        if !in_score_range(ring.risk_score) {
            return violation(format!(
                "ring {} risk score {} outside [0, 100]",
                ring.ring_id, ring.risk_score
            ));
        }
        if let Some(len) = ring
            .pattern_type
            .strip_prefix("cycle_length_")
            .and_then(|n| n.parse::<usize>().ok())
        {
            if !(MIN_CYCLE_LEN..=MAX_CYCLE_LEN).contains(&len)
                || ring.member_accounts.len() != len
            {
                return violation(format!(
                    "ring {} has pattern {} with {} members",
                    ring.ring_id,
                    ring.pattern_type,
                    ring.member_accounts.len()
                ));
            }
        }
    }

    let mut account_ids = HashSet::new();
    for account in &result.suspicious_accounts {
        if !account_ids.insert(account.account_id.as_str()) {
            return violation(format!("account {} flagged twice", account.account_id));
        }
        if !in_score_range(account.suspicion_score) {
            return violation(format!(
                "account {} score {} outside [0, 100]",
                account.account_id, account.suspicion_score
            ));
        }
    }

    if let Some(pair) = result
        .suspicious_accounts
        .windows(2)
        .find(|pair| pair[0].suspicion_score < pair[1].suspicion_score)
    {
        return violation(format!(
            "suspicious accounts not sorted: {} ({}) before {} ({})",
            pair[0].account_id,
            pair[0].suspicion_score,
            pair[1].account_id,
            pair[1].suspicion_score
        ));
    }

    let summary = &result.summary;
    if summary.suspicious_accounts_flagged != result.suspicious_accounts.len()
        || summary.fraud_rings_detected != result.fraud_rings.len()
    {
        return violation(format!(
            "summary counts ({} accounts, {} rings) do not match lists ({}, {})",
            summary.suspicious_accounts_flagged,
            summary.fraud_rings_detected,
            result.suspicious_accounts.len(),
            result.fraud_rings.len()
        ));
    }

    Ok(())
}
