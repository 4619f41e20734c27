//! Risk-band and pattern breakdowns over a finished result.

use std::fmt;

use mule_data::types::AnalysisResult;
use serde::Serialize;

use crate::config::RiskThresholds;

/// Reporting band for a suspicion score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    /// At or above the critical threshold.
    Critical,
    /// At or above the high threshold.
    High,
    /// Everything below.
    Medium,
}

impl RiskBand {
    /// Band for `score` under `thresholds`.
    pub fn classify(score: f64, thresholds: &RiskThresholds) -> Self {
        if score >= thresholds.critical {
            RiskBand::Critical
        } else if score >= thresholds.high {
            RiskBand::High
        } else {
            RiskBand::Medium
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskBand::Critical => "Critical",
            RiskBand::High => "High",
            RiskBand::Medium => "Medium",
        };
        f.write_str(label)
    }
}

/// Account counts per risk band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
}

/// Count suspicious accounts per band.
pub fn risk_distribution(result: &AnalysisResult, thresholds: &RiskThresholds) -> RiskDistribution {
    let mut dist = RiskDistribution::default();
    for account in &result.suspicious_accounts {
        match RiskBand::classify(account.suspicion_score, thresholds) {
            RiskBand::Critical => dist.critical += 1,
            RiskBand::High => dist.high += 1,
            RiskBand::Medium => dist.medium += 1,
        }
    }
    dist
}

/// Pattern tag counts grouped by family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PatternBreakdown {
    pub cycles: usize,
    pub smurfing: usize,
    pub shell: usize,
    pub other: usize,
}

/// Count every pattern tag on every suspicious account by family.
pub fn pattern_breakdown(result: &AnalysisResult) -> PatternBreakdown {
    let mut breakdown = PatternBreakdown::default();
    for tag in result
        .suspicious_accounts
        .iter()
        .flat_map(|account| account.detected_patterns.iter())
    {
        if tag.starts_with("cycle") || tag.starts_with("circular") {
            breakdown.cycles += 1;
        } else if tag.starts_with("fan") || tag == "smurfing" {
            breakdown.smurfing += 1;
        } else if tag.starts_with("shell") || tag == "low_transaction_count" {
            breakdown.shell += 1;
        } else {
            breakdown.other += 1;
        }
    }
    breakdown
}
