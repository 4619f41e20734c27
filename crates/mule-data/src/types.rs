//! Type definitions for transaction input and analysis output.
//!
//! Field names match the JSON document exchanged with the remote analysis
//! service, so the same values serialize identically whether the result was
//! computed locally or remotely.

use serde::{Deserialize, Serialize};

/// One money-transfer record, as supplied by the ingestion layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// External transaction identifier.
    pub transaction_id: String,
    /// Account the funds left.
    pub sender_id: String,
    /// Account the funds arrived at.
    pub receiver_id: String,
    /// Transfer amount.
    pub amount: f64,
    /// Timestamp text, kept verbatim from the source.
    pub timestamp: String,
}

impl Transaction {
    /// Builds a transaction with the given parties and placeholder id/amount/timestamp.
    ///
    /// Convenient for graph-shape fixtures where only the topology matters.
    pub fn transfer(sender_id: impl Into<String>, receiver_id: impl Into<String>) -> Self {
        Self {
            transaction_id: String::new(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            amount: 0.0,
            timestamp: String::new(),
        }
    }
}

/// Per-account suspicion record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    /// Flagged account.
    pub account_id: String,
    /// Heuristic score in [0, 100]; the maximum across contributing findings.
    pub suspicion_score: f64,
    /// Pattern tags, e.g. `circular_routing`, `smurfing`, `shell_account`.
    pub detected_patterns: Vec<String>,
    /// Ring the score was taken from (`RING_SHELL_*` for shell flags).
    pub ring_id: Option<String>,
}

/// A named group of accounts produced by one detected pattern instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FraudRing {
    /// Unique ring identifier (`RING_001`, `RING_002`, ...).
    pub ring_id: String,
    /// Member accounts; cycle rings list the walk order, smurfing rings may repeat neighbors.
    pub member_accounts: Vec<String>,
    /// `cycle_length_N`, `fan_in` or `fan_out`.
    pub pattern_type: String,
    /// Ring risk in [0, 100].
    pub risk_score: f64,
}

/// Aggregate counts for one analysis run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Distinct account ids seen as sender or receiver.
    pub total_accounts_analyzed: usize,
    /// Number of suspicious account records.
    pub suspicious_accounts_flagged: usize,
    /// Number of ring records created (shell flags excluded).
    pub fraud_rings_detected: usize,
    /// Wall-clock duration of the pipeline, rounded to 2 decimals.
    pub processing_time_seconds: f64,
}

/// Result document returned by the detection engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Flagged accounts, sorted by score descending.
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    /// Detected rings in creation order.
    pub fraud_rings: Vec<FraudRing>,
    /// Aggregate counts.
    pub summary: AnalysisSummary,
}

impl AnalysisResult {
    /// Looks up the suspicion record for an account.
    pub fn account(&self, account_id: &str) -> Option<&SuspiciousAccount> {
        self.suspicious_accounts
            .iter()
            .find(|acc| acc.account_id == account_id)
    }

    /// Looks up a ring by id.
    pub fn ring(&self, ring_id: &str) -> Option<&FraudRing> {
        self.fraud_rings.iter().find(|ring| ring.ring_id == ring_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_with_contract_field_names() {
        let result = AnalysisResult {
            suspicious_accounts: vec![SuspiciousAccount {
                account_id: "ACC_1".to_string(),
                suspicion_score: 88.5,
                detected_patterns: vec!["smurfing".to_string()],
                ring_id: Some("RING_001".to_string()),
            }],
            fraud_rings: vec![],
            summary: AnalysisSummary::default(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["suspicious_accounts"][0]["account_id"], "ACC_1");
        assert_eq!(json["suspicious_accounts"][0]["ring_id"], "RING_001");
        assert_eq!(json["summary"]["total_accounts_analyzed"], 0);
        assert!(json["fraud_rings"].as_array().unwrap().is_empty());
    }

    #[test]
    fn remote_document_deserializes() {
        let body = r#"{
            "suspicious_accounts": [
                {"account_id": "A", "suspicion_score": 91.2,
                 "detected_patterns": ["cycle_length_3", "circular_routing"], "ring_id": "RING_001"}
            ],
            "fraud_rings": [
                {"ring_id": "RING_001", "member_accounts": ["A", "B", "C"],
                 "pattern_type": "cycle_length_3", "risk_score": 80.0}
            ],
            "summary": {"total_accounts_analyzed": 3, "suspicious_accounts_flagged": 1,
                        "fraud_rings_detected": 1, "processing_time_seconds": 0.01}
        }"#;

        let result: AnalysisResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.ring("RING_001").unwrap().member_accounts.len(), 3);
        assert_eq!(result.account("A").unwrap().suspicion_score, 91.2);
        assert!(result.account("Z").is_none());
    }
}
