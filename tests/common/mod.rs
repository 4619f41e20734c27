//! Shared test helpers and fixtures.
//!
//! Small transaction sets with one known pattern each, so integration tests
//! can compose them and assert on exact ring membership.

#![allow(dead_code)]

use std::collections::HashSet;

use mule_data::types::{AnalysisResult, FraudRing, SuspiciousAccount, Transaction};

/// A transfer with a sequential-looking id, fixed amount, and fixed timestamp.
pub fn tx(sender: &str, receiver: &str) -> Transaction {
    Transaction {
        transaction_id: format!("TX_{sender}_{receiver}"),
        sender_id: sender.to_string(),
        receiver_id: receiver.to_string(),
        amount: 1_000.0,
        timestamp: "2024-01-15 10:00:00".to_string(),
    }
}

/// Transfers for a list of `(sender, receiver)` pairs, in order.
pub fn txs(edges: &[(&str, &str)]) -> Vec<Transaction> {
    edges.iter().map(|(from, to)| tx(from, to)).collect()
}

/// A directed cycle through `accounts`, closing back to the first.
pub fn cycle(accounts: &[&str]) -> Vec<Transaction> {
    accounts
        .iter()
        .zip(accounts.iter().cycle().skip(1))
        .map(|(from, to)| tx(from, to))
        .collect()
}

/// `senders` distinct accounts each paying `hub` once.
pub fn fan_in(hub: &str, senders: usize) -> Vec<Transaction> {
    (0..senders)
        .map(|i| tx(&format!("{hub}_SRC{i}"), hub))
        .collect()
}

/// `hub` paying `receivers` distinct accounts once each.
pub fn fan_out(hub: &str, receivers: usize) -> Vec<Transaction> {
    (0..receivers)
        .map(|i| tx(hub, &format!("{hub}_DST{i}")))
        .collect()
}

/// Number of distinct account ids in a transaction list.
pub fn distinct_accounts(transactions: &[Transaction]) -> usize {
    transactions
        .iter()
        .flat_map(|t| [t.sender_id.as_str(), t.receiver_id.as_str()])
        .collect::<HashSet<_>>()
        .len()
}

/// Looks up a suspicious account, panicking with the full list if absent.
pub fn flagged<'a>(result: &'a AnalysisResult, account_id: &str) -> &'a SuspiciousAccount {
    result.account(account_id).unwrap_or_else(|| {
        panic!(
            "{account_id} not flagged; flagged: {:?}",
            result
                .suspicious_accounts
                .iter()
                .map(|a| a.account_id.as_str())
                .collect::<Vec<_>>()
        )
    })
}

/// Rings whose pattern type starts with `prefix`.
pub fn rings_with_pattern<'a>(result: &'a AnalysisResult, prefix: &str) -> Vec<&'a FraudRing> {
    result
        .fraud_rings
        .iter()
        .filter(|ring| ring.pattern_type.starts_with(prefix))
        .collect()
}

/// Sorted member set of a ring.
pub fn member_set(ring: &FraudRing) -> Vec<String> {
    let mut members = ring.member_accounts.clone();
    members.sort();
    members
}
