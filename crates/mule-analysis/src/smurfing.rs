//! Fan-in / fan-out (smurfing) detection.
//!
//! Counts distinct counterparties per account: each sender/receiver pair
//! counts once no matter how many transfers it carries. An account with at
//! least [`FAN_THRESHOLD`] distinct senders is fan-in; with at least that
//! many distinct receivers it is fan-out. An account may be both.
//!
//! The threshold is fixed and no time window is applied. Analyst-facing
//! material describes a 72-hour window with a higher threshold; that is not
//! what this detector enforces.

use std::collections::HashSet;

use crate::graph::{AccountIx, TransactionGraph};

/// Minimum distinct counterparties for a fan-in or fan-out flag.
pub const FAN_THRESHOLD: usize = 5;

/// Direction of a smurfing pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FanDirection {
    /// Many distinct senders into one account.
    In,
    /// One account paying many distinct receivers.
    Out,
}

/// Distinct counterparty counts, indexed by [`AccountIx::index`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterpartyCounts {
    /// Distinct accounts that sent to each account.
    pub distinct_senders: Vec<usize>,
    /// Distinct accounts each account sent to.
    pub distinct_receivers: Vec<usize>,
}

/// Detector output. Lists follow node discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SmurfingFindings {
    /// Accounts with >= [`FAN_THRESHOLD`] distinct senders.
    pub fan_in: Vec<AccountIx>,
    /// Accounts with >= [`FAN_THRESHOLD`] distinct receivers.
    pub fan_out: Vec<AccountIx>,
}

/// Count distinct predecessors and successors for every account.
pub fn counterparty_counts(graph: &TransactionGraph) -> CounterpartyCounts {
    let mut counts = CounterpartyCounts {
        distinct_senders: vec![0; graph.node_count()],
        distinct_receivers: vec![0; graph.node_count()],
    };
    let mut pairs: HashSet<(AccountIx, AccountIx)> = HashSet::new();

    for &(from, to) in graph.transfers() {
        if pairs.insert((from, to)) {
            counts.distinct_receivers[from.index()] += 1;
            counts.distinct_senders[to.index()] += 1;
        }
    }
    counts
}

/// Flag fan-in and fan-out accounts.
pub fn detect_smurfing(graph: &TransactionGraph) -> SmurfingFindings {
    let counts = counterparty_counts(graph);
    let mut findings = SmurfingFindings::default();

    for ix in graph.nodes() {
        if counts.distinct_senders[ix.index()] >= FAN_THRESHOLD {
            findings.fan_in.push(ix);
        }
        if counts.distinct_receivers[ix.index()] >= FAN_THRESHOLD {
            findings.fan_out.push(ix);
        }
    }
    findings
}

/// First `limit` counterparties of `account` in transaction order.
///
/// Senders for [`FanDirection::In`], receivers for [`FanDirection::Out`].
/// Repeated transfers repeat the counterparty.
pub fn fan_neighbors(
    graph: &TransactionGraph,
    account: AccountIx,
    direction: FanDirection,
    limit: usize,
) -> Vec<AccountIx> {
    match direction {
        FanDirection::In => graph
            .transfers()
            .iter()
            .filter(|&&(_, to)| to == account)
            .map(|&(from, _)| from)
            .take(limit)
            .collect(),
        FanDirection::Out => graph.successors(account).iter().copied().take(limit).collect(),
    }
}
