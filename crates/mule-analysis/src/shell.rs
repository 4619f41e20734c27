//! Shell (pass-through) account detection.

use std::ops::RangeInclusive;

use crate::graph::{AccountIx, TransactionGraph};

/// Total sender + receiver appearances for a shell account.
pub const SHELL_TOUCH_RANGE: RangeInclusive<usize> = 2..=4;

/// Outbound edge count required for a shell account.
pub const SHELL_OUT_DEGREE: usize = 1;

/// Transaction touches per account: appearances as sender plus as receiver.
///
/// A self-transfer touches its account twice.
pub fn touch_counts(graph: &TransactionGraph) -> Vec<usize> {
    let mut touches = vec![0usize; graph.node_count()];
    for &(from, to) in graph.transfers() {
        touches[from.index()] += 1;
        touches[to.index()] += 1;
    }
    touches
}

/// Accounts with 2-4 touches and exactly one outbound edge, in discovery order.
pub fn detect_shell_accounts(graph: &TransactionGraph) -> Vec<AccountIx> {
    let touches = touch_counts(graph);
    graph
        .nodes()
        .filter(|&ix| {
            SHELL_TOUCH_RANGE.contains(&touches[ix.index()])
                && graph.out_degree(ix) == SHELL_OUT_DEGREE
        })
        .collect()
}
