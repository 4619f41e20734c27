//! Transaction graph construction.
//!
//! Builds an immutable directed multigraph where nodes are interned account
//! ids and edges are transfers. This is the shared input of every detector.
//!
//! ## Layout
//!
//! Accounts are interned into dense [`AccountIx`] values in discovery order
//! (sender before receiver, transaction by transaction). Successors are
//! stored in CSR form: `successors[offsets[i]..offsets[i + 1]]` lists the
//! receivers of account `i` in transaction order, duplicates included.
//! No predecessor index is kept; detectors that need one derive it from
//! [`TransactionGraph::transfers`].
//!
//! The structure is never mutated after construction, so detectors can read
//! it from several threads without locking.

use std::collections::HashMap;

use mule_data::types::Transaction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;

/// Dense index of an interned account id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountIx(u32);

impl AccountIx {
    /// Position in the graph's node arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Immutable account-level transfer graph.
#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    accounts: Vec<String>,
    index: HashMap<String, AccountIx>,
    offsets: Vec<usize>,
    successors: Vec<AccountIx>,
    transfers: Vec<(AccountIx, AccountIx)>,
}

impl TransactionGraph {
    /// Build the graph from an ordered transaction list.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut accounts: Vec<String> = Vec::new();
        let mut index: HashMap<String, AccountIx> = HashMap::new();
        let mut transfers = Vec::with_capacity(transactions.len());

        let mut intern = |id: &str| -> AccountIx {
            if let Some(&ix) = index.get(id) {
                return ix;
            }
            let ix = AccountIx(accounts.len() as u32);
            accounts.push(id.to_string());
            index.insert(id.to_string(), ix);
            ix
        };

        for tx in transactions {
            let from = intern(&tx.sender_id);
            let to = intern(&tx.receiver_id);
            transfers.push((from, to));
        }

        let node_count = accounts.len();
        let mut offsets = vec![0usize; node_count + 1];
        for &(from, _) in &transfers {
            offsets[from.index() + 1] += 1;
        }
        for i in 0..node_count {
            offsets[i + 1] += offsets[i];
        }

        // Fill in transaction order so each successor run keeps that order.
        let mut cursor = offsets.clone();
        let mut successors = vec![AccountIx(0); transfers.len()];
        for &(from, to) in &transfers {
            successors[cursor[from.index()]] = to;
            cursor[from.index()] += 1;
        }

        Self {
            accounts,
            index,
            offsets,
            successors,
            transfers,
        }
    }

    /// Number of distinct accounts.
    pub fn node_count(&self) -> usize {
        self.accounts.len()
    }

    /// Number of transfers (parallel edges counted individually).
    pub fn edge_count(&self) -> usize {
        self.transfers.len()
    }

    /// Accounts in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = AccountIx> + '_ {
        (0..self.accounts.len()).map(|i| AccountIx(i as u32))
    }

    /// External id of an interned account.
    pub fn account_id(&self, ix: AccountIx) -> &str {
        &self.accounts[ix.index()]
    }

    /// Interned index of an external account id.
    pub fn index_of(&self, account_id: &str) -> Option<AccountIx> {
        self.index.get(account_id).copied()
    }

    /// Receivers of `ix` in transaction order, duplicates included.
    pub fn successors(&self, ix: AccountIx) -> &[AccountIx] {
        &self.successors[self.offsets[ix.index()]..self.offsets[ix.index() + 1]]
    }

    /// Outbound edge count, duplicates included.
    pub fn out_degree(&self, ix: AccountIx) -> usize {
        self.offsets[ix.index() + 1] - self.offsets[ix.index()]
    }

    /// All `(sender, receiver)` pairs in transaction order.
    pub fn transfers(&self) -> &[(AccountIx, AccountIx)] {
        &self.transfers
    }

    /// Label every account with the id of its strongly connected component.
    ///
    /// Returns `(labels, sizes)` where `labels[i]` is the component of
    /// account `i` and `sizes[c]` the number of accounts in component `c`.
    pub fn strongly_connected_components(&self) -> (Vec<usize>, Vec<usize>) {
        let mut graph: DiGraph<(), ()> =
            DiGraph::with_capacity(self.node_count(), self.edge_count());
        let nodes: Vec<_> = (0..self.node_count()).map(|_| graph.add_node(())).collect();
        for &(from, to) in &self.transfers {
            graph.add_edge(nodes[from.index()], nodes[to.index()], ());
        }

        let mut labels = vec![0usize; self.node_count()];
        let mut sizes = Vec::new();
        for (component, members) in tarjan_scc(&graph).into_iter().enumerate() {
            sizes.push(members.len());
            for node in members {
                labels[node.index()] = component;
            }
        }
        (labels, sizes)
    }
}
