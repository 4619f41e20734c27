//! Bounded circular-routing detection.
//!
//! Enumerates short directed cycles (3 to 5 accounts) with a depth-limited
//! DFS over simple paths, one search per root account.
//!
//! ## Enumeration order
//!
//! Roots are taken in node discovery order. Each root is marked as tried
//! when its own search begins; being visited as an interior vertex of an
//! earlier root's search does not mark it. A root can therefore still
//! start its own search, and can reappear inside rings already reported.
//!
//! Within one search frame, successors are scanned in transaction order.
//! When a successor closes the path back to the root (path length >= 3) the
//! cycle is recorded and the frame returns immediately: its remaining
//! successors are not explored.
//!
//! ## Deduplication
//!
//! Cycles are keyed by their sorted vertex set, so every rotation and every
//! direction of a ring over the same accounts collapses into the first raw
//! cycle seen. At most [`MAX_UNIQUE_CYCLES`] unique cycles are kept, in
//! discovery order; the search stops once that many have been found.
//!
//! ## Pruning
//!
//! Every vertex on a closed walk lies in the root's strongly connected
//! component, so roots in components smaller than [`MIN_CYCLE_LEN`] are
//! skipped and the search never leaves the root's component. Parallel edges
//! are collapsed per frame (first occurrence kept) since re-walking the same
//! successor only reproduces cycles already keyed. Neither changes which
//! cycles are reported or their order.
//!
//! ## Resource bounds
//!
//! The search is O(V * d^5) in the worst case. [`SearchLimits`] bound it by
//! wall-clock deadline and expansion count, and a [`CancelToken`] allows an
//! external abort. Hitting any of them yields [`DetectorError::Aborted`];
//! cycles found up to that point remain available via
//! [`CycleDetector::into_cycles`].

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{AnalysisConfig, CancelToken};
use crate::error::{AbortReason, Detector, DetectorError};
use crate::graph::{AccountIx, TransactionGraph};

/// Shortest reportable cycle, in accounts.
pub const MIN_CYCLE_LEN: usize = 3;

/// Longest reportable cycle, in accounts.
pub const MAX_CYCLE_LEN: usize = 5;

/// Cap on unique cycles kept per run.
pub const MAX_UNIQUE_CYCLES: usize = 20;

/// Deadline and cancel checks run once every this many expansions.
const CHECK_INTERVAL: u64 = 64;

/// A closed directed walk over distinct accounts, starting at its root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cycle {
    members: Vec<AccountIx>,
}

impl Cycle {
    /// Accounts in walk order; the last one transfers back to the first.
    pub fn members(&self) -> &[AccountIx] {
        &self.members
    }

    /// Number of accounts (equal to the number of edges).
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; cycles hold at least [`MIN_CYCLE_LEN`] accounts.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Deduplication key: the sorted, unique vertex set.
    pub fn canonical_key(&self) -> Vec<AccountIx> {
        let mut key = self.members.clone();
        key.sort_unstable();
        key.dedup();
        key
    }
}

/// Bounds on one cycle enumeration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// Abort once this instant has passed.
    pub deadline: Option<Instant>,
    /// Abort after this many DFS expansions.
    pub max_expansions: Option<u64>,
}

impl SearchLimits {
    /// No deadline and no budget.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Limits from config, with the deadline measured from `started`.
    pub fn from_config(config: &AnalysisConfig, started: Instant) -> Self {
        Self {
            deadline: config
                .cycle_deadline
                .and_then(|timeout: Duration| started.checked_add(timeout)),
            max_expansions: config.max_cycle_expansions,
        }
    }
}

/// Depth-limited cycle search over a [`TransactionGraph`].
pub struct CycleDetector<'g> {
    graph: &'g TransactionGraph,
    limits: SearchLimits,
    cancel: Option<CancelToken>,
    component: Vec<usize>,
    component_size: Vec<usize>,
    tried_roots: HashSet<AccountIx>,
    seen_keys: HashSet<Vec<AccountIx>>,
    cycles: Vec<Cycle>,
    expansions: u64,
}

impl<'g> CycleDetector<'g> {
    /// Create an unbounded detector for `graph`.
    pub fn new(graph: &'g TransactionGraph) -> Self {
        let (component, component_size) = graph.strongly_connected_components();
        Self {
            graph,
            limits: SearchLimits::unbounded(),
            cancel: None,
            component,
            component_size,
            tried_roots: HashSet::new(),
            seen_keys: HashSet::new(),
            cycles: Vec::new(),
            expansions: 0,
        }
    }

    /// Apply deadline / budget limits.
    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Observe a cancel token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run the enumeration.
    ///
    /// # Errors
    /// Returns [`DetectorError::Aborted`] when a limit is hit or the token is
    /// cancelled. Unique cycles found before that stay in the detector.
    pub fn run(&mut self) -> Result<(), DetectorError> {
        let graph = self.graph;
        let mut on_path = vec![false; graph.node_count()];
        let mut path: Vec<AccountIx> = Vec::with_capacity(MAX_CYCLE_LEN);

        for root in graph.nodes() {
            if self.is_full() {
                break;
            }
            if !self.tried_roots.insert(root) {
                continue;
            }
            if self.component_size[self.component[root.index()]] < MIN_CYCLE_LEN {
                continue;
            }
            self.check_interrupts()?;

            path.clear();
            path.push(root);
            on_path[root.index()] = true;
            let outcome = self.extend(root, &mut path, &mut on_path);
            on_path[root.index()] = false;
            outcome?;
        }

        debug!(
            unique_cycles = self.cycles.len(),
            expansions = self.expansions,
            roots = self.tried_roots.len(),
            "cycle enumeration finished"
        );
        Ok(())
    }

    /// Unique cycles in discovery order.
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Consume the detector, keeping the unique cycles found so far.
    pub fn into_cycles(self) -> Vec<Cycle> {
        self.cycles
    }

    /// DFS expansions performed so far.
    pub fn expansions(&self) -> u64 {
        self.expansions
    }

    fn is_full(&self) -> bool {
        self.cycles.len() >= MAX_UNIQUE_CYCLES
    }

    fn extend(
        &mut self,
        node: AccountIx,
        path: &mut Vec<AccountIx>,
        on_path: &mut [bool],
    ) -> Result<(), DetectorError> {
        self.tick()?;

        let graph = self.graph;
        let root = path[0];
        let root_component = self.component[root.index()];
        let mut expanded: Vec<AccountIx> = Vec::new();

        for &next in graph.successors(node) {
            if next == root && path.len() >= MIN_CYCLE_LEN {
                self.record(path);
                return Ok(());
            }
            if on_path[next.index()]
                || path.len() == MAX_CYCLE_LEN
                || self.component[next.index()] != root_component
                || expanded.contains(&next)
            {
                continue;
            }
            expanded.push(next);

            path.push(next);
            on_path[next.index()] = true;
            let outcome = self.extend(next, path, on_path);
            on_path[next.index()] = false;
            path.pop();
            outcome?;

            if self.is_full() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn record(&mut self, path: &[AccountIx]) {
        let cycle = Cycle {
            members: path.to_vec(),
        };
        if self.seen_keys.insert(cycle.canonical_key()) {
            self.cycles.push(cycle);
        }
    }

    fn tick(&mut self) -> Result<(), DetectorError> {
        if let Some(max) = self.limits.max_expansions {
            if self.expansions >= max {
                return Err(self.abort(AbortReason::BudgetExhausted));
            }
        }
        if self.expansions % CHECK_INTERVAL == 0 {
            self.check_interrupts()?;
        }
        self.expansions += 1;
        Ok(())
    }

    fn check_interrupts(&self) -> Result<(), DetectorError> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(self.abort(AbortReason::Cancelled));
        }
        if let Some(deadline) = self.limits.deadline {
            if Instant::now() >= deadline {
                return Err(self.abort(AbortReason::DeadlineExceeded));
            }
        }
        Ok(())
    }

    fn abort(&self, reason: AbortReason) -> DetectorError {
        DetectorError::Aborted {
            detector: Detector::Cycle,
            reason,
            expansions: self.expansions,
        }
    }
}

/// Enumerate up to [`MAX_UNIQUE_CYCLES`] unique 3-5 account cycles.
///
/// # Errors
/// Returns [`DetectorError::Aborted`] if `limits` or `cancel` stop the search.
pub fn detect_cycles(
    graph: &TransactionGraph,
    limits: SearchLimits,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Cycle>, DetectorError> {
    let mut detector = CycleDetector::new(graph).with_limits(limits);
    if let Some(token) = cancel {
        detector = detector.with_cancel(token.clone());
    }
    detector.run()?;
    Ok(detector.into_cycles())
}
