//! Ring assembly and per-account suspicion scoring.
//!
//! Findings are processed in a fixed priority order, sharing one sequential
//! ring counter (`RING_001`, `RING_002`, ...):
//!
//! 1. Cycles, in detector order. Each gets a ring. Members take the ring's
//!    score unless they already hold a score at least as high.
//! 2. Smurfing, fan-in list then fan-out list. Each account not yet scored
//!    gets a score and one companion ring of itself plus up to
//!    [`SMURF_RING_NEIGHBORS`] counterparties.
//! 3. Shell accounts not yet scored get a score and a `RING_SHELL_*` label,
//!    but no ring record.
//!
//! The final account list is sorted by score descending; ties keep the
//! order in which accounts were first scored.

use std::collections::HashMap;

use mule_data::types::{FraudRing, SuspiciousAccount};

use crate::cycles::Cycle;
use crate::graph::{AccountIx, TransactionGraph};
use crate::scoring::{round1, Jitter};
use crate::smurfing::{fan_neighbors, FanDirection, SmurfingFindings};

/// Counterparties listed in a smurfing ring besides the flagged account.
pub const SMURF_RING_NEIGHBORS: usize = 8;

/// Pattern tag for circular routing.
pub const PATTERN_CIRCULAR_ROUTING: &str = "circular_routing";
/// Pattern tag for fan-in smurfing.
pub const PATTERN_FAN_IN_AGGREGATION: &str = "fan_in_aggregation";
/// Pattern tag for fan-out smurfing.
pub const PATTERN_FAN_OUT_DISPERSION: &str = "fan_out_dispersion";
/// Pattern tag shared by both smurfing directions.
pub const PATTERN_SMURFING: &str = "smurfing";
/// Pattern tag for shell accounts.
pub const PATTERN_SHELL_ACCOUNT: &str = "shell_account";
/// Companion tag for shell accounts.
pub const PATTERN_LOW_TRANSACTION_COUNT: &str = "low_transaction_count";

/// Ring `pattern_type` for a fan-in cluster.
pub const RING_FAN_IN: &str = "fan_in";
/// Ring `pattern_type` for a fan-out cluster.
pub const RING_FAN_OUT: &str = "fan_out";

/// `cycle_length_N` tag for a cycle of `len` accounts.
pub fn cycle_pattern(len: usize) -> String {
    format!("cycle_length_{len}")
}

/// Outputs of the three detectors, joined before assembly.
#[derive(Clone, Debug, Default)]
pub struct DetectorFindings {
    /// Unique cycles in discovery order.
    pub cycles: Vec<Cycle>,
    /// Fan-in / fan-out accounts.
    pub smurfing: SmurfingFindings,
    /// Shell accounts.
    pub shells: Vec<AccountIx>,
}

/// Assembled rings and scored accounts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assembly {
    /// Accounts sorted by score descending.
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    /// Rings in creation order.
    pub fraud_rings: Vec<FraudRing>,
}

/// Sequential, order-dependent ring builder.
pub struct RingAssembler<'g> {
    graph: &'g TransactionGraph,
    jitter: Jitter,
    rings: Vec<FraudRing>,
    accounts: Vec<SuspiciousAccount>,
    scored: HashMap<AccountIx, usize>,
    next_ring: usize,
}

impl<'g> RingAssembler<'g> {
    /// New assembler over `graph` with the run's jitter source.
    pub fn new(graph: &'g TransactionGraph, jitter: Jitter) -> Self {
        Self {
            graph,
            jitter,
            rings: Vec::new(),
            accounts: Vec::new(),
            scored: HashMap::new(),
            next_ring: 1,
        }
    }

    /// Process all findings in priority order and return the sorted result.
    pub fn assemble(mut self, findings: &DetectorFindings) -> Assembly {
        for cycle in &findings.cycles {
            self.add_cycle(cycle);
        }
        for &account in &findings.smurfing.fan_in {
            self.add_smurf(account, FanDirection::In);
        }
        for &account in &findings.smurfing.fan_out {
            self.add_smurf(account, FanDirection::Out);
        }
        for &account in &findings.shells {
            self.add_shell(account);
        }
        self.finish()
    }

    fn next_ring_id(&mut self) -> String {
        let id = format!("RING_{:03}", self.next_ring);
        self.next_ring += 1;
        id
    }

    fn add_cycle(&mut self, cycle: &Cycle) {
        let ring_id = self.next_ring_id();
        let len = cycle.len();
        let pattern = cycle_pattern(len);

        let raw_risk = 60.0 + 5.0 * len as f64 + self.jitter.between(&ring_id, 0.0, 15.0);
        let risk_score = round1(raw_risk.min(95.0));

        let members: Vec<String> = cycle
            .members()
            .iter()
            .map(|&ix| self.graph.account_id(ix).to_string())
            .collect();

        for (&ix, account_id) in cycle.members().iter().zip(&members) {
            let key = format!("{ring_id}:{account_id}");
            let raw = risk_score + 10.0 + self.jitter.between(&key, 0.0, 15.0);
            let score = round1(raw.min(100.0));
            let record = SuspiciousAccount {
                account_id: account_id.clone(),
                suspicion_score: score,
                detected_patterns: vec![pattern.clone(), PATTERN_CIRCULAR_ROUTING.to_string()],
                ring_id: Some(ring_id.clone()),
            };

            match self.scored.get(&ix) {
                // First-assigned maximum wins: only a strictly higher score replaces it.
                Some(&slot) => {
                    if self.accounts[slot].suspicion_score < score {
                        self.accounts[slot] = record;
                    }
                }
                None => self.insert(ix, record),
            }
        }

        self.rings.push(FraudRing {
            ring_id,
            member_accounts: members,
            pattern_type: pattern,
            risk_score,
        });
    }

    fn add_smurf(&mut self, account: AccountIx, direction: FanDirection) {
        if self.scored.contains_key(&account) {
            return;
        }
        let account_id = self.graph.account_id(account).to_string();
        let ring_id = self.next_ring_id();
        let score = round1(self.jitter.between(&format!("smurf:{account_id}"), 65.0, 90.0));

        let (pattern, ring_type) = match direction {
            FanDirection::In => (PATTERN_FAN_IN_AGGREGATION, RING_FAN_IN),
            FanDirection::Out => (PATTERN_FAN_OUT_DISPERSION, RING_FAN_OUT),
        };

        let mut members = vec![account_id.clone()];
        members.extend(
            fan_neighbors(self.graph, account, direction, SMURF_RING_NEIGHBORS)
                .into_iter()
                .map(|ix| self.graph.account_id(ix).to_string()),
        );

        self.insert(
            account,
            SuspiciousAccount {
                account_id,
                suspicion_score: score,
                detected_patterns: vec![pattern.to_string(), PATTERN_SMURFING.to_string()],
                ring_id: Some(ring_id.clone()),
            },
        );
        self.rings.push(FraudRing {
            ring_id,
            member_accounts: members,
            pattern_type: ring_type.to_string(),
            risk_score: round1(score - 5.0),
        });
    }

    fn add_shell(&mut self, account: AccountIx) {
        if self.scored.contains_key(&account) {
            return;
        }
        let account_id = self.graph.account_id(account).to_string();
        let score = round1(self.jitter.between(&format!("shell:{account_id}"), 45.0, 75.0));
        let ring_id = shell_ring_id(&account_id);

        self.insert(
            account,
            SuspiciousAccount {
                account_id,
                suspicion_score: score,
                detected_patterns: vec![
                    PATTERN_SHELL_ACCOUNT.to_string(),
                    PATTERN_LOW_TRANSACTION_COUNT.to_string(),
                ],
                ring_id: Some(ring_id),
            },
        );
    }

    fn insert(&mut self, ix: AccountIx, record: SuspiciousAccount) {
        self.scored.insert(ix, self.accounts.len());
        self.accounts.push(record);
    }

    fn finish(self) -> Assembly {
        let mut suspicious_accounts = self.accounts;
        // Stable: equal scores keep first-scored order.
        suspicious_accounts.sort_by(|a, b| b.suspicion_score.total_cmp(&a.suspicion_score));
        Assembly {
            suspicious_accounts,
            fraud_rings: self.rings,
        }
    }
}

/// `RING_SHELL_` plus the last three characters of the account id.
pub fn shell_ring_id(account_id: &str) -> String {
    let start = account_id
        .char_indices()
        .rev()
        .nth(2)
        .map_or(0, |(offset, _)| offset);
    format!("RING_SHELL_{}", &account_id[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::{detect_cycles, SearchLimits};
    use crate::shell::detect_shell_accounts;
    use crate::smurfing::detect_smurfing;
    use mule_data::types::Transaction;

    fn graph(edges: &[(&str, &str)]) -> TransactionGraph {
        let txs: Vec<Transaction> = edges
            .iter()
            .map(|(from, to)| Transaction::transfer(*from, *to))
            .collect();
        TransactionGraph::from_transactions(&txs)
    }

    fn assemble(g: &TransactionGraph, seed: u64) -> Assembly {
        let findings = DetectorFindings {
            cycles: detect_cycles(g, SearchLimits::unbounded(), None).unwrap(),
            smurfing: detect_smurfing(g),
            shells: detect_shell_accounts(g),
        };
        RingAssembler::new(g, Jitter::new(seed)).assemble(&findings)
    }

    #[test]
    fn cycle_ring_scores_in_range() {
        let g = graph(&[("A", "B"), ("B", "C"), ("C", "A")]);
        for seed in 0..50 {
            let out = assemble(&g, seed);
            assert_eq!(out.fraud_rings.len(), 1);
            let ring = &out.fraud_rings[0];
            assert_eq!(ring.ring_id, "RING_001");
            assert_eq!(ring.pattern_type, "cycle_length_3");
            assert!(ring.risk_score >= 75.0 && ring.risk_score <= 95.0);

            assert_eq!(out.suspicious_accounts.len(), 3);
            for acc in &out.suspicious_accounts {
                assert!(acc.suspicion_score >= ring.risk_score + 10.0 - 1e-9);
                assert!(acc.suspicion_score <= 100.0);
                assert_eq!(
                    acc.detected_patterns,
                    vec!["cycle_length_3", "circular_routing"]
                );
                assert_eq!(acc.ring_id.as_deref(), Some("RING_001"));
            }
        }
    }

    #[test]
    fn shared_member_keeps_higher_score() {
        // A and B sit in both triangles.
        let g = graph(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "A"),
            ("B", "D"),
            ("D", "A"),
        ]);
        let out = assemble(&g, 3);
        assert_eq!(out.fraud_rings.len(), 2);
        assert_eq!(out.suspicious_accounts.len(), 4);

        let a = out
            .suspicious_accounts
            .iter()
            .find(|acc| acc.account_id == "A")
            .unwrap();
        let ring_scores: Vec<f64> = out
            .fraud_rings
            .iter()
            .filter(|ring| ring.member_accounts.contains(&"A".to_string()))
            .map(|ring| ring.risk_score)
            .collect();
        assert_eq!(ring_scores.len(), 2);
        assert!(a.suspicion_score >= ring_scores[0] + 10.0 - 1e-9);
    }

    /// Score a member would get from `ring`, computed the same way the assembler does.
    fn candidate_score(jitter: &Jitter, ring: &FraudRing, account: &str) -> f64 {
        let key = format!("{}:{account}", ring.ring_id);
        round1((ring.risk_score + 10.0 + jitter.between(&key, 0.0, 15.0)).min(100.0))
    }

    #[test]
    fn later_cycle_replaces_only_on_strictly_higher_score() {
        // A sits in both triangles: A-B-C becomes RING_001, A-D-E RING_002.
        let g = graph(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "A"),
            ("A", "D"),
            ("D", "E"),
            ("E", "A"),
        ]);
        let findings = DetectorFindings {
            cycles: detect_cycles(&g, SearchLimits::unbounded(), None).unwrap(),
            ..DetectorFindings::default()
        };
        assert_eq!(findings.cycles.len(), 2);

        let (mut replaced, mut kept_on_tie, mut kept_on_lower) = (0, 0, 0);
        for seed in 0..200 {
            let jitter = Jitter::new(seed);
            let out = RingAssembler::new(&g, jitter).assemble(&findings);
            let first = candidate_score(&jitter, &out.fraud_rings[0], "A");
            let second = candidate_score(&jitter, &out.fraud_rings[1], "A");
            let a = out
                .suspicious_accounts
                .iter()
                .find(|acc| acc.account_id == "A")
                .unwrap();

            if second > first {
                replaced += 1;
                assert_eq!(a.ring_id.as_deref(), Some("RING_002"), "seed {seed}");
                assert_eq!(a.suspicion_score, second);
            } else {
                if second == first {
                    kept_on_tie += 1;
                } else {
                    kept_on_lower += 1;
                }
                assert_eq!(a.ring_id.as_deref(), Some("RING_001"), "seed {seed}");
                assert_eq!(a.suspicion_score, first);
            }
        }
        assert!(replaced > 0 && kept_on_tie > 0 && kept_on_lower > 0);
    }

    #[test]
    fn equal_scores_keep_first_scored_order() {
        // Twenty disjoint 5-cycles. A ring whose risk clamps at 95 pins all
        // five members at 100, so every run has a block of tied accounts.
        let names: Vec<String> = (0..20)
            .flat_map(|ring| (0..5).map(move |k| format!("R{ring:02}_{k}")))
            .collect();
        let mut edges = Vec::new();
        for ring in names.chunks(5) {
            for k in 0..5 {
                edges.push((ring[k].as_str(), ring[(k + 1) % 5].as_str()));
            }
        }
        let g = graph(&edges);
        let findings = DetectorFindings {
            cycles: detect_cycles(&g, SearchLimits::unbounded(), None).unwrap(),
            ..DetectorFindings::default()
        };
        assert_eq!(findings.cycles.len(), 20);

        let mut ties = 0;
        for seed in 0..5 {
            let out = RingAssembler::new(&g, Jitter::new(seed)).assemble(&findings);
            let scored_at: HashMap<&str, usize> = out
                .fraud_rings
                .iter()
                .flat_map(|ring| ring.member_accounts.iter())
                .enumerate()
                .map(|(pos, id)| (id.as_str(), pos))
                .collect();

            for pair in out.suspicious_accounts.windows(2) {
                if pair[0].suspicion_score == pair[1].suspicion_score {
                    ties += 1;
                    assert!(
                        scored_at[pair[0].account_id.as_str()]
                            < scored_at[pair[1].account_id.as_str()],
                        "seed {seed}: {} before {}",
                        pair[0].account_id,
                        pair[1].account_id
                    );
                }
            }
        }
        assert!(ties >= 20, "only {ties} tied neighbours");
    }

    #[test]
    fn smurf_rings_follow_cycle_rings() {
        // Triangle plus a fan-in hub M with 6 senders.
        let g = graph(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "A"),
            ("S1", "M"),
            ("S2", "M"),
            ("S3", "M"),
            ("S4", "M"),
            ("S5", "M"),
            ("S6", "M"),
        ]);
        let out = assemble(&g, 11);
        let ring_ids: Vec<&str> = out.fraud_rings.iter().map(|r| r.ring_id.as_str()).collect();
        assert_eq!(ring_ids, vec!["RING_001", "RING_002"]);

        let smurf_ring = &out.fraud_rings[1];
        assert_eq!(smurf_ring.pattern_type, "fan_in");
        assert_eq!(
            smurf_ring.member_accounts,
            vec!["M", "S1", "S2", "S3", "S4", "S5", "S6"]
        );

        let m = out
            .suspicious_accounts
            .iter()
            .find(|acc| acc.account_id == "M")
            .unwrap();
        assert!(m.suspicion_score >= 65.0 && m.suspicion_score <= 90.0);
        assert_eq!(m.detected_patterns, vec!["fan_in_aggregation", "smurfing"]);
        assert_eq!(smurf_ring.risk_score, round1(m.suspicion_score - 5.0));
    }

    #[test]
    fn smurf_ring_lists_at_most_eight_neighbors() {
        let senders: Vec<String> = (0..12).map(|i| format!("S{i:02}")).collect();
        let edges: Vec<(&str, &str)> = senders.iter().map(|s| (s.as_str(), "M")).collect();
        let g = graph(&edges);
        let out = assemble(&g, 0);
        assert_eq!(out.fraud_rings.len(), 1);
        assert_eq!(out.fraud_rings[0].member_accounts.len(), 1 + SMURF_RING_NEIGHBORS);
    }

    #[test]
    fn fan_in_and_out_account_scored_once() {
        let mut edges = Vec::new();
        for s in ["I1", "I2", "I3", "I4", "I5"] {
            edges.push((s, "HUB"));
        }
        for r in ["O1", "O2", "O3", "O4", "O5"] {
            edges.push(("HUB", r));
        }
        let g = graph(&edges);
        let out = assemble(&g, 5);

        assert_eq!(out.fraud_rings.len(), 1);
        assert_eq!(out.fraud_rings[0].pattern_type, "fan_in");
        let hubs = out
            .suspicious_accounts
            .iter()
            .filter(|acc| acc.account_id == "HUB")
            .count();
        assert_eq!(hubs, 1);
    }

    #[test]
    fn cycle_member_is_not_rescored_as_smurf() {
        // A is in a triangle and also receives from five distinct senders.
        let g = graph(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "A"),
            ("S1", "A"),
            ("S2", "A"),
            ("S3", "A"),
            ("S4", "A"),
        ]);
        let out = assemble(&g, 9);
        // Only the cycle ring: A already holds a score when smurfing runs.
        assert_eq!(out.fraud_rings.len(), 1);
        let a = out
            .suspicious_accounts
            .iter()
            .find(|acc| acc.account_id == "A")
            .unwrap();
        assert!(a.detected_patterns.contains(&"circular_routing".to_string()));
    }

    #[test]
    fn shell_flags_produce_no_ring() {
        let g = graph(&[("X", "ACC_M42"), ("Y", "ACC_M42"), ("ACC_M42", "Z")]);
        let out = assemble(&g, 1);
        assert!(out.fraud_rings.is_empty());

        let shell = out
            .suspicious_accounts
            .iter()
            .find(|acc| acc.account_id == "ACC_M42")
            .unwrap();
        assert_eq!(shell.ring_id.as_deref(), Some("RING_SHELL_M42"));
        assert_eq!(
            shell.detected_patterns,
            vec!["shell_account", "low_transaction_count"]
        );
        assert!(shell.suspicion_score >= 45.0 && shell.suspicion_score <= 75.0);
    }

    #[test]
    fn accounts_sorted_descending() {
        let g = graph(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "A"),
            ("S1", "M"),
            ("S2", "M"),
            ("S3", "M"),
            ("S4", "M"),
            ("S5", "M"),
            ("X", "P"),
            ("Y", "P"),
            ("P", "Q"),
        ]);
        let out = assemble(&g, 21);
        let scores: Vec<f64> = out
            .suspicious_accounts
            .iter()
            .map(|acc| acc.suspicion_score)
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
    }

    #[test]
    fn shell_ring_id_uses_last_three_chars() {
        assert_eq!(shell_ring_id("ACC_01890"), "RING_SHELL_890");
        assert_eq!(shell_ring_id("AB"), "RING_SHELL_AB");
        assert_eq!(shell_ring_id(""), "RING_SHELL_");
        assert_eq!(shell_ring_id("konto_äöü"), "RING_SHELL_äöü");
    }
}
