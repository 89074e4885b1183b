//! Rendezvous counters over the constraint graph.
//!
//! Every registered pair carries a counter that starts at [`BASELINE`].
//! Presenting an event bumps the counter of every pair it belongs to, so a
//! pair whose two sides were both presented once reaches
//! [`COMMIT_THRESHOLD`]. An event is satisfied when every pair in its
//! connected component of the graph is at the threshold: events joined by a
//! chain of constraints go together or not at all.

use std::collections::{HashSet, VecDeque};

use crate::error::{ConfigError, KernelResult};

use super::graph::ConstraintGraph;
use super::names::NameId;

/// Counter value of a pair at rest.
pub const BASELINE: u8 = 1;
/// Counter value of a pair whose both sides were presented once.
pub const COMMIT_THRESHOLD: u8 = 3;

/// Pairwise rendezvous check.
#[derive(Debug, Clone)]
pub struct ConstraintSolver {
    capacity: usize,
    graph: ConstraintGraph,
    /// One counter per edge, same index.
    counters: Vec<u8>,
}

impl ConstraintSolver {
    /// A solver accepting ids `1..capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        ConstraintSolver {
            capacity,
            graph: ConstraintGraph::new(),
            counters: Vec::new(),
        }
    }

    fn check(&self, id: NameId) -> KernelResult<()> {
        if id.raw() == 0 || id.index() >= self.capacity {
            return Err(ConfigError::EventIdOutOfRange {
                id: id.raw(),
                capacity: self.capacity,
            }
            .into());
        }
        Ok(())
    }

    /// Register `(a, b)`. Adding a pair twice is a no-op.
    pub fn add(&mut self, a: NameId, b: NameId) -> KernelResult<bool> {
        self.check(a)?;
        self.check(b)?;
        let added = self.graph.add(a, b);
        if added {
            self.counters.push(BASELINE);
        }
        Ok(added)
    }

    /// Count one occurrence of `id` in the current pass.
    pub fn present(&mut self, id: NameId) -> KernelResult<()> {
        self.check(id)?;
        for &edge in self.graph.incident(id) {
            self.counters[edge] = self.counters[edge].saturating_add(1);
        }
        Ok(())
    }

    /// Every pair reachable from `id` is at the commit threshold.
    ///
    /// Unconstrained ids are vacuously satisfied.
    pub fn is_satisfied(&self, id: NameId) -> KernelResult<bool> {
        self.check(id)?;
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(node) = queue.pop_front() {
            for &edge in self.graph.incident(node) {
                if self.counters[edge] != COMMIT_THRESHOLD {
                    return Ok(false);
                }
                if let Some(next) = self.graph.opposite(edge, node) {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Lower every non-zero counter back to [`BASELINE`].
    pub fn reset(&mut self) {
        for c in self.counters.iter_mut().filter(|c| **c != 0) {
            *c = BASELINE;
        }
    }

    /// One full pass: present every id once, check each, reset.
    ///
    /// Repeated ids are presented once. The result is aligned with `ids`.
    pub fn pass(&mut self, ids: &[NameId]) -> KernelResult<Vec<bool>> {
        for &id in ids {
            self.check(id)?;
        }
        let mut presented = HashSet::new();
        for &id in ids {
            if presented.insert(id) {
                self.present(id)?;
            }
        }
        let verdicts: KernelResult<Vec<bool>> = ids.iter().map(|&id| self.is_satisfied(id)).collect();
        self.reset();
        verdicts
    }

    /// Counter of the pair `(a, b)`, if registered.
    pub fn counter(&self, a: NameId, b: NameId) -> Option<u8> {
        self.graph
            .incident(a)
            .iter()
            .find(|&&e| self.graph.opposite(e, a) == Some(b))
            .map(|&e| self.counters[e])
    }

    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;
    use proptest::prelude::*;

    fn id(n: u32) -> NameId {
        NameId::new(n)
    }

    #[test]
    fn test_pair_commits_when_both_sides_presented() {
        let mut s = ConstraintSolver::with_capacity(16);
        s.add(id(1), id(2)).unwrap();
        assert_eq!(s.counter(id(1), id(2)), Some(BASELINE));

        s.present(id(1)).unwrap();
        assert_eq!(s.counter(id(2), id(1)), Some(2));
        assert!(!s.is_satisfied(id(1)).unwrap());

        s.present(id(2)).unwrap();
        assert_eq!(s.counter(id(1), id(2)), Some(COMMIT_THRESHOLD));
        assert!(s.is_satisfied(id(1)).unwrap());
        assert!(s.is_satisfied(id(2)).unwrap());

        s.reset();
        assert_eq!(s.counter(id(1), id(2)), Some(BASELINE));
        assert!(s.graph().contains(id(1), id(2)));
    }

    #[test]
    fn test_unconstrained_is_vacuously_satisfied() {
        let s = ConstraintSolver::with_capacity(16);
        assert!(s.is_satisfied(id(5)).unwrap());
    }

    #[test]
    fn test_chain_goes_together() {
        let mut s = ConstraintSolver::with_capacity(16);
        s.add(id(1), id(2)).unwrap();
        s.add(id(1), id(3)).unwrap();
        // 3 missing: neither 1 nor 2 may go.
        assert_eq!(s.pass(&[id(1), id(2)]).unwrap(), vec![false, false]);
        assert_eq!(s.pass(&[id(1), id(2), id(3)]).unwrap(), vec![true, true, true]);
    }

    #[test]
    fn test_duplicate_presentation_counts_once_in_pass() {
        let mut s = ConstraintSolver::with_capacity(16);
        s.add(id(1), id(2)).unwrap();
        assert_eq!(s.pass(&[id(1), id(1)]).unwrap(), vec![false, false]);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut s = ConstraintSolver::with_capacity(16);
        assert!(s.add(id(1), id(2)).unwrap());
        assert!(!s.add(id(2), id(1)).unwrap());
        assert_eq!(s.graph().edge_count(), 1);
    }

    #[test]
    fn test_out_of_range_ids_are_rejected() {
        let mut s = ConstraintSolver::with_capacity(4);
        for bad in [0, 4, 100] {
            assert!(matches!(
                s.present(id(bad)),
                Err(KernelError::Config(ConfigError::EventIdOutOfRange { .. }))
            ));
        }
        assert!(s.add(id(1), id(4)).is_err());
        assert!(s.is_satisfied(id(0)).is_err());
        assert!(s.pass(&[id(1), id(9)]).is_err());
    }

    proptest! {
        // For every registered pair whose two sides were proposed in a
        // pass, the two sides get the same verdict.
        #[test]
        fn property_pairs_agree(
            edges in proptest::collection::vec((1u32..12, 1u32..12), 0..20),
            proposed in proptest::collection::btree_set(1u32..12, 0..12),
        ) {
            let mut s = ConstraintSolver::with_capacity(16);
            for &(a, b) in &edges {
                s.add(id(a), id(b)).unwrap();
            }
            let ids: Vec<NameId> = proposed.iter().map(|&n| id(n)).collect();
            let verdicts = s.pass(&ids).unwrap();
            let verdict = |n: u32| ids.iter().position(|&i| i == id(n)).map(|p| verdicts[p]);
            for &(a, b) in &edges {
                if let (Some(va), Some(vb)) = (verdict(a), verdict(b)) {
                    prop_assert_eq!(va, vb);
                }
            }
            for &(a, b) in s.graph().edges() {
                prop_assert_eq!(s.counter(a, b), Some(BASELINE));
            }
        }
    }
}
