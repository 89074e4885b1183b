//! Symmetric co-occurrence graph over interned event names.

use std::collections::HashMap;

use super::names::NameId;

/// Index of an edge in insertion order.
pub type EdgeIndex = usize;

/// Unordered pairs of events that must be notified together.
#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    /// Each pair stored once, smaller id first.
    edges: Vec<(NameId, NameId)>,
    index: HashMap<(NameId, NameId), EdgeIndex>,
    adjacency: HashMap<NameId, Vec<EdgeIndex>>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: NameId, b: NameId) -> (NameId, NameId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Register `(a, b)`. Returns `false` if the pair was already present
    /// or is a self-loop, which constrains nothing.
    pub fn add(&mut self, a: NameId, b: NameId) -> bool {
        if a == b {
            return false;
        }
        let key = Self::key(a, b);
        if self.index.contains_key(&key) {
            return false;
        }
        let edge = self.edges.len();
        self.edges.push(key);
        self.index.insert(key, edge);
        self.adjacency.entry(a).or_default().push(edge);
        self.adjacency.entry(b).or_default().push(edge);
        true
    }

    pub fn contains(&self, a: NameId, b: NameId) -> bool {
        self.index.contains_key(&Self::key(a, b))
    }

    /// Edges touching `id`.
    pub fn incident(&self, id: NameId) -> &[EdgeIndex] {
        self.adjacency.get(&id).map_or(&[][..], Vec::as_slice)
    }

    pub fn endpoints(&self, edge: EdgeIndex) -> Option<(NameId, NameId)> {
        self.edges.get(edge).copied()
    }

    /// The other endpoint of `edge` seen from `id`.
    pub fn opposite(&self, edge: EdgeIndex, id: NameId) -> Option<NameId> {
        self.endpoints(edge)
            .map(|(a, b)| if a == id { b } else { a })
    }

    pub fn neighbors(&self, id: NameId) -> impl Iterator<Item = NameId> + '_ {
        self.incident(id)
            .iter()
            .filter_map(move |&e| self.opposite(e, id))
    }

    pub fn degree(&self, id: NameId) -> usize {
        self.incident(id).len()
    }

    pub fn is_constrained(&self, id: NameId) -> bool {
        self.degree(id) > 0
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[(NameId, NameId)] {
        &self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> NameId {
        NameId::new(n)
    }

    #[test]
    fn test_add_is_symmetric_and_idempotent() {
        let mut g = ConstraintGraph::new();
        assert!(g.add(id(2), id(1)));
        assert!(!g.add(id(1), id(2)));
        assert!(g.contains(id(1), id(2)));
        assert!(g.contains(id(2), id(1)));
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edges()[0], (id(1), id(2)));
    }

    #[test]
    fn test_self_loop_is_ignored() {
        let mut g = ConstraintGraph::new();
        assert!(!g.add(id(3), id(3)));
        assert!(!g.is_constrained(id(3)));
    }

    #[test]
    fn test_neighbors() {
        let mut g = ConstraintGraph::new();
        g.add(id(1), id(2));
        g.add(id(1), id(3));
        g.add(id(3), id(4));
        let mut n: Vec<_> = g.neighbors(id(1)).collect();
        n.sort();
        assert_eq!(n, vec![id(2), id(3)]);
        assert_eq!(g.degree(id(4)), 1);
        assert_eq!(g.degree(id(9)), 0);
    }
}
