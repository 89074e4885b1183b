//! Constraint solving: which proposed events must go together.
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`names`] | [`NameId`], [`NameTable`] |
//! | [`graph`] | [`ConstraintGraph`] |
//! | [`rendezvous`] | [`ConstraintSolver`] |
//! | [`mapping`] | mapping file parsing and writing |
//!
//! [`ConstraintContext`] bundles the name table and the solver. It is
//! built in one go from mapping pairs and owned by whoever resolves with
//! it, so nothing global is mutated while rounds run.

pub mod graph;
pub mod mapping;
pub mod names;
pub mod rendezvous;

use std::path::Path;

pub use graph::ConstraintGraph;
pub use mapping::{format_mapping, load_mapping, parse_mapping, write_mapping, MappingPair};
pub use names::{NameId, NameTable};
pub use rendezvous::{ConstraintSolver, BASELINE, COMMIT_THRESHOLD};

use crate::error::KernelResult;

/// Default bound on distinct constrained names.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Name table plus solver for one session.
#[derive(Debug, Clone)]
pub struct ConstraintContext {
    names: NameTable,
    solver: ConstraintSolver,
}

impl ConstraintContext {
    pub fn new(capacity: usize) -> Self {
        ConstraintContext {
            names: NameTable::with_capacity(capacity),
            solver: ConstraintSolver::with_capacity(capacity),
        }
    }

    /// Build a context from pairs. Either every pair is registered or the
    /// error is returned and nothing is built.
    pub fn from_pairs(capacity: usize, pairs: &[MappingPair]) -> KernelResult<Self> {
        let mut ctx = ConstraintContext::new(capacity);
        for (a, b) in pairs {
            ctx.add_constraint(a, b)?;
        }
        Ok(ctx)
    }

    pub fn from_mapping_file(capacity: usize, path: &Path) -> KernelResult<Self> {
        let pairs = load_mapping(path)?;
        Self::from_pairs(capacity, &pairs)
    }

    /// Intern both names and register the pair.
    pub fn add_constraint(&mut self, a: &str, b: &str) -> KernelResult<bool> {
        let ia = self.names.intern(a)?;
        let ib = self.names.intern(b)?;
        self.solver.add(ia, ib)
    }

    /// Id of a constrained name. Names never mentioned in a constraint
    /// have none and are unconstrained.
    pub fn lookup(&self, name: &str) -> Option<NameId> {
        self.names.lookup(name)
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn solver(&self) -> &ConstraintSolver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut ConstraintSolver {
        &mut self.solver
    }

    /// Registered pairs as names, in registration order.
    pub fn pairs(&self) -> Vec<MappingPair> {
        self.solver
            .graph()
            .edges()
            .iter()
            .filter_map(|&(a, b)| {
                let na = self.names.name(a)?;
                let nb = self.names.name(b)?;
                Some((na.to_string(), nb.to_string()))
            })
            .collect()
    }

    pub fn constraint_count(&self) -> usize {
        self.solver.graph().edge_count()
    }
}

impl Default for ConstraintContext {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
