//! Resolution: deciding which pending events of a batch are notified.
//!
//! A [`Resolver`] works in two steps. `filter` narrows the candidate set,
//! starting from every pending event. `commit` sees the final grant before
//! it is applied. [`resolve`] turns the outcome into statuses: candidates
//! left after filtering are notified, every other pending event is
//! deferred. No other code in the kernel changes an event status.

use tracing::debug;

use crate::error::KernelResult;
use crate::event::Event;
use crate::solver::{ConstraintContext, NameId};

/// One resolution stage.
pub trait Resolver {
    fn name(&self) -> &str;

    /// Remove from `candidates` (indices into `events`) what may not go yet.
    fn filter(&mut self, events: &[Event], candidates: &mut Vec<usize>) -> KernelResult<()>;

    /// Observe the final grant. Stages may stamp the granted events.
    fn commit(&mut self, _events: &mut [Event], _granted: &[usize]) -> KernelResult<()> {
        Ok(())
    }
}

/// Outcome of one [`resolve`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Pending events examined.
    pub candidates: usize,
    /// Events moved to `Notified`.
    pub notified: usize,
    /// Events moved to `Waiting`.
    pub deferred: usize,
}

/// Run `resolver` over `events` and apply the resulting statuses.
pub fn resolve(resolver: &mut dyn Resolver, events: &mut [Event]) -> KernelResult<ResolveReport> {
    let pending: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_pending())
        .map(|(i, _)| i)
        .collect();

    let mut granted = pending.clone();
    resolver.filter(events, &mut granted)?;
    granted.sort_unstable();
    granted.dedup();
    granted.retain(|i| pending.binary_search(i).is_ok());

    resolver.commit(events, &granted)?;

    let mut report = ResolveReport {
        candidates: pending.len(),
        ..Default::default()
    };
    for &i in &pending {
        if granted.binary_search(&i).is_ok() {
            events[i].notify();
            report.notified += 1;
        } else {
            events[i].defer()?;
            report.deferred += 1;
        }
    }
    debug!(
        resolver = resolver.name(),
        candidates = report.candidates,
        notified = report.notified,
        deferred = report.deferred,
        "resolved batch"
    );
    Ok(report)
}

// ── ConstraintResolver ────────────────────────────────────────────────

/// Grants events whose constraint chain is fully proposed.
///
/// Names absent from the context are unconstrained and always granted.
#[derive(Debug, Clone, Default)]
pub struct ConstraintResolver {
    ctx: ConstraintContext,
}

impl ConstraintResolver {
    pub fn new(ctx: ConstraintContext) -> Self {
        ConstraintResolver { ctx }
    }

    pub fn context(&self) -> &ConstraintContext {
        &self.ctx
    }

    /// Swap in a freshly built context, returning the old one.
    ///
    /// Build the new context first; a failed build leaves this resolver
    /// untouched.
    pub fn reload(&mut self, ctx: ConstraintContext) -> ConstraintContext {
        debug!(constraints = ctx.constraint_count(), "reloaded constraint context");
        std::mem::replace(&mut self.ctx, ctx)
    }
}

impl Resolver for ConstraintResolver {
    fn name(&self) -> &str {
        "constraint"
    }

    fn filter(&mut self, events: &[Event], candidates: &mut Vec<usize>) -> KernelResult<()> {
        let constrained: Vec<(usize, NameId)> = candidates
            .iter()
            .filter_map(|&i| self.ctx.lookup(events[i].name()).map(|id| (i, id)))
            .collect();
        if constrained.is_empty() {
            return Ok(());
        }
        let ids: Vec<NameId> = constrained.iter().map(|&(_, id)| id).collect();
        let verdicts = self.ctx.solver_mut().pass(&ids)?;
        let blocked: Vec<usize> = constrained
            .iter()
            .zip(verdicts)
            .filter(|(_, ok)| !ok)
            .map(|(&(i, _), _)| i)
            .collect();
        candidates.retain(|i| !blocked.contains(i));
        Ok(())
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────

/// Resolvers applied in sequence; each filters what the previous one kept.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Resolver>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, resolver: impl Resolver + 'static) -> Self {
        self.stages.push(Box::new(resolver));
        self
    }

    pub fn push(&mut self, resolver: Box<dyn Resolver>) {
        self.stages.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in application order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Resolver for Pipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn filter(&mut self, events: &[Event], candidates: &mut Vec<usize>) -> KernelResult<()> {
        for stage in &mut self.stages {
            if candidates.is_empty() {
                break;
            }
            stage.filter(events, candidates)?;
        }
        Ok(())
    }

    fn commit(&mut self, events: &mut [Event], granted: &[usize]) -> KernelResult<()> {
        for stage in &mut self.stages {
            stage.commit(events, granted)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}
