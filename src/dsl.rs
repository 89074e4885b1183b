/// Fluent builder for coordinator sessions.
///
/// Collects actors, constraints and resolver settings, then builds the
/// constraint context in one go so a bad mapping never leaves a half-built
/// coordinator behind.

use std::path::PathBuf;

use crate::actor::Actor;
use crate::config::{KernelConfig, ResolverKind};
use crate::coordinator::{Coordinator, HaltPolicy, RunOutcome, DEFAULT_MAX_ROUNDS};
use crate::error::KernelResult;
use crate::machine::Policy;
use crate::resolver::{ConstraintResolver, Pipeline, Resolver};
use crate::scheduler::{TimeScheduler, UntimedPolicy};
use crate::solver::{load_mapping, ConstraintContext, MappingPair, DEFAULT_CAPACITY};
use crate::time::Resolution;

// ── CoordinatorBuilder ────────────────────────────────────────────────

/// Fluent builder for a [`Coordinator`].
///
/// # Example
/// ```rust
/// use metroii_kernel::dsl::CoordinatorBuilder;
/// use metroii_kernel::actor::CounterActor;
///
/// let (coordinator, outcome) = CoordinatorBuilder::new()
///     .actor(CounterActor::new("a"))
///     .actor(CounterActor::new("b"))
///     .constraint("a.PREFIRE_BEGIN", "b.PREFIRE_BEGIN")
///     .max_rounds(8)
///     .run()
///     .unwrap();
/// assert_eq!(outcome.rounds, 8);
/// # let _ = coordinator;
/// ```
pub struct CoordinatorBuilder {
    actors: Vec<(Box<dyn Actor>, Policy)>,
    pairs: Vec<MappingPair>,
    mapping: Option<PathBuf>,
    capacity: usize,
    resolver: Option<ResolverKind>,
    time: Option<TimeScheduler>,
    /// Resolution and untimed policy for a scheduler built from config.
    resolution: f64,
    untimed: UntimedPolicy,
    max_rounds: Option<u64>,
    print_trace: bool,
    halt_policy: HaltPolicy,
    logging: LoggingConfig,
}

#[derive(Clone, Copy)]
enum LoggingConfig {
    Off,
    On,
    WithCheckpoints(u64),
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        CoordinatorBuilder {
            actors: Vec::new(),
            pairs: Vec::new(),
            mapping: None,
            capacity: DEFAULT_CAPACITY,
            resolver: None,
            time: None,
            resolution: Resolution::default().seconds(),
            untimed: UntimedPolicy::default(),
            max_rounds: Some(DEFAULT_MAX_ROUNDS),
            print_trace: false,
            halt_policy: HaltPolicy::default(),
            logging: LoggingConfig::Off,
        }
    }

    /// Take every setting the config carries. Later calls still override.
    pub fn from_config(mut self, config: &KernelConfig) -> Self {
        self.mapping = config.mapping.clone();
        self.print_trace = config.print_trace;
        self.max_rounds = config.round_limit();
        self.capacity = config.solver_capacity;
        self.resolver = Some(config.resolver);
        self.resolution = config.resolution;
        self.untimed = config.untimed;
        self.halt_policy = config.halt;
        self
    }

    // ── Actors ────────────────────────────────────────────────

    /// Register an actor under the blocking actor policy.
    pub fn actor(self, actor: impl Actor + 'static) -> Self {
        self.actor_with_policy(actor, Policy::blocking_actor())
    }

    pub fn actor_with_policy(mut self, actor: impl Actor + 'static, policy: Policy) -> Self {
        self.actors.push((Box::new(actor), policy));
        self
    }

    /// Register an already boxed actor.
    pub fn boxed_actor(mut self, actor: Box<dyn Actor>, policy: Policy) -> Self {
        self.actors.push((actor, policy));
        self
    }

    // ── Constraints ───────────────────────────────────────────

    /// Require `a` and `b` to be notified together.
    pub fn constraint(mut self, a: &str, b: &str) -> Self {
        self.pairs.push((a.to_string(), b.to_string()));
        self
    }

    /// Read constraint pairs from a mapping file at build time.
    pub fn mapping_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping = Some(path.into());
        self
    }

    pub fn solver_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    // ── Resolution ────────────────────────────────────────────

    /// Run `scheduler` ahead of the constraint stage.
    ///
    /// Without an explicit [`resolver`](Self::resolver) choice this
    /// selects [`ResolverKind::TimeThenConstraint`].
    pub fn time_scheduler(mut self, scheduler: TimeScheduler) -> Self {
        self.time = Some(scheduler);
        self
    }

    pub fn resolver(mut self, kind: ResolverKind) -> Self {
        self.resolver = Some(kind);
        self
    }

    // ── Run control ───────────────────────────────────────────

    pub fn max_rounds(mut self, rounds: u64) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.max_rounds = None;
        self
    }

    pub fn print_trace(mut self, on: bool) -> Self {
        self.print_trace = on;
        self
    }

    pub fn halt_policy(mut self, policy: HaltPolicy) -> Self {
        self.halt_policy = policy;
        self
    }

    // ── Logging ───────────────────────────────────────────────

    pub fn with_logging(mut self) -> Self {
        self.logging = LoggingConfig::On;
        self
    }

    pub fn with_checkpoints(mut self, interval: u64) -> Self {
        self.logging = LoggingConfig::WithCheckpoints(interval);
        self
    }

    // ── Build ─────────────────────────────────────────────────

    fn build_resolver(&mut self) -> KernelResult<Box<dyn Resolver>> {
        let mut pairs = match &self.mapping {
            Some(path) => load_mapping(path)?,
            None => Vec::new(),
        };
        pairs.append(&mut self.pairs);
        let ctx = ConstraintContext::from_pairs(self.capacity, &pairs)?;

        let kind = self.resolver.unwrap_or(if self.time.is_some() {
            ResolverKind::TimeThenConstraint
        } else {
            ResolverKind::Constraint
        });
        let time = match self.time.take() {
            Some(scheduler) => scheduler,
            None => TimeScheduler::new(Resolution::new(self.resolution)?).with_untimed(self.untimed),
        };
        let resolver: Box<dyn Resolver> = match kind {
            ResolverKind::Constraint => Box::new(ConstraintResolver::new(ctx)),
            ResolverKind::Time => Box::new(time),
            ResolverKind::TimeThenConstraint => Box::new(
                Pipeline::new()
                    .stage(time)
                    .stage(ConstraintResolver::new(ctx)),
            ),
        };
        Ok(resolver)
    }

    /// Build the coordinator. Mapping and registration errors are returned
    /// before anything runs.
    pub fn build(mut self) -> KernelResult<Coordinator> {
        let resolver = self.build_resolver()?;
        let mut coordinator = Coordinator::with_resolver(resolver);
        coordinator.set_max_rounds(self.max_rounds);
        coordinator.set_print_trace(self.print_trace);
        coordinator.set_halt_policy(self.halt_policy);
        match self.logging {
            LoggingConfig::Off => {}
            LoggingConfig::On => coordinator.enable_logging(),
            LoggingConfig::WithCheckpoints(n) => coordinator.enable_logging_with_checkpoints(n),
        }
        for (actor, policy) in self.actors {
            coordinator.register(actor, policy)?;
        }
        Ok(coordinator)
    }

    /// Build and run to termination.
    pub fn run(self) -> KernelResult<(Coordinator, RunOutcome)> {
        let mut coordinator = self.build()?;
        let outcome = coordinator.run()?;
        Ok((coordinator, outcome))
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{CounterActor, PeriodicActor};
    use crate::coordinator::Termination;
    use crate::error::{ConfigError, KernelError};
    use crate::solver::format_mapping;

    #[test]
    fn test_build_registers_in_order() {
        let c = CoordinatorBuilder::new()
            .actor(CounterActor::new("a"))
            .actor_with_policy(CounterActor::new("f"), Policy::blocking_fire())
            .build()
            .unwrap();
        assert_eq!(c.live_count(), 2);
        assert_eq!(c.id_of("f").map(|id| id.raw()), Some(1));
        assert_eq!(c.resolver().name(), "constraint");
    }

    #[test]
    fn test_time_scheduler_selects_pipeline() {
        let c = CoordinatorBuilder::new()
            .time_scheduler(TimeScheduler::new(Resolution::SECONDS))
            .build()
            .unwrap();
        assert_eq!(c.resolver().name(), "pipeline");

        let c = CoordinatorBuilder::new()
            .time_scheduler(TimeScheduler::new(Resolution::SECONDS))
            .resolver(ResolverKind::Time)
            .build()
            .unwrap();
        assert_eq!(c.resolver().name(), "time");
    }

    #[test]
    fn test_mapping_file_and_inline_constraints_combine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.mapping");
        std::fs::write(&path, format_mapping(&[("a.POSTFIRE_END".into(), "b.POSTFIRE_END".into())]))
            .unwrap();

        let (c, outcome) = CoordinatorBuilder::new()
            .actor(CounterActor::new("a"))
            .actor(CounterActor::new("b"))
            .mapping_file(&path)
            .constraint("a.PREFIRE_BEGIN", "b.PREFIRE_BEGIN")
            .max_rounds(10)
            .with_logging()
            .run()
            .unwrap();
        assert_eq!(outcome.termination, Termination::RoundLimit);
        let a_end: Vec<u64> = c
            .trace
            .iter()
            .filter(|e| e.event == "a.POSTFIRE_END" && e.status == crate::event::EventStatus::Notified)
            .map(|e| e.round)
            .collect();
        let b_end: Vec<u64> = c
            .trace
            .iter()
            .filter(|e| e.event == "b.POSTFIRE_END" && e.status == crate::event::EventStatus::Notified)
            .map(|e| e.round)
            .collect();
        assert!(!a_end.is_empty());
        assert_eq!(a_end, b_end);
        assert!(c.event_log().is_some());
    }

    #[test]
    fn test_bad_mapping_fails_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.mapping");
        std::fs::write(&path, "a.X, b.Y, c.Z\n").unwrap();
        let result = CoordinatorBuilder::new()
            .actor(CounterActor::new("a"))
            .mapping_file(&path)
            .build();
        assert!(matches!(
            result,
            Err(KernelError::Config(ConfigError::MalformedMapping { line: 1, .. }))
        ));
    }

    #[test]
    fn test_duplicate_names_fail_build() {
        let result = CoordinatorBuilder::new()
            .actor(CounterActor::new("a"))
            .actor(CounterActor::new("a"))
            .build();
        assert!(matches!(
            result,
            Err(KernelError::Config(ConfigError::DuplicateActor(_)))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = KernelConfig {
            resolver: ResolverKind::Time,
            resolution: 1.0,
            max_rounds: 0,
            halt: HaltPolicy::Keep,
            ..Default::default()
        };
        let (c, outcome) = CoordinatorBuilder::new()
            .from_config(&config)
            .actor(PeriodicActor::new("p", 5).halting_after(2))
            .run()
            .unwrap();
        assert_eq!(c.resolver().name(), "time");
        assert_eq!(outcome.termination, Termination::Quiescent);
        assert_eq!(c.live_count(), 1);
    }
}
