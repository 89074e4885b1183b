//! # MetroII — Event-Coordination Kernel
//!
//! A kernel that drives independent components in lock-step rounds.
//! Components never call each other; they propose events, a resolver
//! decides which proposals are notified, and only notified components
//! proceed. No threads, no wall-clock time. Every run is a pure function
//! of the model, the constraints and the resolver.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │          Coordinator           │ ← round loop
//! │  ┌─────────────────────────┐  │
//! │  │  StateMachine × N       │  │ ← one per actor, propose on its behalf
//! │  │  ┌───────────────────┐  │  │
//! │  │  │ Actor / coroutine │  │  │ ← prefire / fire / postfire or body
//! │  │  └───────────────────┘  │  │
//! │  └─────────────────────────┘  │
//! │  ┌─────────────────────────┐  │
//! │  │  EventBuffer            │  │ ← one batch per round
//! │  └─────────────────────────┘  │
//! │  ┌─────────────────────────┐  │
//! │  │  Resolver               │  │ ← constraints, time, or both
//! │  └─────────────────────────┘  │
//! └───────────────────────────────┘
//! ```

pub mod actor;
pub mod config;
pub mod coordinator;
pub mod coroutine;
pub mod dsl;
pub mod error;
pub mod event;
pub mod eventlog;
pub mod machine;
pub mod resolver;
pub mod scheduler;
pub mod solver;
pub mod time;

// Re-exports for convenience.
pub use actor::{Actor, ActorId, CounterActor, PeriodicActor, TraceEntry, YieldingActor};
pub use config::{ConfigLoader, ConfigOverrides, KernelConfig, ResolverKind};
pub use coordinator::{
    CompositeActor, Coordinator, ExportedRound, HaltPolicy, RoundReport, RunOutcome, Termination,
};
pub use coroutine::{Body, YieldAdapter, Yielder};
pub use dsl::CoordinatorBuilder;
pub use error::{ConfigError, KernelError, KernelResult, ProtocolViolation};
pub use event::{Event, EventBuffer, EventKind, EventStatus};
pub use eventlog::RoundLog;
pub use machine::{MachineState, Policy, StateMachine};
pub use resolver::{resolve, ConstraintResolver, Pipeline, Resolver};
pub use scheduler::{TimeScheduler, UntimedPolicy};
pub use solver::{ConstraintContext, ConstraintSolver};
pub use time::{EventTime, Resolution, VirtualTime};
