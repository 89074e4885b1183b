//! `Coordinator` — the round loop.
//!
//! Each round every registered machine advances once, in registration
//! order, against the shared buffer. Events nobody re-proposed are then
//! purged, the resolver runs once over what remains, and the resolved
//! batch is left in the buffer for the owners to take back next round.
//!
//! ```text
//!   ┌────────── round ───────────┐
//!   │ advance m0, m1, ... mN     │ ← proposals, registration order
//!   │ purge stale                │
//!   │ resolve(buffer)            │ ← the only status change
//!   │ trace / log / retire halts │
//!   └──────────────┬─────────────┘
//!                  │ progress ? repeat : stop
//! ```
//!
//! A coordinator can also hand its batch to someone else to resolve
//! ([`Coordinator::export_round`] / [`Coordinator::import_round`]). That
//! is how [`CompositeActor`] nests one coordinator inside another.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::actor::{Actor, ActorId, TraceEntry};
use crate::error::{ConfigError, KernelError, KernelResult};
use crate::event::{Event, EventBuffer};
use crate::eventlog::{hash_combine, RoundLog};
use crate::machine::{Advance, MachineState, Policy, StateMachine};
use crate::resolver::{resolve, ConstraintResolver, ResolveReport, Resolver};
use crate::time::EventTime;

mod composite;

pub use composite::CompositeActor;

/// Default bound on rounds per `run`.
pub const DEFAULT_MAX_ROUNDS: u64 = 1_000;

/// What happens to a machine that entered `Halted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltPolicy {
    /// Stop it and drop it from later rounds.
    #[default]
    Remove,
    /// Leave it registered; it stays idle.
    Keep,
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A round notified nothing while some machine still waits.
    FixedPoint,
    /// Every machine is terminal, stopped or removed.
    Quiescent,
    /// The round bound was reached while progress continued.
    RoundLimit,
    /// The sentinel passed to `run_until` was notified.
    SentinelNotified,
}

/// Summary of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u64,
    /// Events resolved in this round.
    pub proposed: usize,
    pub notified: usize,
    pub deferred: usize,
    /// Machines that progressed without proposing: inline phases and
    /// bodies resumed past an empty yield.
    pub inline: usize,
    /// Nothing was notified and nothing progressed inline.
    pub stable: bool,
}

/// Summary of a `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub rounds: u64,
    pub notified: u64,
    pub termination: Termination,
}

/// A round whose batch is resolved outside this coordinator.
///
/// Returned by [`Coordinator::export_round`]; hand it back to
/// [`Coordinator::import_round`] together with the resolved batch.
#[derive(Debug)]
#[must_use]
pub struct ExportedRound {
    events: Vec<Event>,
    inline: usize,
}

impl ExportedRound {
    /// The pending batch, in proposal order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Owns the machines, the resolver and the round buffer.
pub struct Coordinator {
    machines: Vec<StateMachine>,
    /// Machines removed after halting, kept for inspection.
    retired: Vec<StateMachine>,
    resolver: Box<dyn Resolver>,
    buffer: EventBuffer,
    round: u64,
    next_id: u64,
    max_rounds: Option<u64>,
    halt_policy: HaltPolicy,
    print_trace: bool,
    /// Every resolved event, in round order.
    pub trace: Vec<TraceEntry>,
    log: Option<RoundLog>,
}

impl Coordinator {
    /// A coordinator with an empty constraint resolver.
    pub fn new() -> Self {
        Self::with_resolver(Box::new(ConstraintResolver::default()))
    }

    pub fn with_resolver(resolver: Box<dyn Resolver>) -> Self {
        Coordinator {
            machines: Vec::new(),
            retired: Vec::new(),
            resolver,
            buffer: EventBuffer::new(),
            round: 0,
            next_id: 0,
            max_rounds: Some(DEFAULT_MAX_ROUNDS),
            halt_policy: HaltPolicy::default(),
            print_trace: false,
            trace: Vec::new(),
            log: None,
        }
    }

    // ── Configuration ─────────────────────────────────────────────────

    pub fn set_resolver(&mut self, resolver: Box<dyn Resolver>) {
        self.resolver = resolver;
    }

    /// `None` removes the bound.
    pub fn set_max_rounds(&mut self, max_rounds: Option<u64>) {
        self.max_rounds = max_rounds;
    }

    pub fn set_halt_policy(&mut self, policy: HaltPolicy) {
        self.halt_policy = policy;
    }

    /// Emit an `info!` line per resolved event.
    pub fn set_print_trace(&mut self, on: bool) {
        self.print_trace = on;
    }

    pub fn enable_logging(&mut self) {
        self.log = Some(RoundLog::new());
    }

    pub fn enable_logging_with_checkpoints(&mut self, interval: u64) {
        self.log = Some(RoundLog::with_checkpoint_interval(interval));
    }

    /// Register an actor; names must be unique.
    pub fn register(&mut self, actor: Box<dyn Actor>, policy: Policy) -> KernelResult<ActorId> {
        let name = actor.name();
        if self.all_machines().any(|m| m.name() == name) {
            return Err(ConfigError::DuplicateActor(name.to_string()).into());
        }
        let id = ActorId::new(self.next_id);
        self.next_id += 1;
        self.machines.push(StateMachine::new(id, actor, policy));
        Ok(id)
    }

    // ── Rounds ────────────────────────────────────────────────────────

    /// Run one round.
    ///
    /// A protocol error from a machine stops that machine and aborts the
    /// round with the error.
    pub fn round(&mut self) -> KernelResult<RoundReport> {
        let inline = self.advance_machines()?;
        let report = resolve(self.resolver.as_mut(), self.buffer.as_mut_slice())?;
        Ok(self.close_round(report, inline))
    }

    /// Advance every machine once and purge what nobody re-proposed.
    /// Returns how many machines progressed without proposing.
    fn advance_machines(&mut self) -> KernelResult<usize> {
        self.round += 1;
        let mut inline = 0;
        for m in &mut self.machines {
            match m.advance(&mut self.buffer) {
                Ok(Advance::Inline | Advance::Resumed) => inline += 1,
                Ok(Advance::Finished(state)) => {
                    info!(actor = %m.name(), %state, cycles = m.cycle(), "actor finished");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(actor = %m.name(), error = %e, "actor aborted");
                    m.stop();
                    self.buffer.discard_owned(m.id());
                    return Err(e);
                }
            }
        }
        self.buffer.purge_stale();
        Ok(inline)
    }

    fn close_round(&mut self, report: ResolveReport, inline: usize) -> RoundReport {
        self.buffer.sync_pending();

        for event in self.buffer.iter() {
            let entry = TraceEntry::from_event(self.round, event);
            if self.print_trace {
                info!("{}", entry);
            }
            self.trace.push(entry);
        }
        let checkpoint = self
            .log
            .as_ref()
            .is_some_and(|log| log.should_checkpoint(self.round))
            .then(|| self.state_hash());
        if let Some(log) = self.log.as_mut() {
            log.record_round(self.round, self.buffer.as_slice());
            if let Some(hash) = checkpoint {
                log.add_checkpoint(self.round, hash);
            }
        }
        self.retire_halted();

        RoundReport {
            round: self.round,
            proposed: report.candidates,
            notified: report.notified,
            deferred: report.deferred,
            inline,
            stable: report.notified == 0 && inline == 0,
        }
    }

    /// Advance every machine and hand the pending batch out instead of
    /// resolving it here.
    ///
    /// The buffer keeps the originals; nothing else may run on this
    /// coordinator until the round is imported back.
    pub fn export_round(&mut self) -> KernelResult<ExportedRound> {
        let inline = self.advance_machines()?;
        Ok(ExportedRound {
            events: self.buffer.as_slice().to_vec(),
            inline,
        })
    }

    /// Finish an exported round with the batch an outer resolver produced.
    ///
    /// Events are matched by name. An exported event notified in
    /// `resolved` is notified here and takes over any timestamp the outer
    /// resolver gave it. Every other exported event is deferred.
    pub fn import_round(
        &mut self,
        round: ExportedRound,
        resolved: &[Event],
    ) -> KernelResult<RoundReport> {
        let mut report = ResolveReport {
            candidates: round.events.len(),
            ..Default::default()
        };
        for event in self.buffer.as_mut_slice() {
            if !event.is_pending() {
                continue;
            }
            match resolved.iter().find(|r| r.name() == event.name()) {
                Some(outer) if outer.is_notified() => {
                    if let Some(t) = outer.time() {
                        event.stamp(t);
                    }
                    event.notify();
                    report.notified += 1;
                }
                _ => {
                    event.defer()?;
                    report.deferred += 1;
                }
            }
        }
        Ok(self.close_round(report, round.inline))
    }

    fn retire_halted(&mut self) {
        if self.halt_policy != HaltPolicy::Remove {
            return;
        }
        let (halted, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.machines)
            .into_iter()
            .partition(|m| m.is_halted());
        self.machines = live;
        for mut m in halted {
            warn!(actor = %m.name(), cycles = m.cycle(), "removing halted actor");
            m.stop();
            self.buffer.discard_owned(m.id());
            self.retired.push(m);
        }
    }

    /// Run rounds until nothing changes, every machine is done, or the
    /// round bound is hit.
    pub fn run(&mut self) -> KernelResult<RunOutcome> {
        let mut rounds = 0;
        let mut notified = 0;
        let termination = loop {
            if self.is_quiescent() && rounds > 0 {
                break Termination::Quiescent;
            }
            if self.max_rounds.is_some_and(|max| rounds >= max) {
                break Termination::RoundLimit;
            }
            let report = self.round()?;
            rounds += 1;
            notified += report.notified as u64;
            if report.stable {
                break if self.is_quiescent() {
                    Termination::Quiescent
                } else {
                    Termination::FixedPoint
                };
            }
        };
        info!(rounds, notified, ?termination, "run finished");
        Ok(RunOutcome {
            rounds,
            notified,
            termination,
        })
    }

    /// Run rounds until the resolver notifies `sentinel`.
    ///
    /// A fresh copy of `sentinel` is proposed next to the machines' events
    /// every round, so constraints and timestamps on it decide when the
    /// loop ends. The run also ends at a fixed point, on quiescence or at
    /// the round bound, whichever comes first.
    pub fn run_until(&mut self, sentinel: Event) -> KernelResult<RunOutcome> {
        let mut rounds = 0;
        let mut notified = 0;
        let termination = loop {
            if self.max_rounds.is_some_and(|max| rounds >= max) {
                break Termination::RoundLimit;
            }
            let inline = self.advance_machines()?;
            self.buffer.propose(sentinel.clone())?;
            let resolved = resolve(self.resolver.as_mut(), self.buffer.as_mut_slice())?;
            let report = self.close_round(resolved, inline);
            rounds += 1;
            notified += report.notified as u64;
            if self.buffer.find(sentinel.name()).is_some_and(Event::is_notified) {
                break Termination::SentinelNotified;
            }
            if report.stable {
                break if self.is_quiescent() {
                    Termination::Quiescent
                } else {
                    Termination::FixedPoint
                };
            }
        };
        info!(rounds, notified, ?termination, sentinel = sentinel.name(), "run finished");
        Ok(RunOutcome {
            rounds,
            notified,
            termination,
        })
    }

    /// No registered machine can propose again.
    pub fn is_quiescent(&self) -> bool {
        self.machines.iter().all(|m| m.is_done())
    }

    // ── Teardown ──────────────────────────────────────────────────────

    /// Reset one machine to its initial state, dropping its events.
    ///
    /// Returns `true` if a suspended body was disposed.
    pub fn reset_actor(&mut self, id: ActorId) -> KernelResult<bool> {
        let m = self
            .machines
            .iter_mut()
            .find(|m| m.id() == id)
            .ok_or(KernelError::UnknownActor(id))?;
        self.buffer.discard_owned(id);
        Ok(m.reset())
    }

    /// Let a one-shot machine run `n` more cycles once it completes.
    ///
    /// A machine already in `COMPLETE` or `FINAL` restarts on the next
    /// round.
    pub fn schedule_iterations(&mut self, id: ActorId, n: u64) -> KernelResult<()> {
        let m = self
            .machines
            .iter_mut()
            .find(|m| m.id() == id)
            .ok_or(KernelError::UnknownActor(id))?;
        m.schedule_iterations(n);
        Ok(())
    }

    /// Stop every machine and clear the buffer.
    ///
    /// Returns the number of suspended bodies disposed.
    pub fn stop(&mut self) -> usize {
        let disposed = self.machines.iter_mut().map(|m| m.stop()).filter(|&d| d).count();
        self.buffer.clear();
        info!(disposed, "coordinator stopped");
        disposed
    }

    // ── Inspection ────────────────────────────────────────────────────

    fn all_machines(&self) -> impl Iterator<Item = &StateMachine> {
        self.machines.iter().chain(self.retired.iter())
    }

    pub fn machine(&self, id: ActorId) -> Option<&StateMachine> {
        self.all_machines().find(|m| m.id() == id)
    }

    /// Downcast an actor for inspection; retired actors included.
    pub fn actor<T: Actor + 'static>(&self, id: ActorId) -> Option<&T> {
        self.machine(id)?.actor().as_any().downcast_ref::<T>()
    }

    pub fn actor_mut<T: Actor + 'static>(&mut self, id: ActorId) -> Option<&mut T> {
        self.machines
            .iter_mut()
            .chain(self.retired.iter_mut())
            .find(|m| m.id() == id)?
            .actor_mut()
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn state_of(&self, id: ActorId) -> Option<MachineState> {
        self.machine(id).map(StateMachine::state)
    }

    pub fn id_of(&self, name: &str) -> Option<ActorId> {
        self.all_machines().find(|m| m.name() == name).map(|m| m.id())
    }

    pub fn is_retired(&self, id: ActorId) -> bool {
        self.retired.iter().any(|m| m.id() == id)
    }

    /// Machines still taking part in rounds.
    pub fn live_count(&self) -> usize {
        self.machines.len()
    }

    pub fn round_number(&self) -> u64 {
        self.round
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    pub fn resolver_mut(&mut self) -> &mut dyn Resolver {
        self.resolver.as_mut()
    }

    pub fn event_log(&self) -> Option<&RoundLog> {
        self.log.as_ref()
    }

    /// Combined state hash of the live actors.
    pub fn state_hash(&self) -> u64 {
        self.machines
            .iter()
            .fold(0, |h, m| hash_combine(h, m.actor().state_hash()))
    }

    /// Latest timestamp among notified events in the trace.
    pub fn latest_time(&self) -> Option<EventTime> {
        self.trace
            .iter()
            .rev()
            .filter(|e| e.status == crate::event::EventStatus::Notified)
            .find_map(|e| e.time)
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("round", &self.round)
            .field("machines", &self.machines)
            .field("retired", &self.retired.len())
            .field("resolver", &self.resolver.name())
            .field("buffer", &self.buffer.len())
            .finish()
    }
}
