//! `StateMachine` — one generic resumable wrapper for every policy.

use tracing::{debug, warn};

use crate::actor::{Actor, ActorId};
use crate::coroutine::YieldAdapter;
use crate::error::{KernelResult, ProtocolViolation};
use crate::event::{Event, EventBuffer};

use super::policy::{Family, FireMode, Policy};
use super::state::{phase_event_name, ActState, FireState, MachineState};

/// What a call to [`StateMachine::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Proposed this many new events.
    Proposed(usize),
    /// Put this many still-pending events back into the buffer.
    Waiting(usize),
    /// Ran phases inline without proposing anything.
    Inline,
    /// Resumed a suspended body that yielded an empty batch.
    Resumed,
    /// Reached a terminal state during this call.
    Finished(MachineState),
    /// Already terminal or stopped; nothing happened.
    Idle,
}

/// Drives one actor through its phases, one granted event at a time.
///
/// Each `advance` first takes back the machine's own events from the
/// buffer. If the event tied to the current state was notified, the
/// matching lifecycle call runs, the machine moves on and proposes the
/// next state's event. Otherwise the event goes back into the buffer
/// unchanged and the actor is not called.
pub struct StateMachine {
    id: ActorId,
    name: String,
    actor: Box<dyn Actor>,
    policy: Policy,
    state: MachineState,
    /// Cycles completed since creation or the last reset.
    cycle: u64,
    halt_requested: bool,
    /// Extra cycles a one-shot machine runs before settling.
    pending_iterations: u64,
    coroutine: Option<YieldAdapter>,
    /// Names of this machine's events currently in the buffer.
    outstanding: Vec<String>,
    /// Drop whatever comes back on the next advance (set by reset).
    discard_stale: bool,
    stopped: bool,
    proposals: u64,
    disposals: u64,
}

impl StateMachine {
    pub fn new(id: ActorId, actor: Box<dyn Actor>, policy: Policy) -> Self {
        StateMachine {
            id,
            name: actor.name().to_string(),
            actor,
            policy,
            state: policy.initial_state(),
            cycle: 0,
            halt_requested: false,
            pending_iterations: 0,
            coroutine: None,
            outstanding: Vec::new(),
            discard_stale: false,
            stopped: false,
            proposals: 0,
            disposals: 0,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────

    #[inline]
    pub fn id(&self) -> ActorId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    #[inline]
    pub fn state(&self) -> MachineState {
        self.state
    }

    #[inline]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn actor(&self) -> &dyn Actor {
        self.actor.as_ref()
    }

    pub fn actor_mut(&mut self) -> &mut dyn Actor {
        self.actor.as_mut()
    }

    /// Terminal state reached or stopped.
    pub fn is_done(&self) -> bool {
        self.stopped || self.state.is_terminal()
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.state.is_halted()
    }

    /// `postfire` returned `false` in the current cycle.
    #[inline]
    pub fn halt_requested(&self) -> bool {
        self.halt_requested
    }

    /// A coroutine body is suspended.
    pub fn has_live_body(&self) -> bool {
        self.coroutine.as_ref().is_some_and(|co| !co.is_finished())
    }

    /// Total events pushed into a buffer, re-proposals included.
    #[inline]
    pub fn proposals(&self) -> u64 {
        self.proposals
    }

    /// Suspended bodies unwound by reset or stop.
    #[inline]
    pub fn disposals(&self) -> u64 {
        self.disposals
    }

    /// Event names this machine is waiting on.
    pub fn outstanding(&self) -> &[String] {
        &self.outstanding
    }

    // ── Advance ───────────────────────────────────────────────────────

    /// Take back this machine's events from `buffer` and react to them.
    pub fn advance(&mut self, buffer: &mut EventBuffer) -> KernelResult<Advance> {
        let owned = buffer.take_owned(self.id);
        if self.is_done() {
            return Ok(Advance::Idle);
        }
        let owned = if std::mem::take(&mut self.discard_stale) {
            if !owned.is_empty() {
                debug!(actor = %self.name, dropped = owned.len(), "discarding events of reset cycle");
            }
            Vec::new()
        } else {
            self.check_owned(&owned)?;
            owned
        };
        self.outstanding.clear();

        if self.policy.mode == FireMode::NonBlocking {
            return Ok(self.run_inline());
        }
        if self.state.is_resuming() {
            return self.drive(buffer, Some(owned));
        }
        if self.state == MachineState::Fire(FireState::Start) {
            return self.enter(buffer, MachineState::Fire(FireState::Begin));
        }

        let expected = phase_event_name(&self.name, self.state);
        match owned.into_iter().find(|e| e.name() == expected) {
            None => self.propose_phase(buffer),
            Some(mut event) if !event.is_notified() => {
                event.repropose()?;
                self.push(buffer, event)?;
                Ok(Advance::Waiting(1))
            }
            Some(_) => self.on_notified(buffer),
        }
    }

    fn check_owned(&self, owned: &[Event]) -> KernelResult<()> {
        match owned.iter().find(|e| !self.outstanding.iter().any(|n| n == e.name())) {
            Some(stray) => Err(ProtocolViolation::UnexpectedEvent {
                actor: self.name.clone(),
                event: stray.name().to_string(),
                state: self.state.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// The current state's event was granted.
    fn on_notified(&mut self, buffer: &mut EventBuffer) -> KernelResult<Advance> {
        use MachineState::{Act, Fire};
        match self.state {
            Act(ActState::PrefireBegin) => {
                if self.actor.prefire() {
                    self.enter(buffer, Act(ActState::PrefireEndFireBegin))
                } else {
                    debug!(actor = %self.name, "prefire declined");
                    self.propose_phase(buffer)
                        .map(|a| if let Advance::Proposed(n) = a { Advance::Waiting(n) } else { a })
                }
            }
            Act(ActState::PrefireEndFireBegin) => {
                self.fire_phase(buffer, Act(ActState::Firing), Act(ActState::FireEndPostfireBegin))
            }
            Act(ActState::FireEndPostfireBegin) => {
                if !self.actor.postfire() {
                    debug!(actor = %self.name, "postfire requested halt");
                    self.halt_requested = true;
                }
                self.enter(buffer, Act(ActState::PostfireEnd))
            }
            Fire(FireState::Begin) => {
                self.fire_phase(buffer, Fire(FireState::Process), Fire(FireState::End))
            }
            Act(ActState::PostfireEnd) | Fire(FireState::End) => self.finish_cycle(buffer),
            _ => Ok(Advance::Idle),
        }
    }

    fn fire_phase(
        &mut self,
        buffer: &mut EventBuffer,
        resuming: MachineState,
        after: MachineState,
    ) -> KernelResult<Advance> {
        if self.policy.uses_coroutine() {
            self.start_body()?;
            self.transition(resuming);
            self.drive(buffer, None)
        } else {
            self.actor.fire();
            self.enter(buffer, after)
        }
    }

    fn finish_cycle(&mut self, buffer: &mut EventBuffer) -> KernelResult<Advance> {
        self.cycle += 1;
        let halted = self.halt_requested && matches!(self.policy.family, Family::Act);
        let again = !halted && (self.policy.cyclic || self.take_iteration());
        let next = match (self.policy.family, halted, again) {
            (Family::Act, true, _) => MachineState::Act(ActState::Halted),
            (Family::Act, false, true) => MachineState::Act(ActState::PrefireBegin),
            (Family::Act, false, false) => MachineState::Act(ActState::Complete),
            (Family::Fire, _, true) => MachineState::Fire(FireState::Begin),
            (Family::Fire, _, false) => MachineState::Fire(FireState::Final),
        };
        self.enter(buffer, next)
    }

    /// Move to `next` and propose whatever it waits on.
    fn enter(&mut self, buffer: &mut EventBuffer, next: MachineState) -> KernelResult<Advance> {
        self.transition(next);
        if next.is_terminal() {
            Ok(Advance::Finished(next))
        } else {
            self.propose_phase(buffer)
        }
    }

    fn transition(&mut self, next: MachineState) {
        debug!(actor = %self.name, from = %self.state, to = %next, cycle = self.cycle, "transition");
        self.state = next;
    }

    fn propose_phase(&mut self, buffer: &mut EventBuffer) -> KernelResult<Advance> {
        let mut event = Event::proposed(phase_event_name(&self.name, self.state), self.state.event_kind());
        if let Some(t) = self.actor.event_time(self.state, self.cycle) {
            event = event.with_time(t);
        }
        self.push(buffer, event)?;
        Ok(Advance::Proposed(1))
    }

    fn push(&mut self, buffer: &mut EventBuffer, mut event: Event) -> KernelResult<()> {
        event.claim(self.id);
        let name = event.name().to_string();
        buffer.propose(event)?;
        self.outstanding.push(name);
        self.proposals += 1;
        Ok(())
    }

    // ── Coroutine ─────────────────────────────────────────────────────

    fn start_body(&mut self) -> KernelResult<()> {
        let yielder = YieldAdapter::yielder();
        match self.actor.get_fire(yielder.clone()) {
            Some(body) => {
                self.coroutine = Some(YieldAdapter::from_body(body, &yielder));
                Ok(())
            }
            None => Err(ProtocolViolation::NoResumableBody {
                actor: self.name.clone(),
            }
            .into()),
        }
    }

    /// Resume the body with last round's resolved batch.
    fn drive(&mut self, buffer: &mut EventBuffer, feedback: Option<Vec<Event>>) -> KernelResult<Advance> {
        let yielded = {
            let Some(co) = self.coroutine.as_mut() else {
                return Err(ProtocolViolation::NoResumableBody {
                    actor: self.name.clone(),
                }
                .into());
            };
            if let Some(resolved) = feedback {
                co.feed(resolved);
            }
            co.next()?
        };
        match yielded {
            Some(batch) if batch.is_empty() => {
                debug!(actor = %self.name, "body yielded an empty batch");
                Ok(Advance::Resumed)
            }
            Some(batch) => {
                let n = batch.len();
                for event in batch {
                    self.push(buffer, event)?;
                }
                Ok(Advance::Proposed(n))
            }
            None => {
                self.coroutine = None;
                let after = match self.state {
                    MachineState::Act(_) => MachineState::Act(ActState::FireEndPostfireBegin),
                    MachineState::Fire(_) => MachineState::Fire(FireState::End),
                };
                self.enter(buffer, after)
            }
        }
    }

    fn dispose_body(&mut self) -> bool {
        let Some(mut co) = self.coroutine.take() else {
            return false;
        };
        let live = co.dispose();
        if live {
            self.disposals += 1;
            warn!(actor = %self.name, state = %self.state, "disposed suspended body");
        }
        live
    }

    // ── Inline ────────────────────────────────────────────────────────

    fn run_inline(&mut self) -> Advance {
        match self.policy.family {
            Family::Act => {
                if !self.actor.prefire() {
                    return Advance::Inline;
                }
                self.actor.fire();
                self.halt_requested = !self.actor.postfire();
                self.cycle += 1;
                if self.halt_requested {
                    self.transition(MachineState::Act(ActState::Halted));
                } else if !self.policy.cyclic && !self.take_iteration() {
                    self.transition(MachineState::Act(ActState::Complete));
                }
            }
            Family::Fire => {
                self.actor.fire();
                self.cycle += 1;
                if !self.policy.cyclic && !self.take_iteration() {
                    self.transition(MachineState::Fire(FireState::Final));
                }
            }
        }
        if self.state.is_terminal() {
            Advance::Finished(self.state)
        } else {
            Advance::Inline
        }
    }

    // ── Iterations ────────────────────────────────────────────────────

    /// Queue `n` more cycles for a one-shot machine.
    ///
    /// A machine resting in `COMPLETE` or `FINAL` restarts from its initial
    /// state right away. Cyclic, halted and stopped machines ignore the
    /// queue.
    pub fn schedule_iterations(&mut self, n: u64) {
        self.pending_iterations += n;
        let settled = matches!(
            self.state,
            MachineState::Act(ActState::Complete) | MachineState::Fire(FireState::Final)
        );
        if settled && !self.stopped && self.take_iteration() {
            self.transition(self.policy.initial_state());
        }
    }

    #[inline]
    pub fn pending_iterations(&self) -> u64 {
        self.pending_iterations
    }

    fn take_iteration(&mut self) -> bool {
        if self.pending_iterations == 0 {
            return false;
        }
        self.pending_iterations -= 1;
        true
    }

    // ── Teardown ──────────────────────────────────────────────────────

    /// Return to the initial state.
    ///
    /// A suspended body is unwound first and only then is the actor told
    /// to stop. Events of the abandoned cycle that come back later are
    /// dropped. Returns `true` if a live body was disposed.
    pub fn reset(&mut self) -> bool {
        let disposed = self.dispose_body();
        if disposed {
            self.actor.stop();
        }
        self.discard_stale = !self.outstanding.is_empty();
        self.outstanding.clear();
        self.halt_requested = false;
        self.pending_iterations = 0;
        self.stopped = false;
        self.cycle = 0;
        self.transition(self.policy.initial_state());
        disposed
    }

    /// Tear down without resetting. Later advances are no-ops.
    ///
    /// Returns `true` if a live body was disposed. Stopping twice does
    /// nothing the second time.
    pub fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        let disposed = self.dispose_body();
        self.actor.stop();
        self.outstanding.clear();
        self.stopped = true;
        disposed
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("cycle", &self.cycle)
            .field("outstanding", &self.outstanding)
            .field("stopped", &self.stopped)
            .finish()
    }
}
