//! Wrapper policies: which phases exist, how fire runs, whether to loop.

use serde::{Deserialize, Serialize};

use super::state::{ActState, FireState, MachineState};

/// Which phase table the machine follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// prefire, fire and postfire, each behind its own event.
    Act,
    /// fire only, bracketed by `BEGIN` and `END`.
    Fire,
}

/// How the fire phase executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    /// Calls `Actor::fire` atomically once the fire event is granted.
    Blocking,
    /// Runs the actor's body in the coroutine adapter, proposing whatever
    /// it yields until the body returns.
    Resumable,
    /// Runs every phase inline on each advance without proposing events.
    NonBlocking,
}

/// Parameters of a [`StateMachine`](super::StateMachine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    pub family: Family,
    pub mode: FireMode,
    /// Restart from the first phase after the last one instead of stopping.
    pub cyclic: bool,
}

impl Policy {
    /// Four-phase wrapper with an atomic fire, looping forever.
    pub const fn blocking_actor() -> Self {
        Policy {
            family: Family::Act,
            mode: FireMode::Blocking,
            cyclic: true,
        }
    }

    /// Four-phase wrapper whose fire body may yield, looping forever.
    pub const fn resumable_actor() -> Self {
        Policy {
            family: Family::Act,
            mode: FireMode::Resumable,
            cyclic: true,
        }
    }

    /// One atomic fire between `BEGIN` and `END`, then `FINAL`.
    pub const fn blocking_fire() -> Self {
        Policy {
            family: Family::Fire,
            mode: FireMode::Blocking,
            cyclic: false,
        }
    }

    /// One resumable fire between `BEGIN` and `END`, then `FINAL`.
    pub const fn resumable_fire() -> Self {
        Policy {
            family: Family::Fire,
            mode: FireMode::Resumable,
            cyclic: false,
        }
    }

    /// Fire once on the first advance, without events.
    pub const fn non_blocking_fire() -> Self {
        Policy {
            family: Family::Fire,
            mode: FireMode::NonBlocking,
            cyclic: false,
        }
    }

    pub const fn cyclic(mut self, cyclic: bool) -> Self {
        self.cyclic = cyclic;
        self
    }

    /// The state a fresh or reset machine starts in.
    pub fn initial_state(&self) -> MachineState {
        match self.family {
            Family::Act => MachineState::Act(ActState::PrefireBegin),
            Family::Fire => MachineState::Fire(FireState::Start),
        }
    }

    #[inline]
    pub fn uses_coroutine(&self) -> bool {
        self.mode == FireMode::Resumable
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::blocking_actor()
    }
}
