//! Machine states for both wrapper families.

use crate::event::EventKind;

/// States of the four-phase actor wrapper.
///
/// `Complete` and `Halted` are terminal. `Complete` is reached by one-shot
/// wrappers after `POSTFIRE_END`; `Halted` after `postfire` asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ActState {
    PrefireBegin,
    PrefireEndFireBegin,
    Firing,
    FireEndPostfireBegin,
    PostfireEnd,
    Complete,
    Halted,
}

/// States of the single-fire wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FireState {
    Start,
    Begin,
    Process,
    End,
    Final,
}

/// The active state of one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MachineState {
    Act(ActState),
    Fire(FireState),
}

impl MachineState {
    /// Upper-case label used as the event-name suffix.
    pub fn label(self) -> &'static str {
        match self {
            MachineState::Act(s) => match s {
                ActState::PrefireBegin => "PREFIRE_BEGIN",
                ActState::PrefireEndFireBegin => "PREFIRE_END_FIRE_BEGIN",
                ActState::Firing => "FIRING",
                ActState::FireEndPostfireBegin => "FIRE_END_POSTFIRE_BEGIN",
                ActState::PostfireEnd => "POSTFIRE_END",
                ActState::Complete => "COMPLETE",
                ActState::Halted => "HALTED",
            },
            MachineState::Fire(s) => match s {
                FireState::Start => "START",
                FireState::Begin => "BEGIN",
                FireState::Process => "PROCESS",
                FireState::End => "END",
                FireState::Final => "FINAL",
            },
        }
    }

    /// No further events will be proposed from this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MachineState::Act(ActState::Complete | ActState::Halted)
                | MachineState::Fire(FireState::Final)
        )
    }

    #[inline]
    pub fn is_halted(self) -> bool {
        self == MachineState::Act(ActState::Halted)
    }

    /// The body is suspended inside the coroutine adapter.
    #[inline]
    pub fn is_resuming(self) -> bool {
        matches!(
            self,
            MachineState::Act(ActState::Firing) | MachineState::Fire(FireState::Process)
        )
    }

    /// The state waits on a single event named after it.
    pub fn has_phase_event(self) -> bool {
        matches!(
            self,
            MachineState::Act(
                ActState::PrefireBegin
                    | ActState::PrefireEndFireBegin
                    | ActState::FireEndPostfireBegin
                    | ActState::PostfireEnd
            ) | MachineState::Fire(FireState::Begin | FireState::End)
        )
    }

    /// Domain tag of the phase event: the event opening a cycle is `Begin`,
    /// the one closing it is `End`.
    pub fn event_kind(self) -> EventKind {
        match self {
            MachineState::Act(ActState::PrefireBegin) | MachineState::Fire(FireState::Begin) => {
                EventKind::Begin
            }
            MachineState::Act(ActState::PostfireEnd) | MachineState::Fire(FireState::End) => {
                EventKind::End
            }
            _ => EventKind::Generic,
        }
    }
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `<actor>.<STATE>`.
pub fn phase_event_name(actor: &str, state: MachineState) -> String {
    format!("{}.{}", actor, state.label())
}
