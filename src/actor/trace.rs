//! TraceEntry — one resolved event as seen at the end of a round.

use crate::event::{Event, EventStatus};
use crate::time::EventTime;

use super::id::ActorId;

/// A record of a single event after resolution.
///
/// The coordinator appends one entry per event in every resolved batch.
/// The trace backs test assertions and the `print_trace` output.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TraceEntry {
    /// Round in which the event was resolved, starting at 1.
    pub round: u64,
    /// Event name.
    pub event: String,
    /// The component that proposed it.
    pub owner: Option<ActorId>,
    /// Status after resolution.
    pub status: EventStatus,
    /// Timestamp after resolution, if any.
    pub time: Option<EventTime>,
}

impl TraceEntry {
    pub fn from_event(round: u64, event: &Event) -> Self {
        TraceEntry {
            round,
            event: event.name().to_string(),
            owner: event.owner(),
            status: event.status(),
            time: event.time(),
        }
    }
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[R={}", self.round)?;
        if let Some(owner) = self.owner {
            write!(f, " {}", owner)?;
        }
        write!(f, "] {} {}", self.event, self.status)?;
        if let Some(t) = self.time {
            write!(f, " @{}", t)?;
        }
        Ok(())
    }
}
