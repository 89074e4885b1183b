//! `PeriodicActor` — timestamps its begin events on a fixed period.

use crate::machine::{ActState, FireState, MachineState};
use crate::time::{EventTime, Resolution};

use crate::actor::traits::Actor;

/// An actor whose cycle `n` begins at time `offset + n × period`.
///
/// Only the event that opens a cycle (`PREFIRE_BEGIN` or `BEGIN`) carries
/// a timestamp; the remaining phase events stay untimed and are stamped by
/// the time scheduler when granted.
#[derive(Debug, Clone)]
pub struct PeriodicActor {
    pub name: String,
    pub period: u64,
    pub offset: u64,
    pub resolution: Resolution,
    pub fires: u64,
    /// Ask to halt once this many cycles have fired.
    pub halt_after: Option<u64>,
}

impl PeriodicActor {
    pub fn new(name: impl Into<String>, period: u64) -> Self {
        PeriodicActor {
            name: name.into(),
            period,
            offset: 0,
            resolution: Resolution::SECONDS,
            fires: 0,
            halt_after: None,
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn halting_after(mut self, cycles: u64) -> Self {
        self.halt_after = Some(cycles);
        self
    }

    /// Start time of cycle `cycle`, saturating at `u64::MAX`.
    pub fn release_time(&self, cycle: u64) -> u64 {
        self.offset
            .saturating_add(cycle.saturating_mul(self.period))
    }
}

impl Actor for PeriodicActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self) {
        self.fires += 1;
    }

    fn postfire(&mut self) -> bool {
        self.halt_after.map_or(true, |n| self.fires < n)
    }

    fn event_time(&self, state: MachineState, cycle: u64) -> Option<EventTime> {
        match state {
            MachineState::Act(ActState::PrefireBegin) | MachineState::Fire(FireState::Begin) => {
                Some(EventTime::new(self.release_time(cycle), self.resolution))
            }
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn state_hash(&self) -> u64 {
        crate::eventlog::hash_combine(self.period, self.fires)
    }
}
