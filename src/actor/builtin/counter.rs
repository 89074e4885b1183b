//! `CounterActor` — counts lifecycle calls for test assertions.

use crate::eventlog::hash_combine;

use crate::actor::traits::Actor;

/// An actor that records how often each phase ran.
///
/// It has no real computation. Tests use it to check which phases a
/// machine invoked and in what number. `halt_after` makes `postfire`
/// request a halt once that many postfires have run, and
/// `refuse_prefires` makes the first few `prefire` calls decline.
#[derive(Debug, Clone, Default)]
pub struct CounterActor {
    pub name: String,
    pub prefires: u64,
    pub fires: u64,
    pub postfires: u64,
    pub stops: u64,
    /// Request a halt on the postfire that brings `postfires` to this value.
    pub halt_after: Option<u64>,
    /// Number of initial `prefire` calls that return `false`.
    pub refuse_prefires: u64,
}

impl CounterActor {
    pub fn new(name: impl Into<String>) -> Self {
        CounterActor {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Halt after `n` postfires.
    pub fn halting_after(mut self, n: u64) -> Self {
        self.halt_after = Some(n);
        self
    }

    /// Decline the first `n` prefires.
    pub fn refusing_prefires(mut self, n: u64) -> Self {
        self.refuse_prefires = n;
        self
    }
}

impl Actor for CounterActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefire(&mut self) -> bool {
        self.prefires += 1;
        self.prefires > self.refuse_prefires
    }

    fn fire(&mut self) {
        self.fires += 1;
    }

    fn postfire(&mut self) -> bool {
        self.postfires += 1;
        self.halt_after.map_or(true, |n| self.postfires < n)
    }

    fn stop(&mut self) {
        self.stops += 1;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn state_hash(&self) -> u64 {
        let mut h = hash_combine(0, self.prefires);
        h = hash_combine(h, self.fires);
        h = hash_combine(h, self.postfires);
        hash_combine(h, self.stops)
    }
}
