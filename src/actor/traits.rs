//! `Actor` trait: the interface the kernel consumes from a wrapped component.

use crate::coroutine::{Body, Yielder};
use crate::machine::MachineState;
use crate::time::EventTime;

/// A component driven by a [`StateMachine`](crate::machine::StateMachine).
///
/// The kernel only ever calls these methods from the state machine, one
/// phase at a time, after the event tied to that phase was notified.
///
/// # Contract
///
/// Implementations **must**:
/// - Return a stable `name()`; it prefixes every event the machine proposes.
/// - Be deterministic for equal inputs.
/// - Never touch event statuses; only the resolver does that.
///
/// # Example
///
/// ```rust
/// use metroii_kernel::actor::Actor;
///
/// struct Blinker { on: bool }
///
/// impl Actor for Blinker {
///     fn name(&self) -> &str { "blinker" }
///     fn fire(&mut self) { self.on = !self.on; }
///     fn as_any(&self) -> &dyn std::any::Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
/// }
/// ```
pub trait Actor {
    /// Stable identity used to build event names.
    fn name(&self) -> &str;

    /// Called once `PREFIRE_BEGIN` is notified. `false` retries next round.
    fn prefire(&mut self) -> bool {
        true
    }

    /// The component's computation for one cycle.
    fn fire(&mut self);

    /// Called once `FIRE_END_POSTFIRE_BEGIN` is notified. `false` requests a halt.
    fn postfire(&mut self) -> bool {
        true
    }

    /// Release resources. Called on reset and teardown.
    fn stop(&mut self) {}

    /// Timestamp for the event the machine is about to propose in `state`.
    ///
    /// `None` (the default) leaves the event untimed.
    fn event_time(&self, _state: MachineState, _cycle: u64) -> Option<EventTime> {
        None
    }

    /// A body that proposes events mid-computation.
    ///
    /// Components that can only fire atomically return `None` (the default);
    /// running such a component under a resumable policy is an error.
    fn get_fire(&mut self, _yielder: Yielder) -> Option<Body> {
        None
    }

    /// Downcast support, required for `Coordinator::actor::<T>()`.
    fn as_any(&self) -> &dyn std::any::Any;
    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;

    /// Deterministic hash of this component's state. `0` opts out.
    fn state_hash(&self) -> u64 {
        0
    }
}
