//! Wrapped components and their identities.
//!
//! An actor is an opaque component that the kernel drives through its
//! lifecycle phases. Actors never see the event buffer: their state
//! machine proposes on their behalf and calls into them only when the
//! resolver granted the phase.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`ActorId`] newtype |
//! | [`traits`] | [`Actor`] trait |
//! | [`trace`] | [`TraceEntry`] struct |
//! | [`builtin`] | [`CounterActor`], [`PeriodicActor`], [`YieldingActor`] |

pub mod builtin;
pub mod id;
pub mod trace;
pub mod traits;

pub use builtin::{BodyProgress, CounterActor, PeriodicActor, YieldingActor};
pub use id::ActorId;
pub use trace::TraceEntry;
pub use traits::Actor;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::YieldAdapter;
    use crate::machine::{ActState, MachineState};

    #[test]
    fn test_actor_id_display() {
        assert_eq!(ActorId::new(7).to_string(), "A7");
        assert!(ActorId::new(1) < ActorId::new(2));
    }

    #[test]
    fn test_counter_halts_after_n_postfires() {
        let mut a = CounterActor::new("c").halting_after(2);
        assert!(a.postfire());
        assert!(!a.postfire());
        assert_eq!(a.postfires, 2);
    }

    #[test]
    fn test_counter_refuses_initial_prefires() {
        let mut a = CounterActor::new("c").refusing_prefires(2);
        assert!(!a.prefire());
        assert!(!a.prefire());
        assert!(a.prefire());
    }

    #[test]
    fn test_periodic_stamps_only_cycle_start() {
        let a = PeriodicActor::new("p", 10).with_offset(5);
        let begin = a
            .event_time(MachineState::Act(ActState::PrefireBegin), 2)
            .unwrap();
        assert_eq!(begin.value(), 25);
        assert!(a
            .event_time(MachineState::Act(ActState::PostfireEnd), 2)
            .is_none());
    }

    #[test]
    fn test_yielding_body_steps() {
        let mut actor = YieldingActor::new("y", 2);
        let co = YieldAdapter::yielder();
        let body = actor.get_fire(co.clone()).unwrap();
        let mut adapter = YieldAdapter::from_body(body, &co);

        let mut batch = adapter.next().unwrap().unwrap();
        assert_eq!(batch[0].name(), "y.step0");
        batch[0].notify();
        let mut batch = adapter.resume(batch).unwrap().unwrap();
        assert_eq!(batch[0].name(), "y.step1");
        batch[0].notify();
        assert!(adapter.resume(batch).unwrap().is_none());
        assert_eq!(actor.progress.steps.get(), 2);
        assert_eq!(actor.progress.completed.get(), 1);
        assert_eq!(actor.progress.unwound.get(), 0);
    }

    #[test]
    fn test_yielding_body_counts_unwind() {
        let mut actor = YieldingActor::new("y", 3);
        let co = YieldAdapter::yielder();
        let body = actor.get_fire(co.clone()).unwrap();
        let mut adapter = YieldAdapter::from_body(body, &co);
        adapter.next().unwrap();
        assert!(adapter.dispose());
        assert_eq!(actor.progress.unwound.get(), 1);
        assert_eq!(actor.progress.completed.get(), 0);
    }

    #[test]
    fn test_trace_entry_display() {
        use crate::event::{Event, EventKind};
        let mut e = Event::proposed("a.END", EventKind::End).with_owner(ActorId::new(1));
        e.notify();
        let entry = TraceEntry::from_event(3, &e);
        assert_eq!(entry.to_string(), "[R=3 A1] a.END NOTIFIED");
    }
}
