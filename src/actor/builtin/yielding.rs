//! `YieldingActor` — a resumable body that proposes one event per step.

use std::cell::Cell;
use std::rc::Rc;

use crate::coroutine::{Body, Yielder};
use crate::event::{Event, EventKind};

use crate::actor::traits::Actor;

/// Counters shared between the actor and its live body.
#[derive(Debug, Default)]
pub struct BodyProgress {
    /// Steps whose event was notified in the current body.
    pub steps: Cell<u32>,
    /// Bodies that ran to completion.
    pub completed: Cell<u32>,
    /// Bodies dropped before they completed.
    pub unwound: Cell<u32>,
}

/// Bumps `unwound` if the body is dropped before reaching its end.
struct UnwindGuard {
    progress: Rc<BodyProgress>,
    armed: bool,
}

impl Drop for UnwindGuard {
    fn drop(&mut self) {
        if self.armed {
            self.progress.unwound.set(self.progress.unwound.get() + 1);
        }
    }
}

/// An actor whose fire body yields `<name>.step<i>` for each step and
/// waits until that event is notified before moving on.
///
/// Under a blocking policy `fire` runs all steps at once.
#[derive(Debug, Clone)]
pub struct YieldingActor {
    pub name: String,
    pub steps: u32,
    pub fires: u64,
    pub stops: u64,
    pub progress: Rc<BodyProgress>,
}

impl YieldingActor {
    pub fn new(name: impl Into<String>, steps: u32) -> Self {
        YieldingActor {
            name: name.into(),
            steps,
            fires: 0,
            stops: 0,
            progress: Rc::new(BodyProgress::default()),
        }
    }

    /// Event name yielded at `step`.
    pub fn step_event(&self, step: u32) -> String {
        format!("{}.step{}", self.name, step)
    }
}

impl Actor for YieldingActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self) {
        self.fires += 1;
        self.progress.steps.set(self.steps);
        self.progress.completed.set(self.progress.completed.get() + 1);
    }

    fn stop(&mut self) {
        self.stops += 1;
    }

    fn get_fire(&mut self, yielder: Yielder) -> Option<Body> {
        self.fires += 1;
        let names: Vec<String> = (0..self.steps).map(|i| self.step_event(i)).collect();
        let progress = Rc::clone(&self.progress);
        progress.steps.set(0);
        Some(Box::pin(async move {
            let mut guard = UnwindGuard {
                progress: Rc::clone(&progress),
                armed: true,
            };
            for name in names {
                let batch = vec![Event::proposed(name, EventKind::Generic)];
                if let Err(e) = yielder.propose_until_notified(batch).await {
                    tracing::warn!(error = %e, "yielding body aborted");
                    return;
                }
                progress.steps.set(progress.steps.get() + 1);
            }
            guard.armed = false;
            progress.completed.set(progress.completed.get() + 1);
        }))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
