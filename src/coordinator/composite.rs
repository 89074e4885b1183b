//! `CompositeActor` — a whole coordinator driven as one component.
//!
//! Under a resumable policy the composite's fire body runs the inner
//! coordinator round by round, but never resolves an inner batch itself.
//! Each inner batch is yielded upward together with `<name>.IDLE`, and the
//! outer resolver decides both. The body keeps going until the outer
//! resolver notifies `IDLE` or the inner model runs dry.
//!
//! `IDLE` carries the earliest timestamp pending in the inner batch, so a
//! time-resolving outer coordinator only lets the composite settle once
//! the inner model reached that time. The notified `IDLE` time becomes the
//! composite's model time.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::actor::Actor;
use crate::coroutine::{Body, Yielder};
use crate::event::{Event, EventKind};
use crate::time::EventTime;

use super::Coordinator;

/// Runs an inner [`Coordinator`] as the body of one outer machine.
///
/// Under a blocking policy `fire` runs a single inner round with the inner
/// coordinator's own resolver. `postfire` asks to halt once the inner model
/// is quiescent.
pub struct CompositeActor {
    name: String,
    inner: Rc<RefCell<Coordinator>>,
    model_time: Rc<Cell<Option<EventTime>>>,
    pub fires: u64,
    pub stops: u64,
}

impl CompositeActor {
    pub fn new(name: impl Into<String>, inner: Coordinator) -> Self {
        CompositeActor {
            name: name.into(),
            inner: Rc::new(RefCell::new(inner)),
            model_time: Rc::new(Cell::new(None)),
            fires: 0,
            stops: 0,
        }
    }

    /// Name of the event that ends one fire of the composite.
    pub fn idle_event(&self) -> String {
        format!("{}.IDLE", self.name)
    }

    pub fn inner(&self) -> Ref<'_, Coordinator> {
        self.inner.borrow()
    }

    /// Time of the last notified `IDLE` that carried one.
    pub fn model_time(&self) -> Option<EventTime> {
        self.model_time.get()
    }
}

/// Earliest timestamp among `events`, compared at the first one's resolution.
fn earliest_time(events: &[Event]) -> Option<EventTime> {
    events
        .iter()
        .filter_map(Event::time)
        .fold(None, |best: Option<EventTime>, t| match best {
            Some(b) if t.in_resolution(b.resolution()).map_or(true, |t| t.value() >= b.value()) => {
                Some(b)
            }
            _ => Some(t),
        })
}

impl Actor for CompositeActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self) {
        self.fires += 1;
        if let Err(e) = self.inner.borrow_mut().round() {
            warn!(actor = %self.name, error = %e, "inner round aborted");
        }
    }

    fn postfire(&mut self) -> bool {
        !self.inner.borrow().is_quiescent()
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.inner.borrow_mut().stop();
    }

    fn get_fire(&mut self, yielder: Yielder) -> Option<Body> {
        self.fires += 1;
        let inner = Rc::clone(&self.inner);
        let model_time = Rc::clone(&self.model_time);
        let idle_name = self.idle_event();
        Some(Box::pin(async move {
            loop {
                let exported = match inner.borrow_mut().export_round() {
                    Ok(round) => round,
                    Err(e) => {
                        warn!(actor = %idle_name, error = %e, "inner round aborted");
                        return;
                    }
                };
                if exported.is_empty() && inner.borrow().is_quiescent() {
                    if let Err(e) = inner.borrow_mut().import_round(exported, &[]) {
                        warn!(actor = %idle_name, error = %e, "inner round aborted");
                    }
                    debug!(actor = %idle_name, "inner model quiescent");
                    return;
                }

                let mut idle = Event::proposed(idle_name.clone(), EventKind::Generic);
                if let Some(t) = earliest_time(exported.events()) {
                    idle = idle.with_time(t);
                }
                let mut batch = exported.events().to_vec();
                batch.push(idle);

                let resolved = yielder.propose(batch).await;
                let idle = resolved.iter().find(|e| e.name() == idle_name).cloned();
                if let Err(e) = inner.borrow_mut().import_round(exported, &resolved) {
                    warn!(actor = %idle_name, error = %e, "inner round aborted");
                    return;
                }
                if let Some(idle) = idle.filter(Event::is_notified) {
                    if let Some(t) = idle.time() {
                        model_time.set(Some(t));
                    }
                    return;
                }
            }
        }))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn state_hash(&self) -> u64 {
        self.inner.borrow().state_hash()
    }
}

impl std::fmt::Debug for CompositeActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeActor")
            .field("name", &self.name)
            .field("inner", &self.inner.borrow())
            .field("model_time", &self.model_time.get())
            .field("fires", &self.fires)
            .finish()
    }
}
