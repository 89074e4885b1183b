//! Single-threaded coroutine adapter for component bodies.
//!
//! A component whose body must propose events part-way through its own
//! computation is written as an `async` block that awaits
//! [`Yielder::propose`] at each yield point. The adapter polls that future
//! with a no-op waker: every `propose` parks the batch in a shared slot and
//! suspends once, handing control back to the caller. No thread is
//! involved, and caller and body strictly alternate.
//!
//! ```text
//!  caller                         body
//!  ──────                         ────
//!  has_next() ── poll ──────────▶ runs to propose(batch)
//!             ◀── Pending ─────── batch parked in slot
//!  next()  → batch
//!  (resolve batch)
//!  feed(resolved)
//!  has_next() ── poll ──────────▶ propose(..) returns resolved batch
//!                                 ...
//!             ◀── Ready ───────── body returned
//!  has_next() == false
//! ```
//!
//! Dropping the suspended future unwinds the body, running the destructors
//! of everything it holds. That is what [`YieldAdapter::dispose`] does.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::task::noop_waker_ref;

use crate::error::{KernelResult, ProtocolViolation};
use crate::event::Event;

/// A suspended component body.
pub type Body = Pin<Box<dyn Future<Output = ()>>>;

/// Hand-off slot between the adapter and the body.
#[derive(Debug, Default)]
struct Exchange {
    /// Batch the body yielded, waiting for the caller to take it.
    outgoing: Option<Vec<Event>>,
    /// Resolved batch the caller handed back, waiting for the body.
    incoming: Option<Vec<Event>>,
}

// ── Yielder ───────────────────────────────────────────────────────────

/// Handle a body uses to yield batches of events.
#[derive(Debug, Clone)]
pub struct Yielder {
    slot: Rc<RefCell<Exchange>>,
}

impl Yielder {
    /// Yield `events` to the caller and suspend.
    ///
    /// Resolves to the same events after the caller resolved them, in the
    /// order they were yielded.
    pub fn propose(&self, events: Vec<Event>) -> Propose {
        Propose {
            slot: Rc::clone(&self.slot),
            events: Some(events),
        }
    }

    /// Keep proposing until every event in the batch is notified.
    ///
    /// Notified events are not proposed again; the result keeps the
    /// original order.
    pub async fn propose_until_notified(&self, events: Vec<Event>) -> KernelResult<Vec<Event>> {
        let mut done: Vec<Option<Event>> = vec![None; events.len()];
        let mut pending: Vec<(usize, Event)> = events.into_iter().enumerate().collect();
        while !pending.is_empty() {
            let (slots, batch): (Vec<usize>, Vec<Event>) = pending.into_iter().unzip();
            let resolved = self.propose(batch).await;
            pending = Vec::new();
            for (slot, mut e) in slots.into_iter().zip(resolved) {
                if e.is_notified() {
                    done[slot] = Some(e);
                } else {
                    e.repropose()?;
                    pending.push((slot, e));
                }
            }
        }
        Ok(done.into_iter().flatten().collect())
    }
}

/// Future returned by [`Yielder::propose`].
#[derive(Debug)]
pub struct Propose {
    slot: Rc<RefCell<Exchange>>,
    events: Option<Vec<Event>>,
}

impl Future for Propose {
    type Output = Vec<Event>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(batch) = self.events.take() {
            self.slot.borrow_mut().outgoing = Some(batch);
            return Poll::Pending;
        }
        match self.slot.borrow_mut().incoming.take() {
            Some(resolved) => Poll::Ready(resolved),
            None => Poll::Pending,
        }
    }
}

// ── YieldAdapter ──────────────────────────────────────────────────────

/// Drives one body from yield point to yield point.
pub struct YieldAdapter {
    body: Option<Body>,
    slot: Rc<RefCell<Exchange>>,
    /// Batch produced by the last resume and not yet taken.
    ready: Option<Vec<Event>>,
    /// Resolved batch to hand back on the next resume.
    feedback: Vec<Event>,
    resumes: u64,
}

impl YieldAdapter {
    /// Create the body. It does not run until the first `has_next`.
    pub fn new<F>(make: F) -> Self
    where
        F: FnOnce(Yielder) -> Body,
    {
        let slot = Rc::new(RefCell::new(Exchange::default()));
        let body = make(Yielder {
            slot: Rc::clone(&slot),
        });
        YieldAdapter {
            body: Some(body),
            slot,
            ready: None,
            feedback: Vec::new(),
            resumes: 0,
        }
    }

    /// Wrap a body that was created elsewhere with [`YieldAdapter::yielder`].
    pub fn from_body(body: Body, yielder: &Yielder) -> Self {
        YieldAdapter {
            body: Some(body),
            slot: Rc::clone(&yielder.slot),
            ready: None,
            feedback: Vec::new(),
            resumes: 0,
        }
    }

    /// A fresh yielder for building a body outside [`YieldAdapter::new`].
    pub fn yielder() -> Yielder {
        Yielder {
            slot: Rc::new(RefCell::new(Exchange::default())),
        }
    }

    /// Supply the resolved batch for the next resume.
    pub fn feed(&mut self, resolved: Vec<Event>) {
        self.feedback = resolved;
    }

    /// Run the body to its next yield point.
    ///
    /// Returns `true` if a batch was yielded and `false` once the body has
    /// returned. Calling it again before `next` does not resume the body.
    pub fn has_next(&mut self) -> KernelResult<bool> {
        if self.ready.is_some() {
            return Ok(true);
        }
        let Some(body) = self.body.as_mut() else {
            return Ok(false);
        };
        if self.resumes > 0 {
            self.slot.borrow_mut().incoming = Some(std::mem::take(&mut self.feedback));
        }
        self.resumes += 1;

        let mut cx = Context::from_waker(noop_waker_ref());
        match body.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                self.body = None;
                self.clear_slot();
                Ok(false)
            }
            Poll::Pending => match self.slot.borrow_mut().outgoing.take() {
                Some(batch) => {
                    self.ready = Some(batch);
                    Ok(true)
                }
                None => Err(ProtocolViolation::BodyStalled.into()),
            },
        }
    }

    /// Take the batch yielded by the last resume.
    pub fn next(&mut self) -> KernelResult<Option<Vec<Event>>> {
        if self.has_next()? {
            Ok(self.ready.take())
        } else {
            Ok(None)
        }
    }

    /// Hand back `feedback` and resume; `None` means the body returned.
    pub fn resume(&mut self, feedback: Vec<Event>) -> KernelResult<Option<Vec<Event>>> {
        self.feed(feedback);
        self.next()
    }

    /// Unwind a suspended body. Returns `true` if a live body was dropped.
    pub fn dispose(&mut self) -> bool {
        self.ready = None;
        self.feedback.clear();
        let live = self.body.take().is_some();
        self.clear_slot();
        live
    }

    /// The body has returned or was disposed.
    pub fn is_finished(&self) -> bool {
        self.body.is_none()
    }

    /// Number of times the body was polled.
    pub fn resumes(&self) -> u64 {
        self.resumes
    }

    fn clear_slot(&self) {
        let mut slot = self.slot.borrow_mut();
        slot.outgoing = None;
        slot.incoming = None;
    }
}

impl Drop for YieldAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for YieldAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YieldAdapter")
            .field("finished", &self.is_finished())
            .field("ready", &self.ready.as_ref().map(Vec::len))
            .field("resumes", &self.resumes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;
    use crate::event::EventKind;
    use std::cell::Cell;

    fn ev(name: &str) -> Event {
        Event::proposed(name, EventKind::Generic)
    }

    struct DropFlag(Rc<Cell<u32>>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_yields_in_order_then_completes() {
        let mut adapter = YieldAdapter::new(|co| {
            Box::pin(async move {
                co.propose(vec![ev("a"), ev("b")]).await;
                co.propose(vec![ev("c")]).await;
            })
        });

        let first = adapter.next().unwrap().unwrap();
        assert_eq!(first.iter().map(|e| e.name()).collect::<Vec<_>>(), vec!["a", "b"]);
        let second = adapter.resume(first).unwrap().unwrap();
        assert_eq!(second[0].name(), "c");
        assert!(adapter.resume(second).unwrap().is_none());
        assert!(adapter.is_finished());
        assert!(!adapter.has_next().unwrap());
    }

    #[test]
    fn test_body_sees_resolved_statuses() {
        let seen = Rc::new(Cell::new(false));
        let flag = Rc::clone(&seen);
        let mut adapter = YieldAdapter::new(move |co| {
            Box::pin(async move {
                let back = co.propose(vec![ev("x")]).await;
                flag.set(back[0].is_notified());
            })
        });

        let mut batch = adapter.next().unwrap().unwrap();
        batch[0].notify();
        assert!(adapter.resume(batch).unwrap().is_none());
        assert!(seen.get());
    }

    #[test]
    fn test_has_next_is_idempotent_until_taken() {
        let polls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&polls);
        let mut adapter = YieldAdapter::new(move |co| {
            Box::pin(async move {
                counter.set(counter.get() + 1);
                co.propose(vec![ev("x")]).await;
            })
        });
        assert!(adapter.has_next().unwrap());
        assert!(adapter.has_next().unwrap());
        assert_eq!(polls.get(), 1);
        assert_eq!(adapter.resumes(), 1);
    }

    #[test]
    fn test_propose_until_notified_reproposes_pending() {
        let mut adapter = YieldAdapter::new(|co| {
            Box::pin(async move {
                let _ = co.propose_until_notified(vec![ev("p"), ev("q")]).await;
            })
        });

        let mut batch = adapter.next().unwrap().unwrap();
        batch[0].notify();
        batch[1].defer().unwrap();
        let again = adapter.resume(batch).unwrap().unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].name(), "q");
        assert!(!again[0].is_notified());

        let mut again = again;
        again[0].notify();
        assert!(adapter.resume(again).unwrap().is_none());
    }

    #[test]
    fn test_dispose_unwinds_body_once() {
        let drops = Rc::new(Cell::new(0));
        let guard_count = Rc::clone(&drops);
        let mut adapter = YieldAdapter::new(move |co| {
            Box::pin(async move {
                let _guard = DropFlag(guard_count);
                co.propose(vec![ev("x")]).await;
                co.propose(vec![ev("never")]).await;
            })
        });

        adapter.next().unwrap();
        assert_eq!(drops.get(), 0);
        assert!(adapter.dispose());
        assert_eq!(drops.get(), 1);
        assert!(!adapter.dispose());
        drop(adapter);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_stalled_body_is_a_protocol_error() {
        let mut adapter = YieldAdapter::new(|_co| Box::pin(futures::future::pending::<()>()));
        assert!(matches!(
            adapter.has_next(),
            Err(KernelError::Protocol(ProtocolViolation::BodyStalled))
        ));
    }

    #[test]
    fn test_empty_body_completes_immediately() {
        let mut adapter = YieldAdapter::new(|_co| Box::pin(async {}));
        assert!(adapter.next().unwrap().is_none());
        assert!(adapter.is_finished());
        assert!(!adapter.dispose());
    }
}
