/// Events and the propose/notify status protocol.
///
/// An `Event` is what a component exposes about its progress: a name
/// (conventionally `<owner>.<phase>`), the component that owns it, an
/// optional timestamp, and a status. Components create events only in the
/// `Proposed` state; moving an event to `Waiting` or `Notified` is the
/// resolver's job. Within one proposal lifetime an event never leaves
/// `Notified`.

use std::collections::HashSet;

use crate::actor::ActorId;
use crate::error::{KernelResult, ProtocolViolation};
use crate::time::EventTime;

// ── Status ────────────────────────────────────────────────────────────

/// Where an event is in its per-round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EventStatus {
    /// Exposed by a component, not yet examined.
    Proposed,
    /// Examined and deferred; the component re-proposes next round.
    Waiting,
    /// Granted; the component may proceed.
    Notified,
}

impl EventStatus {
    /// `Proposed` or `Waiting`.
    #[inline]
    pub fn is_pending(self) -> bool {
        !matches!(self, EventStatus::Notified)
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Proposed => write!(f, "PROPOSED"),
            EventStatus::Waiting => write!(f, "WAITING"),
            EventStatus::Notified => write!(f, "NOTIFIED"),
        }
    }
}

// ── Kind ──────────────────────────────────────────────────────────────

/// Domain tag carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum EventKind {
    #[default]
    Generic,
    Begin,
    End,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Generic => write!(f, "GENERIC"),
            EventKind::Begin => write!(f, "BEGIN"),
            EventKind::End => write!(f, "END"),
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single coordination event.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    name: String,
    owner: Option<ActorId>,
    status: EventStatus,
    kind: EventKind,
    time: Option<EventTime>,
}

impl Event {
    /// A freshly proposed event with no owner and no timestamp.
    pub fn proposed(name: impl Into<String>, kind: EventKind) -> Self {
        Event {
            name: name.into(),
            owner: None,
            status: EventStatus::Proposed,
            kind,
            time: None,
        }
    }

    /// Attach the originating component.
    pub fn with_owner(mut self, owner: ActorId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Attach a timestamp.
    pub fn with_time(mut self, time: EventTime) -> Self {
        self.time = Some(time);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn owner(&self) -> Option<ActorId> {
        self.owner
    }

    #[inline]
    pub fn status(&self) -> EventStatus {
        self.status
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[inline]
    pub fn time(&self) -> Option<EventTime> {
        self.time
    }

    #[inline]
    pub fn is_notified(&self) -> bool {
        self.status == EventStatus::Notified
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Grant the event. Notifying twice is a no-op.
    pub fn notify(&mut self) {
        self.status = EventStatus::Notified;
    }

    /// Defer the event to a later round.
    pub fn defer(&mut self) -> KernelResult<()> {
        self.guard_regression(EventStatus::Waiting)?;
        self.status = EventStatus::Waiting;
        Ok(())
    }

    /// Start a new proposal lifetime for a still-pending event.
    pub fn repropose(&mut self) -> KernelResult<()> {
        self.guard_regression(EventStatus::Proposed)?;
        self.status = EventStatus::Proposed;
        Ok(())
    }

    /// Give an untimed event a timestamp. Events that already carry one keep it.
    pub(crate) fn stamp(&mut self, time: EventTime) {
        if self.time.is_none() {
            self.time = Some(time);
        }
    }

    /// Tag the event as proposed by `owner`, replacing any owner it carried.
    pub(crate) fn claim(&mut self, owner: ActorId) {
        self.owner = Some(owner);
    }

    fn guard_regression(&self, requested: EventStatus) -> KernelResult<()> {
        if self.is_notified() {
            return Err(ProtocolViolation::StatusRegression {
                event: self.name.clone(),
                requested: requested.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.name, self.status)?;
        if let Some(t) = self.time {
            write!(f, " @{}", t)?;
        }
        Ok(())
    }
}

// ── EventBuffer ───────────────────────────────────────────────────────

/// The batch of events shared by all components in one round.
///
/// Order is proposal order. The buffer also carries last round's resolved
/// events until their owners take them back.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    events: Vec<Event>,
    /// Names of the pending events, for the per-batch uniqueness check.
    pending_names: HashSet<String>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component's proposal.
    ///
    /// The event must still be `Proposed`, and no other pending event in the
    /// batch may carry the same name.
    pub fn propose(&mut self, event: Event) -> KernelResult<()> {
        if event.status != EventStatus::Proposed {
            return Err(ProtocolViolation::SelfNotified {
                event: event.name,
                status: event.status.to_string(),
            }
            .into());
        }
        if !self.pending_names.insert(event.name.clone()) {
            return Err(ProtocolViolation::DuplicateProposal { event: event.name }.into());
        }
        self.events.push(event);
        Ok(())
    }

    /// Remove and return, in order, every event owned by `owner`.
    pub fn take_owned(&mut self, owner: ActorId) -> Vec<Event> {
        let (mine, rest): (Vec<Event>, Vec<Event>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|e| e.owner == Some(owner));
        self.events = rest;
        for e in &mine {
            if e.status == EventStatus::Proposed {
                self.pending_names.remove(&e.name);
            }
        }
        mine
    }

    /// Drop everything that is no longer `Proposed`.
    ///
    /// Called after every component advanced: a resolved event still in the
    /// buffer at that point was not re-proposed by anyone.
    pub fn purge_stale(&mut self) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.status == EventStatus::Proposed);
        before - self.events.len()
    }

    /// Drop every event owned by `owner`.
    pub fn discard_owned(&mut self, owner: ActorId) -> usize {
        self.take_owned(owner).len()
    }

    /// Re-sync the pending-name index after a resolver changed statuses.
    pub(crate) fn sync_pending(&mut self) {
        self.pending_names = self
            .events
            .iter()
            .filter(|e| e.status == EventStatus::Proposed)
            .map(|e| e.name.clone())
            .collect();
    }

    pub fn find(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// The events as a mutable slice, for resolvers.
    pub fn as_mut_slice(&mut self) -> &mut [Event] {
        &mut self.events
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.pending_names.clear();
    }

    /// Event names in buffer order.
    pub fn names(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.name()).collect()
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;
    use proptest::prelude::*;

    fn ev(name: &str) -> Event {
        Event::proposed(name, EventKind::Generic)
    }

    #[test]
    fn test_new_event_is_proposed() {
        let e = ev("a.PREFIRE_BEGIN").with_owner(ActorId::new(3));
        assert_eq!(e.status(), EventStatus::Proposed);
        assert_eq!(e.owner(), Some(ActorId::new(3)));
        assert!(e.time().is_none());
        assert!(e.is_pending());
    }

    #[test]
    fn test_notified_cannot_regress() {
        let mut e = ev("x");
        e.notify();
        assert!(matches!(
            e.defer(),
            Err(KernelError::Protocol(ProtocolViolation::StatusRegression { .. }))
        ));
        assert!(e.repropose().is_err());
        assert!(e.is_notified());
    }

    #[test]
    fn test_waiting_reproposes() {
        let mut e = ev("x");
        e.defer().unwrap();
        assert_eq!(e.status(), EventStatus::Waiting);
        e.repropose().unwrap();
        assert_eq!(e.status(), EventStatus::Proposed);
    }

    #[test]
    fn test_buffer_rejects_self_notified() {
        let mut buf = EventBuffer::new();
        let mut e = ev("x");
        e.notify();
        assert!(matches!(
            buf.propose(e),
            Err(KernelError::Protocol(ProtocolViolation::SelfNotified { .. }))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_buffer_rejects_duplicate_names() {
        let mut buf = EventBuffer::new();
        buf.propose(ev("x")).unwrap();
        assert!(matches!(
            buf.propose(ev("x")),
            Err(KernelError::Protocol(ProtocolViolation::DuplicateProposal { .. }))
        ));
    }

    #[test]
    fn test_event_serializes_through_toml() {
        let mut e = ev("a.POSTFIRE_END")
            .with_owner(ActorId::new(2))
            .with_time(EventTime::new(40, crate::time::Resolution::MILLIS));
        e.notify();
        let text = toml::to_string(&e).unwrap();
        assert!(text.contains("status = \"Notified\""));
        let back: Event = toml::from_str(&text).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_take_owned_preserves_order_and_frees_names() {
        let a = ActorId::new(0);
        let b = ActorId::new(1);
        let mut buf = EventBuffer::new();
        buf.propose(ev("a.1").with_owner(a)).unwrap();
        buf.propose(ev("b.1").with_owner(b)).unwrap();
        buf.propose(ev("a.2").with_owner(a)).unwrap();

        let mine = buf.take_owned(a);
        assert_eq!(mine.iter().map(|e| e.name()).collect::<Vec<_>>(), vec!["a.1", "a.2"]);
        assert_eq!(buf.names(), vec!["b.1"]);
        buf.propose(ev("a.1").with_owner(a)).unwrap();
    }

    #[test]
    fn test_purge_stale_keeps_only_proposed() {
        let mut buf = EventBuffer::new();
        buf.propose(ev("x")).unwrap();
        buf.propose(ev("y")).unwrap();
        buf.as_mut_slice()[0].notify();
        buf.sync_pending();
        assert_eq!(buf.purge_stale(), 1);
        assert_eq!(buf.names(), vec!["y"]);
    }

    proptest! {
        // Once notified, no sequence of protocol calls moves an event back.
        #[test]
        fn property_notified_is_final(ops in proptest::collection::vec(0u8..3, 0..20)) {
            let mut e = ev("p");
            let mut notified = false;
            for op in ops {
                match op {
                    0 => { e.notify(); notified = true; }
                    1 => { let _ = e.defer(); }
                    _ => { let _ = e.repropose(); }
                }
                if notified {
                    prop_assert_eq!(e.status(), EventStatus::Notified);
                }
            }
        }
    }
}
