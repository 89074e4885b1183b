/// Time scheduler: a resolver that grants the earliest proposals.
///
/// Timestamps are compared after rescaling to the scheduler's own
/// resolution, which should be the finest one in use; rescaling to a
/// coarser resolution is a configuration error. Among timed candidates
/// only those at the minimum time are granted, and the clock then moves
/// to that time if it is later than the current reading. The clock never
/// goes backwards.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::KernelResult;
use crate::event::Event;
use crate::resolver::Resolver;
use crate::time::{EventTime, Resolution, VirtualTime};

/// How untimed proposals are ordered against timed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UntimedPolicy {
    /// Untimed events wait while any timed event is proposed. Once only
    /// untimed events remain they are stamped with the clock and granted.
    #[default]
    AfterTimed,
    /// Untimed events are stamped and granted first; timed events wait
    /// until none is proposed.
    BeforeTimed,
}

/// Resolver keyed on event timestamps.
#[derive(Debug, Clone)]
pub struct TimeScheduler {
    clock: VirtualTime,
    resolution: Resolution,
    untimed: UntimedPolicy,
}

impl TimeScheduler {
    /// A scheduler at time zero.
    pub fn new(resolution: Resolution) -> Self {
        TimeScheduler {
            clock: VirtualTime::ZERO,
            resolution,
            untimed: UntimedPolicy::default(),
        }
    }

    pub fn with_untimed(mut self, untimed: UntimedPolicy) -> Self {
        self.untimed = untimed;
        self
    }

    /// Start the clock at `time`.
    pub fn starting_at(mut self, time: VirtualTime) -> Self {
        self.clock = time;
        self
    }

    #[inline]
    pub fn clock(&self) -> VirtualTime {
        self.clock
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[inline]
    pub fn untimed_policy(&self) -> UntimedPolicy {
        self.untimed
    }

    /// The clock as an event timestamp.
    pub fn now(&self) -> EventTime {
        EventTime::at(self.clock, self.resolution)
    }

    /// Ticks of `time` at the scheduler resolution.
    pub fn ticks_of(&self, time: EventTime) -> KernelResult<u64> {
        Ok(time.in_resolution(self.resolution)?.value())
    }

    /// Candidates whose timestamp is the minimum among timed ones.
    fn earliest(&self, events: &[Event], timed: &[usize]) -> KernelResult<Vec<usize>> {
        let mut best: Option<u64> = None;
        let mut chosen = Vec::new();
        for &i in timed {
            let Some(t) = events[i].time() else { continue };
            let ticks = self.ticks_of(t)?;
            match best {
                Some(b) if ticks > b => {}
                Some(b) if ticks == b => chosen.push(i),
                _ => {
                    best = Some(ticks);
                    chosen.clear();
                    chosen.push(i);
                }
            }
        }
        Ok(chosen)
    }
}

impl Default for TimeScheduler {
    fn default() -> Self {
        Self::new(Resolution::default())
    }
}

impl Resolver for TimeScheduler {
    fn name(&self) -> &str {
        "time"
    }

    fn filter(&mut self, events: &[Event], candidates: &mut Vec<usize>) -> KernelResult<()> {
        let (timed, untimed): (Vec<usize>, Vec<usize>) =
            candidates.iter().partition(|&&i| events[i].time().is_some());
        *candidates = match self.untimed {
            UntimedPolicy::AfterTimed if !timed.is_empty() => self.earliest(events, &timed)?,
            UntimedPolicy::AfterTimed => untimed,
            UntimedPolicy::BeforeTimed if !untimed.is_empty() => untimed,
            UntimedPolicy::BeforeTimed => self.earliest(events, &timed)?,
        };
        Ok(())
    }

    fn commit(&mut self, events: &mut [Event], granted: &[usize]) -> KernelResult<()> {
        let mut next = self.clock.ticks();
        for &i in granted {
            if let Some(t) = events[i].time() {
                next = next.max(self.ticks_of(t)?);
            }
        }
        if next > self.clock.ticks() {
            debug!(from = %self.clock, to = next, "clock advanced");
            self.clock = VirtualTime::new(next);
        }
        let now = self.now();
        for &i in granted {
            events[i].stamp(now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, KernelError};
    use crate::event::{EventKind, EventStatus};
    use crate::resolver::resolve;
    use proptest::prelude::*;

    fn ev(name: &str) -> Event {
        Event::proposed(name, EventKind::Generic)
    }

    fn at(name: &str, v: u64) -> Event {
        ev(name).with_time(EventTime::new(v, Resolution::SECONDS))
    }

    fn reprocess(batch: &mut Vec<Event>) {
        batch.retain(|e| !e.is_notified());
        for e in batch.iter_mut() {
            e.repropose().unwrap();
        }
    }

    #[test]
    fn test_untimed_waits_for_timed() {
        let mut s = TimeScheduler::new(Resolution::SECONDS);
        let mut batch = vec![at("t10", 10), at("t20", 20), ev("u")];

        resolve(&mut s, &mut batch).unwrap();
        assert_eq!(batch[0].status(), EventStatus::Notified);
        assert_eq!(batch[1].status(), EventStatus::Waiting);
        assert_eq!(batch[2].status(), EventStatus::Waiting);
        assert_eq!(s.clock(), VirtualTime::new(10));

        reprocess(&mut batch);
        resolve(&mut s, &mut batch).unwrap();
        assert_eq!(batch[0].name(), "t20");
        assert!(batch[0].is_notified());
        assert_eq!(batch[1].status(), EventStatus::Waiting);
        assert_eq!(s.clock(), VirtualTime::new(20));

        reprocess(&mut batch);
        resolve(&mut s, &mut batch).unwrap();
        assert_eq!(batch[0].name(), "u");
        assert!(batch[0].is_notified());
        assert_eq!(batch[0].time().unwrap().value(), 20);
    }

    #[test]
    fn test_before_timed_drains_untimed_first() {
        let mut s = TimeScheduler::new(Resolution::SECONDS).with_untimed(UntimedPolicy::BeforeTimed);
        let mut batch = vec![at("t10", 10), ev("u")];
        resolve(&mut s, &mut batch).unwrap();
        assert_eq!(batch[0].status(), EventStatus::Waiting);
        assert_eq!(batch[1].status(), EventStatus::Notified);
        assert_eq!(batch[1].time().unwrap().value(), 0);
        assert_eq!(s.clock(), VirtualTime::ZERO);
    }

    #[test]
    fn test_ties_are_granted_together() {
        let mut s = TimeScheduler::new(Resolution::SECONDS);
        let mut batch = vec![at("a", 7), at("b", 3), at("c", 3)];
        let report = resolve(&mut s, &mut batch).unwrap();
        assert_eq!(report.notified, 2);
        assert!(!batch[0].is_notified());
        assert!(batch[1].is_notified() && batch[2].is_notified());
    }

    #[test]
    fn test_mixed_resolutions_compare_after_scaling() {
        let mut s = TimeScheduler::new(Resolution::MILLIS);
        let mut batch = vec![
            ev("sec").with_time(EventTime::new(2, Resolution::SECONDS)),
            ev("ms").with_time(EventTime::new(1_500, Resolution::MILLIS)),
        ];
        resolve(&mut s, &mut batch).unwrap();
        assert!(!batch[0].is_notified());
        assert!(batch[1].is_notified());
        assert_eq!(s.clock(), VirtualTime::new(1_500));
    }

    #[test]
    fn test_finer_event_resolution_is_rejected() {
        let mut s = TimeScheduler::new(Resolution::SECONDS);
        let mut batch = vec![ev("ms").with_time(EventTime::new(1, Resolution::MILLIS))];
        assert!(matches!(
            resolve(&mut s, &mut batch),
            Err(KernelError::Config(ConfigError::FractionalTimeScale { .. }))
        ));
    }

    #[test]
    fn test_past_event_does_not_rewind_clock() {
        let mut s = TimeScheduler::new(Resolution::SECONDS).starting_at(VirtualTime::new(50));
        let mut batch = vec![at("late", 5)];
        resolve(&mut s, &mut batch).unwrap();
        assert!(batch[0].is_notified());
        assert_eq!(s.clock(), VirtualTime::new(50));
    }

    proptest! {
        #[test]
        fn property_clock_never_decreases(
            rounds in proptest::collection::vec(
                proptest::collection::vec(proptest::option::of(0u64..1_000), 0..6),
                1..20,
            ),
            before in any::<bool>(),
        ) {
            let policy = if before { UntimedPolicy::BeforeTimed } else { UntimedPolicy::AfterTimed };
            let mut s = TimeScheduler::new(Resolution::SECONDS).with_untimed(policy);
            let mut last = s.clock();
            for times in rounds {
                let mut batch: Vec<Event> = times
                    .iter()
                    .enumerate()
                    .map(|(i, t)| match t {
                        Some(v) => at(&format!("e{}", i), *v),
                        None => ev(&format!("e{}", i)),
                    })
                    .collect();
                resolve(&mut s, &mut batch).unwrap();
                prop_assert!(s.clock() >= last);
                last = s.clock();
            }
        }
    }
}
