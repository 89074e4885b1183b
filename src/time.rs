/// Logical time for the coordination kernel.
///
/// `VirtualTime` is the time scheduler's clock. `EventTime` is the optional
/// timestamp an event carries: an integer value paired with the resolution
/// (seconds per tick) it was expressed in. Comparing timestamps taken at
/// different resolutions goes through [`convert`], which only accepts exact
/// integer scale factors.

use crate::error::{ConfigError, KernelError, KernelResult};

/// Relative tolerance when deciding whether a scale factor is an integer.
const SCALE_EPSILON: f64 = 1e-9;

// ── VirtualTime ───────────────────────────────────────────────────────

/// A logical tick of the scheduler clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The zero-point of logical time.
    pub const ZERO: VirtualTime = VirtualTime(0);

    /// Create a new `VirtualTime` from a raw tick value.
    #[inline]
    pub fn new(ticks: u64) -> Self {
        VirtualTime(ticks)
    }

    /// Return the raw tick value.
    #[inline]
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// Advance time by `delta` ticks.
    /// Returns `None` on overflow.
    #[inline]
    pub fn advance(self, delta: u64) -> Option<VirtualTime> {
        self.0.checked_add(delta).map(VirtualTime)
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: VirtualTime) -> bool {
        self.0 < other.0
    }

    /// Returns the duration (in ticks) between two points in time.
    /// Returns `None` if `other` is after `self`.
    #[inline]
    pub fn duration_since(self, other: VirtualTime) -> Option<u64> {
        self.0.checked_sub(other.0)
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}

// ── Resolution ────────────────────────────────────────────────────────

/// Seconds represented by one tick.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Resolution(f64);

impl Resolution {
    /// One tick per second.
    pub const SECONDS: Resolution = Resolution(1.0);
    /// One tick per millisecond.
    pub const MILLIS: Resolution = Resolution(1e-3);
    /// One tick per microsecond.
    pub const MICROS: Resolution = Resolution(1e-6);
    /// One tick per nanosecond.
    pub const NANOS: Resolution = Resolution(1e-9);

    /// Validate and wrap a resolution in seconds per tick.
    pub fn new(seconds_per_tick: f64) -> KernelResult<Self> {
        if seconds_per_tick.is_finite() && seconds_per_tick > 0.0 {
            Ok(Resolution(seconds_per_tick))
        } else {
            Err(ConfigError::InvalidResolution(seconds_per_tick).into())
        }
    }

    /// Seconds per tick.
    #[inline]
    pub fn seconds(self) -> f64 {
        self.0
    }

    /// The integer factor that turns ticks of `self` into ticks of `to`.
    pub fn scale_to(self, to: Resolution) -> KernelResult<u64> {
        let factor = self.0 / to.0;
        let rounded = factor.round();
        if rounded < 1.0 || (factor - rounded).abs() > SCALE_EPSILON * rounded {
            return Err(ConfigError::FractionalTimeScale {
                from: self.0,
                to: to.0,
            }
            .into());
        }
        if rounded > u64::MAX as f64 {
            return Err(KernelError::TimeOverflow {
                value: 1,
                factor: u64::MAX,
            });
        }
        Ok(rounded as u64)
    }

    /// The finer of two resolutions.
    pub fn finer(self, other: Resolution) -> Resolution {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::NANOS
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Rescale `value` ticks from `from` to `to`: `value × (from / to)`.
///
/// The factor must be an exact integer. Converting to a coarser resolution
/// is rejected even when `value` happens to divide evenly.
pub fn convert(value: u64, from: Resolution, to: Resolution) -> KernelResult<u64> {
    let factor = from.scale_to(to)?;
    value
        .checked_mul(factor)
        .ok_or(KernelError::TimeOverflow { value, factor })
}

// ── EventTime ─────────────────────────────────────────────────────────

/// A timestamp attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventTime {
    value: u64,
    resolution: Resolution,
}

impl EventTime {
    /// A timestamp of `value` ticks at `resolution`.
    pub fn new(value: u64, resolution: Resolution) -> Self {
        EventTime { value, resolution }
    }

    /// The clock reading expressed at the given resolution.
    pub fn at(time: VirtualTime, resolution: Resolution) -> Self {
        EventTime::new(time.ticks(), resolution)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// This timestamp rescaled to `to`.
    pub fn in_resolution(&self, to: Resolution) -> KernelResult<EventTime> {
        Ok(EventTime::new(convert(self.value, self.resolution, to)?, to))
    }
}

impl std::fmt::Display for EventTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.value, self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, KernelError};

    #[test]
    fn test_ordering() {
        let t1 = VirtualTime::new(10);
        let t2 = VirtualTime::new(20);
        assert!(t1 < t2);
        assert!(t1.is_before(t2));
        assert!(!t2.is_before(t1));
    }

    #[test]
    fn test_advance_overflow() {
        let t = VirtualTime::new(u64::MAX);
        assert!(t.advance(1).is_none());
        assert_eq!(VirtualTime::new(100).advance(50), Some(VirtualTime::new(150)));
    }

    #[test]
    fn test_duration_since() {
        let t1 = VirtualTime::new(10);
        let t2 = VirtualTime::new(30);
        assert_eq!(t2.duration_since(t1), Some(20));
        assert_eq!(t1.duration_since(t2), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", VirtualTime::new(42)), "T=42");
    }

    #[test]
    fn test_convert_to_finer_resolution() {
        assert_eq!(convert(3, Resolution::MILLIS, Resolution::MICROS).unwrap(), 3_000);
        assert_eq!(convert(7, Resolution::SECONDS, Resolution::NANOS).unwrap(), 7_000_000_000);
        assert_eq!(convert(9, Resolution::NANOS, Resolution::NANOS).unwrap(), 9);
    }

    #[test]
    fn test_convert_to_coarser_resolution_is_rejected() {
        let err = convert(3_000, Resolution::MICROS, Resolution::MILLIS).unwrap_err();
        assert!(matches!(
            err,
            KernelError::Config(ConfigError::FractionalTimeScale { .. })
        ));
    }

    #[test]
    fn test_convert_non_integer_factor_is_rejected() {
        let quarter = Resolution::new(0.25).unwrap();
        let tenth = Resolution::new(0.1).unwrap();
        assert!(convert(1, quarter, tenth).is_err());
        assert_eq!(convert(1, Resolution::SECONDS, quarter).unwrap(), 4);
    }

    #[test]
    fn test_convert_overflow() {
        let err = convert(u64::MAX, Resolution::SECONDS, Resolution::MILLIS).unwrap_err();
        assert!(matches!(err, KernelError::TimeOverflow { .. }));
    }

    #[test]
    fn test_invalid_resolution() {
        assert!(Resolution::new(0.0).is_err());
        assert!(Resolution::new(-1.0).is_err());
        assert!(Resolution::new(f64::NAN).is_err());
    }

    #[test]
    fn test_event_time_in_resolution() {
        let t = EventTime::new(5, Resolution::MILLIS);
        let fine = t.in_resolution(Resolution::MICROS).unwrap();
        assert_eq!(fine.value(), 5_000);
        assert_eq!(fine.resolution(), Resolution::MICROS);
        assert_eq!(Resolution::MILLIS.finer(Resolution::MICROS), Resolution::MICROS);
    }
}
