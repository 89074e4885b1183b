//! Actor ID — a dense, copyable component identifier.

/// Identifies a registered component.
///
/// IDs are handed out in registration order, so iterating machines by ID
/// is the deterministic proposal order of a round.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ActorId(u64);

impl ActorId {
    /// Create an actor ID from a raw integer.
    #[inline]
    pub fn new(id: u64) -> Self {
        ActorId(id)
    }

    /// Return the underlying integer.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "A{}", self.0)
    }
}
