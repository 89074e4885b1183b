//! Built-in actors — CounterActor, PeriodicActor and YieldingActor.
//!
//! Small reference components for tests, the demo binary and examples in
//! the docs.

pub mod counter;
pub mod periodic;
pub mod yielding;

pub use counter::CounterActor;
pub use periodic::PeriodicActor;
pub use yielding::{BodyProgress, YieldingActor};
