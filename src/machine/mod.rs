//! Resumable state machines that wrap actors.
//!
//! Every wrapper variant (blocking or resumable, four-phase or fire-only,
//! cyclic or one-shot) is the same [`StateMachine`] parameterized by a
//! [`Policy`]. The machine proposes one event per phase and moves on only
//! after observing that event notified.
//!
//! ```text
//!  Act family                      Fire family
//!  ──────────                      ───────────
//!  PREFIRE_BEGIN ──prefire()──┐    START
//!  PREFIRE_END_FIRE_BEGIN     │      │
//!     │ fire() / body         │    BEGIN ──fire() / body──┐
//!  [FIRING]                   │   [PROCESS]               │
//!  FIRE_END_POSTFIRE_BEGIN    │    END ───────────────────┘
//!     │ postfire()            │      │
//!  POSTFIRE_END ──cyclic──────┘    FINAL
//!     │
//!  COMPLETE | HALTED
//! ```
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`state`] | [`ActState`], [`FireState`], [`MachineState`] |
//! | [`policy`] | [`Policy`], [`Family`], [`FireMode`] |
//! | [`wrapper`] | [`StateMachine`], [`Advance`] |

pub mod policy;
pub mod state;
pub mod wrapper;

pub use policy::{Family, FireMode, Policy};
pub use state::{phase_event_name, ActState, FireState, MachineState};
pub use wrapper::{Advance, StateMachine};
