//! Structured error types for the MetroII kernel.
//!
//! All fallible public APIs return `Result<T, KernelError>`. The variants
//! follow the kernel's error taxonomy: protocol violations abort the
//! offending component, configuration errors are fatal at load time and
//! never partially applied, and I/O errors are reported to the caller that
//! performed the I/O. A component asking to halt is not an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::actor::ActorId;

/// The top-level error type for the kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A component or resolver broke the propose/notify protocol.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Invalid mapping, time resolution, or kernel configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading or writing a mapping file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A time value does not fit in 64 bits after rescaling.
    #[error("time value {value} overflows when scaled by {factor}")]
    TimeOverflow { value: u64, factor: u64 },

    /// An actor ID was referenced but is not registered.
    #[error("actor {0} is not registered")]
    UnknownActor(ActorId),
}

// ── Protocol violations ───────────────────────────────────────────────

/// Breaches of the propose → {wait, notify} lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// A component pushed an event that was not in the `Proposed` state.
    #[error("event '{event}' was proposed with status {status} (components may not set their own status)")]
    SelfNotified { event: String, status: String },

    /// A notified event was moved back to `Proposed` or `Waiting`.
    #[error("event '{event}' is already notified and cannot go back to {requested}")]
    StatusRegression { event: String, requested: String },

    /// Two pending events in one batch share a name.
    #[error("event '{event}' is already proposed in this batch")]
    DuplicateProposal { event: String },

    /// A machine found one of its events that does not belong to its current state.
    #[error("actor '{actor}' received event '{event}' while in state {state}")]
    UnexpectedEvent {
        actor: String,
        event: String,
        state: String,
    },

    /// A resumable policy was used with a component that has no body.
    #[error("actor '{actor}' has no resumable body")]
    NoResumableBody { actor: String },

    /// A coroutine body suspended without yielding a batch.
    #[error("coroutine body suspended without proposing events")]
    BodyStalled,
}

// ── Configuration errors ──────────────────────────────────────────────

/// Load-time configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A mapping line does not contain exactly two event names.
    #[error("malformed mapping line {line}: '{content}'")]
    MalformedMapping { line: usize, content: String },

    /// An event id is zero or not below the solver capacity.
    #[error("event id {id} is out of range (valid ids are 1..{capacity})")]
    EventIdOutOfRange { id: u32, capacity: usize },

    /// The name table has no room for another event name.
    #[error("cannot intern '{name}': name table capacity {capacity} exhausted")]
    CapacityExceeded { name: String, capacity: usize },

    /// A rescaling factor between two resolutions is not an integer.
    #[error("cannot rescale time from resolution {from} to {to}: factor is not an integer")]
    FractionalTimeScale { from: f64, to: f64 },

    /// A time resolution is not a finite positive number.
    #[error("invalid time resolution {0}")]
    InvalidResolution(f64),

    /// Two actors were registered under the same name.
    #[error("an actor named '{0}' is already registered")]
    DuplicateActor(String),

    /// Invalid environment variable value.
    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn invalid_env_var(name: &str, message: &str) -> Self {
        ConfigError::InvalidEnvVar {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

/// Convenience alias for `Result<T, KernelError>`.
pub type KernelResult<T> = Result<T, KernelError>;
