//! Error types for the order-execution core.
//!
//! Errors fall into two groups. Invariant violations abort the task tree
//! that raised them (continuing would risk a lockstep desync). Everything
//! else is a recoverable lookup or loading failure.

use thiserror::Error;

use crate::object::ObjectId;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Referenced object does not exist.
    #[error("Object not found: {0}")]
    EntityNotFound(ObjectId),

    /// A task was run without a parameter it requires.
    #[error("Required task parameter not set: {0}")]
    MissingParameter(&'static str),

    /// A caller required immediate termination of a task that refused it.
    #[error("Force cancel failed for the current task of object {0}")]
    ForceCancelFailed(ObjectId),

    /// Unit type is not present in the rules.
    #[error("Unknown unit type: {0}")]
    UnknownUnitType(String),

    /// Building type is not present in the rules.
    #[error("Unknown building type: {0}")]
    UnknownBuildingType(String),

    /// Object was asked to fire without an armament.
    #[error("Object {0} has no armament")]
    MissingArmament(ObjectId),

    /// Rules or scenario data failed to parse.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// File could not be read or written.
    #[error("IO error on '{path}': {message}")]
    Io {
        /// Path involved.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid simulation state.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),

    /// Desync detected between two runs of the same inputs.
    #[error("Desync detected at tick {tick}: local hash {local_hash}, remote hash {remote_hash}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation hash.
        local_hash: u64,
        /// Remote simulation hash.
        remote_hash: u64,
    },
}

impl SimError {
    /// Whether the error is an invariant violation that must abort the task.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound(_)
                | Self::MissingParameter(_)
                | Self::ForceCancelFailed(_)
                | Self::InvalidState(_)
        )
    }
}
