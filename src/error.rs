use thiserror::Error;

use crate::activity::{ActivityState, Transition};

/// Failures of a single state-machine operation.
///
/// Every variant is returned before any mutation happens, so the machine is
/// left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    #[error("Activity with ID {id} already exists")]
    DuplicateActivity { id: String },

    #[error("Cannot {attempted} activity {id} from {from} state")]
    InvalidTransition {
        id: String,
        from: ActivityState,
        attempted: Transition,
    },

    #[error("Cannot start activity {id} while {running} is running")]
    ActivityAlreadyRunning { id: String, running: String },

    #[error("Activity with ID {id} not found")]
    UnknownActivity { id: String },

    #[error("Activity ID must not be empty")]
    EmptyId,

    #[error("Invalid activity snapshot: {reason}")]
    InvalidSnapshot { reason: String },
}

#[derive(Debug, Error)]
pub enum TimelyError {
    #[error(transparent)]
    Activity(#[from] ActivityError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No session found. Run `mr-timely setup <duration>` first.")]
    NoSession,

    #[error("Session already started; reset it before replacing its activities")]
    SessionInProgress,

    #[error("Saved session has format version {found}, expected {expected}")]
    IncompatibleSession { found: u32, expected: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
