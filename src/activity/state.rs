use std::fmt;

use serde::{Deserialize, Serialize};

/// The four lifecycle states of an activity.
///
/// Each activity flows through: PENDING → RUNNING → COMPLETED, and may be
/// dropped into REMOVED from any state except REMOVED itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityState {
    Pending,
    Running,
    Completed,
    Removed,
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityState::Pending => write!(f, "PENDING"),
            ActivityState::Running => write!(f, "RUNNING"),
            ActivityState::Completed => write!(f, "COMPLETED"),
            ActivityState::Removed => write!(f, "REMOVED"),
        }
    }
}

/// A transition a caller can request on an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Start,
    Complete,
    Remove,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Start => write!(f, "start"),
            Transition::Complete => write!(f, "complete"),
            Transition::Remove => write!(f, "remove"),
        }
    }
}

impl ActivityState {
    /// The state reached by applying `transition`, or `None` when the
    /// transition is not legal from `self`.
    ///
    /// COMPLETED → REMOVED is accepted: a finished activity can still be
    /// dropped from the list without losing its completion stamp.
    pub fn apply(self, transition: Transition) -> Option<ActivityState> {
        match (self, transition) {
            (ActivityState::Pending, Transition::Start) => Some(ActivityState::Running),
            (ActivityState::Running, Transition::Complete) => Some(ActivityState::Completed),
            (
                ActivityState::Pending | ActivityState::Running | ActivityState::Completed,
                Transition::Remove,
            ) => Some(ActivityState::Removed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ActivityState::Completed | ActivityState::Removed)
    }
}
