//! Display timeline of activity runs.
//!
//! The [`Timeline`] is told about each successful start, completion and
//! removal by the session and keeps one entry per run. Entries are only
//! appended or closed, never rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::{Activity, ColorSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: String,
    pub activity_id: String,
    pub activity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorSet>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl TimelineEntry {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Whole seconds covered by the entry; open entries run until `now`.
    pub fn duration_secs(&self, now: DateTime<Utc>) -> i64 {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an entry for `activity`, closing any entry still open at `at`.
    pub fn begin(&mut self, activity: &Activity, at: DateTime<Utc>) {
        self.close_open(at);
        self.entries.push(TimelineEntry {
            id: Uuid::new_v4().to_string(),
            activity_id: activity.id.clone(),
            activity_name: activity.name.clone(),
            colors: Some(activity.colors.clone()),
            start_time: at,
            end_time: None,
        });
    }

    /// Closes the open entry, if any. Returns whether one was closed.
    pub fn close_open(&mut self, at: DateTime<Utc>) -> bool {
        match self.entries.last_mut() {
            Some(entry) if entry.is_open() => {
                entry.end_time = Some(at.max(entry.start_time));
                true
            }
            _ => false,
        }
    }

    pub fn open_entry(&self) -> Option<&TimelineEntry> {
        self.entries.last().filter(|e| e.is_open())
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
