use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::colors::ColorSet;
use super::state::ActivityState;

/// Lifecycle snapshot of one activity as held by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub state: ActivityState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
}

impl ActivityRecord {
    pub fn pending(id: String) -> Self {
        Self {
            id,
            state: ActivityState::Pending,
            started_at: None,
            completed_at: None,
            removed_at: None,
        }
    }

    pub fn was_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn was_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// The latest timestamp recorded so far.
    pub fn last_stamp(&self) -> Option<DateTime<Utc>> {
        [self.started_at, self.completed_at, self.removed_at]
            .into_iter()
            .flatten()
            .max()
    }

    /// Checks that timestamp presence matches the state, as required for a
    /// record restored from storage.
    pub(crate) fn check_consistency(&self) -> Result<(), String> {
        let id = &self.id;
        let expect = |ok: bool, what: &str| {
            if ok {
                Ok(())
            } else {
                Err(format!("activity {id} in {} state {what}", self.state))
            }
        };
        match self.state {
            ActivityState::Pending => expect(
                self.started_at.is_none() && self.completed_at.is_none() && self.removed_at.is_none(),
                "carries timestamps",
            ),
            ActivityState::Running => expect(
                self.started_at.is_some() && self.completed_at.is_none() && self.removed_at.is_none(),
                "must have only a start time",
            ),
            ActivityState::Completed => expect(
                self.started_at.is_some() && self.completed_at.is_some() && self.removed_at.is_none(),
                "must have start and completion times",
            ),
            ActivityState::Removed => expect(
                self.removed_at.is_some() && (self.completed_at.is_none() || self.started_at.is_some()),
                "must have a removal time",
            ),
        }?;
        if let (Some(start), Some(end)) = (self.started_at, self.completed_at)
            && end < start
        {
            return Err(format!("activity {id} completed before it started"));
        }
        Ok(())
    }
}

/// A user-facing activity: what the user typed plus display colors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub colors: ColorSet,
    pub created_at: DateTime<Utc>,
}

/// Derives a lowercase, dash-separated id from a display name.
///
/// Falls back to `"activity"` when the name has no alphanumeric characters.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "activity".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn pending_record_has_no_stamps() {
        let record = ActivityRecord::pending("a".into());
        assert_eq!(record.state, ActivityState::Pending);
        assert!(!record.was_started());
        assert_eq!(record.last_stamp(), None);
        assert!(record.check_consistency().is_ok());
    }

    #[test]
    fn serializes_with_camel_case_and_omits_missing_stamps() {
        let mut record = ActivityRecord::pending("a".into());
        record.state = ActivityState::Running;
        record.started_at = Some(at(0));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "RUNNING");
        assert!(json.get("startedAt").is_some());
        assert!(json.get("completedAt").is_none());
    }

    #[test]
    fn consistency_rejects_completed_before_started() {
        let record = ActivityRecord {
            id: "a".into(),
            state: ActivityState::Completed,
            started_at: Some(at(10)),
            completed_at: Some(at(5)),
            removed_at: None,
        };
        assert!(record.check_consistency().is_err());
    }

    #[test]
    fn consistency_rejects_running_without_start() {
        let mut record = ActivityRecord::pending("a".into());
        record.state = ActivityState::Running;
        let err = record.check_consistency().unwrap_err();
        assert!(err.contains("RUNNING"));
    }

    #[test]
    fn slugify_names() {
        assert_eq!(slugify("Deep work"), "deep-work");
        assert_eq!(slugify("  Email & Slack!! "), "email-slack");
        assert_eq!(slugify("***"), "activity");
        assert_eq!(slugify("Café 2"), "café-2");
    }
}
