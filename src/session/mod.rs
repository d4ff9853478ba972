//! A single time-boxed tracking session.
//!
//! [`Session`] is the one writer for a set of activities: it owns the
//! activity catalog, the lifecycle [`ActivityStateMachine`] and the
//! [`Timeline`]. Each operation runs the state-machine transition first
//! and only notifies the timeline once the transition succeeded.

mod store;

pub use store::{JsonFileStore, PersistedSession, SessionStore};

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::activity::{
    Activity, ActivityRecord, ActivityState, ActivityStateMachine, Transition, color_for_index,
    slugify,
};
use crate::error::{ActivityError, TimelyError};
use crate::planner::PlannedActivity;
use crate::summary::{self, SessionOutcome, SessionSummary, SkippedActivity};
use crate::timeline::Timeline;

/// A session is deserialized through [`SessionParts`], which rejects a
/// catalog that disagrees with the machine's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SessionParts")]
pub struct Session {
    pub id: String,
    pub total_duration_secs: i64,
    pub created_at: DateTime<Utc>,
    /// Set when the first activity starts.
    #[serde(default)]
    pub timer_started_at: Option<DateTime<Utc>>,
    activities: Vec<Activity>,
    machine: ActivityStateMachine,
    timeline: Timeline,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionParts {
    id: String,
    total_duration_secs: i64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    timer_started_at: Option<DateTime<Utc>>,
    activities: Vec<Activity>,
    machine: ActivityStateMachine,
    timeline: Timeline,
}

impl TryFrom<SessionParts> for Session {
    type Error = ActivityError;

    fn try_from(parts: SessionParts) -> Result<Self, Self::Error> {
        let invalid = |reason: String| ActivityError::InvalidSnapshot { reason };

        let mut seen = HashSet::with_capacity(parts.activities.len());
        for activity in &parts.activities {
            if !seen.insert(activity.id.as_str()) {
                return Err(invalid(format!("activity {} is listed twice", activity.id)));
            }
            if parts.machine.activity_state(&activity.id).is_none() {
                return Err(invalid(format!(
                    "activity {} has no lifecycle record",
                    activity.id
                )));
            }
        }
        if let Some(orphan) = parts.machine.activities().find(|r| !seen.contains(r.id.as_str())) {
            return Err(invalid(format!(
                "lifecycle record {} has no catalog entry",
                orphan.id
            )));
        }

        Ok(Self {
            id: parts.id,
            total_duration_secs: parts.total_duration_secs,
            created_at: parts.created_at,
            timer_started_at: parts.timer_started_at,
            activities: parts.activities,
            machine: parts.machine,
            timeline: parts.timeline,
        })
    }
}

impl Session {
    pub fn new(total_duration: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("session-{}", Uuid::new_v4()),
            total_duration_secs: total_duration.num_seconds().max(0),
            created_at: now,
            timer_started_at: None,
            activities: Vec::new(),
            machine: ActivityStateMachine::new(),
            timeline: Timeline::new(),
        }
    }

    /// Adds an activity named `name`, deriving a unique id from the name.
    pub fn add_activity(
        &mut self,
        name: &str,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&Activity, TimelyError> {
        let id = self.unique_id(&slugify(name));
        let activity = Activity {
            id,
            name: name.trim().to_string(),
            description,
            colors: color_for_index(self.activities.len()),
            created_at: now,
        };
        self.insert_activity(activity)
    }

    /// Adds a caller-built activity. Fails if its id is already known.
    pub fn insert_activity(&mut self, activity: Activity) -> Result<&Activity, TimelyError> {
        self.machine.add_or_fail(activity.id.clone())?;
        info!(activity = %activity.id, name = %activity.name, "activity added");
        self.activities.push(activity);
        Ok(&self.activities[self.activities.len() - 1])
    }

    fn unique_id(&self, base: &str) -> String {
        if self.machine.activity_state(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| self.machine.activity_state(candidate).is_none())
            .unwrap_or_else(|| format!("{base}-{}", Uuid::new_v4()))
    }

    pub fn start(&mut self, id: &str, at: DateTime<Utc>) -> Result<(), TimelyError> {
        self.machine.start_activity_at(id, at)?;
        self.timer_started_at.get_or_insert(at);
        if let Some(activity) = self.activities.iter().find(|a| a.id == id) {
            self.timeline.begin(activity, at);
        }
        info!(activity = %id, "activity started");
        Ok(())
    }

    pub fn complete(&mut self, id: &str, at: DateTime<Utc>) -> Result<(), TimelyError> {
        self.machine.complete_activity_at(id, at)?;
        self.timeline.close_open(at);
        info!(activity = %id, "activity completed");
        Ok(())
    }

    /// Completes whatever is running. Returns the id that was completed.
    pub fn complete_current(&mut self, at: DateTime<Utc>) -> Result<Option<String>, TimelyError> {
        let Some(current) = self.machine.current_activity().map(|r| r.id.clone()) else {
            return Ok(None);
        };
        self.complete(&current, at)?;
        Ok(Some(current))
    }

    pub fn remove(&mut self, id: &str, at: DateTime<Utc>) -> Result<(), TimelyError> {
        let was_running = self.machine.current_activity().is_some_and(|r| r.id == id);
        self.machine.remove_activity_at(id, at)?;
        if was_running {
            self.timeline.close_open(at);
        }
        info!(activity = %id, was_running, "activity removed");
        Ok(())
    }

    /// Moves tracking to `id`, completing the running activity first.
    ///
    /// The target is validated before anything changes, so a failed switch
    /// leaves the running activity running.
    pub fn switch_to(&mut self, id: &str, at: DateTime<Utc>) -> Result<(), TimelyError> {
        let record = self
            .machine
            .activity_state(id)
            .ok_or_else(|| ActivityError::UnknownActivity { id: id.to_string() })?;
        if record.state.apply(Transition::Start).is_none() {
            return Err(ActivityError::InvalidTransition {
                id: id.to_string(),
                from: record.state,
                attempted: Transition::Start,
            }
            .into());
        }

        if let Some(previous) = self.complete_current(at)? {
            debug!(from = %previous, to = %id, "switching activity");
        }
        self.start(id, at)
    }

    /// Replaces the catalog with a generated plan.
    ///
    /// Only allowed before any activity has started. A plan whose
    /// durations add up to more than zero also sets the session length.
    pub fn apply_plan(
        &mut self,
        plan: &[PlannedActivity],
        now: DateTime<Utc>,
    ) -> Result<(), TimelyError> {
        if self.machine.has_started_any() {
            return Err(TimelyError::SessionInProgress);
        }
        let planned_minutes: u64 = plan
            .iter()
            .filter_map(|p| p.duration_minutes)
            .map(u64::from)
            .fold(0, u64::saturating_add);

        self.activities.clear();
        self.machine.reset();
        self.timeline.clear();

        for planned in plan {
            self.add_activity(&planned.name, planned.description.clone(), now)?;
        }
        if planned_minutes > 0 {
            self.total_duration_secs = i64::try_from(planned_minutes.saturating_mul(60))
                .unwrap_or(i64::MAX);
        }
        info!(activities = plan.len(), planned_minutes, "plan applied");
        Ok(())
    }

    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// Catalog entries paired with their lifecycle record, in insertion order.
    pub fn activities(&self) -> impl Iterator<Item = (&Activity, &ActivityRecord)> {
        self.activities
            .iter()
            .filter_map(|a| self.machine.activity_state(&a.id).map(|r| (a, r)))
    }

    pub fn current_activity(&self) -> Option<&Activity> {
        self.machine
            .current_activity()
            .and_then(|r| self.activity(&r.id))
    }

    pub fn machine(&self) -> &ActivityStateMachine {
        &self.machine
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn is_completed(&self) -> bool {
        self.machine.is_completed()
    }

    /// Seconds since the first activity started; zero before that.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        self.timer_started_at
            .map(|start| (now - start).num_seconds().max(0))
            .unwrap_or(0)
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.total_duration_secs - self.elapsed_secs(now)).max(0)
    }

    pub fn is_time_up(&self, now: DateTime<Utc>) -> bool {
        self.timer_started_at.is_some() && self.elapsed_secs(now) >= self.total_duration_secs
    }

    pub fn outcome(&self, now: DateTime<Utc>) -> SessionOutcome {
        if self.is_completed() {
            SessionOutcome::Completed
        } else if self.is_time_up(now) {
            SessionOutcome::TimeUp
        } else {
            SessionOutcome::InProgress
        }
    }

    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        let entries = self.timeline.entries();
        let (active_secs, idle_secs) = summary::active_and_idle(entries, now);
        let skipped = self
            .activities()
            .filter(|(_, record)| record.state == ActivityState::Pending)
            .map(|(activity, _)| SkippedActivity {
                id: activity.id.clone(),
                name: activity.name.clone(),
            })
            .collect();

        SessionSummary {
            planned_secs: self.total_duration_secs,
            time_spent_secs: self.elapsed_secs(now),
            overtime_secs: summary::overtime(entries, self.total_duration_secs, now),
            active_secs,
            idle_secs,
            activities: summary::activity_times(entries, now),
            skipped,
            outcome: self.outcome(now),
            generated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn session_with(names: &[&str]) -> Session {
        let mut session = Session::new(Duration::minutes(10), at(0));
        for name in names {
            session.add_activity(name, None, at(0)).unwrap();
        }
        session
    }

    #[test]
    fn ids_are_derived_from_names_and_deduplicated() {
        let mut session = session_with(&["Deep work", "Deep work", "Email"]);
        let ids: Vec<_> = session.activities().map(|(a, _)| a.id.clone()).collect();
        assert_eq!(ids, ["deep-work", "deep-work-2", "email"]);

        let added = session.add_activity("Deep Work", None, at(0)).unwrap();
        assert_eq!(added.id, "deep-work-3");
    }

    #[test]
    fn colors_follow_catalog_position() {
        let session = session_with(&["a", "b"]);
        assert_eq!(session.activity("a").unwrap().colors, color_for_index(0));
        assert_eq!(session.activity("b").unwrap().colors, color_for_index(1));
    }

    #[test]
    fn insert_activity_rejects_duplicate_id() {
        let mut session = session_with(&["a"]);
        let duplicate = session.activity("a").unwrap().clone();
        let err = session.insert_activity(duplicate).unwrap_err();
        assert!(matches!(
            err,
            TimelyError::Activity(ActivityError::DuplicateActivity { .. })
        ));
        assert_eq!(session.activities().count(), 1);
    }

    #[test]
    fn start_and_complete_drive_timeline() {
        let mut session = session_with(&["a"]);
        session.start("a", at(5)).unwrap();
        assert_eq!(session.timer_started_at, Some(at(5)));
        assert_eq!(session.current_activity().unwrap().id, "a");
        assert!(session.timeline().open_entry().is_some());

        session.complete("a", at(65)).unwrap();
        assert!(session.current_activity().is_none());
        let entry = &session.timeline().entries()[0];
        assert_eq!(entry.end_time, Some(at(65)));
        assert!(session.is_completed());
    }

    #[test]
    fn failed_start_leaves_timeline_untouched() {
        let mut session = session_with(&["a", "b"]);
        session.start("a", at(0)).unwrap();
        assert!(session.start("b", at(1)).is_err());
        assert_eq!(session.timeline().entries().len(), 1);
        assert_eq!(session.current_activity().unwrap().id, "a");
    }

    #[test]
    fn switch_completes_running_activity() {
        let mut session = session_with(&["a", "b"]);
        session.switch_to("a", at(0)).unwrap();
        session.switch_to("b", at(30)).unwrap();

        let state = |id| session.machine().activity_state(id).unwrap().state;
        assert_eq!(state("a"), ActivityState::Completed);
        assert_eq!(state("b"), ActivityState::Running);
        let entries = session.timeline().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].end_time, Some(at(30)));
    }

    #[test]
    fn failed_switch_keeps_current_running() {
        let mut session = session_with(&["a", "b"]);
        session.start("a", at(0)).unwrap();
        session.remove("b", at(1)).unwrap();

        assert!(session.switch_to("b", at(2)).is_err());
        assert!(session.switch_to("missing", at(2)).is_err());
        assert_eq!(session.current_activity().unwrap().id, "a");
        assert!(session.timeline().open_entry().is_some());
    }

    #[test]
    fn removing_running_activity_closes_its_entry() {
        let mut session = session_with(&["a"]);
        session.start("a", at(0)).unwrap();
        session.remove("a", at(20)).unwrap();
        assert!(session.timeline().open_entry().is_none());
        assert!(session.current_activity().is_none());
    }

    #[test]
    fn complete_current_without_runner_is_none() {
        let mut session = session_with(&["a"]);
        assert_eq!(session.complete_current(at(0)).unwrap(), None);
        session.start("a", at(0)).unwrap();
        assert_eq!(session.complete_current(at(1)).unwrap(), Some("a".into()));
    }

    #[test]
    fn time_up_after_duration() {
        let mut session = session_with(&["a", "b"]);
        assert!(!session.is_time_up(at(10_000)));
        session.start("a", at(0)).unwrap();
        assert_eq!(session.remaining_secs(at(60)), 540);
        assert!(!session.is_time_up(at(599)));
        assert!(session.is_time_up(at(600)));
        assert_eq!(session.outcome(at(600)), SessionOutcome::TimeUp);
    }

    #[test]
    fn apply_plan_replaces_catalog_and_duration() {
        let mut session = session_with(&["old"]);
        let plan = vec![
            PlannedActivity {
                name: "Study React".into(),
                description: Some("hooks".into()),
                duration_minutes: Some(30),
            },
            PlannedActivity {
                name: "Break".into(),
                description: None,
                duration_minutes: Some(10),
            },
        ];
        session.apply_plan(&plan, at(0)).unwrap();

        let ids: Vec<_> = session.activities().map(|(a, _)| a.id.clone()).collect();
        assert_eq!(ids, ["study-react", "break"]);
        assert_eq!(session.total_duration_secs, 40 * 60);
        assert!(session.machine().activity_state("old").is_none());
    }

    #[test]
    fn apply_plan_sums_large_durations_without_overflow() {
        let mut session = session_with(&[]);
        let huge = |name: &str| PlannedActivity {
            name: name.into(),
            description: None,
            duration_minutes: Some(3_000_000_000),
        };
        session.apply_plan(&[huge("a"), huge("b")], at(0)).unwrap();

        assert_eq!(session.total_duration_secs, 6_000_000_000 * 60);
        assert_eq!(session.machine().len(), 2);
        assert_eq!(session.remaining_secs(at(0)), 6_000_000_000 * 60);
    }

    #[test]
    fn apply_plan_rejected_after_start() {
        let mut session = session_with(&["a"]);
        session.start("a", at(0)).unwrap();
        let err = session.apply_plan(&[], at(1)).unwrap_err();
        assert!(matches!(err, TimelyError::SessionInProgress));
        assert!(session.activity("a").is_some());
    }

    #[test]
    fn summary_reports_skipped_and_times() {
        let mut session = session_with(&["a", "b", "c"]);
        session.start("a", at(0)).unwrap();
        session.complete("a", at(300)).unwrap();
        session.start("b", at(360)).unwrap();
        session.complete("b", at(660)).unwrap();

        let summary = session.summary(at(700));
        assert_eq!(summary.planned_secs, 600);
        assert_eq!(summary.time_spent_secs, 700);
        assert_eq!(summary.active_secs, 600);
        assert_eq!(summary.idle_secs, 60);
        assert_eq!(summary.overtime_secs, 60);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].id, "c");
        assert_eq!(summary.outcome, SessionOutcome::TimeUp);

        session.remove("c", at(700)).unwrap();
        assert_eq!(session.summary(at(700)).outcome, SessionOutcome::Completed);
    }

    #[test]
    fn session_serde_restores_state() {
        let mut session = session_with(&["a", "b"]);
        session.start("a", at(0)).unwrap();

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
        assert_eq!(restored.current_activity().unwrap().id, "a");
    }

    #[test]
    fn session_serde_rejects_catalog_out_of_sync() {
        let session = session_with(&["a", "b"]);
        let value = serde_json::to_value(&session).unwrap();

        let mut missing_entry = value.clone();
        missing_entry["activities"].as_array_mut().unwrap().remove(1);
        let err = serde_json::from_value::<Session>(missing_entry).unwrap_err();
        assert!(err.to_string().contains("lifecycle record b has no catalog entry"));

        let mut missing_record = value.clone();
        missing_record["machine"]["activities"].as_array_mut().unwrap().remove(0);
        let err = serde_json::from_value::<Session>(missing_record).unwrap_err();
        assert!(err.to_string().contains("activity a has no lifecycle record"));

        let mut duplicated = value;
        let first = duplicated["activities"][0].clone();
        duplicated["activities"].as_array_mut().unwrap().push(first);
        let err = serde_json::from_value::<Session>(duplicated).unwrap_err();
        assert!(err.to_string().contains("activity a is listed twice"));
    }
}
