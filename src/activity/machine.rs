use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::completion::{CompletionInput, is_session_complete};
use super::record::ActivityRecord;
use super::state::{ActivityState, Transition};
use crate::error::ActivityError;

/// Serialized form of an [`ActivityStateMachine`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSnapshot {
    pub activities: Vec<ActivityRecord>,
    #[serde(default)]
    pub current_activity: Option<String>,
}

/// Owns the lifecycle state of every activity in a session and tracks the
/// single running one.
///
/// Records are kept in insertion order and are never deleted, except by
/// [`reset`](Self::reset). Every mutating call either succeeds completely or
/// returns an error without touching any record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MachineSnapshot", into = "MachineSnapshot")]
pub struct ActivityStateMachine {
    records: Vec<ActivityRecord>,
    index: HashMap<String, usize>,
    current: Option<String>,
}

impl ActivityStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a PENDING activity, failing if the id is already known.
    pub fn add_or_fail(&mut self, id: impl Into<String>) -> Result<(), ActivityError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ActivityError::EmptyId);
        }
        if self.index.contains_key(&id) {
            return Err(ActivityError::DuplicateActivity { id });
        }
        self.insert(id);
        Ok(())
    }

    /// Adds a PENDING activity unless the id is already known.
    ///
    /// Returns `false`, leaving the existing record untouched, when the id
    /// exists.
    pub fn add_if_absent(&mut self, id: impl Into<String>) -> Result<bool, ActivityError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ActivityError::EmptyId);
        }
        if self.index.contains_key(&id) {
            return Ok(false);
        }
        self.insert(id);
        Ok(true)
    }

    fn insert(&mut self, id: String) {
        debug!(activity = %id, "adding activity");
        self.index.insert(id.clone(), self.records.len());
        self.records.push(ActivityRecord::pending(id));
    }

    pub fn start_activity(&mut self, id: &str) -> Result<(), ActivityError> {
        self.start_activity_at(id, Utc::now())
    }

    /// PENDING → RUNNING. Rejected while another activity is running.
    pub fn start_activity_at(&mut self, id: &str, at: DateTime<Utc>) -> Result<(), ActivityError> {
        let pos = self.check(id, Transition::Start)?;
        if let Some(running) = &self.current {
            return Err(ActivityError::ActivityAlreadyRunning {
                id: id.to_string(),
                running: running.clone(),
            });
        }

        let record = &mut self.records[pos];
        record.state = ActivityState::Running;
        record.started_at = Some(at);
        self.current = Some(record.id.clone());
        debug!(activity = %id, "activity started");
        Ok(())
    }

    pub fn complete_activity(&mut self, id: &str) -> Result<(), ActivityError> {
        self.complete_activity_at(id, Utc::now())
    }

    /// RUNNING → COMPLETED.
    pub fn complete_activity_at(
        &mut self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ActivityError> {
        let pos = self.check(id, Transition::Complete)?;

        let record = &mut self.records[pos];
        record.completed_at = Some(not_before(at, record.last_stamp()));
        record.state = ActivityState::Completed;
        self.clear_current(id);
        debug!(activity = %id, "activity completed");
        Ok(())
    }

    pub fn remove_activity(&mut self, id: &str) -> Result<(), ActivityError> {
        self.remove_activity_at(id, Utc::now())
    }

    /// PENDING, RUNNING or COMPLETED → REMOVED.
    ///
    /// A completed activity keeps its `completed_at` stamp after removal.
    pub fn remove_activity_at(&mut self, id: &str, at: DateTime<Utc>) -> Result<(), ActivityError> {
        let pos = self.check(id, Transition::Remove)?;

        let record = &mut self.records[pos];
        record.removed_at = Some(not_before(at, record.last_stamp()));
        record.state = ActivityState::Removed;
        self.clear_current(id);
        debug!(activity = %id, "activity removed");
        Ok(())
    }

    /// Validates `transition` on `id` and returns the record position.
    fn check(&self, id: &str, transition: Transition) -> Result<usize, ActivityError> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| ActivityError::UnknownActivity { id: id.to_string() })?;
        let from = self.records[pos].state;
        match from.apply(transition) {
            Some(_) => Ok(pos),
            None => Err(ActivityError::InvalidTransition {
                id: id.to_string(),
                from,
                attempted: transition,
            }),
        }
    }

    fn clear_current(&mut self, id: &str) {
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
    }

    pub fn activity_state(&self, id: &str) -> Option<&ActivityRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    pub fn current_activity(&self) -> Option<&ActivityRecord> {
        self.current.as_deref().and_then(|id| self.activity_state(id))
    }

    /// All records in insertion order.
    pub fn activities(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.records.iter()
    }

    pub fn activities_in_state(
        &self,
        state: ActivityState,
    ) -> impl Iterator<Item = &ActivityRecord> {
        self.records.iter().filter(move |r| r.state == state)
    }

    pub fn has_started_any(&self) -> bool {
        self.records.iter().any(ActivityRecord::was_started)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.index.clear();
        self.current = None;
    }

    pub fn completion_input(&self) -> CompletionInput {
        let ids = |pred: fn(&ActivityRecord) -> bool| {
            self.records
                .iter()
                .filter(move |r| pred(*r))
                .map(|r| r.id.clone())
        };
        CompletionInput {
            running: self.current.is_some(),
            all_ids: ids(|_| true).collect(),
            started_ids: ids(ActivityRecord::was_started).collect::<BTreeSet<_>>(),
            completed_ids: ids(ActivityRecord::was_completed).collect(),
            removed_ids: ids(|r| r.state == ActivityState::Removed).collect(),
        }
    }

    pub fn is_completed(&self) -> bool {
        is_session_complete(&self.completion_input())
    }
}

/// Clamps `at` so a record's timestamps never go backwards.
fn not_before(at: DateTime<Utc>, floor: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match floor {
        Some(floor) if floor > at => floor,
        _ => at,
    }
}

impl From<ActivityStateMachine> for MachineSnapshot {
    fn from(machine: ActivityStateMachine) -> Self {
        Self {
            activities: machine.records,
            current_activity: machine.current,
        }
    }
}

impl TryFrom<MachineSnapshot> for ActivityStateMachine {
    type Error = ActivityError;

    fn try_from(snapshot: MachineSnapshot) -> Result<Self, Self::Error> {
        let invalid = |reason: String| ActivityError::InvalidSnapshot { reason };

        let mut index = HashMap::with_capacity(snapshot.activities.len());
        let mut running = None;
        for (pos, record) in snapshot.activities.iter().enumerate() {
            if record.id.is_empty() {
                return Err(invalid("empty activity id".into()));
            }
            if index.insert(record.id.clone(), pos).is_some() {
                return Err(invalid(format!("duplicate activity id {}", record.id)));
            }
            record.check_consistency().map_err(invalid)?;
            if record.state == ActivityState::Running {
                if let Some(other) = running.replace(record.id.as_str()) {
                    return Err(invalid(format!(
                        "both {other} and {} are running",
                        record.id
                    )));
                }
            }
        }
        if running != snapshot.current_activity.as_deref() {
            return Err(invalid(format!(
                "current activity {:?} does not match running activity {:?}",
                snapshot.current_activity, running
            )));
        }

        Ok(Self {
            records: snapshot.activities,
            index,
            current: snapshot.current_activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn machine_with(ids: &[&str]) -> ActivityStateMachine {
        let mut m = ActivityStateMachine::new();
        for id in ids {
            m.add_or_fail(*id).unwrap();
        }
        m
    }

    fn running_count(m: &ActivityStateMachine) -> usize {
        m.activities_in_state(ActivityState::Running).count()
    }

    #[test]
    fn start_then_complete_scenario() {
        let mut m = machine_with(&["a"]);
        m.start_activity("a").unwrap();
        assert_eq!(m.current_activity().unwrap().id, "a");

        m.complete_activity("a").unwrap();
        assert!(m.current_activity().is_none());
        assert_eq!(m.activity_state("a").unwrap().state, ActivityState::Completed);
    }

    #[test]
    fn add_or_fail_rejects_duplicate() {
        let mut m = machine_with(&["a"]);
        assert_eq!(
            m.add_or_fail("a"),
            Err(ActivityError::DuplicateActivity { id: "a".into() })
        );
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn add_if_absent_on_existing_is_a_no_op() {
        let mut m = machine_with(&["a", "b"]);
        m.start_activity_at("a", at(0)).unwrap();
        let before = m.clone();

        assert_eq!(m.add_if_absent("a"), Ok(false));
        assert_eq!(m, before);
        assert_eq!(
            serde_json::to_string(&m).unwrap(),
            serde_json::to_string(&before).unwrap()
        );

        assert_eq!(m.add_if_absent("c"), Ok(true));
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn empty_id_is_rejected() {
        let mut m = ActivityStateMachine::new();
        assert_eq!(m.add_or_fail(""), Err(ActivityError::EmptyId));
        assert_eq!(m.add_if_absent(""), Err(ActivityError::EmptyId));
        assert!(m.is_empty());
    }

    #[test]
    fn only_one_activity_runs_at_a_time() {
        let mut m = machine_with(&["a", "b"]);
        m.start_activity_at("a", at(0)).unwrap();

        let err = m.start_activity_at("b", at(1)).unwrap_err();
        assert_eq!(
            err,
            ActivityError::ActivityAlreadyRunning {
                id: "b".into(),
                running: "a".into()
            }
        );
        assert_eq!(running_count(&m), 1);
        assert_eq!(m.activity_state("b").unwrap().state, ActivityState::Pending);

        m.complete_activity_at("a", at(5)).unwrap();
        m.start_activity_at("b", at(6)).unwrap();
        assert_eq!(running_count(&m), 1);
        assert_eq!(m.current_activity().unwrap().id, "b");
    }

    #[test]
    fn single_runner_holds_over_a_mixed_sequence() {
        let mut m = machine_with(&["a", "b", "c"]);
        type Step = fn(&mut ActivityStateMachine) -> Result<(), ActivityError>;
        let steps: [Step; 8] = [
            |m| m.start_activity_at("a", at(0)),
            |m| m.start_activity_at("b", at(1)),
            |m| m.remove_activity_at("a", at(2)),
            |m| m.start_activity_at("b", at(3)),
            |m| m.start_activity_at("c", at(4)),
            |m| m.complete_activity_at("b", at(5)),
            |m| m.start_activity_at("c", at(6)),
            |m| m.start_activity_at("a", at(7)),
        ];
        for step in steps {
            let _ = step(&mut m);
            assert!(running_count(&m) <= 1);
            assert_eq!(
                m.current_activity().map(|r| r.id.clone()),
                m.activities_in_state(ActivityState::Running)
                    .next()
                    .map(|r| r.id.clone())
            );
        }
        assert_eq!(m.current_activity().unwrap().id, "c");
    }

    #[test]
    fn terminal_states_reject_start_and_complete_unchanged() {
        let mut m = machine_with(&["done", "gone"]);
        m.start_activity_at("done", at(0)).unwrap();
        m.complete_activity_at("done", at(10)).unwrap();
        m.remove_activity_at("gone", at(11)).unwrap();
        let before = m.clone();

        for id in ["done", "gone"] {
            let err = m.start_activity_at(id, at(20)).unwrap_err();
            assert!(matches!(
                err,
                ActivityError::InvalidTransition {
                    attempted: Transition::Start,
                    ..
                }
            ));
            let err = m.complete_activity_at(id, at(21)).unwrap_err();
            assert!(matches!(
                err,
                ActivityError::InvalidTransition {
                    attempted: Transition::Complete,
                    ..
                }
            ));
        }
        assert_eq!(m, before);
    }

    #[test]
    fn complete_requires_running() {
        let mut m = machine_with(&["a"]);
        let err = m.complete_activity("a").unwrap_err();
        assert_eq!(
            err,
            ActivityError::InvalidTransition {
                id: "a".into(),
                from: ActivityState::Pending,
                attempted: Transition::Complete,
            }
        );
    }

    #[test]
    fn unknown_id_errors_on_write_and_is_absent_on_read() {
        let mut m = ActivityStateMachine::new();
        assert!(m.activity_state("nope").is_none());
        assert_eq!(
            m.start_activity("nope"),
            Err(ActivityError::UnknownActivity { id: "nope".into() })
        );
        assert!(m.remove_activity("nope").is_err());
    }

    #[test]
    fn removing_running_activity_clears_current() {
        let mut m = machine_with(&["a"]);
        m.start_activity_at("a", at(0)).unwrap();
        m.remove_activity_at("a", at(3)).unwrap();

        let record = m.activity_state("a").unwrap();
        assert_eq!(record.state, ActivityState::Removed);
        assert_eq!(record.started_at, Some(at(0)));
        assert_eq!(record.removed_at, Some(at(3)));
        assert!(m.current_activity().is_none());
    }

    #[test]
    fn removing_completed_keeps_completion_stamp() {
        let mut m = machine_with(&["a"]);
        m.start_activity_at("a", at(0)).unwrap();
        m.complete_activity_at("a", at(5)).unwrap();
        m.remove_activity_at("a", at(6)).unwrap();

        let record = m.activity_state("a").unwrap();
        assert_eq!(record.state, ActivityState::Removed);
        assert_eq!(record.completed_at, Some(at(5)));
        assert!(m.remove_activity_at("a", at(7)).is_err());
    }

    #[test]
    fn completion_never_precedes_start() {
        let mut m = machine_with(&["a"]);
        m.start_activity_at("a", at(100)).unwrap();
        m.complete_activity_at("a", at(50)).unwrap();

        let record = m.activity_state("a").unwrap();
        assert!(record.completed_at.unwrap() >= record.started_at.unwrap());
    }

    #[test]
    fn empty_machine_is_not_completed() {
        assert!(!ActivityStateMachine::new().is_completed());
    }

    #[test]
    fn completion_tracks_machine_state() {
        let mut m = machine_with(&["1", "2"]);
        m.start_activity_at("1", at(0)).unwrap();
        assert!(!m.is_completed());
        m.complete_activity_at("1", at(1)).unwrap();
        assert!(!m.is_completed());
        m.start_activity_at("2", at(2)).unwrap();
        m.complete_activity_at("2", at(3)).unwrap();
        assert!(m.is_completed());
    }

    #[test]
    fn completion_with_the_rest_removed() {
        let mut m = machine_with(&["1", "2", "3"]);
        m.start_activity_at("1", at(0)).unwrap();
        m.complete_activity_at("1", at(1)).unwrap();
        m.remove_activity_at("2", at(2)).unwrap();
        assert!(!m.is_completed());
        m.remove_activity_at("3", at(3)).unwrap();
        assert!(m.is_completed());
    }

    #[test]
    fn everything_removed_unstarted_is_not_completed() {
        let mut m = machine_with(&["1", "2"]);
        m.remove_activity("1").unwrap();
        m.remove_activity("2").unwrap();
        assert!(!m.is_completed());
        assert!(!m.has_started_any());
    }

    #[test]
    fn reset_forgets_everything() {
        let mut m = machine_with(&["a"]);
        m.start_activity("a").unwrap();
        m.reset();
        assert!(m.is_empty());
        assert!(m.current_activity().is_none());
        m.add_or_fail("a").unwrap();
    }

    #[test]
    fn snapshot_restores_equal_machine() {
        let mut m = machine_with(&["a", "b", "c"]);
        m.start_activity_at("a", at(0)).unwrap();
        m.complete_activity_at("a", at(1)).unwrap();
        m.start_activity_at("b", at(2)).unwrap();

        let json = serde_json::to_string(&m).unwrap();
        let restored: ActivityStateMachine = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, m);
        assert_eq!(restored.current_activity().unwrap().id, "b");
        let ids: Vec<_> = restored.activities().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn snapshot_with_two_runners_is_rejected() {
        let running = |id: &str| ActivityRecord {
            id: id.into(),
            state: ActivityState::Running,
            started_at: Some(at(0)),
            completed_at: None,
            removed_at: None,
        };
        let snapshot = MachineSnapshot {
            activities: vec![running("a"), running("b")],
            current_activity: Some("a".into()),
        };
        let err = ActivityStateMachine::try_from(snapshot).unwrap_err();
        assert!(matches!(err, ActivityError::InvalidSnapshot { .. }));
    }

    #[test]
    fn snapshot_with_dangling_pointer_is_rejected() {
        let snapshot = MachineSnapshot {
            activities: vec![ActivityRecord::pending("a".into())],
            current_activity: Some("a".into()),
        };
        assert!(ActivityStateMachine::try_from(snapshot).is_err());

        let json = r#"{"activities":[{"id":"a","state":"PENDING"},{"id":"a","state":"PENDING"}]}"#;
        assert!(serde_json::from_str::<ActivityStateMachine>(json).is_err());
    }
}
