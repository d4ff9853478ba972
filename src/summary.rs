//! End-of-session statistics derived from the timeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ColorSet;
use crate::timeline::TimelineEntry;

/// How a session ended, or that it has not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionOutcome {
    Completed,
    TimeUp,
    InProgress,
}

/// Total tracked time for one activity across all of its timeline entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTime {
    pub id: String,
    pub name: String,
    pub duration_secs: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorSet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedActivity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub planned_secs: i64,
    pub time_spent_secs: i64,
    pub overtime_secs: i64,
    pub active_secs: i64,
    pub idle_secs: i64,
    pub activities: Vec<ActivityTime>,
    pub skipped: Vec<SkippedActivity>,
    pub outcome: SessionOutcome,
    pub generated_at: DateTime<Utc>,
}

/// Active time is the sum of entry durations; idle time is the sum of the
/// gaps between consecutive entries. Open entries count up to `now`.
pub fn active_and_idle(entries: &[TimelineEntry], now: DateTime<Utc>) -> (i64, i64) {
    let mut sorted: Vec<&TimelineEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.start_time);

    let mut active = 0;
    let mut idle = 0;
    let mut last_end: Option<DateTime<Utc>> = None;
    for entry in sorted {
        if let Some(prev) = last_end
            && entry.start_time > prev
        {
            idle += (entry.start_time - prev).num_seconds();
        }
        active += entry.duration_secs(now);
        let end = entry.end_time.unwrap_or(now);
        last_end = Some(last_end.map_or(end, |prev| prev.max(end)));
    }
    (active, idle)
}

/// Time used beyond the plan, measured from the first start to the last end.
pub fn overtime(entries: &[TimelineEntry], planned_secs: i64, now: DateTime<Utc>) -> i64 {
    let Some(first) = entries.iter().map(|e| e.start_time).min() else {
        return 0;
    };
    let last = entries
        .iter()
        .map(|e| e.end_time.unwrap_or(now))
        .max()
        .unwrap_or(first);
    ((last - first).num_seconds() - planned_secs).max(0)
}

/// Per-activity totals in order of first appearance on the timeline.
pub fn activity_times(entries: &[TimelineEntry], now: DateTime<Utc>) -> Vec<ActivityTime> {
    let mut sorted: Vec<&TimelineEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.start_time);

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut times: Vec<ActivityTime> = Vec::new();
    for entry in sorted {
        let duration = entry.duration_secs(now);
        match positions.get(entry.activity_id.as_str()) {
            Some(&pos) => times[pos].duration_secs += duration,
            None => {
                positions.insert(&entry.activity_id, times.len());
                times.push(ActivityTime {
                    id: entry.activity_id.clone(),
                    name: entry.activity_name.clone(),
                    duration_secs: duration,
                    colors: entry.colors.clone(),
                });
            }
        }
    }
    times
}
