use std::collections::BTreeSet;

/// Aggregate view of a session's activities used to decide whether the
/// session is finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionInput {
    /// Whether any activity is currently running.
    pub running: bool,
    pub all_ids: BTreeSet<String>,
    /// IDs that have ever been started.
    pub started_ids: BTreeSet<String>,
    pub completed_ids: Vec<String>,
    pub removed_ids: Vec<String>,
}

/// Decides whether the session should be considered done.
///
/// 1. Anything running: not done.
/// 2. Nothing known: not done.
/// 3. If some activities were not removed, every one of them must have been
///    both started and completed.
/// 4. If every activity was removed, the session is done when at least one
///    activity was started and at least one was completed. The two checks
///    are independent and need not refer to the same activity.
pub fn is_session_complete(input: &CompletionInput) -> bool {
    if input.running {
        return false;
    }
    if input.all_ids.is_empty() {
        return false;
    }

    let removed: BTreeSet<&str> = input.removed_ids.iter().map(String::as_str).collect();
    let completed: BTreeSet<&str> = input.completed_ids.iter().map(String::as_str).collect();
    let mut available = input
        .all_ids
        .iter()
        .filter(|id| !removed.contains(id.as_str()))
        .peekable();

    if available.peek().is_some() {
        available.all(|id| input.started_ids.contains(id) && completed.contains(id.as_str()))
    } else {
        !input.started_ids.is_empty() && !input.completed_ids.is_empty()
    }
}
