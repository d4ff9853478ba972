//! Activity planning from a free-text session description.
//!
//! [`ActivityPlanner`] turns something like "a 30-minute study sprint on
//! React, plus a 10-minute break" into a list of [`PlannedActivity`]s. With
//! an API client it asks the model for a JSON plan; without one, or when the
//! model's answer is unusable, it falls back to splitting the text on list
//! markers and clause separators.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::anthropic::{Message, MessageSender, MessagesRequest};

/// Upper bound on activities taken from a single plan.
pub const DEFAULT_MAX_ACTIVITIES: usize = 20;

/// Longest duration accepted for one planned activity. Larger values are
/// dropped rather than clamped.
pub const MAX_ACTIVITY_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedActivity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

pub struct ActivityPlanner;

impl ActivityPlanner {
    /// Plans with the model when a client is given, falling back to keyword
    /// splitting on any error.
    pub async fn plan<C: MessageSender>(
        client: Option<&C>,
        model: &str,
        prompt: &str,
        max: usize,
    ) -> Vec<PlannedActivity> {
        if let Some(client) = client {
            match Self::plan_with_llm(client, model, prompt, max).await {
                Ok(plan) => return plan,
                Err(e) => warn!(error = %e, "LLM planning failed, using keyword planner"),
            }
        }
        Self::plan_from_keywords(prompt, max)
    }

    /// Asks the model for a JSON plan and maps it leniently: a missing title
    /// falls back to `name`, then to "Activity N".
    pub async fn plan_with_llm(
        client: &impl MessageSender,
        model: &str,
        prompt: &str,
        max: usize,
    ) -> Result<Vec<PlannedActivity>> {
        let req = MessagesRequest {
            model: model.to_string(),
            max_tokens: 1024,
            system: Some(
                "You plan focused, time-boxed work sessions. Respond with ONLY valid JSON."
                    .to_string(),
            ),
            messages: vec![Message::user(format!(
                "Break this session description into activities.\n\
                 \n\
                 Format:\n\
                 {{\"activities\": [\n\
                   {{\"title\": \"<short activity name>\", \"description\": \"<optional detail>\", \"duration\": <minutes>}}\n\
                 ]}}\n\
                 \n\
                 Rules:\n\
                 - title is a short noun phrase (e.g., \"React hooks study\")\n\
                 - duration is a whole number of minutes\n\
                 - list activities in the order they should happen, at most {max}\n\
                 \n\
                 Session: {prompt}"
            ))],
        };

        let response = client.send_message(&req).await?;
        let text = response.text();
        let value: Value = serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| anyhow!("Failed to parse LLM plan response: {e}"))?;

        let items = value
            .get("activities")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("LLM plan response has no activities array"))?;
        if items.is_empty() {
            bail!("LLM returned an empty plan");
        }

        let plan: Vec<PlannedActivity> = items
            .iter()
            .take(max)
            .enumerate()
            .map(|(i, item)| planned_from_value(i, item))
            .collect();
        debug!(count = plan.len(), "LLM plan parsed");
        Ok(plan)
    }

    /// Offline planner. Splits on bullet or numbered lines when there are at
    /// least two, otherwise on clause separators ("plus", "then", ";").
    pub fn plan_from_keywords(prompt: &str, max: usize) -> Vec<PlannedActivity> {
        let listed = split_explicit_list(prompt);
        let clauses = if listed.len() >= 2 {
            listed
        } else {
            split_on_separators(prompt)
        };

        clauses
            .iter()
            .filter_map(|clause| planned_from_clause(clause))
            .take(max)
            .enumerate()
            .map(|(i, (name, minutes))| PlannedActivity {
                name: name.unwrap_or_else(|| format!("Activity {}", i + 1)),
                description: None,
                duration_minutes: minutes,
            })
            .collect()
    }
}

fn planned_from_value(index: usize, item: &Value) -> PlannedActivity {
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let duration_minutes = match item.get("duration") {
        Some(Value::Number(n)) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        Some(Value::String(s)) => extract_minutes(s).1,
        _ => None,
    };
    PlannedActivity {
        name: text("title")
            .or_else(|| text("name"))
            .unwrap_or_else(|| format!("Activity {}", index + 1)),
        description: text("description"),
        duration_minutes: duration_minutes.filter(|&m| m > 0 && m <= MAX_ACTIVITY_MINUTES),
    }
}

/// Models sometimes wrap JSON in a Markdown code fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Lines starting with "- ", "* ", "1." or "1)".
fn split_explicit_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if let Some(rest) = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
            {
                return Some(rest.to_string());
            }
            let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
            if digits == 0 {
                return None;
            }
            let rest = trimmed[digits..].strip_prefix(['.', ')'])?.trim();
            (!rest.is_empty()).then(|| rest.to_string())
        })
        .collect()
}

fn split_on_separators(text: &str) -> Vec<String> {
    let delimiters = [", plus ", " plus ", ", then ", " and then ", " then ", ";", "\n"];

    let mut parts = vec![text.to_string()];
    for delim in delimiters {
        parts = parts
            .iter()
            .flat_map(|part| split_ascii_case_insensitive(part, delim))
            .collect();
    }
    parts
}

/// Splits on every occurrence of the ASCII delimiter `delim`, ignoring case.
fn split_ascii_case_insensitive(text: &str, delim: &str) -> Vec<String> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let mut pieces = Vec::new();
    let mut start = 0;
    while let Some(pos) = lower[start..].find(delim) {
        pieces.push(text[start..start + pos].to_string());
        start += pos + delim.len();
    }
    pieces.push(text[start..].to_string());
    pieces
}

const LEADING_FILLER: &[&str] = &[
    "i", "i'd", "i'll", "want", "would", "like", "need", "to", "do", "have", "a", "an", "some",
    "and", "then", "plus", "finally",
];
const TRAILING_FILLER: &[&str] = &["for", "of", "a", "an", "and"];

/// Name and duration for one clause, or `None` when the clause is blank.
fn planned_from_clause(clause: &str) -> Option<(Option<String>, Option<u32>)> {
    let clause = clause.trim().trim_end_matches(['.', ',', '!']);
    if clause.is_empty() {
        return None;
    }
    let (words, minutes) = extract_minutes(clause);

    let is_filler = |word: &&str, list: &[&str]| list.contains(&word.to_lowercase().as_str());
    let mut slice: &[&str] = &words;
    while let Some((first, rest)) = slice.split_first() {
        if !is_filler(first, LEADING_FILLER) {
            break;
        }
        slice = rest;
    }
    while let Some((last, rest)) = slice.split_last() {
        if !is_filler(last, TRAILING_FILLER) {
            break;
        }
        slice = rest;
    }

    let name = (!slice.is_empty()).then(|| capitalize_first(&slice.join(" ")));
    Some((name, minutes))
}

/// Pulls "30-minute", "30 min", "45m", "1-hour" style durations out of a
/// clause. Returns the remaining words and the total minutes found, or
/// `None` for the total when it exceeds [`MAX_ACTIVITY_MINUTES`].
fn extract_minutes(clause: &str) -> (Vec<&str>, Option<u32>) {
    let words: Vec<&str> = clause.split_whitespace().collect();
    let clean = |w: &str| {
        w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
            .to_lowercase()
    };

    let mut kept = Vec::with_capacity(words.len());
    let mut found = false;
    let mut total = Some(0u32);
    let mut add = |number: &str, factor: u32| {
        found = true;
        total = total
            .zip(to_minutes(number, factor))
            .and_then(|(t, m)| t.checked_add(m))
            .filter(|&t| t <= MAX_ACTIVITY_MINUTES);
    };

    let mut i = 0;
    while i < words.len() {
        let word = clean(words[i]);
        if let Some((number, factor)) = attached_duration(&word) {
            add(number, factor);
            i += 1;
            continue;
        }
        let is_number = !word.is_empty() && word.chars().all(|c| c.is_ascii_digit());
        if is_number
            && let Some(factor) = words.get(i + 1).and_then(|next| unit_factor(&clean(*next)))
        {
            add(word.as_str(), factor);
            i += 2;
            continue;
        }
        kept.push(words[i]);
        i += 1;
    }
    (kept, if found { total } else { None })
}

/// Splits "30-minute", "30min", "45m", "2-hours", "1h" into the number and
/// the minutes per unit.
fn attached_duration(word: &str) -> Option<(&str, u32)> {
    let split = word.find(|c: char| !c.is_ascii_digit())?;
    if split == 0 {
        return None;
    }
    let (number, unit) = word.split_at(split);
    Some((number, unit_factor(unit.trim_start_matches('-'))?))
}

fn to_minutes(number: &str, factor: u32) -> Option<u32> {
    number
        .parse::<u32>()
        .ok()?
        .checked_mul(factor)
        .filter(|&m| m <= MAX_ACTIVITY_MINUTES)
}

fn unit_factor(unit: &str) -> Option<u32> {
    match unit {
        "m" | "min" | "mins" | "minute" | "minutes" => Some(1),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(60),
        _ => None,
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
