use crate::domain::error::ParseError;
use crate::domain::interval::parse_hours;
use crate::domain::models::{StatusHistoryEntry, Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What an unreadable `duration_in_previous_status` contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePolicy {
    /// Leave the sample out of both mean and count.
    #[default]
    Drop,
    /// Count it as a zero-hour stay.
    Zero,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusDuration {
    pub status: TaskStatus,
    pub label: String,
    pub average_hours: f64,
    pub total_hours: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RejectedSample {
    pub entry_id: String,
    pub task_id: String,
    pub raw: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DurationReport {
    pub statuses: Vec<StatusDuration>,
    pub rejected: Vec<RejectedSample>,
}

#[derive(Debug, Default)]
struct Samples {
    total: f64,
    count: usize,
}

/// Mean time spent in each `from_status`, in board order. Creation entries
/// and entries without a recorded duration carry no sample; statuses with no
/// samples are omitted.
pub fn average_time_in_status<'a, I>(entries: I, policy: SamplePolicy) -> DurationReport
where
    I: IntoIterator<Item = &'a StatusHistoryEntry>,
{
    let mut groups: BTreeMap<TaskStatus, Samples> = BTreeMap::new();
    let mut rejected = Vec::new();

    for entry in entries {
        let (Some(from_status), Some(raw)) =
            (entry.from_status, entry.duration_in_previous_status.as_deref())
        else {
            continue;
        };

        let hours = match parse_hours(raw) {
            Ok(hours) => hours,
            Err(error) => {
                tracing::warn!(
                    entry_id = %entry.id,
                    task_id = %entry.task_id,
                    raw,
                    %error,
                    ?policy,
                    "unreadable status duration"
                );
                rejected.push(rejected_sample(entry, raw, &error));
                match policy {
                    SamplePolicy::Drop => continue,
                    SamplePolicy::Zero => 0.0,
                }
            }
        };

        let samples = groups.entry(from_status).or_default();
        samples.total += hours;
        samples.count += 1;
    }

    let statuses = groups
        .into_iter()
        .filter(|(_, samples)| samples.count > 0)
        .map(|(status, samples)| StatusDuration {
            status,
            label: status_label(status),
            average_hours: round_one_decimal(samples.total / samples.count as f64),
            total_hours: round_one_decimal(samples.total),
            count: samples.count,
        })
        .collect();

    DurationReport { statuses, rejected }
}

/// Same aggregation restricted to transitions made inside `[from, to]`.
pub fn average_time_in_status_between(
    entries: &[StatusHistoryEntry],
    policy: SamplePolicy,
    from: Option<DateTime<Utc>>,
    to: DateTime<Utc>,
) -> DurationReport {
    average_time_in_status(
        entries.iter().filter(|entry| {
            entry.changed_at <= to && from.map(|start| entry.changed_at >= start).unwrap_or(true)
        }),
        policy,
    )
}

/// Per tag name, the time-in-status report over the history of tasks carrying
/// that tag. History for tasks not present in `tasks` is ignored.
pub fn time_in_status_by_tag(
    entries: &[StatusHistoryEntry],
    tasks: &[Task],
    policy: SamplePolicy,
) -> BTreeMap<String, DurationReport> {
    let tags_by_task: HashMap<&str, BTreeSet<&str>> = tasks
        .iter()
        .map(|task| (task.id.as_str(), task.tags.iter().map(String::as_str).collect()))
        .collect();

    let mut entries_by_tag: BTreeMap<&str, Vec<&StatusHistoryEntry>> = BTreeMap::new();
    for entry in entries {
        let Some(tags) = tags_by_task.get(entry.task_id.as_str()) else {
            continue;
        };
        for &tag in tags {
            entries_by_tag.entry(tag).or_default().push(entry);
        }
    }

    entries_by_tag
        .into_iter()
        .map(|(tag, tagged)| (tag.to_string(), average_time_in_status(tagged, policy)))
        .filter(|(_, report)| !report.statuses.is_empty())
        .collect()
}

pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn status_label(status: TaskStatus) -> String {
    status.as_str().replace('_', " ").to_ascii_uppercase()
}

fn rejected_sample(entry: &StatusHistoryEntry, raw: &str, error: &ParseError) -> RejectedSample {
    RejectedSample {
        entry_id: entry.id.clone(),
        task_id: entry.task_id.clone(),
        raw: raw.to_string(),
        error: error.to_string(),
    }
}
