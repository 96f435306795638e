use crate::domain::interval::Interval;
use crate::domain::models::{StatusHistoryEntry, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainViolation {
    #[error("first entry {entry_id} of task {task_id} has from_status {found}, expected none")]
    FirstEntryHasPredecessor {
        task_id: String,
        entry_id: String,
        found: TaskStatus,
    },
    #[error("entry {entry_id} of task {task_id} has no from_status but is not the first entry")]
    MissingPredecessor { task_id: String, entry_id: String },
    #[error("entry {entry_id} of task {task_id} starts from {found}, previous entry ended in {expected}")]
    BrokenLink {
        task_id: String,
        entry_id: String,
        expected: TaskStatus,
        found: TaskStatus,
    },
    #[error("entry {entry_id} of task {task_id} is older than its predecessor")]
    OutOfOrder { task_id: String, entry_id: String },
    #[error("entry {entry_id} has from_status but no duration_in_previous_status")]
    MissingDuration { entry_id: String },
    #[error("entry {entry_id} has a duration but no from_status")]
    UnexpectedDuration { entry_id: String },
}

/// Builds the entry the store appends when a task's status is set.
///
/// `previous` is the latest entry already recorded for the task, or `None`
/// when the task is being created.
pub fn next_entry(
    entry_id: impl Into<String>,
    task_id: impl Into<String>,
    previous: Option<&StatusHistoryEntry>,
    to_status: TaskStatus,
    changed_at: DateTime<Utc>,
) -> StatusHistoryEntry {
    StatusHistoryEntry {
        id: entry_id.into(),
        task_id: task_id.into(),
        from_status: previous.map(|entry| entry.to_status),
        to_status,
        changed_at,
        duration_in_previous_status: previous
            .map(|entry| Interval::from_duration(changed_at - entry.changed_at).to_string()),
    }
}

/// Per-task subsequences in their original relative order.
pub fn group_by_task(entries: &[StatusHistoryEntry]) -> BTreeMap<&str, Vec<&StatusHistoryEntry>> {
    let mut grouped: BTreeMap<&str, Vec<&StatusHistoryEntry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(entry.task_id.as_str()).or_default().push(entry);
    }
    grouped
}

/// Checks every task's chain and reports the first violation found.
pub fn validate_chain(entries: &[StatusHistoryEntry]) -> Result<(), ChainViolation> {
    for (task_id, chain) in group_by_task(entries) {
        let mut previous: Option<&StatusHistoryEntry> = None;
        for entry in chain {
            match (entry.from_status, &entry.duration_in_previous_status) {
                (Some(_), None) => {
                    return Err(ChainViolation::MissingDuration {
                        entry_id: entry.id.clone(),
                    });
                }
                (None, Some(_)) => {
                    return Err(ChainViolation::UnexpectedDuration {
                        entry_id: entry.id.clone(),
                    });
                }
                _ => {}
            }

            match (previous, entry.from_status) {
                (None, Some(found)) => {
                    return Err(ChainViolation::FirstEntryHasPredecessor {
                        task_id: task_id.to_string(),
                        entry_id: entry.id.clone(),
                        found,
                    });
                }
                (Some(_), None) => {
                    return Err(ChainViolation::MissingPredecessor {
                        task_id: task_id.to_string(),
                        entry_id: entry.id.clone(),
                    });
                }
                (Some(prior), Some(found)) => {
                    if entry.changed_at < prior.changed_at {
                        return Err(ChainViolation::OutOfOrder {
                            task_id: task_id.to_string(),
                            entry_id: entry.id.clone(),
                        });
                    }
                    if prior.to_status != found {
                        return Err(ChainViolation::BrokenLink {
                            task_id: task_id.to_string(),
                            entry_id: entry.id.clone(),
                            expected: prior.to_status,
                            found,
                        });
                    }
                }
                (None, None) => {}
            }
            previous = Some(entry);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineItem {
    pub entry: StatusHistoryEntry,
    pub status_name: &'static str,
    pub status_color: &'static str,
    pub previous_status_name: Option<&'static str>,
    /// Compact label such as `"3h 15m"`; absent for the creation entry or an
    /// unreadable interval.
    pub time_in_previous_status: Option<String>,
}

/// One task's history, oldest first.
pub fn timeline(entries: &[StatusHistoryEntry], task_id: &str) -> Vec<TimelineItem> {
    let mut chain = entries
        .iter()
        .filter(|entry| entry.task_id == task_id)
        .cloned()
        .collect::<Vec<_>>();
    chain.sort_by(|left, right| left.changed_at.cmp(&right.changed_at));

    chain
        .into_iter()
        .map(|entry| TimelineItem {
            status_name: entry.to_status.display_name(),
            status_color: entry.to_status.color(),
            previous_status_name: entry.from_status.map(TaskStatus::display_name),
            time_in_previous_status: entry
                .duration_in_previous_status
                .as_deref()
                .and_then(|raw| Interval::parse(raw).ok())
                .map(|interval| interval.compact_label()),
            entry,
        })
        .collect()
}
