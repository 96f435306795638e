use crate::domain::error::ValidationError;
use crate::domain::time_slot::decode;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_DURATION_MINUTES: u32 = 60;
pub const MIN_DURATION_MINUTES: u32 = 15;
pub const DEFAULT_DISPLAY_COLOR: &str = "#666666";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Backlog,
    Todo,
    InProgress,
    Waiting,
    Done,
}

impl TaskStatus {
    /// Board order, also used for every per-status report.
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Waiting,
        TaskStatus::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Waiting => "waiting",
            Self::Done => "done",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Waiting => "Waiting",
            Self::Done => "Done",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Backlog => "#666666",
            Self::Todo => "#3B82F6",
            Self::InProgress => "#F59E0B",
            Self::Waiting => "#8B5CF6",
            Self::Done => "#10B981",
        }
    }

    pub fn position(self) -> usize {
        match self {
            Self::Backlog => 0,
            Self::Todo => 1,
            Self::InProgress => 2,
            Self::Waiting => 3,
            Self::Done => 4,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "backlog" => Ok(Self::Backlog),
            "todo" | "to_do" => Ok(Self::Todo),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "waiting" => Ok(Self::Waiting),
            "done" => Ok(Self::Done),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub is_scheduled: bool,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn effective_duration_minutes(&self) -> u32 {
        self.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_non_empty(&self.id, "task.id")?;
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        validate_duration(self.duration_minutes)?;
        if self.is_scheduled {
            let parseable = self
                .start_time
                .as_deref()
                .map(|value| decode(value).is_ok())
                .unwrap_or(false);
            if !parseable {
                return Err(ValidationError::MissingStartTime(self.id.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusHistoryEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub task_id: String,
    #[serde(default, deserialize_with = "deserialize_optional_status")]
    pub from_status: Option<TaskStatus>,
    #[serde(deserialize_with = "deserialize_required_status")]
    pub to_status: TaskStatus,
    pub changed_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_in_previous_status: Option<String>,
}

/// Fields accepted by `insertTask`; id and `created_at` are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub status: TaskStatus,
    pub completed: bool,
    pub is_scheduled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Trims text fields and rejects anything `Task::validate` would reject.
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        self.title = title.to_string();
        self.description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);
        self.tags = normalize_tags(self.tags);
        validate_duration(self.duration_minutes)?;
        if self.is_scheduled {
            let parseable = self
                .start_time
                .as_deref()
                .map(|value| decode(value).is_ok())
                .unwrap_or(false);
            if !parseable {
                return Err(ValidationError::MissingStartTime(self.title.clone()));
            }
        }
        Ok(self)
    }

    pub fn into_task(self, id: impl Into<String>, created_at: DateTime<Utc>) -> Task {
        Task {
            id: id.into(),
            title: self.title,
            description: self.description,
            tags: self.tags,
            status: self.status,
            completed: self.completed,
            is_scheduled: self.is_scheduled,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            created_at,
        }
    }
}

/// Partial update sent to `updateTask`. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_scheduled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn schedule(start_time: String, duration_minutes: u32) -> Self {
        Self {
            is_scheduled: Some(true),
            start_time: Some(Some(start_time)),
            duration_minutes: Some(duration_minutes),
            ..Self::default()
        }
    }

    pub fn unschedule() -> Self {
        Self {
            is_scheduled: Some(false),
            start_time: Some(None),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, task: &Task) -> Task {
        let mut updated = task.clone();
        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        if let Some(tags) = &self.tags {
            updated.tags = tags.clone();
        }
        if let Some(status) = self.status {
            updated.status = status;
        }
        if let Some(completed) = self.completed {
            updated.completed = completed;
        }
        if let Some(is_scheduled) = self.is_scheduled {
            updated.is_scheduled = is_scheduled;
        }
        if let Some(start_time) = &self.start_time {
            updated.start_time = start_time.clone();
        }
        if let Some(duration_minutes) = self.duration_minutes {
            updated.duration_minutes = Some(duration_minutes);
        }
        updated
    }
}

fn validate_non_empty(value: &str, field_name: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyId(field_name));
    }
    Ok(())
}

pub fn validate_duration(duration_minutes: Option<u32>) -> Result<(), ValidationError> {
    match duration_minutes {
        Some(actual) if actual < MIN_DURATION_MINUTES => Err(ValidationError::DurationOutOfRange {
            actual,
            min: MIN_DURATION_MINUTES,
        }),
        _ => Ok(()),
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || normalized.iter().any(|existing| existing == tag) {
            continue;
        }
        normalized.push(tag.to_string());
    }
    normalized
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}

fn deserialize_optional_status<'de, D>(deserializer: D) -> Result<Option<TaskStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|value| value.parse().map_err(de::Error::custom))
        .transpose()
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<TaskStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_optional_status(deserializer)?.unwrap_or_default())
}

fn deserialize_required_status<'de, D>(deserializer: D) -> Result<TaskStatus, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer)?
        .parse()
        .map_err(de::Error::custom)
}

fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
