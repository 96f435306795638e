use crate::domain::durations::{average_time_in_status_between, DurationReport, SamplePolicy};
use crate::domain::error::ValidationError;
use crate::domain::models::{StatusHistoryEntry, Tag, Task, TaskStatus, DEFAULT_DISPLAY_COLOR};
use crate::domain::time_slot::today_in;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportWindow {
    #[default]
    Week,
    Month,
    All,
}

impl ReportWindow {
    pub fn start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(now - Duration::days(30)),
            Self::All => None,
        }
    }

    pub fn contains(self, instant: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.start(now).map(|start| instant >= start).unwrap_or(true)
    }
}

impl FromStr for ReportWindow {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            other => Err(ValidationError::UnknownWindow(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub name: &'static str,
    pub color: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TagBreakdown {
    pub tag: String,
    pub color: String,
    pub counts: BTreeMap<TaskStatus, usize>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyThroughput {
    pub date: NaiveDate,
    pub weekday: String,
    pub created: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunnelStage {
    pub status: TaskStatus,
    pub name: &'static str,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeyMetrics {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub waiting: usize,
    pub completion_rate: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Dashboard {
    pub window: ReportWindow,
    pub generated_at: DateTime<Utc>,
    pub key_metrics: KeyMetrics,
    pub status_distribution: Vec<StatusCount>,
    pub tag_breakdown: Vec<TagBreakdown>,
    pub weekly_throughput: Vec<DailyThroughput>,
    pub completion_funnel: Vec<FunnelStage>,
    pub time_in_status: DurationReport,
}

/// Everything a dashboard is computed from; read fresh from the store.
#[derive(Debug, Clone, Copy)]
pub struct DashboardInput<'a> {
    pub tasks: &'a [Task],
    pub history: &'a [StatusHistoryEntry],
    pub tags: &'a [Tag],
    pub window: ReportWindow,
    pub now: DateTime<Utc>,
    pub time_zone: Tz,
    pub policy: SamplePolicy,
}

fn count_by_status<'a, I>(tasks: I) -> [usize; 5]
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut counts = [0usize; 5];
    for task in tasks {
        counts[task.status.position()] += 1;
    }
    counts
}

/// Every status appears, in board order, even with zero tasks.
pub fn status_distribution(tasks: &[Task]) -> Vec<StatusCount> {
    let counts = count_by_status(tasks);
    TaskStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            name: status.display_name(),
            color: status.color(),
            count: counts[status.position()],
        })
        .collect()
}

/// Buckets are the tag names found on tasks, in order of first appearance.
/// The catalog only supplies display colors.
pub fn tag_breakdown(tasks: &[Task], catalog: &[Tag]) -> Vec<TagBreakdown> {
    let colors: HashMap<&str, &str> = catalog
        .iter()
        .filter_map(|tag| tag.color.as_deref().map(|color| (tag.name.as_str(), color)))
        .collect();

    let mut buckets: Vec<TagBreakdown> = Vec::new();
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();

    for task in tasks {
        let mut seen_on_task: HashSet<&str> = HashSet::new();
        for tag in &task.tags {
            if !seen_on_task.insert(tag.as_str()) {
                continue;
            }
            let index = *index_by_name.entry(tag.as_str()).or_insert_with(|| {
                buckets.push(TagBreakdown {
                    tag: tag.clone(),
                    color: colors
                        .get(tag.as_str())
                        .copied()
                        .unwrap_or(DEFAULT_DISPLAY_COLOR)
                        .to_string(),
                    counts: TaskStatus::ALL.into_iter().map(|status| (status, 0)).collect(),
                    total: 0,
                });
                buckets.len() - 1
            });
            let bucket = &mut buckets[index];
            bucket.total += 1;
            *bucket.counts.entry(task.status).or_default() += 1;
        }
    }

    buckets
}

/// Trailing seven calendar days ending `today`, oldest first. `completed`
/// counts tasks created that day that are `done` now, so a task finished
/// later is credited to its creation day.
pub fn weekly_throughput(tasks: &[Task], today: NaiveDate, time_zone: Tz) -> Vec<DailyThroughput> {
    let mut days = (0..7)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            DailyThroughput {
                date,
                weekday: date.format("%a").to_string(),
                created: 0,
                completed: 0,
            }
        })
        .collect::<Vec<_>>();

    for task in tasks {
        let created_on = task.created_at.with_timezone(&time_zone).date_naive();
        let Some(day) = days.iter_mut().find(|day| day.date == created_on) else {
            continue;
        };
        day.created += 1;
        if task.status == TaskStatus::Done {
            day.completed += 1;
        }
    }

    days
}

/// Share of the population at each status. Stages are independent counts,
/// not cumulative, so values need not decrease along the board.
pub fn completion_funnel(tasks: &[Task]) -> Vec<FunnelStage> {
    let total = tasks.len();
    let counts = count_by_status(tasks);
    TaskStatus::ALL
        .into_iter()
        .map(|status| {
            let count = counts[status.position()];
            FunnelStage {
                status,
                name: status.display_name(),
                count,
                percentage: if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64 * 100.0
                },
            }
        })
        .collect()
}

pub fn key_metrics(tasks: &[Task]) -> KeyMetrics {
    let counts = count_by_status(tasks);
    let total = tasks.len();
    let completed = counts[TaskStatus::Done.position()];
    KeyMetrics {
        total,
        completed,
        in_progress: counts[TaskStatus::InProgress.position()],
        waiting: counts[TaskStatus::Waiting.position()],
        completion_rate: if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u32
        },
    }
}

pub fn build_dashboard(input: DashboardInput<'_>) -> Dashboard {
    let in_window = input
        .tasks
        .iter()
        .filter(|task| input.window.contains(task.created_at, input.now))
        .cloned()
        .collect::<Vec<_>>();
    let today = today_in(input.time_zone, input.now);

    Dashboard {
        window: input.window,
        generated_at: input.now,
        key_metrics: key_metrics(&in_window),
        status_distribution: status_distribution(&in_window),
        tag_breakdown: tag_breakdown(&in_window, input.tags),
        weekly_throughput: weekly_throughput(input.tasks, today, input.time_zone),
        completion_funnel: completion_funnel(&in_window),
        time_in_status: average_time_in_status_between(
            input.history,
            input.policy,
            input.window.start(input.now),
            input.now,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn task(id: &str, status: TaskStatus, tags: &[&str], created_at: &str) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            description: None,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            status,
            completed: status == TaskStatus::Done,
            is_scheduled: false,
            start_time: None,
            duration_minutes: None,
            created_at: fixed_time(created_at),
        }
    }

    fn catalog() -> Vec<Tag> {
        vec![Tag {
            id: "1".to_string(),
            name: "work".to_string(),
            color: Some("#EF4444".to_string()),
        }]
    }

    #[test]
    fn distribution_lists_every_status_in_board_order() {
        let tasks = vec![
            task("a", TaskStatus::Done, &[], "2024-03-10T10:00:00Z"),
            task("b", TaskStatus::Done, &[], "2024-03-10T10:00:00Z"),
            task("c", TaskStatus::Todo, &[], "2024-03-10T10:00:00Z"),
        ];
        let distribution = status_distribution(&tasks);
        let counts = distribution
            .iter()
            .map(|entry| (entry.status, entry.count))
            .collect::<Vec<_>>();
        assert_eq!(
            counts,
            vec![
                (TaskStatus::Backlog, 0),
                (TaskStatus::Todo, 1),
                (TaskStatus::InProgress, 0),
                (TaskStatus::Waiting, 0),
                (TaskStatus::Done, 2),
            ]
        );
        assert_eq!(distribution[1].name, "To Do");
    }

    #[test]
    fn tag_breakdown_discovers_unknown_tags_with_default_color() {
        let tasks = vec![
            task("a", TaskStatus::Todo, &["work", "errands"], "2024-03-10T10:00:00Z"),
            task("b", TaskStatus::Done, &["work", "work"], "2024-03-10T10:00:00Z"),
        ];
        let breakdown = tag_breakdown(&tasks, &catalog());

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].tag, "work");
        assert_eq!(breakdown[0].color, "#EF4444");
        assert_eq!(breakdown[0].total, 2);
        assert_eq!(breakdown[0].counts[&TaskStatus::Done], 1);
        assert_eq!(breakdown[0].counts[&TaskStatus::Waiting], 0);
        assert_eq!(breakdown[1].tag, "errands");
        assert_eq!(breakdown[1].color, DEFAULT_DISPLAY_COLOR);
        assert_eq!(breakdown[1].counts[&TaskStatus::Todo], 1);
    }

    #[test]
    fn weekly_throughput_credits_completion_to_creation_day() {
        let tasks = vec![
            task("old", TaskStatus::Done, &[], "2024-03-04T12:00:00Z"),
            task("five-days", TaskStatus::Done, &[], "2024-03-05T12:00:00Z"),
            task("today", TaskStatus::Todo, &[], "2024-03-10T12:00:00Z"),
            task("today-done", TaskStatus::Done, &[], "2024-03-10T18:00:00Z"),
        ];
        let days = weekly_throughput(&tasks, date(2024, 3, 10), chrono_tz::UTC);

        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, date(2024, 3, 4));
        assert_eq!(days[0].weekday, "Mon");
        assert_eq!(days[0].created, 1);
        assert_eq!(days[1].created, 1);
        assert_eq!(days[1].completed, 1);
        assert_eq!(days[6].date, date(2024, 3, 10));
        assert_eq!(days[6].created, 2);
        assert_eq!(days[6].completed, 1);
    }

    #[test]
    fn weekly_throughput_buckets_by_local_day() {
        // 03:00 UTC on the 11th is still the 10th in New York.
        let tasks = vec![task("late", TaskStatus::Todo, &[], "2024-03-11T03:00:00Z")];
        let days = weekly_throughput(&tasks, date(2024, 3, 10), chrono_tz::America::New_York);
        assert_eq!(days[6].created, 1);

        let utc_days = weekly_throughput(&tasks, date(2024, 3, 10), chrono_tz::UTC);
        assert!(utc_days.iter().all(|day| day.created == 0));
    }

    #[test]
    fn funnel_of_empty_board_is_all_zero() {
        let funnel = completion_funnel(&[]);
        assert_eq!(funnel.len(), 5);
        assert!(funnel.iter().all(|stage| stage.count == 0 && stage.percentage == 0.0));
        assert_eq!(key_metrics(&[]).completion_rate, 0);
    }

    #[test]
    fn funnel_is_not_cumulative() {
        let tasks = vec![
            task("a", TaskStatus::Backlog, &[], "2024-03-10T10:00:00Z"),
            task("b", TaskStatus::Done, &[], "2024-03-10T10:00:00Z"),
            task("c", TaskStatus::Done, &[], "2024-03-10T10:00:00Z"),
            task("d", TaskStatus::Done, &[], "2024-03-10T10:00:00Z"),
        ];
        let funnel = completion_funnel(&tasks);
        assert_eq!(funnel[0].percentage, 25.0);
        assert_eq!(funnel[1].percentage, 0.0);
        assert_eq!(funnel[4].percentage, 75.0);
    }

    #[test]
    fn key_metrics_round_completion_rate() {
        let tasks = vec![
            task("a", TaskStatus::Done, &[], "2024-03-10T10:00:00Z"),
            task("b", TaskStatus::InProgress, &[], "2024-03-10T10:00:00Z"),
            task("c", TaskStatus::Waiting, &[], "2024-03-10T10:00:00Z"),
        ];
        let metrics = key_metrics(&tasks);
        assert_eq!(
            metrics,
            KeyMetrics {
                total: 3,
                completed: 1,
                in_progress: 1,
                waiting: 1,
                completion_rate: 33,
            }
        );
    }

    #[test]
    fn dashboard_applies_report_window() {
        let now = fixed_time("2024-03-10T20:00:00Z");
        let tasks = vec![
            task("recent", TaskStatus::Done, &["work"], "2024-03-09T10:00:00Z"),
            task("last-month", TaskStatus::Todo, &["work"], "2024-02-20T10:00:00Z"),
            task("ancient", TaskStatus::Backlog, &[], "2023-01-01T10:00:00Z"),
        ];
        let tags = catalog();
        let input = |window| DashboardInput {
            tasks: &tasks,
            history: &[],
            tags: &tags,
            window,
            now,
            time_zone: chrono_tz::UTC,
            policy: SamplePolicy::Drop,
        };

        let week = build_dashboard(input(ReportWindow::Week));
        let month = build_dashboard(input(ReportWindow::Month));
        let all = build_dashboard(input(ReportWindow::All));

        assert_eq!(week.key_metrics.total, 1);
        assert_eq!(month.key_metrics.total, 2);
        assert_eq!(all.key_metrics.total, 3);
        assert_eq!(week.tag_breakdown[0].total, 1);
        assert_eq!(all.weekly_throughput, week.weekly_throughput);
        assert_eq!("MONTH".parse::<ReportWindow>(), Ok(ReportWindow::Month));
    }

    fn status_strategy() -> impl Strategy<Value = TaskStatus> {
        prop::sample::select(TaskStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn distribution_and_funnel_account_for_every_task(
            statuses in prop::collection::vec(status_strategy(), 0..60)
        ) {
            let tasks = statuses
                .iter()
                .enumerate()
                .map(|(index, status)| task(&index.to_string(), *status, &[], "2024-03-10T10:00:00Z"))
                .collect::<Vec<_>>();

            let distribution = status_distribution(&tasks);
            prop_assert_eq!(distribution.len(), 5);
            prop_assert_eq!(distribution.iter().map(|entry| entry.count).sum::<usize>(), tasks.len());

            let funnel = completion_funnel(&tasks);
            prop_assert_eq!(funnel.iter().map(|stage| stage.count).sum::<usize>(), tasks.len());
            for stage in &funnel {
                prop_assert!((0.0..=100.0).contains(&stage.percentage));
            }
        }
    }
}
