use crate::application::error::CoreError;
use crate::application::retry::{with_retry, RetryPolicy};
use crate::domain::durations::{
    average_time_in_status_between, time_in_status_by_tag, DurationReport, SamplePolicy,
};
use crate::domain::history::{validate_chain, ChainViolation};
use crate::domain::metrics::{build_dashboard, Dashboard, DashboardInput, ReportWindow};
use crate::domain::models::{StatusHistoryEntry, Task};
use crate::infrastructure::task_store::TaskStore;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::Arc;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Dashboard and lifecycle reports. Every call reads the authoritative store
/// first; nothing is cached between calls.
pub struct AnalyticsService<S>
where
    S: TaskStore,
{
    store: Arc<S>,
    time_zone: Tz,
    policy: SamplePolicy,
    default_window: ReportWindow,
    retry_policy: RetryPolicy,
    now_provider: NowProvider,
}

impl<S> AnalyticsService<S>
where
    S: TaskStore,
{
    pub fn new(store: Arc<S>, time_zone: Tz) -> Self {
        Self {
            store,
            time_zone,
            policy: SamplePolicy::default(),
            default_window: ReportWindow::default(),
            retry_policy: RetryPolicy::default(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_sample_policy(mut self, policy: SamplePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Window used by `dashboard_default`, normally the configured `reportWindow`.
    pub fn with_default_window(mut self, window: ReportWindow) -> Self {
        self.default_window = window;
        self
    }

    pub fn default_window(&self) -> ReportWindow {
        self.default_window
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn dashboard(&self, window: ReportWindow) -> Result<Dashboard, CoreError> {
        let tasks = self.tasks().await?;
        let history = self.history().await?;
        let tags = with_retry(&self.retry_policy, "list_tags", || self.store.list_tags()).await?;
        let now = (self.now_provider)();

        let dashboard = build_dashboard(DashboardInput {
            tasks: &tasks,
            history: &history,
            tags: &tags,
            window,
            now,
            time_zone: self.time_zone,
            policy: self.policy,
        });
        tracing::info!(
            ?window,
            task_count = tasks.len(),
            history_count = history.len(),
            rejected = dashboard.time_in_status.rejected.len(),
            "dashboard built"
        );
        Ok(dashboard)
    }

    pub async fn dashboard_default(&self) -> Result<Dashboard, CoreError> {
        self.dashboard(self.default_window).await
    }

    pub async fn time_in_status(&self, window: ReportWindow) -> Result<DurationReport, CoreError> {
        let history = self.history().await?;
        let now = (self.now_provider)();
        Ok(average_time_in_status_between(
            &history,
            self.policy,
            window.start(now),
            now,
        ))
    }

    pub async fn time_in_status_by_tag(
        &self,
        window: ReportWindow,
    ) -> Result<BTreeMap<String, DurationReport>, CoreError> {
        let tasks = self.tasks().await?;
        let now = (self.now_provider)();
        let history = self
            .history()
            .await?
            .into_iter()
            .filter(|entry| window.contains(entry.changed_at, now) && entry.changed_at <= now)
            .collect::<Vec<_>>();
        Ok(time_in_status_by_tag(&history, &tasks, self.policy))
    }

    /// First broken invariant in the stored history, if any.
    pub async fn verify_history(&self) -> Result<Option<ChainViolation>, CoreError> {
        let history = self.history().await?;
        match validate_chain(&history) {
            Ok(()) => Ok(None),
            Err(violation) => {
                tracing::warn!(%violation, "status history chain is inconsistent");
                Ok(Some(violation))
            }
        }
    }

    async fn tasks(&self) -> Result<Vec<Task>, CoreError> {
        Ok(with_retry(&self.retry_policy, "list_tasks", || self.store.list_tasks()).await?)
    }

    async fn history(&self) -> Result<Vec<StatusHistoryEntry>, CoreError> {
        Ok(with_retry(&self.retry_policy, "list_status_history", || {
            self.store.list_status_history(None)
        })
        .await?)
    }
}
