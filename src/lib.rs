pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::analytics::AnalyticsService;
pub use application::app_state::{AppState, TaskBackend};
pub use application::board::TaskBoard;
pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::error::CoreError;
pub use application::retry::RetryPolicy;
pub use application::scheduling::{assign_slot, ScheduleService};
pub use application::task_flow::{BoardSource, LoadedBoard, MoveOutcome, TaskFlowService};
pub use domain::durations::{average_time_in_status, DurationReport, SamplePolicy, StatusDuration};
pub use domain::error::{ParseError, ValidationError};
pub use domain::interval::{parse_hours, Interval};
pub use domain::metrics::{build_dashboard, Dashboard, DashboardInput, ReportWindow};
pub use domain::models::{NewTask, StatusHistoryEntry, Tag, Task, TaskPatch, TaskStatus};
pub use domain::time_slot::{decode, encode, slot_key, LocalTimestamp, Slot};
pub use infrastructure::error::InfraError;
pub use infrastructure::snapshot_store::{InMemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};
pub use infrastructure::task_store::TaskStore;
