pub mod analytics;
pub mod app_state;
pub mod board;
pub mod bootstrap;
pub mod error;
pub mod retry;
pub mod scheduling;
pub mod task_flow;
