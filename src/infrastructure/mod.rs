pub mod config;
pub mod error;
pub mod logging;
pub mod memory_task_store;
pub mod rest_task_store;
pub mod snapshot_store;
pub mod storage;
pub mod task_store;
