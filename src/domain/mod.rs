pub mod durations;
pub mod error;
pub mod history;
pub mod interval;
pub mod metrics;
pub mod models;
pub mod time_slot;
