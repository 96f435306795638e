use crate::domain::error::ValidationError;
use crate::infrastructure::error::InfraError;
use thiserror::Error;

/// Failures surfaced by the application services. Validation errors are
/// raised before any state changes; persistence errors are raised after the
/// in-memory board has been restored.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] InfraError),
}

impl CoreError {
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}
