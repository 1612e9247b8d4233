use crate::domain::violation::{ViolationKind, ViolationSet};
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device already exists: {0}")]
    DeviceAlreadyExists(String),

    #[error("Device rules violated: {0}")]
    ValidationFailed(ViolationSet),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Patch failed: {reason}")]
    PatchFailed {
        operation: Option<usize>,
        reason: String,
    },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

/// A not-found violation outranks every other rule failure
impl From<ViolationSet> for DomainError {
    fn from(violations: ViolationSet) -> Self {
        if let Some(missing) = violations
            .iter()
            .find(|violation| violation.kind == ViolationKind::NotFound)
        {
            return DomainError::DeviceNotFound(missing.message.clone());
        }
        DomainError::ValidationFailed(violations)
    }
}
