use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Audit record could not be written: {0}")]
    AuditLog(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReconciliationError>;
