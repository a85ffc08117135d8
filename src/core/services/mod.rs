pub mod account_service;
pub mod audit_service;
pub mod journal_service;
pub mod wealth_service;

pub use account_service::AccountService;
pub use audit_service::AuditService;
pub use journal_service::JournalService;
pub use wealth_service::WealthService;

use serde::Serialize;

use crate::errors::{LedgerError, ValidationError};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service failures: validation outcomes are typed values the caller can
/// render; ledger faults are unexpected and propagate.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Serializes an entity for an audit before/after snapshot.
pub(crate) fn audit_snapshot<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}
