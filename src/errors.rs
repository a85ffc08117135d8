use thiserror::Error;
use uuid::Uuid;

/// Error type that captures storage and reference faults.
///
/// These propagate with `?`. Validation outcomes use [`ValidationError`]
/// instead and are returned as values, never thrown, so the calling layer
/// can render the message directly.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),
    #[error("Journal not found: {0}")]
    JournalNotFound(Uuid),
    #[error("Invalid reference: {0}")]
    InvalidRef(String),
}

/// Typed validation failures surfaced to the caller as values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("journal is unbalanced: debits and credits differ by {imbalance} minor units")]
    UnbalancedJournal { imbalance: i64 },
    #[error("journal must touch at least two distinct accounts")]
    TooFewAccounts,
    #[error("journal description must not be empty")]
    EmptyDescription,
    #[error("journal must contain at least one transaction line")]
    NoLines,
    #[error("parent account type does not match child account type")]
    ParentTypeMismatch,
    #[error("parent has transactions and cannot be used as a parent")]
    ParentHasTransactions,
    #[error("circular parent relationship detected")]
    CircularParent,
    #[error("an account cannot be its own parent")]
    SelfParent,
    #[error("transaction amounts must be positive")]
    NonPositiveAmount,
    #[error("cross-currency line is missing an exchange rate")]
    MissingExchangeRate,
}
