pub mod account;
pub mod audit;
pub mod common;
pub mod journal;
pub mod rate;
pub mod transaction;

pub use account::{Account, AccountType};
pub use audit::{AuditAction, AuditLogEntry};
pub use common::{Identifiable, SoftDeletable};
pub use journal::{Journal, JournalKind, JournalStatus};
pub use rate::ExchangeRate;
pub use transaction::{EntryType, Transaction};
