pub mod balance;
pub mod calculus;
pub mod integrity;
pub mod rebuild;
pub mod services;

pub use balance::{AccountBalance, BalanceEngine};
pub use integrity::{IntegrityReport, IntegrityService};
pub use rebuild::RebuildQueue;
pub use services::{AccountService, AuditService, JournalService, WealthService};
