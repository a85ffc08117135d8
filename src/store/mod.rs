//! Persistence collaborator contract and the bundled implementations.
//!
//! The ledger core only assumes atomic batched writes, indexed finders, and a
//! change-notification stream. `MemoryStore` is the single-writer in-memory
//! seat; `JsonStore` adds file durability on top of it.

pub mod json;
pub mod memory;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Account, AuditLogEntry, Journal, Transaction};
use crate::errors::LedgerError;

pub use json::JsonStore;
pub use memory::{MemoryStore, StoreSnapshot};

/// One mutation inside an atomic batch. `Put*` upserts by id, so tombstoning
/// a record is a `Put` with `deleted_at` set.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutAccount(Account),
    PutJournal(Journal),
    PutTransaction(Transaction),
    AppendAudit(AuditLogEntry),
    /// Reserved for the one-time legacy audit-label migration.
    RewriteAuditEntityType { id: Uuid, entity_type: String },
}

/// Ordered set of operations committed as a unit.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Entity tables a batch touched, for derived-view invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityKind {
    Account,
    Journal,
    Transaction,
    AuditLog,
}

/// Emitted once per committed batch.
#[derive(Debug, Clone, Default)]
pub struct ChangeEvent {
    pub entities: BTreeSet<EntityKind>,
    /// Accounts whose balances may have moved.
    pub account_ids: BTreeSet<Uuid>,
}

impl ChangeEvent {
    pub fn from_batch(batch: &WriteBatch) -> Self {
        let mut event = ChangeEvent::default();
        for op in batch.ops() {
            match op {
                WriteOp::PutAccount(account) => {
                    event.entities.insert(EntityKind::Account);
                    event.account_ids.insert(account.id);
                }
                WriteOp::PutJournal(_) => {
                    event.entities.insert(EntityKind::Journal);
                }
                WriteOp::PutTransaction(txn) => {
                    event.entities.insert(EntityKind::Transaction);
                    event.account_ids.insert(txn.account_id);
                }
                WriteOp::AppendAudit(_) | WriteOp::RewriteAuditEntityType { .. } => {
                    event.entities.insert(EntityKind::AuditLog);
                }
            }
        }
        event
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + Send>;

/// Trait that abstracts interaction with the persistence layer.
///
/// Finders ending in a plural return non-deleted records only; tombstoned
/// rows stay in the store and are filtered at query time.
pub trait LedgerStore: Send {
    fn account(&self, id: Uuid) -> Option<Account>;
    /// Non-deleted accounts, ordered by display order then name.
    fn accounts(&self) -> Vec<Account>;
    /// Every account row, tombstoned included.
    fn all_accounts(&self) -> Vec<Account>;

    fn journal(&self, id: Uuid) -> Option<Journal>;
    fn journals(&self) -> Vec<Journal>;

    fn transaction(&self, id: Uuid) -> Option<Transaction>;
    /// Non-deleted lines for an account in replay order.
    fn transactions_for_account(&self, account_id: Uuid) -> Vec<Transaction>;
    fn transactions_for_journal(&self, journal_id: Uuid) -> Vec<Transaction>;
    /// Whether the account has ever recorded a line, tombstoned ones included.
    fn account_has_transactions(&self, account_id: Uuid) -> bool;
    fn latest_transaction_date(&self, account_id: Uuid) -> Option<DateTime<Utc>>;

    fn audit_entries(&self) -> Vec<AuditLogEntry>;

    /// Applies the batch as a unit and emits one change event.
    fn write_atomic(&mut self, batch: WriteBatch) -> Result<(), LedgerError>;
    fn subscribe(&mut self, listener: ChangeListener);
}
