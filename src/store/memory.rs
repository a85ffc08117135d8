use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Account, AuditLogEntry, Journal, SoftDeletable, Transaction};
use crate::errors::LedgerError;

use super::{ChangeEvent, ChangeListener, LedgerStore, WriteBatch, WriteOp};

pub const SNAPSHOT_SCHEMA_VERSION: u8 = 1;

/// Serializable full-ledger snapshot, also the export surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default = "StoreSnapshot::schema_version_default")]
    pub schema_version: u8,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub journals: Vec<Journal>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub audit_log: Vec<AuditLogEntry>,
    pub exported_at: DateTime<Utc>,
}

impl StoreSnapshot {
    pub fn schema_version_default() -> u8 {
        SNAPSHOT_SCHEMA_VERSION
    }
}

/// In-memory single-writer implementation of the store contract.
#[derive(Default)]
pub struct MemoryStore {
    accounts: HashMap<Uuid, Account>,
    journals: HashMap<Uuid, Journal>,
    transactions: HashMap<Uuid, Transaction>,
    audit_log: Vec<AuditLogEntry>,
    listeners: Vec<ChangeListener>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let mut accounts: Vec<Account> = self.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.created_at);
        let mut journals: Vec<Journal> = self.journals.values().cloned().collect();
        journals.sort_by_key(|j| j.created_at);
        let mut transactions: Vec<Transaction> = self.transactions.values().cloned().collect();
        transactions.sort_by(|a, b| a.replay_key().cmp(&b.replay_key()));
        StoreSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            accounts,
            journals,
            transactions,
            audit_log: self.audit_log.clone(),
            exported_at: Utc::now(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, LedgerError> {
        if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(LedgerError::Persistence(format!(
                "snapshot schema v{} is newer than supported v{}",
                snapshot.schema_version, SNAPSHOT_SCHEMA_VERSION
            )));
        }
        let mut store = Self::new();
        for account in snapshot.accounts {
            store.accounts.insert(account.id, account);
        }
        for journal in snapshot.journals {
            store.journals.insert(journal.id, journal);
        }
        for txn in snapshot.transactions {
            store.transactions.insert(txn.id, txn);
        }
        store.audit_log = snapshot.audit_log;
        Ok(store)
    }

    fn apply(&mut self, batch: &WriteBatch) {
        for op in batch.ops() {
            match op {
                WriteOp::PutAccount(account) => {
                    self.accounts.insert(account.id, account.clone());
                }
                WriteOp::PutJournal(journal) => {
                    self.journals.insert(journal.id, journal.clone());
                }
                WriteOp::PutTransaction(txn) => {
                    self.transactions.insert(txn.id, txn.clone());
                }
                WriteOp::AppendAudit(entry) => {
                    self.audit_log.push(entry.clone());
                }
                WriteOp::RewriteAuditEntityType { id, entity_type } => {
                    if let Some(entry) = self.audit_log.iter_mut().find(|e| e.id == *id) {
                        entry.entity_type = entity_type.clone();
                    }
                }
            }
        }
    }

    fn notify(&self, event: &ChangeEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

impl LedgerStore for MemoryStore {
    fn account(&self, id: Uuid) -> Option<Account> {
        self.accounts.get(&id).cloned()
    }

    fn accounts(&self) -> Vec<Account> {
        let mut out: Vec<Account> = self
            .accounts
            .values()
            .filter(|a| !a.is_deleted())
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        out
    }

    fn all_accounts(&self) -> Vec<Account> {
        let mut out: Vec<Account> = self.accounts.values().cloned().collect();
        out.sort_by_key(|a| a.created_at);
        out
    }

    fn journal(&self, id: Uuid) -> Option<Journal> {
        self.journals.get(&id).cloned()
    }

    fn journals(&self) -> Vec<Journal> {
        let mut out: Vec<Journal> = self
            .journals
            .values()
            .filter(|j| !j.is_deleted())
            .cloned()
            .collect();
        out.sort_by_key(|j| j.date);
        out
    }

    fn transaction(&self, id: Uuid) -> Option<Transaction> {
        self.transactions.get(&id).cloned()
    }

    fn transactions_for_account(&self, account_id: Uuid) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .transactions
            .values()
            .filter(|t| t.account_id == account_id && !t.is_deleted())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.replay_key().cmp(&b.replay_key()));
        out
    }

    fn transactions_for_journal(&self, journal_id: Uuid) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .transactions
            .values()
            .filter(|t| t.journal_id == journal_id && !t.is_deleted())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.replay_key().cmp(&b.replay_key()));
        out
    }

    fn account_has_transactions(&self, account_id: Uuid) -> bool {
        self.transactions
            .values()
            .any(|t| t.account_id == account_id)
    }

    fn latest_transaction_date(&self, account_id: Uuid) -> Option<DateTime<Utc>> {
        self.transactions
            .values()
            .filter(|t| t.account_id == account_id && !t.is_deleted())
            .map(|t| t.date)
            .max()
    }

    fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit_log.clone()
    }

    fn write_atomic(&mut self, batch: WriteBatch) -> Result<(), LedgerError> {
        if batch.is_empty() {
            return Ok(());
        }
        let event = ChangeEvent::from_batch(&batch);
        self.apply(&batch);
        self.notify(&event);
        Ok(())
    }

    fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountType, EntryType};
    use crate::store::EntityKind;
    use std::sync::{Arc, Mutex};

    #[test]
    fn plural_finders_filter_tombstones() {
        let mut store = MemoryStore::new();
        let live = Account::new("Cash", AccountType::Asset, "USD");
        let mut dead = Account::new("Old Wallet", AccountType::Asset, "USD");
        dead.deleted_at = Some(Utc::now());
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutAccount(live.clone()));
        batch.push(WriteOp::PutAccount(dead.clone()));
        store.write_atomic(batch).unwrap();

        assert_eq!(store.accounts().len(), 1);
        assert_eq!(store.all_accounts().len(), 2);
        assert!(store.account(dead.id).is_some());
    }

    #[test]
    fn batch_emits_single_event_with_affected_accounts() {
        let mut store = MemoryStore::new();
        let events: Arc<Mutex<Vec<ChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.subscribe(Box::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }));

        let account = Account::new("Cash", AccountType::Asset, "USD");
        let journal = Journal::new(Utc::now(), "USD");
        let txn = Transaction::new(
            journal.id,
            account.id,
            1_000,
            EntryType::Debit,
            "USD",
            journal.date,
        );
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutAccount(account.clone()));
        batch.push(WriteOp::PutJournal(journal));
        batch.push(WriteOp::PutTransaction(txn));
        store.write_atomic(batch).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1, "one batch, one event");
        assert!(events[0].account_ids.contains(&account.id));
        assert!(events[0].entities.contains(&EntityKind::Transaction));
    }

    #[test]
    fn deleted_lines_still_count_as_recorded_history() {
        let mut store = MemoryStore::new();
        let account = Account::new("Cash", AccountType::Asset, "USD");
        let mut txn = Transaction::new(
            Uuid::new_v4(),
            account.id,
            500,
            EntryType::Debit,
            "USD",
            Utc::now(),
        );
        txn.deleted_at = Some(Utc::now());
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutAccount(account.clone()));
        batch.push(WriteOp::PutTransaction(txn));
        store.write_atomic(batch).unwrap();

        assert!(store.account_has_transactions(account.id));
        assert!(store.transactions_for_account(account.id).is_empty());
        assert!(store.latest_transaction_date(account.id).is_none());
    }

    #[test]
    fn snapshot_round_trip_preserves_tables() {
        let mut store = MemoryStore::new();
        let account = Account::new("Cash", AccountType::Asset, "USD");
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutAccount(account.clone()));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            "account",
            account.id,
            crate::domain::AuditAction::Create,
            None,
            None,
        )));
        store.write_atomic(batch).unwrap();

        let snapshot = store.snapshot();
        let restored = MemoryStore::from_snapshot(snapshot).unwrap();
        assert_eq!(restored.accounts().len(), 1);
        assert_eq!(restored.audit_entries().len(), 1);
    }

    #[test]
    fn rejects_future_snapshot_schema() {
        let mut snapshot = MemoryStore::new().snapshot();
        snapshot.schema_version = SNAPSHOT_SCHEMA_VERSION + 3;
        let result = MemoryStore::from_snapshot(snapshot);
        assert!(matches!(result, Err(LedgerError::Persistence(_))));
    }
}
