//! Atomic journal lifecycle: create, rewrite, soft-delete, reverse.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::balance::BalanceEngine;
use crate::core::calculus::{
    apply_delta, is_backdated, line_amount_in, validate_distinct_accounts, validate_journal,
};
use crate::core::rebuild::RebuildQueue;
use crate::domain::{
    Account, AccountType, AuditAction, AuditLogEntry, EntryType, Journal, JournalKind,
    JournalStatus, SoftDeletable, Transaction,
};
use crate::errors::{LedgerError, ValidationError};
use crate::store::{LedgerStore, WriteBatch, WriteOp};

use super::audit_service::{ENTITY_JOURNAL, ENTITY_TRANSACTION};
use super::{audit_snapshot, ServiceResult};

/// One requested ledger line.
#[derive(Debug, Clone)]
pub struct JournalLineInput {
    pub account_id: Uuid,
    /// Positive, in minor units of `currency` (journal currency if omitted).
    pub amount: i64,
    pub entry_type: EntryType,
    pub currency: Option<String>,
    pub exchange_rate: Option<f64>,
    pub notes: Option<String>,
}

impl JournalLineInput {
    pub fn new(account_id: Uuid, amount: i64, entry_type: EntryType) -> Self {
        Self {
            account_id,
            amount,
            entry_type,
            currency: None,
            exchange_rate: None,
            notes: None,
        }
    }
}

/// A full journal request: the event plus all of its lines.
#[derive(Debug, Clone)]
pub struct JournalInput {
    pub date: DateTime<Utc>,
    pub description: String,
    pub currency: String,
    pub lines: Vec<JournalLineInput>,
}

pub struct JournalService;

impl JournalService {
    /// Validates and posts a new journal with its lines, audit entries, and
    /// any required rebuild jobs, all in one committed batch. Validation
    /// failure returns a typed error and performs no write.
    pub fn create(
        store: &mut dyn LedgerStore,
        queue: &mut RebuildQueue,
        input: JournalInput,
    ) -> ServiceResult<Journal> {
        let mut batch = WriteBatch::new();
        let journal = Self::stage(store, queue, input, &[], &mut batch)?;
        store.write_atomic(batch)?;
        tracing::info!(journal_id = %journal.id, kind = ?journal.kind, "journal posted");
        Ok(journal)
    }

    /// Validates the request and pushes the journal, its lines, and their
    /// audit entries into the caller's batch without committing, so a caller
    /// can make the journal part of a larger atomic write. `staged_accounts`
    /// are accounts that live in the same batch and are not yet visible in
    /// the store.
    pub(crate) fn stage(
        store: &dyn LedgerStore,
        queue: &mut RebuildQueue,
        input: JournalInput,
        staged_accounts: &[Account],
        batch: &mut WriteBatch,
    ) -> ServiceResult<Journal> {
        let (mut journal, lines, accounts) = Self::validate(store, &input, staged_accounts)?;
        journal.kind = derive_kind(&lines, &accounts);
        Self::stage_lines(store, queue, &journal, lines, &accounts, batch);
        batch.push(WriteOp::PutJournal(journal.clone()));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_JOURNAL,
            journal.id,
            AuditAction::Create,
            None,
            audit_snapshot(&journal),
        )));
        Ok(journal)
    }

    /// Replaces a journal's lines wholesale: old lines are tombstoned, new
    /// ones written, denormalized fields recomputed, and every account whose
    /// history changed gets a rebuild from its earliest affected date.
    pub fn update_with_transactions(
        store: &mut dyn LedgerStore,
        queue: &mut RebuildQueue,
        id: Uuid,
        input: JournalInput,
    ) -> ServiceResult<Journal> {
        let existing = store
            .journal(id)
            .filter(|j| !j.is_deleted())
            .ok_or(LedgerError::JournalNotFound(id))?;
        let (staged, lines, accounts) = Self::validate(store, &input, &[])?;

        let mut journal = existing.clone();
        journal.date = input.date;
        journal.description = staged.description;
        journal.currency = staged.currency;
        journal.total_amount = staged.total_amount;
        journal.line_count = staged.line_count;
        journal.kind = derive_kind(&lines, &accounts);
        journal.touch();

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        for mut old in store.transactions_for_journal(id) {
            queue.enqueue(old.account_id, old.date);
            old.deleted_at = Some(now);
            batch.push(WriteOp::PutTransaction(old));
        }
        let lines: Vec<Transaction> = lines
            .into_iter()
            .map(|mut line| {
                line.journal_id = id;
                line
            })
            .collect();
        Self::stage_lines(store, queue, &journal, lines, &accounts, &mut batch);
        batch.push(WriteOp::PutJournal(journal.clone()));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_JOURNAL,
            id,
            AuditAction::Update,
            audit_snapshot(&existing),
            audit_snapshot(&journal),
        )));
        store.write_atomic(batch)?;
        tracing::info!(journal_id = %id, "journal rewritten");
        Ok(journal)
    }

    /// Soft-deletes the journal and its lines, enqueueing rebuilds from each
    /// account's earliest removed line.
    pub fn delete(
        store: &mut dyn LedgerStore,
        queue: &mut RebuildQueue,
        id: Uuid,
    ) -> ServiceResult<()> {
        let journal = store
            .journal(id)
            .filter(|j| !j.is_deleted())
            .ok_or(LedgerError::JournalNotFound(id))?;
        let now = Utc::now();
        let mut tombstoned = journal.clone();
        tombstoned.deleted_at = Some(now);
        tombstoned.touch();

        let mut batch = WriteBatch::new();
        for mut line in store.transactions_for_journal(id) {
            queue.enqueue(line.account_id, line.date);
            line.deleted_at = Some(now);
            batch.push(WriteOp::PutTransaction(line));
        }
        batch.push(WriteOp::PutJournal(tombstoned));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_JOURNAL,
            id,
            AuditAction::Delete,
            audit_snapshot(&journal),
            None,
        )));
        store.write_atomic(batch)?;
        tracing::info!(journal_id = %id, "journal soft-deleted");
        Ok(())
    }

    /// Posts a mirror journal (debits and credits swapped), links the pair,
    /// and marks the original as reversed.
    pub fn reverse(
        store: &mut dyn LedgerStore,
        queue: &mut RebuildQueue,
        id: Uuid,
        date: DateTime<Utc>,
    ) -> ServiceResult<Journal> {
        let original = store
            .journal(id)
            .filter(|j| !j.is_deleted())
            .ok_or(LedgerError::JournalNotFound(id))?;
        let original_lines = store.transactions_for_journal(id);

        let lines = original_lines
            .iter()
            .map(|line| JournalLineInput {
                account_id: line.account_id,
                amount: line.amount,
                entry_type: line.entry_type.opposite(),
                currency: Some(line.currency.clone()),
                exchange_rate: line.exchange_rate,
                notes: None,
            })
            .collect();
        let description = format!(
            "Reversal of {}",
            original.description.as_deref().unwrap_or("journal")
        );
        let created = Self::create(
            store,
            queue,
            JournalInput {
                date,
                description,
                currency: original.currency.clone(),
                lines,
            },
        )?;
        let mut reversal = created.clone();
        reversal.reversal_of = Some(original.id);
        reversal.touch();

        let mut reversed = original.clone();
        reversed.status = JournalStatus::Reversed;
        reversed.reversed_by = Some(reversal.id);
        reversed.touch();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutJournal(reversal.clone()));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_JOURNAL,
            reversal.id,
            AuditAction::Update,
            audit_snapshot(&created),
            audit_snapshot(&reversal),
        )));
        batch.push(WriteOp::PutJournal(reversed.clone()));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_JOURNAL,
            original.id,
            AuditAction::Update,
            audit_snapshot(&original),
            audit_snapshot(&reversed),
        )));
        store.write_atomic(batch)?;
        Ok(reversal)
    }

    /// Runs the accounting calculus checks and stages a journal shell plus
    /// its lines; touches nothing in the store. Line accounts resolve from
    /// `staged_accounts` first, then the store.
    fn validate(
        store: &dyn LedgerStore,
        input: &JournalInput,
        staged_accounts: &[Account],
    ) -> ServiceResult<(Journal, Vec<Transaction>, HashMap<Uuid, Account>)> {
        if input.description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription.into());
        }
        if input.lines.is_empty() {
            return Err(ValidationError::NoLines.into());
        }
        if input.lines.iter().any(|line| line.amount <= 0) {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        let account_ids: Vec<Uuid> = input.lines.iter().map(|line| line.account_id).collect();
        if !validate_distinct_accounts(&account_ids) {
            return Err(ValidationError::TooFewAccounts.into());
        }

        let mut accounts = HashMap::new();
        for id in account_ids.iter().collect::<HashSet<_>>() {
            let account = staged_accounts
                .iter()
                .find(|a| a.id == *id)
                .cloned()
                .or_else(|| store.account(*id))
                .filter(|a| !a.is_deleted())
                .ok_or(LedgerError::AccountNotFound(*id))?;
            accounts.insert(*id, account);
        }

        let mut journal = Journal::new(input.date, input.currency.clone());
        journal.description = Some(input.description.trim().to_string());

        let lines: Vec<Transaction> = input
            .lines
            .iter()
            .map(|line| {
                let mut txn = Transaction::new(
                    journal.id,
                    line.account_id,
                    line.amount,
                    line.entry_type,
                    line.currency.clone().unwrap_or_else(|| journal.currency.clone()),
                    input.date,
                );
                txn.exchange_rate = line.exchange_rate;
                txn.notes = line.notes.clone();
                txn
            })
            .collect();

        let check = validate_journal(&lines, &journal.currency)?;
        if !check.is_valid() {
            return Err(ValidationError::UnbalancedJournal {
                imbalance: check.imbalance,
            }
            .into());
        }

        journal.total_amount = lines
            .iter()
            .filter(|line| line.entry_type == EntryType::Debit)
            .map(|line| line_amount_in(&journal.currency, line))
            .sum::<Result<i64, _>>()?;
        journal.line_count = lines.len() as u32;
        Ok((journal, lines, accounts))
    }

    /// Pushes lines into the batch, caching running balances inline where the
    /// entry extends the account's history and queueing rebuilds where it
    /// lands before existing entries.
    fn stage_lines(
        store: &dyn LedgerStore,
        queue: &mut RebuildQueue,
        journal: &Journal,
        lines: Vec<Transaction>,
        accounts: &HashMap<Uuid, Account>,
        batch: &mut WriteBatch,
    ) {
        let mut appended: HashMap<Uuid, i64> = HashMap::new();
        for mut line in lines {
            let account = &accounts[&line.account_id];
            let latest = store.latest_transaction_date(line.account_id);
            if is_backdated(journal.date, latest) {
                queue.enqueue(line.account_id, journal.date);
            } else {
                let seed = appended
                    .get(&line.account_id)
                    .copied()
                    .unwrap_or_else(|| BalanceEngine::balance_of(store, line.account_id).balance);
                let next = apply_delta(seed, line.amount, account.account_type, line.entry_type);
                line.running_balance = Some(next);
                appended.insert(line.account_id, next);
            }
            batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
                ENTITY_TRANSACTION,
                line.id,
                AuditAction::Create,
                None,
                audit_snapshot(&line),
            )));
            batch.push(WriteOp::PutTransaction(line));
        }
    }
}

/// Display classification from the account types a journal touches.
fn derive_kind(lines: &[Transaction], accounts: &HashMap<Uuid, Account>) -> JournalKind {
    let types: HashSet<AccountType> = lines
        .iter()
        .filter_map(|line| accounts.get(&line.account_id))
        .map(|account| account.account_type)
        .collect();
    if types.contains(&AccountType::Expense) {
        JournalKind::Expense
    } else if types.contains(&AccountType::Income) {
        JournalKind::Income
    } else if types
        .iter()
        .all(|t| matches!(t, AccountType::Asset | AccountType::Liability))
    {
        JournalKind::Transfer
    } else {
        JournalKind::Other
    }
}
