//! Account lifecycle, hierarchy rules, and balance corrections.

use chrono::Utc;
use uuid::Uuid;

use crate::core::balance::BalanceEngine;
use crate::core::calculus::impact_multiplier;
use crate::core::rebuild::RebuildQueue;
use crate::domain::{
    Account, AccountType, AuditAction, AuditLogEntry, EntryType, Journal, SoftDeletable,
};
use crate::errors::{LedgerError, ValidationError};
use crate::store::{LedgerStore, WriteBatch, WriteOp};

use super::audit_service::ENTITY_ACCOUNT;
use super::journal_service::{JournalInput, JournalLineInput, JournalService};
use super::{audit_snapshot, ServiceResult};

pub const OPENING_BALANCES_PREFIX: &str = "Opening Balances";
pub const BALANCE_CORRECTION_PREFIX: &str = "Balance Correction";

/// Request to create an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
    pub parent_id: Option<Uuid>,
    pub icon: Option<String>,
    pub display_order: u32,
    /// Optional starting balance in minor units, posted as an opening journal
    /// against the system "Opening Balances" equity account.
    pub initial_balance: Option<i64>,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, account_type: AccountType, currency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_type,
            currency: currency.into(),
            parent_id: None,
            icon: None,
            display_order: 0,
            initial_balance: None,
        }
    }
}

/// Partial account update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    /// `Some(None)` detaches from the current parent.
    pub parent_id: Option<Option<Uuid>>,
    pub icon: Option<Option<String>>,
    pub display_order: Option<u32>,
}

pub struct AccountService;

impl AccountService {
    /// Creates the account, its audit entry, and (when an initial balance is
    /// given) the system counter account and opening journal, all committed
    /// as one atomic batch so no partial create is ever observable.
    pub fn create(
        store: &mut dyn LedgerStore,
        queue: &mut RebuildQueue,
        input: NewAccount,
    ) -> ServiceResult<Account> {
        let mut account = Account::new(input.name, input.account_type, input.currency);
        account.icon = input.icon;
        account.display_order = input.display_order;
        if let Some(parent_id) = input.parent_id {
            Self::check_parent(store, account.id, account.account_type, parent_id)?;
            account.parent_id = Some(parent_id);
        }

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutAccount(account.clone()));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_ACCOUNT,
            account.id,
            AuditAction::Create,
            None,
            audit_snapshot(&account),
        )));
        if let Some(amount) = input.initial_balance.filter(|a| *a != 0) {
            Self::stage_counter_journal(
                store,
                queue,
                &account,
                amount,
                OPENING_BALANCES_PREFIX,
                format!("Opening balance for {}", account.name),
                &mut batch,
            )?;
        }
        store.write_atomic(batch)?;
        tracing::info!(account_id = %account.id, name = %account.name, "account created");
        Ok(account)
    }

    /// Applies a partial update. Unspecified fields are preserved; changing
    /// the account type queues a full running-balance rebuild because the
    /// debit/credit multiplier semantics changed.
    pub fn update(
        store: &mut dyn LedgerStore,
        queue: &mut RebuildQueue,
        id: Uuid,
        changes: AccountUpdate,
    ) -> ServiceResult<Account> {
        let existing = store
            .account(id)
            .filter(|a| !a.is_deleted())
            .ok_or(LedgerError::AccountNotFound(id))?;
        let mut account = existing.clone();

        if let Some(name) = changes.name {
            account.name = name;
        }
        if let Some(account_type) = changes.account_type {
            account.account_type = account_type;
        }
        if let Some(icon) = changes.icon {
            account.icon = icon;
        }
        if let Some(order) = changes.display_order {
            account.display_order = order;
        }
        if let Some(parent_change) = changes.parent_id {
            if let Some(parent_id) = parent_change {
                Self::check_parent(store, id, account.account_type, parent_id)?;
            }
            account.parent_id = parent_change;
        } else if account.account_type != existing.account_type {
            // Retype with an existing parent still has to keep types aligned.
            if let Some(parent_id) = account.parent_id {
                Self::check_parent(store, id, account.account_type, parent_id)?;
            }
        }
        if account.account_type != existing.account_type {
            let has_mismatched_child = store
                .accounts()
                .iter()
                .any(|a| a.parent_id == Some(id) && a.account_type != account.account_type);
            if has_mismatched_child {
                return Err(ValidationError::ParentTypeMismatch.into());
            }
        }
        account.touch();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutAccount(account.clone()));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_ACCOUNT,
            id,
            AuditAction::Update,
            audit_snapshot(&existing),
            audit_snapshot(&account),
        )));
        store.write_atomic(batch)?;

        if account.account_type != existing.account_type {
            queue.enqueue_full(id);
            tracing::info!(account_id = %id, "account retyped, full rebuild queued");
        }
        Ok(account)
    }

    pub fn delete(store: &mut dyn LedgerStore, id: Uuid) -> ServiceResult<()> {
        let existing = store
            .account(id)
            .filter(|a| !a.is_deleted())
            .ok_or(LedgerError::AccountNotFound(id))?;
        let mut account = existing.clone();
        account.deleted_at = Some(Utc::now());
        account.touch();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutAccount(account));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_ACCOUNT,
            id,
            AuditAction::Delete,
            audit_snapshot(&existing),
            None,
        )));
        store.write_atomic(batch)?;
        tracing::info!(account_id = %id, "account soft-deleted");
        Ok(())
    }

    pub fn recover(store: &mut dyn LedgerStore, id: Uuid) -> ServiceResult<Account> {
        let existing = store
            .account(id)
            .filter(|a| a.is_deleted())
            .ok_or(LedgerError::AccountNotFound(id))?;
        let mut account = existing.clone();
        account.deleted_at = None;
        account.touch();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutAccount(account.clone()));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_ACCOUNT,
            id,
            AuditAction::Update,
            audit_snapshot(&existing),
            audit_snapshot(&account),
        )));
        store.write_atomic(batch)?;
        Ok(account)
    }

    /// Rewrites display order to match the given id sequence.
    pub fn reorder(store: &mut dyn LedgerStore, ordered_ids: &[Uuid]) -> ServiceResult<()> {
        let mut batch = WriteBatch::new();
        for (index, id) in ordered_ids.iter().enumerate() {
            let Some(existing) = store.account(*id).filter(|a| !a.is_deleted()) else {
                continue;
            };
            if existing.display_order == index as u32 {
                continue;
            }
            let mut account = existing.clone();
            account.display_order = index as u32;
            account.touch();
            batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
                ENTITY_ACCOUNT,
                *id,
                AuditAction::Update,
                audit_snapshot(&existing),
                audit_snapshot(&account),
            )));
            batch.push(WriteOp::PutAccount(account));
        }
        store.write_atomic(batch)?;
        Ok(())
    }

    /// Moves the account's replayed balance to `target` by posting a
    /// correction journal against the system "Balance Correction" account.
    /// A zero discrepancy writes nothing; the result reports what happened.
    pub fn adjust_balance(
        store: &mut dyn LedgerStore,
        queue: &mut RebuildQueue,
        account_id: Uuid,
        target: i64,
    ) -> ServiceResult<Option<Journal>> {
        let account = store
            .account(account_id)
            .filter(|a| !a.is_deleted())
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let current = BalanceEngine::balance_of(store, account_id).balance;
        let discrepancy = target - current;
        if discrepancy == 0 {
            return Ok(None);
        }
        tracing::warn!(
            account_id = %account_id,
            current,
            target,
            discrepancy,
            "posting balance correction"
        );
        let mut batch = WriteBatch::new();
        let journal = Self::stage_counter_journal(
            store,
            queue,
            &account,
            discrepancy,
            BALANCE_CORRECTION_PREFIX,
            format!("Balance correction for {}", account.name),
            &mut batch,
        )?;
        store.write_atomic(batch)?;
        Ok(Some(journal))
    }

    /// Resolves the per-currency system equity account, staging its creation
    /// into the batch when it does not exist yet.
    fn stage_system_account(
        store: &dyn LedgerStore,
        prefix: &str,
        currency: &str,
        batch: &mut WriteBatch,
    ) -> Account {
        let name = format!("{} ({})", prefix, currency.to_uppercase());
        if let Some(account) = store.accounts().into_iter().find(|a| a.name == name) {
            return account;
        }
        let account = Account::new(name, AccountType::Equity, currency);
        batch.push(WriteOp::PutAccount(account.clone()));
        batch.push(WriteOp::AppendAudit(AuditLogEntry::new(
            ENTITY_ACCOUNT,
            account.id,
            AuditAction::Create,
            None,
            audit_snapshot(&account),
        )));
        account
    }

    /// Stages a two-line journal that moves `account` by the signed `delta`,
    /// with the named system account as the counter-leg, into the caller's
    /// batch. The direction is picked through the impact multiplier so the
    /// account always moves the requested way.
    fn stage_counter_journal(
        store: &dyn LedgerStore,
        queue: &mut RebuildQueue,
        account: &Account,
        delta: i64,
        counter_prefix: &str,
        description: String,
        batch: &mut WriteBatch,
    ) -> ServiceResult<Journal> {
        let counter = Self::stage_system_account(store, counter_prefix, &account.currency, batch);
        let sign = delta.signum();
        let entry_type = [EntryType::Debit, EntryType::Credit]
            .into_iter()
            .find(|entry| impact_multiplier(account.account_type, *entry) == sign)
            .unwrap_or(EntryType::Debit);
        let input = JournalInput {
            date: Utc::now(),
            description,
            currency: account.currency.clone(),
            lines: vec![
                JournalLineInput::new(account.id, delta.abs(), entry_type),
                JournalLineInput::new(counter.id, delta.abs(), entry_type.opposite()),
            ],
        };
        let staged = [account.clone(), counter];
        JournalService::stage(store, queue, input, &staged, batch)
    }

    /// Hierarchy rules: no self-parenting, the parent must exist, share the
    /// child's type, have no recorded transactions, and not descend from the
    /// child.
    fn check_parent(
        store: &dyn LedgerStore,
        child_id: Uuid,
        child_type: AccountType,
        parent_id: Uuid,
    ) -> ServiceResult<()> {
        if parent_id == child_id {
            return Err(ValidationError::SelfParent.into());
        }
        let parent = store
            .account(parent_id)
            .filter(|a| !a.is_deleted())
            .ok_or(LedgerError::AccountNotFound(parent_id))?;
        if parent.account_type != child_type {
            return Err(ValidationError::ParentTypeMismatch.into());
        }
        if store.account_has_transactions(parent_id) {
            return Err(ValidationError::ParentHasTransactions.into());
        }
        // Walk the candidate parent's ancestor chain looking for the child.
        let mut cursor = parent.parent_id;
        let mut hops = 0usize;
        while let Some(ancestor) = cursor {
            if ancestor == child_id {
                return Err(ValidationError::CircularParent.into());
            }
            hops += 1;
            if hops > 256 {
                return Err(ValidationError::CircularParent.into());
            }
            cursor = store.account(ancestor).and_then(|a| a.parent_id);
        }
        Ok(())
    }
}
