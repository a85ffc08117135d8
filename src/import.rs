//! Import adapter contract and the validated import pipeline.
//!
//! Adapters normalize a foreign backup into the ledger's own shape before
//! anything is written; the pipeline then routes every record through the
//! regular account/journal services so imports get the same validation and
//! audit trail as hand-entered data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::rebuild::RebuildQueue;
use crate::core::services::account_service::NewAccount;
use crate::core::services::journal_service::{JournalInput, JournalLineInput};
use crate::core::services::{AccountService, JournalService};
use crate::domain::{AccountType, EntryType};
use crate::errors::LedgerError;
use crate::store::LedgerStore;

/// Account record in normalized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedAccount {
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_balance: Option<i64>,
}

/// One journal line, referencing its account by normalized name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedLine {
    pub account: String,
    pub amount: i64,
    pub entry_type: EntryType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedJournal {
    pub date: DateTime<Utc>,
    pub description: String,
    pub currency: String,
    pub lines: Vec<NormalizedLine>,
}

/// A foreign backup reduced to the ledger's own account/journal shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedBackup {
    #[serde(default)]
    pub accounts: Vec<NormalizedAccount>,
    #[serde(default)]
    pub journals: Vec<NormalizedJournal>,
}

/// Format-specific adapter contract. Implementations live outside the core;
/// their single job is recognizing a payload and normalizing it.
pub trait ImportAdapter {
    fn detect(&self, payload: &str) -> bool;
    fn normalize(&self, payload: &str) -> Result<NormalizedBackup, LedgerError>;
}

/// Adapter for this crate's own normalized JSON backups.
pub struct NativeBackupAdapter;

impl ImportAdapter for NativeBackupAdapter {
    fn detect(&self, payload: &str) -> bool {
        serde_json::from_str::<NormalizedBackup>(payload).is_ok()
    }

    fn normalize(&self, payload: &str) -> Result<NormalizedBackup, LedgerError> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub accounts_created: u64,
    pub journals_created: u64,
    pub transactions_created: u64,
    pub audit_logs_created: u64,
    pub skipped: Vec<String>,
}

impl ImportReport {
    pub fn skipped_count(&self) -> u64 {
        self.skipped.len() as u64
    }
}

pub struct Importer;

impl Importer {
    /// Runs a full import through the validated service path. Records that
    /// fail validation are skipped and reported, never partially written.
    pub fn run(
        store: &mut dyn LedgerStore,
        queue: &mut RebuildQueue,
        adapter: &dyn ImportAdapter,
        payload: &str,
    ) -> Result<ImportReport, LedgerError> {
        if !adapter.detect(payload) {
            return Err(LedgerError::InvalidRef(
                "payload not recognized by import adapter".into(),
            ));
        }
        let backup = adapter.normalize(payload)?;
        let audit_before = store.audit_entries().len() as u64;
        let mut report = ImportReport::default();

        for normalized in backup.accounts {
            if store
                .accounts()
                .iter()
                .any(|existing| existing.name == normalized.name)
            {
                report
                    .skipped
                    .push(format!("account `{}` already exists", normalized.name));
                continue;
            }
            let mut input = NewAccount::new(
                normalized.name.clone(),
                normalized.account_type,
                normalized.currency.clone(),
            );
            input.initial_balance = normalized.initial_balance;
            match AccountService::create(store, queue, input) {
                Ok(_) => report.accounts_created += 1,
                Err(err) => report
                    .skipped
                    .push(format!("account `{}`: {}", normalized.name, err)),
            }
        }

        for normalized in backup.journals {
            match Self::resolve_journal(store, &normalized) {
                Ok(input) => match JournalService::create(store, queue, input) {
                    Ok(journal) => {
                        report.journals_created += 1;
                        report.transactions_created += u64::from(journal.line_count);
                    }
                    Err(err) => report
                        .skipped
                        .push(format!("journal `{}`: {}", normalized.description, err)),
                },
                Err(reason) => report.skipped.push(reason),
            }
        }

        report.audit_logs_created = store.audit_entries().len() as u64 - audit_before;
        tracing::info!(
            accounts = report.accounts_created,
            journals = report.journals_created,
            skipped = report.skipped_count(),
            "import finished"
        );
        Ok(report)
    }

    fn resolve_journal(
        store: &dyn LedgerStore,
        normalized: &NormalizedJournal,
    ) -> Result<JournalInput, String> {
        let accounts = store.accounts();
        let mut lines = Vec::with_capacity(normalized.lines.len());
        for line in &normalized.lines {
            let Some(account) = accounts.iter().find(|a| a.name == line.account) else {
                return Err(format!(
                    "journal `{}`: unknown account `{}`",
                    normalized.description, line.account
                ));
            };
            lines.push(JournalLineInput::new(
                account.id,
                line.amount,
                line.entry_type,
            ));
        }
        Ok(JournalInput {
            date: normalized.date,
            description: normalized.description.clone(),
            currency: normalized.currency.clone(),
            lines,
        })
    }
}
