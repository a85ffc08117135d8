use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Account, AuditLogEntry, Journal, Transaction};
use crate::errors::LedgerError;

use super::{ChangeListener, LedgerStore, MemoryStore, StoreSnapshot, WriteBatch};

const LEDGER_FILE: &str = "ledger.json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// File-backed store: an in-memory table set flushed to a JSON snapshot with
/// tmp-then-rename writes after every committed batch.
pub struct JsonStore {
    inner: MemoryStore,
    ledger_file: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonStore {
    /// Opens (or creates) the store rooted at `root`; `None` uses the
    /// platform data directory.
    pub fn open(root: Option<PathBuf>, retention: Option<usize>) -> Result<Self, LedgerError> {
        let root = root.unwrap_or_else(default_base_dir);
        ensure_dir(&root)?;
        let backups_dir = root.join("backups");
        ensure_dir(&backups_dir)?;
        let ledger_file = root.join(LEDGER_FILE);
        let inner = if ledger_file.exists() {
            let data = fs::read_to_string(&ledger_file)?;
            let snapshot: StoreSnapshot = serde_json::from_str(&data)?;
            MemoryStore::from_snapshot(snapshot)?
        } else {
            MemoryStore::new()
        };
        Ok(Self {
            inner,
            ledger_file,
            backups_dir,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
        })
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_file
    }

    /// Exports the current state; this doubles as the versioned export
    /// snapshot surface.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }

    pub fn backup(&self, note: Option<&str>) -> Result<PathBuf, LedgerError> {
        ensure_dir(&self.backups_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut name = format!("ledger_{timestamp}");
        if let Some(label) = sanitize_note(note) {
            name.push('_');
            name.push_str(&label);
        }
        name.push_str(".json");
        let path = self.backups_dir.join(&name);
        let json = serde_json::to_string_pretty(&self.inner.snapshot())?;
        write_atomic_file(&path, &json)?;
        self.prune_backups()?;
        Ok(path)
    }

    pub fn list_backups(&self) -> Result<Vec<PathBuf>, LedgerError> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(&self.backups_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        entries.sort();
        Ok(entries)
    }

    pub fn restore_backup(&mut self, backup: &Path) -> Result<(), LedgerError> {
        let data = fs::read_to_string(backup)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&data)?;
        self.inner = MemoryStore::from_snapshot(snapshot)?;
        self.persist()
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(&self.inner.snapshot())?;
        write_atomic_file(&self.ledger_file, &json)
    }

    fn prune_backups(&self) -> Result<(), LedgerError> {
        let mut backups = self.list_backups()?;
        while backups.len() > self.retention {
            let oldest = backups.remove(0);
            fs::remove_file(oldest)?;
        }
        Ok(())
    }
}

impl LedgerStore for JsonStore {
    fn account(&self, id: Uuid) -> Option<Account> {
        self.inner.account(id)
    }

    fn accounts(&self) -> Vec<Account> {
        self.inner.accounts()
    }

    fn all_accounts(&self) -> Vec<Account> {
        self.inner.all_accounts()
    }

    fn journal(&self, id: Uuid) -> Option<Journal> {
        self.inner.journal(id)
    }

    fn journals(&self) -> Vec<Journal> {
        self.inner.journals()
    }

    fn transaction(&self, id: Uuid) -> Option<Transaction> {
        self.inner.transaction(id)
    }

    fn transactions_for_account(&self, account_id: Uuid) -> Vec<Transaction> {
        self.inner.transactions_for_account(account_id)
    }

    fn transactions_for_journal(&self, journal_id: Uuid) -> Vec<Transaction> {
        self.inner.transactions_for_journal(journal_id)
    }

    fn account_has_transactions(&self, account_id: Uuid) -> bool {
        self.inner.account_has_transactions(account_id)
    }

    fn latest_transaction_date(&self, account_id: Uuid) -> Option<DateTime<Utc>> {
        self.inner.latest_transaction_date(account_id)
    }

    fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.inner.audit_entries()
    }

    fn write_atomic(&mut self, batch: WriteBatch) -> Result<(), LedgerError> {
        self.inner.write_atomic(batch)?;
        self.persist()
    }

    fn subscribe(&mut self, listener: ChangeListener) {
        self.inner.subscribe(listener);
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledger_core")
}

fn ensure_dir(path: &Path) -> Result<(), LedgerError> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

fn write_atomic_file(path: &Path, contents: &str) -> Result<(), LedgerError> {
    let tmp = path.with_extension(TMP_SUFFIX);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn sanitize_note(note: Option<&str>) -> Option<String> {
    let note = note?.trim();
    if note.is_empty() {
        return None;
    }
    let cleaned: String = note
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    Some(cleaned.trim_matches('-').to_string())
}
