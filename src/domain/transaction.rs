use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{Identifiable, SoftDeletable};

/// A single ledger line inside a journal.
///
/// Amounts are always stored positive, in minor currency units; the line's
/// [`EntryType`] together with the owning account's type decides the sign of
/// the balance movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub account_id: Uuid,
    pub amount: i64,
    pub entry_type: EntryType,
    pub currency: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Rate into the journal currency, for lines denominated differently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<f64>,
    /// Cached balance of the account immediately after this line. Derived
    /// only: the source of truth is always a full replay in date order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_balance: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        journal_id: Uuid,
        account_id: Uuid,
        amount: i64,
        entry_type: EntryType,
        currency: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            journal_id,
            account_id,
            amount,
            entry_type,
            currency: currency.into().to_uppercase(),
            date,
            notes: None,
            exchange_rate: None,
            running_balance: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    /// Stable replay ordering: date first, then insertion time, then id.
    pub fn replay_key(&self) -> (DateTime<Utc>, DateTime<Utc>, Uuid) {
        (self.date, self.created_at, self.id)
    }
}

impl Identifiable for Transaction {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl SoftDeletable for Transaction {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// The two double-entry line types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn opposite(&self) -> EntryType {
        match self {
            EntryType::Debit => EntryType::Credit,
            EntryType::Credit => EntryType::Debit,
        }
    }
}
