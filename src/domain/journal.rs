use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{Identifiable, SoftDeletable};

/// An atomic, balanced group of transaction lines for one economic event.
///
/// `total_amount` and `line_count` are denormalized from the lines and kept
/// current by the journal service; they never feed back into balance math.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Journal {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO 4217 code; line amounts are validated against this currency.
    pub currency: String,
    pub status: JournalStatus,
    /// Set on a reversing journal, pointing back at the journal it undoes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reversal_of: Option<Uuid>,
    /// Set on a reversed journal, pointing at the journal that undid it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reversed_by: Option<Uuid>,
    /// Sum of debit amounts in minor units.
    pub total_amount: i64,
    pub line_count: u32,
    pub kind: JournalKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Journal {
    pub fn new(date: DateTime<Utc>, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            date,
            description: None,
            currency: currency.into().to_uppercase(),
            status: JournalStatus::Posted,
            reversal_of: None,
            reversed_by: None,
            total_amount: 0,
            line_count: 0,
            kind: JournalKind::Other,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Identifiable for Journal {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl SoftDeletable for Journal {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JournalStatus {
    Posted,
    Reversed,
}

/// Display classification derived from the account types a journal touches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JournalKind {
    Income,
    Expense,
    Transfer,
    Other,
}
