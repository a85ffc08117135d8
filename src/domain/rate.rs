use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable historical exchange-rate record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeRate {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub effective_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ExchangeRate {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        rate: f64,
        effective_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.into().to_uppercase(),
            to: to.into().to_uppercase(),
            rate,
            effective_date,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
