//! Currency precision helpers and the rate-lookup collaborator.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::domain::ExchangeRate;
use crate::errors::LedgerError;

/// Minor-unit digits for an ISO 4217 code.
pub fn minor_units_for(code: &str) -> u8 {
    match code {
        "JPY" | "KRW" | "VND" => 0,
        "KWD" | "BHD" | "OMR" => 3,
        _ => 2,
    }
}

/// Scales a major-unit value into minor units, rounding half away from zero.
pub fn to_minor(value: f64, code: &str) -> i64 {
    let scale = 10f64.powi(minor_units_for(code) as i32);
    (value * scale).round() as i64
}

/// Renders minor units as a major-unit value for display or conversion.
pub fn to_major(minor: i64, code: &str) -> f64 {
    let scale = 10f64.powi(minor_units_for(code) as i32);
    minor as f64 / scale
}

/// Result of one conversion, carrying the rate used for disclosure.
#[derive(Debug, Clone)]
pub struct Converted {
    pub amount: i64,
    pub rate: f64,
}

/// Currency-rate collaborator: converts minor-unit amounts between codes.
pub trait CurrencyConverter {
    fn convert(
        &self,
        amount: i64,
        from: &str,
        to: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Converted, LedgerError>;
}

const NEAREST_PRIOR_TOLERANCE_DAYS: i64 = 5;

/// Dated rate table with inverse lookup and a nearest-prior tolerance.
#[derive(Debug, Clone, Default)]
pub struct RateBook {
    rates: HashMap<(String, String), BTreeMap<DateTime<Utc>, ExchangeRate>>,
    tolerance_days: i64,
}

impl RateBook {
    pub fn new() -> Self {
        Self {
            rates: HashMap::new(),
            tolerance_days: NEAREST_PRIOR_TOLERANCE_DAYS,
        }
    }

    pub fn with_tolerance_days(mut self, days: i64) -> Self {
        self.tolerance_days = days;
        self
    }

    pub fn add_rate(&mut self, rate: ExchangeRate) {
        let key = (rate.from.clone(), rate.to.clone());
        self.rates
            .entry(key)
            .or_default()
            .insert(rate.effective_date, rate);
    }

    pub fn all_rates(&self) -> Vec<&ExchangeRate> {
        let mut out: Vec<&ExchangeRate> = self.rates.values().flat_map(|s| s.values()).collect();
        out.sort_by_key(|rate| rate.effective_date);
        out
    }

    pub fn lookup(
        &self,
        from: &str,
        to: &str,
        as_of: DateTime<Utc>,
    ) -> Result<f64, LedgerError> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(1.0);
        }
        if let Some(series) = self.rates.get(&(from.to_string(), to.to_string())) {
            return self.lookup_within(series, from, to, as_of);
        }
        if let Some(series) = self.rates.get(&(to.to_string(), from.to_string())) {
            let rate = self.lookup_within(series, to, from, as_of)?;
            return Ok(if rate.abs() < f64::EPSILON {
                0.0
            } else {
                1.0 / rate
            });
        }
        Err(LedgerError::Persistence(format!(
            "exchange rate {} -> {} not found",
            from, to
        )))
    }

    fn lookup_within(
        &self,
        series: &BTreeMap<DateTime<Utc>, ExchangeRate>,
        from: &str,
        to: &str,
        as_of: DateTime<Utc>,
    ) -> Result<f64, LedgerError> {
        if let Some(rate) = series.get(&as_of) {
            return Ok(rate.rate);
        }
        if let Some((near, rate)) = series.range(..=as_of).next_back() {
            if (as_of - *near).num_days() <= self.tolerance_days {
                return Ok(rate.rate);
            }
        }
        Err(LedgerError::Persistence(format!(
            "exchange rate {} -> {} missing on {} (no prior rate within {} days)",
            from, to, as_of, self.tolerance_days
        )))
    }
}

impl CurrencyConverter for RateBook {
    fn convert(
        &self,
        amount: i64,
        from: &str,
        to: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Converted, LedgerError> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let rate = self.lookup(from, to, as_of)?;
        let major = to_major(amount, from) * rate;
        Ok(Converted {
            amount: to_minor(major, to),
            rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn parity_conversion_is_identity() {
        let book = RateBook::new();
        let converted = book.convert(12_345, "USD", "usd", Some(day(1))).unwrap();
        assert_eq!(converted.amount, 12_345);
        assert_eq!(converted.rate, 1.0);
    }

    #[test]
    fn converts_through_inverse_pair() {
        let mut book = RateBook::new();
        book.add_rate(ExchangeRate::new("EUR", "USD", 1.25, day(1)));
        let converted = book.convert(10_000, "USD", "EUR", Some(day(1))).unwrap();
        assert_eq!(converted.amount, 8_000);
    }

    #[test]
    fn falls_back_to_nearest_prior_within_tolerance() {
        let mut book = RateBook::new();
        book.add_rate(ExchangeRate::new("EUR", "USD", 1.10, day(1)));
        let converted = book.convert(1_000, "EUR", "USD", Some(day(4))).unwrap();
        assert_eq!(converted.amount, 1_100);

        let err = book.convert(1_000, "EUR", "USD", Some(day(20)));
        assert!(err.is_err());
    }

    #[test]
    fn zero_decimal_currencies_round_to_whole_units() {
        let mut book = RateBook::new();
        book.add_rate(ExchangeRate::new("USD", "JPY", 150.0, day(1)));
        let converted = book.convert(1_050, "USD", "JPY", Some(day(1))).unwrap();
        assert_eq!(converted.amount, 1_575);
    }
}
