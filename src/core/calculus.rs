//! Pure, stateless accounting calculus.
//!
//! Everything here is deterministic and side-effect free: debit/credit
//! impact, balance deltas, journal balance validation, backdate detection,
//! and the two-line journal builder.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::currency::minor_units_for;
use crate::domain::{Account, AccountType, EntryType, Journal, JournalKind, Transaction};
use crate::errors::ValidationError;

/// Signed effect of a line on its account's balance.
///
/// Debit increases asset/expense; credit increases liability/equity/income.
pub fn impact_multiplier(account_type: AccountType, entry_type: EntryType) -> i64 {
    let debit_increases = matches!(account_type, AccountType::Asset | AccountType::Expense);
    match entry_type {
        EntryType::Debit if debit_increases => 1,
        EntryType::Credit if !debit_increases => 1,
        _ => -1,
    }
}

/// Applies one line's signed delta to a running balance in minor units.
pub fn apply_delta(
    current: i64,
    amount: i64,
    account_type: AccountType,
    entry_type: EntryType,
) -> i64 {
    current + amount * impact_multiplier(account_type, entry_type)
}

/// Converts a line amount into the journal's currency in minor units,
/// rounding at the journal currency's precision. A line denominated in a
/// different currency must carry its own rate.
pub fn line_amount_in(journal_currency: &str, line: &Transaction) -> Result<i64, ValidationError> {
    if line.currency.eq_ignore_ascii_case(journal_currency) {
        return Ok(line.amount);
    }
    let Some(rate) = line.exchange_rate else {
        return Err(ValidationError::MissingExchangeRate);
    };
    let from_scale = 10f64.powi(minor_units_for(&line.currency) as i32);
    let to_scale = 10f64.powi(minor_units_for(journal_currency) as i32);
    Ok(((line.amount as f64 / from_scale) * rate * to_scale).round() as i64)
}

/// Outcome of balance validation over a journal's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalCheck {
    /// Σ debit − Σ credit, in journal-currency minor units.
    pub imbalance: i64,
}

impl JournalCheck {
    /// Valid when debits and credits agree to within the currency's smallest
    /// unit; after per-line rounding that means an imbalance of zero.
    pub fn is_valid(&self) -> bool {
        self.imbalance == 0
    }
}

/// Sums debit against credit lines in the journal currency.
pub fn validate_journal(
    lines: &[Transaction],
    journal_currency: &str,
) -> Result<JournalCheck, ValidationError> {
    let mut imbalance = 0i64;
    for line in lines {
        let amount = line_amount_in(journal_currency, line)?;
        match line.entry_type {
            EntryType::Debit => imbalance += amount,
            EntryType::Credit => imbalance -= amount,
        }
    }
    Ok(JournalCheck { imbalance })
}

/// A journal must touch at least two distinct accounts.
pub fn validate_distinct_accounts(account_ids: &[Uuid]) -> bool {
    let distinct: HashSet<&Uuid> = account_ids.iter().filter(|id| !id.is_nil()).collect();
    distinct.len() >= 2
}

/// Whether a new entry lands before the account's latest known entry.
pub fn is_backdated(new_date: DateTime<Utc>, latest_known: Option<DateTime<Utc>>) -> bool {
    matches!(latest_known, Some(latest) if new_date < latest)
}

/// Builds a balanced two-line journal for the common single-amount flows.
///
/// The destination always receives the debit and the source the credit:
/// expense (asset → expense), income (income → asset), and transfers all
/// share that shape. The journal is denominated in the source currency.
pub fn build_simple_journal(
    kind: JournalKind,
    amount: i64,
    source: &Account,
    destination: &Account,
    description: impl Into<String>,
    date: DateTime<Utc>,
) -> (Journal, Vec<Transaction>) {
    let mut journal = Journal::new(date, source.currency.clone());
    journal.description = Some(description.into());
    journal.kind = kind;
    journal.total_amount = amount;
    journal.line_count = 2;

    let debit = Transaction::new(
        journal.id,
        destination.id,
        amount,
        EntryType::Debit,
        destination.currency.clone(),
        date,
    );
    let credit = Transaction::new(
        journal.id,
        source.id,
        amount,
        EntryType::Credit,
        source.currency.clone(),
        date,
    );
    (journal, vec![debit, credit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap()
    }

    #[test]
    fn multiplier_covers_all_type_pairs() {
        assert_eq!(impact_multiplier(AccountType::Asset, EntryType::Debit), 1);
        assert_eq!(impact_multiplier(AccountType::Asset, EntryType::Credit), -1);
        assert_eq!(impact_multiplier(AccountType::Expense, EntryType::Debit), 1);
        assert_eq!(
            impact_multiplier(AccountType::Expense, EntryType::Credit),
            -1
        );
        assert_eq!(
            impact_multiplier(AccountType::Liability, EntryType::Credit),
            1
        );
        assert_eq!(
            impact_multiplier(AccountType::Liability, EntryType::Debit),
            -1
        );
        assert_eq!(impact_multiplier(AccountType::Equity, EntryType::Credit), 1);
        assert_eq!(impact_multiplier(AccountType::Income, EntryType::Credit), 1);
        assert_eq!(impact_multiplier(AccountType::Income, EntryType::Debit), -1);
    }

    #[test]
    fn apply_delta_moves_balance_by_signed_amount() {
        let balance = apply_delta(10_000, 2_500, AccountType::Asset, EntryType::Credit);
        assert_eq!(balance, 7_500);
        let balance = apply_delta(balance, 500, AccountType::Asset, EntryType::Debit);
        assert_eq!(balance, 8_000);
    }

    #[test]
    fn balanced_journal_validates() {
        let journal_id = Uuid::new_v4();
        let lines = vec![
            Transaction::new(
                journal_id,
                Uuid::new_v4(),
                5_000,
                EntryType::Debit,
                "USD",
                at(1),
            ),
            Transaction::new(
                journal_id,
                Uuid::new_v4(),
                5_000,
                EntryType::Credit,
                "USD",
                at(1),
            ),
        ];
        let check = validate_journal(&lines, "USD").unwrap();
        assert!(check.is_valid());
        assert_eq!(check.imbalance, 0);
    }

    #[test]
    fn unbalanced_journal_reports_imbalance() {
        let journal_id = Uuid::new_v4();
        let lines = vec![
            Transaction::new(
                journal_id,
                Uuid::new_v4(),
                5_000,
                EntryType::Debit,
                "USD",
                at(1),
            ),
            Transaction::new(
                journal_id,
                Uuid::new_v4(),
                4_000,
                EntryType::Credit,
                "USD",
                at(1),
            ),
        ];
        let check = validate_journal(&lines, "USD").unwrap();
        assert!(!check.is_valid());
        assert_eq!(check.imbalance, 1_000);
    }

    #[test]
    fn foreign_line_converts_through_its_rate() {
        let journal_id = Uuid::new_v4();
        let mut eur_line = Transaction::new(
            journal_id,
            Uuid::new_v4(),
            4_000,
            EntryType::Debit,
            "EUR",
            at(1),
        );
        eur_line.exchange_rate = Some(1.25);
        let usd_line = Transaction::new(
            journal_id,
            Uuid::new_v4(),
            5_000,
            EntryType::Credit,
            "USD",
            at(1),
        );
        let check = validate_journal(&[eur_line, usd_line], "USD").unwrap();
        assert!(check.is_valid(), "imbalance was {}", check.imbalance);
    }

    #[test]
    fn foreign_line_without_rate_is_an_error_not_parity() {
        let journal_id = Uuid::new_v4();
        let eur_line = Transaction::new(
            journal_id,
            Uuid::new_v4(),
            5_000,
            EntryType::Debit,
            "EUR",
            at(1),
        );
        let usd_line = Transaction::new(
            journal_id,
            Uuid::new_v4(),
            5_000,
            EntryType::Credit,
            "USD",
            at(1),
        );
        let err = validate_journal(&[eur_line, usd_line], "USD").unwrap_err();
        assert_eq!(err, ValidationError::MissingExchangeRate);
    }

    #[test]
    fn distinct_accounts_requires_two_non_nil_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(validate_distinct_accounts(&[a, b]));
        assert!(!validate_distinct_accounts(&[a, a]));
        assert!(!validate_distinct_accounts(&[a, Uuid::nil()]));
        assert!(!validate_distinct_accounts(&[]));
    }

    #[test]
    fn backdate_detection() {
        assert!(is_backdated(at(1), Some(at(5))));
        assert!(!is_backdated(at(5), Some(at(5))));
        assert!(!is_backdated(at(6), Some(at(5))));
        assert!(!is_backdated(at(1), None));
    }

    #[test]
    fn simple_journal_debits_destination_credits_source() {
        let cash = Account::new("Cash", AccountType::Asset, "USD");
        let food = Account::new("Food", AccountType::Expense, "USD");
        let (journal, lines) =
            build_simple_journal(JournalKind::Expense, 5_000, &cash, &food, "Lunch", at(2));

        assert_eq!(journal.kind, JournalKind::Expense);
        assert_eq!(journal.total_amount, 5_000);
        assert_eq!(journal.line_count, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].account_id, food.id);
        assert_eq!(lines[0].entry_type, EntryType::Debit);
        assert_eq!(lines[1].account_id, cash.id);
        assert_eq!(lines[1].entry_type, EntryType::Credit);
        assert!(validate_journal(&lines, &journal.currency).unwrap().is_valid());
    }
}
