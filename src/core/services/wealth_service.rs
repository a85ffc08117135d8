//! Currency-normalized wealth summary across all accounts.

use std::collections::HashMap;

use uuid::Uuid;

use crate::core::balance::BalanceEngine;
use crate::currency::CurrencyConverter;
use crate::domain::{Account, AccountType};
use crate::errors::LedgerError;
use crate::store::LedgerStore;

/// Per-type totals in the target currency, minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WealthSummary {
    pub assets: i64,
    pub liabilities: i64,
    pub equity: i64,
    pub income: i64,
    pub expenses: i64,
    pub net_worth: i64,
    pub currency: String,
}

pub struct WealthService;

impl WealthService {
    /// Converts every account balance to `target` and sums per account type.
    ///
    /// The net-worth figure deliberately mixes stock and flow accounts:
    /// `(assets + income + equity) − (liabilities + expenses)`, matching the
    /// ledger's historical definition (see DESIGN.md).
    pub fn calculate_summary(
        accounts: &[Account],
        balances: &HashMap<Uuid, i64>,
        converter: &dyn CurrencyConverter,
        target: &str,
    ) -> Result<WealthSummary, LedgerError> {
        let target = target.to_uppercase();
        let mut summary = WealthSummary {
            assets: 0,
            liabilities: 0,
            equity: 0,
            income: 0,
            expenses: 0,
            net_worth: 0,
            currency: target.clone(),
        };
        for account in accounts {
            let balance = balances.get(&account.id).copied().unwrap_or(0);
            let converted = converter
                .convert(balance, &account.currency, &target, None)?
                .amount;
            match account.account_type {
                AccountType::Asset => summary.assets += converted,
                AccountType::Liability => summary.liabilities += converted,
                AccountType::Equity => summary.equity += converted,
                AccountType::Income => summary.income += converted,
                AccountType::Expense => summary.expenses += converted,
            }
        }
        summary.net_worth = (summary.assets + summary.income + summary.equity)
            - (summary.liabilities + summary.expenses);
        Ok(summary)
    }

    /// Summary over the store's non-deleted accounts using each account's own
    /// ledger balance (hierarchy roll-ups are excluded so subtrees are not
    /// counted twice).
    pub fn summarize(
        store: &dyn LedgerStore,
        converter: &dyn CurrencyConverter,
        target: &str,
    ) -> Result<WealthSummary, LedgerError> {
        let accounts = store.accounts();
        let balances: HashMap<Uuid, i64> = accounts
            .iter()
            .map(|account| (account.id, BalanceEngine::balance_of(store, account.id).balance))
            .collect();
        Self::calculate_summary(&accounts, &balances, converter, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::RateBook;
    use crate::domain::ExchangeRate;
    use chrono::Utc;

    fn account(name: &str, account_type: AccountType, currency: &str) -> Account {
        Account::new(name, account_type, currency)
    }

    #[test]
    fn sums_per_type_and_applies_net_worth_formula() {
        let accounts = vec![
            account("Cash", AccountType::Asset, "USD"),
            account("Card", AccountType::Liability, "USD"),
            account("Salary", AccountType::Income, "USD"),
            account("Food", AccountType::Expense, "USD"),
            account("Opening", AccountType::Equity, "USD"),
        ];
        let balances: HashMap<Uuid, i64> = accounts
            .iter()
            .zip([100_000i64, 20_000, 50_000, 30_000, 10_000])
            .map(|(a, b)| (a.id, b))
            .collect();
        let summary =
            WealthService::calculate_summary(&accounts, &balances, &RateBook::new(), "USD")
                .unwrap();
        assert_eq!(summary.assets, 100_000);
        assert_eq!(summary.liabilities, 20_000);
        assert_eq!(summary.income, 50_000);
        assert_eq!(summary.expenses, 30_000);
        assert_eq!(summary.equity, 10_000);
        // (assets + income + equity) − (liabilities + expenses)
        assert_eq!(summary.net_worth, 110_000);
    }

    #[test]
    fn converts_foreign_balances_into_target() {
        let mut book = RateBook::new();
        book.add_rate(ExchangeRate::new("EUR", "USD", 1.25, Utc::now()));
        let accounts = vec![account("Euro Cash", AccountType::Asset, "EUR")];
        let balances: HashMap<Uuid, i64> =
            accounts.iter().map(|a| (a.id, 8_000i64)).collect();
        let summary =
            WealthService::calculate_summary(&accounts, &balances, &book, "usd").unwrap();
        assert_eq!(summary.assets, 10_000);
        assert_eq!(summary.currency, "USD");
        assert_eq!(summary.net_worth, 10_000);
    }

    #[test]
    fn missing_balance_counts_as_zero() {
        let accounts = vec![account("Empty", AccountType::Asset, "USD")];
        let summary =
            WealthService::calculate_summary(&accounts, &HashMap::new(), &RateBook::new(), "USD")
                .unwrap();
        assert_eq!(summary.assets, 0);
        assert_eq!(summary.net_worth, 0);
    }
}
