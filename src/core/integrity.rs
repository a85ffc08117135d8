//! Startup/on-demand verification and audited repair of cached totals.

use std::collections::HashMap;

use uuid::Uuid;

use crate::core::balance::BalanceEngine;
use crate::core::rebuild::RebuildQueue;
use crate::core::services::{AccountService, ServiceResult};
use crate::store::LedgerStore;

/// Outcome of one verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntegrityReport {
    pub total_accounts: u64,
    pub discrepancies_found: u64,
    pub repairs_successful: u64,
}

pub struct IntegrityService;

impl IntegrityService {
    /// Recomputes every non-deleted account's true balance and compares it
    /// against the externally cached total, where one exists. Each mismatch
    /// is repaired through [`AccountService::adjust_balance`], so every
    /// correction is an audited journal rather than a silent rewrite.
    ///
    /// Safe to run repeatedly: a correctly-balanced ledger yields zero
    /// discrepancies and zero writes.
    pub fn run_startup_check(
        store: &mut dyn LedgerStore,
        queue: &mut RebuildQueue,
        cached_totals: &HashMap<Uuid, i64>,
    ) -> ServiceResult<IntegrityReport> {
        let accounts = store.accounts();
        let mut report = IntegrityReport {
            total_accounts: accounts.len() as u64,
            ..IntegrityReport::default()
        };
        for account in accounts {
            let Some(&cached) = cached_totals.get(&account.id) else {
                continue;
            };
            let replayed = BalanceEngine::balance_of(store, account.id).balance;
            if replayed == cached {
                continue;
            }
            report.discrepancies_found += 1;
            tracing::warn!(
                account_id = %account.id,
                replayed,
                cached,
                "integrity mismatch, posting correction"
            );
            match AccountService::adjust_balance(store, queue, account.id, cached) {
                Ok(Some(_)) => report.repairs_successful += 1,
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(account_id = %account.id, %err, "repair failed");
                }
            }
        }
        tracing::info!(
            total = report.total_accounts,
            discrepancies = report.discrepancies_found,
            repaired = report.repairs_successful,
            "integrity check finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::services::account_service::NewAccount;
    use crate::domain::AccountType;
    use crate::store::MemoryStore;

    #[test]
    fn clean_ledger_yields_no_discrepancies_and_no_writes() {
        let mut store = MemoryStore::new();
        let mut queue = RebuildQueue::new();
        let mut input = NewAccount::new("Cash", AccountType::Asset, "USD");
        input.initial_balance = Some(10_000);
        let cash = AccountService::create(&mut store, &mut queue, input).unwrap();

        let cached = HashMap::from([(cash.id, 10_000i64)]);
        let journals_before = store.journals().len();
        let report =
            IntegrityService::run_startup_check(&mut store, &mut queue, &cached).unwrap();
        assert_eq!(report.discrepancies_found, 0);
        assert_eq!(report.repairs_successful, 0);
        assert_eq!(store.journals().len(), journals_before);
    }

    #[test]
    fn corrupted_cache_triggers_exactly_one_audited_correction() {
        let mut store = MemoryStore::new();
        let mut queue = RebuildQueue::new();
        let mut input = NewAccount::new("Cash", AccountType::Asset, "USD");
        input.initial_balance = Some(10_000);
        let cash = AccountService::create(&mut store, &mut queue, input).unwrap();

        // The externally cached total drifted from true history.
        let cached = HashMap::from([(cash.id, 12_500i64)]);
        let report =
            IntegrityService::run_startup_check(&mut store, &mut queue, &cached).unwrap();
        assert_eq!(report.discrepancies_found, 1);
        assert_eq!(report.repairs_successful, 1);

        let corrections: Vec<_> = store
            .accounts()
            .into_iter()
            .filter(|a| a.name.starts_with("Balance Correction"))
            .collect();
        assert_eq!(corrections.len(), 1);
        assert_eq!(
            BalanceEngine::balance_of(&store, cash.id).balance,
            12_500,
            "recomputed balance back in line with the cached total"
        );

        // Second run finds nothing left to repair.
        let report =
            IntegrityService::run_startup_check(&mut store, &mut queue, &cached).unwrap();
        assert_eq!(report.discrepancies_found, 0);
    }

    #[test]
    fn accounts_without_cached_totals_are_skipped() {
        let mut store = MemoryStore::new();
        let mut queue = RebuildQueue::new();
        AccountService::create(
            &mut store,
            &mut queue,
            NewAccount::new("Cash", AccountType::Asset, "USD"),
        )
        .unwrap();
        let report =
            IntegrityService::run_startup_check(&mut store, &mut queue, &HashMap::new()).unwrap();
        assert_eq!(report.total_accounts, 1);
        assert_eq!(report.discrepancies_found, 0);
    }
}
