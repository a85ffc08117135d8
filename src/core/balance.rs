//! Point-in-time balance computation and hierarchical aggregation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::calculus::apply_delta;
use crate::store::LedgerStore;

/// Replayed balance for a single account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountBalance {
    /// Minor units in the account's own currency.
    pub balance: i64,
    pub transaction_count: u64,
}

/// Read-only engine that derives balances from transaction history. Caches
/// (running balances, denormalized totals) never feed into these folds.
pub struct BalanceEngine;

impl BalanceEngine {
    /// Folds the account's non-deleted lines dated at or before `as_of`
    /// (all of them when omitted), in replay order, starting from zero.
    ///
    /// An unknown account or one with no history yields a zero balance,
    /// never an error.
    pub fn balance_as_of(
        store: &dyn LedgerStore,
        account_id: Uuid,
        as_of: Option<DateTime<Utc>>,
    ) -> AccountBalance {
        let Some(account) = store.account(account_id) else {
            return AccountBalance::default();
        };
        let mut result = AccountBalance::default();
        for line in store.transactions_for_account(account_id) {
            if let Some(cutoff) = as_of {
                if line.date > cutoff {
                    continue;
                }
            }
            result.balance = apply_delta(
                result.balance,
                line.amount,
                account.account_type,
                line.entry_type,
            );
            result.transaction_count += 1;
        }
        result
    }

    pub fn balance_of(store: &dyn LedgerStore, account_id: Uuid) -> AccountBalance {
        Self::balance_as_of(store, account_id, None)
    }

    /// Balances for every non-deleted account, aggregated up the hierarchy:
    /// each ancestor carries its own ledger balance plus the sum of all
    /// descendant balances, computed in one bottom-up pass (deepest first).
    ///
    /// Subtree sums are raw numeric sums even across currencies; see
    /// DESIGN.md on cross-currency aggregation.
    pub fn all_balances(store: &dyn LedgerStore) -> HashMap<Uuid, i64> {
        let accounts = store.accounts();
        let mut totals: HashMap<Uuid, i64> = accounts
            .iter()
            .map(|account| {
                (
                    account.id,
                    Self::balance_of(store, account.id).balance,
                )
            })
            .collect();

        let parent_of: HashMap<Uuid, Uuid> = accounts
            .iter()
            .filter_map(|account| account.parent_id.map(|parent| (account.id, parent)))
            .collect();

        let mut by_depth: Vec<(usize, Uuid)> = accounts
            .iter()
            .map(|account| (Self::depth_of(account.id, &parent_of), account.id))
            .collect();
        by_depth.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, id) in by_depth {
            if let Some(parent) = parent_of.get(&id) {
                if totals.contains_key(parent) {
                    let child_total = totals.get(&id).copied().unwrap_or(0);
                    *totals.entry(*parent).or_insert(0) += child_total;
                }
            }
        }
        totals
    }

    fn depth_of(id: Uuid, parent_of: &HashMap<Uuid, Uuid>) -> usize {
        let mut depth = 0;
        let mut cursor = id;
        // Guard against malformed cycles; hierarchy rules keep chains short.
        while let Some(parent) = parent_of.get(&cursor) {
            depth += 1;
            cursor = *parent;
            if depth > parent_of.len() {
                break;
            }
        }
        depth
    }
}
