//! Running-balance rebuilds after backdated or edited history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::calculus::apply_delta;
use crate::errors::LedgerError;
use crate::store::{LedgerStore, WriteBatch, WriteOp};

/// Coalescing queue of running-balance rebuild jobs, one slot per account.
///
/// Repeated requests for an account collapse to the minimum timestamp seen,
/// and processing is strictly sequential per account, so concurrent edits to
/// the same history serialize through here.
#[derive(Debug, Default)]
pub struct RebuildQueue {
    pending: HashMap<Uuid, DateTime<Utc>>,
}

impl RebuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a rebuild of the account's cached running balances from
    /// `from` onward.
    pub fn enqueue(&mut self, account_id: Uuid, from: DateTime<Utc>) {
        self.pending
            .entry(account_id)
            .and_modify(|ts| {
                if from < *ts {
                    *ts = from;
                }
            })
            .or_insert(from);
    }

    /// Requests a full-history rebuild, e.g. after an account type change.
    pub fn enqueue_full(&mut self, account_id: Uuid) {
        self.enqueue(account_id, DateTime::<Utc>::MIN_UTC);
    }

    pub fn pending_for(&self, account_id: Uuid) -> Option<DateTime<Utc>> {
        self.pending.get(&account_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Replays the account's history from its pending timestamp and rewrites
    /// each line's cached running balance in one atomic batch.
    ///
    /// Returns the number of lines rewritten. Idempotent: a second run with
    /// no intervening writes rewrites nothing new and produces identical
    /// cached values.
    pub fn process(
        &mut self,
        store: &mut dyn LedgerStore,
        account_id: Uuid,
    ) -> Result<usize, LedgerError> {
        let Some(from) = self.pending.remove(&account_id) else {
            return Ok(0);
        };
        let Some(account) = store.account(account_id) else {
            tracing::warn!(%account_id, "rebuild requested for unknown account, dropping job");
            return Ok(0);
        };

        // Seed with the replayed balance of everything strictly before the
        // pending timestamp; the cache is never trusted as a starting point.
        let lines = store.transactions_for_account(account_id);
        let mut balance = 0i64;
        let mut batch = WriteBatch::new();
        let mut rewritten = 0usize;
        for line in lines {
            balance = apply_delta(balance, line.amount, account.account_type, line.entry_type);
            if line.date >= from && line.running_balance != Some(balance) {
                let mut updated = line;
                updated.running_balance = Some(balance);
                batch.push(WriteOp::PutTransaction(updated));
                rewritten += 1;
            }
        }
        if !batch.is_empty() {
            if let Err(err) = store.write_atomic(batch) {
                // The job stays pending so a later drain retries it.
                self.enqueue(account_id, from);
                return Err(err);
            }
        }
        tracing::info!(%account_id, rewritten, "running balances rebuilt");
        Ok(rewritten)
    }

    /// Drains every pending job sequentially, in stable account order.
    pub fn process_all(&mut self, store: &mut dyn LedgerStore) -> Result<usize, LedgerError> {
        let mut ids: Vec<Uuid> = self.pending.keys().copied().collect();
        ids.sort();
        let mut total = 0;
        for id in ids {
            total += self.process(store, id)?;
        }
        Ok(total)
    }
}
