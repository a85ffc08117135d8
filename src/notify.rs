//! Debounced recompute scheduling for derived views.
//!
//! Writes arrive as [`ChangeEvent`]s; the scheduler coalesces bursts per
//! recompute target inside a short window so N writes produce one recompute.
//! The clock is passed in explicitly, which keeps the queue deterministic and
//! free of hidden timer threads.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::store::{ChangeEvent, EntityKind};

/// A derived view that needs recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecomputeTarget {
    /// One account's balance view.
    Balance(Uuid),
    /// The cross-account wealth summary.
    Wealth,
}

/// Targets invalidated by a committed batch: any account or transaction
/// change invalidates the wealth summary plus each touched account.
pub fn targets_for(event: &ChangeEvent) -> Vec<RecomputeTarget> {
    let mut targets = Vec::new();
    if event.entities.contains(&EntityKind::Account)
        || event.entities.contains(&EntityKind::Transaction)
    {
        targets.push(RecomputeTarget::Wealth);
    }
    targets.extend(event.account_ids.iter().map(|id| RecomputeTarget::Balance(*id)));
    targets
}

/// Coalescing timer queue keyed by recompute target.
#[derive(Debug)]
pub struct RecomputeScheduler {
    window: Duration,
    deadlines: HashMap<RecomputeTarget, Instant>,
}

impl RecomputeScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(Duration::from_millis(config.coalesce_window_ms))
    }

    /// Marks a target dirty at `now`. Repeated marks inside the window keep
    /// the original deadline, so a burst fires once, at burst start + window.
    pub fn mark(&mut self, target: RecomputeTarget, now: Instant) {
        self.deadlines.entry(target).or_insert(now + self.window);
    }

    pub fn mark_event(&mut self, event: &ChangeEvent, now: Instant) {
        for target in targets_for(event) {
            self.mark(target, now);
        }
    }

    /// Removes and returns every target whose window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Vec<RecomputeTarget> {
        let due: Vec<RecomputeTarget> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(target, _)| *target)
            .collect();
        for target in &due {
            self.deadlines.remove(target);
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }

    /// Time until the earliest deadline, for callers driving a real timer.
    pub fn next_due_in(&self, now: Instant) -> Option<Duration> {
        self.deadlines
            .values()
            .min()
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}
