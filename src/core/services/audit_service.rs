//! Append-only change trail queries and the legacy label migration.

use uuid::Uuid;

use crate::domain::AuditLogEntry;
use crate::store::{LedgerStore, WriteBatch, WriteOp};

use super::ServiceResult;

pub const ENTITY_ACCOUNT: &str = "account";
pub const ENTITY_JOURNAL: &str = "journal";
pub const ENTITY_TRANSACTION: &str = "transaction";

pub struct AuditService;

impl AuditService {
    /// Appends one immutable record. Existing entries are never updated or
    /// deleted outside [`Self::cleanup_legacy_entity_types`].
    pub fn log(store: &mut dyn LedgerStore, entry: AuditLogEntry) -> ServiceResult<()> {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::AppendAudit(entry));
        store.write_atomic(batch)?;
        Ok(())
    }

    /// Full history for one entity, oldest first.
    pub fn trail(store: &dyn LedgerStore, entity_type: &str, entity_id: Uuid) -> Vec<AuditLogEntry> {
        store
            .audit_entries()
            .into_iter()
            .filter(|entry| {
                entry.entity_id == entity_id && entry.entity_type.eq_ignore_ascii_case(entity_type)
            })
            .collect()
    }

    /// The `limit` most recent entries, newest first.
    pub fn recent(store: &dyn LedgerStore, limit: usize) -> Vec<AuditLogEntry> {
        let mut entries = store.audit_entries();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries.truncate(limit);
        entries
    }

    /// One-time migration: rewrites historically inconsistent entity-type
    /// casing to canonical lowercase. Idempotent; a second run finds nothing.
    pub fn cleanup_legacy_entity_types(store: &mut dyn LedgerStore) -> ServiceResult<usize> {
        let mut batch = WriteBatch::new();
        let mut rewritten = 0usize;
        for entry in store.audit_entries() {
            let canonical = entry.entity_type.to_lowercase();
            if canonical != entry.entity_type {
                batch.push(WriteOp::RewriteAuditEntityType {
                    id: entry.id,
                    entity_type: canonical,
                });
                rewritten += 1;
            }
        }
        if !batch.is_empty() {
            store.write_atomic(batch)?;
            tracing::info!(rewritten, "legacy audit entity-type labels canonicalized");
        }
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuditAction;
    use crate::store::MemoryStore;

    fn entry(entity_type: &str, entity_id: Uuid) -> AuditLogEntry {
        AuditLogEntry::new(entity_type, entity_id, AuditAction::Create, None, None)
    }

    #[test]
    fn trail_filters_by_entity_case_insensitively() {
        let mut store = MemoryStore::new();
        let id = Uuid::new_v4();
        AuditService::log(&mut store, entry("Account", id)).unwrap();
        AuditService::log(&mut store, entry(ENTITY_JOURNAL, Uuid::new_v4())).unwrap();

        let trail = AuditService::trail(&store, ENTITY_ACCOUNT, id);
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn recent_returns_newest_first_up_to_limit() {
        let mut store = MemoryStore::new();
        for _ in 0..5 {
            AuditService::log(&mut store, entry(ENTITY_ACCOUNT, Uuid::new_v4())).unwrap();
        }
        let recent = AuditService::recent(&store, 3);
        assert_eq!(recent.len(), 3);
        assert!(recent[0].recorded_at >= recent[1].recorded_at);
        assert!(recent[1].recorded_at >= recent[2].recorded_at);
    }

    #[test]
    fn legacy_cleanup_is_idempotent() {
        let mut store = MemoryStore::new();
        AuditService::log(&mut store, entry("ACCOUNT", Uuid::new_v4())).unwrap();
        AuditService::log(&mut store, entry("Journal", Uuid::new_v4())).unwrap();
        AuditService::log(&mut store, entry(ENTITY_TRANSACTION, Uuid::new_v4())).unwrap();

        let first = AuditService::cleanup_legacy_entity_types(&mut store).unwrap();
        assert_eq!(first, 2);
        assert!(store
            .audit_entries()
            .iter()
            .all(|e| e.entity_type.chars().all(|c| !c.is_uppercase())));

        let second = AuditService::cleanup_legacy_entity_types(&mut store).unwrap();
        assert_eq!(second, 0);
    }
}
