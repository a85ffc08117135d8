use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifies entities that expose a stable unique identifier.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Entities that can be tombstoned instead of physically removed.
///
/// Deletion is a timestamp on the record; queries filter tombstones out and
/// physical removal only happens in an explicit cleanup pass.
pub trait SoftDeletable {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}
