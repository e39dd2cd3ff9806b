//! In-flight push tracking and the local-vs-remote authority decision.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use hearth_core::meta::SyncState;
use hearth_core::tables::Table;

/// Entity kinds whose pushes are tracked for echo suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InFlightKind {
    Tasks,
    Activities,
    Listings,
    Properties,
    Notes,
    TaskAssignees,
    ActivityAssignees,
}

impl InFlightKind {
    pub fn for_table(table: Table) -> Option<Self> {
        match table {
            Table::Tasks => Some(Self::Tasks),
            Table::Activities => Some(Self::Activities),
            Table::Listings => Some(Self::Listings),
            Table::Properties => Some(Self::Properties),
            Table::Notes => Some(Self::Notes),
            Table::TaskAssignees => Some(Self::TaskAssignees),
            Table::ActivityAssignees => Some(Self::ActivityAssignees),
            Table::Users | Table::ListingTypes | Table::ActivityTemplates => None,
        }
    }
}

const KIND_COUNT: usize = 7;

fn slot(kind: InFlightKind) -> usize {
    match kind {
        InFlightKind::Tasks => 0,
        InFlightKind::Activities => 1,
        InFlightKind::Listings => 2,
        InFlightKind::Properties => 3,
        InFlightKind::Notes => 4,
        InFlightKind::TaskAssignees => 5,
        InFlightKind::ActivityAssignees => 6,
    }
}

/// Tracks which row ids are inside an active push batch, per entity kind.
/// All access happens from the engine's single logical executor; the lock
/// only satisfies `Sync`.
#[derive(Debug, Default)]
pub struct ConflictResolver {
    sets: Mutex<[HashSet<Uuid>; KIND_COUNT]>,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sets<R>(&self, f: impl FnOnce(&mut [HashSet<Uuid>; KIND_COUNT]) -> R) -> R {
        let mut guard = self.sets.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Record a batch's ids before any network I/O happens.
    pub fn mark(&self, kind: InFlightKind, ids: &[Uuid]) {
        self.with_sets(|sets| sets[slot(kind)].extend(ids.iter().copied()));
    }

    /// Forget a kind's in-flight set once its push completes, on success or
    /// failure alike.
    pub fn clear(&self, kind: InFlightKind) {
        self.with_sets(|sets| sets[slot(kind)].clear());
    }

    pub fn is_in_flight(&self, kind: InFlightKind, id: Uuid) -> bool {
        self.with_sets(|sets| sets[slot(kind)].contains(&id))
    }
}

/// Whether the local row remains the source of truth against an incoming
/// remote version.
pub fn is_local_authoritative(
    state: SyncState,
    local_updated_at: DateTime<Utc>,
    remote_updated_at: DateTime<Utc>,
    in_flight: bool,
) -> bool {
    if in_flight {
        // We just sent this row; the incoming copy is our own echo.
        return true;
    }
    match state {
        SyncState::Failed => true,
        SyncState::Synced => false,
        SyncState::Pending => local_updated_at > remote_updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn mark_and_clear_scope_to_one_kind() {
        let resolver = ConflictResolver::new();
        let id = Uuid::new_v4();
        resolver.mark(InFlightKind::Tasks, &[id]);

        assert!(resolver.is_in_flight(InFlightKind::Tasks, id));
        assert!(!resolver.is_in_flight(InFlightKind::Activities, id));

        resolver.clear(InFlightKind::Tasks);
        assert!(!resolver.is_in_flight(InFlightKind::Tasks, id));
    }

    #[test]
    fn in_flight_rows_are_always_local_authoritative() {
        assert!(is_local_authoritative(
            SyncState::Synced,
            at(10),
            at(99),
            true
        ));
    }

    #[test]
    fn failed_rows_are_never_overwritten() {
        assert!(is_local_authoritative(
            SyncState::Failed,
            at(10),
            at(99),
            false
        ));
    }

    #[test]
    fn synced_rows_accept_remote() {
        assert!(!is_local_authoritative(
            SyncState::Synced,
            at(99),
            at(10),
            false
        ));
    }

    #[test]
    fn pending_rows_resolve_by_timestamp() {
        assert!(is_local_authoritative(
            SyncState::Pending,
            at(30),
            at(20),
            false
        ));
        assert!(!is_local_authoritative(
            SyncState::Pending,
            at(20),
            at(30),
            false
        ));
        // ties go to the remote
        assert!(!is_local_authoritative(
            SyncState::Pending,
            at(20),
            at(20),
            false
        ));
    }

    #[test]
    fn users_and_reference_tables_are_untracked() {
        assert!(InFlightKind::for_table(Table::Users).is_none());
        assert!(InFlightKind::for_table(Table::ListingTypes).is_none());
        assert_eq!(
            InFlightKind::for_table(Table::Notes),
            Some(InFlightKind::Notes)
        );
    }
}
