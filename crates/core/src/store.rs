//! In-memory graph store: entity tables keyed by UUID plus the derived
//! relationship indexes.
//!
//! Bidirectional links are maintained explicitly at each mutation point
//! instead of through embedded back-pointers; `listing.tasks` and friends are
//! derived indexes updated alongside the child's back-reference. Index
//! mutations emulate the dirty-tracking of an ORM-backed store: touching a
//! parent's children collection re-flags a synced parent as pending, which
//! the orchestrator's finalize pass later repairs.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::meta::{SyncRecord, SyncState};
use crate::model::{
    Activity, ActivityAssignee, ActivityTemplate, Listing, ListingTypeDefinition, Note, Property,
    Task, TaskAssignee, User,
};
use crate::tables::Table;

/// Result of a relationship-link attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Link established (or moved) and the parent index updated.
    Linked,
    /// Link already present; nothing changed.
    AlreadyLinked,
    /// The referenced parent is not in the store yet; a later
    /// reconciliation pass heals this.
    Deferred,
    /// The child carries no parent reference; any stale link was removed.
    Unlinked,
}

/// One entity table: UUID-keyed rows with sync metadata.
pub struct EntityTable<T: SyncRecord> {
    table: Table,
    rows: RwLock<HashMap<Uuid, T>>,
}

impl<T: SyncRecord> EntityTable<T> {
    fn new(table: Table) -> Self {
        Self {
            table,
            rows: RwLock::new(HashMap::new()),
        }
    }

    // A poisoned guard cannot leave the map half-written (single-executor
    // writes), so recover it instead of propagating the panic.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, T>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, T>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        self.read().get(&id).cloned()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.read().contains_key(&id)
    }

    pub fn put(&self, row: T) {
        self.write().insert(row.id(), row);
    }

    pub fn remove(&self, id: Uuid) -> Option<T> {
        self.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn ids(&self) -> BTreeSet<Uuid> {
        self.read().keys().copied().collect()
    }

    pub fn all(&self) -> Vec<T> {
        let mut rows: Vec<T> = self.read().values().cloned().collect();
        rows.sort_by_key(|row| (row.updated_at(), row.id()));
        rows
    }

    /// Rows needing a push (`pending` or `failed`), oldest edit first.
    pub fn dirty(&self) -> Vec<T> {
        let mut rows: Vec<T> = self
            .read()
            .values()
            .filter(|row| row.meta().is_dirty())
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.updated_at(), row.id()));
        rows
    }

    /// Mutate a row in place; returns the closure result when the row exists.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.write().get_mut(&id).map(f)
    }

    /// Dirty-tracking emulation: a relationship mutation re-flags a synced
    /// parent as pending. Failed rows are left alone.
    pub fn flag_pending(&self, id: Uuid) -> bool {
        self.update(id, |row| {
            if row.meta().state == SyncState::Synced {
                row.meta_mut().state = SyncState::Pending;
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    pub fn mark_synced(&self, id: Uuid, at: DateTime<Utc>) {
        self.update(id, |row| row.meta_mut().mark_synced(at));
    }

    pub fn mark_failed(&self, id: Uuid, message: &str) {
        self.update(id, |row| row.meta_mut().mark_failed(message));
    }
}

#[derive(Debug, Default)]
struct LinkGraph {
    listing_tasks: HashMap<Uuid, BTreeSet<Uuid>>,
    listing_activities: HashMap<Uuid, BTreeSet<Uuid>>,
    listing_owners: HashMap<Uuid, Uuid>,
    listing_properties: HashMap<Uuid, Uuid>,
    task_assignees: HashMap<Uuid, BTreeSet<Uuid>>,
    activity_assignees: HashMap<Uuid, BTreeSet<Uuid>>,
}

/// The local graph store.
pub struct Store {
    pub users: EntityTable<User>,
    pub properties: EntityTable<Property>,
    pub listings: EntityTable<Listing>,
    pub tasks: EntityTable<Task>,
    pub activities: EntityTable<Activity>,
    pub task_assignees: EntityTable<TaskAssignee>,
    pub activity_assignees: EntityTable<ActivityAssignee>,
    pub notes: EntityTable<Note>,
    pub listing_types: EntityTable<ListingTypeDefinition>,
    pub activity_templates: EntityTable<ActivityTemplate>,
    links: RwLock<LinkGraph>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            users: EntityTable::new(Table::Users),
            properties: EntityTable::new(Table::Properties),
            listings: EntityTable::new(Table::Listings),
            tasks: EntityTable::new(Table::Tasks),
            activities: EntityTable::new(Table::Activities),
            task_assignees: EntityTable::new(Table::TaskAssignees),
            activity_assignees: EntityTable::new(Table::ActivityAssignees),
            notes: EntityTable::new(Table::Notes),
            listing_types: EntityTable::new(Table::ListingTypes),
            activity_templates: EntityTable::new(Table::ActivityTemplates),
            links: RwLock::new(LinkGraph::default()),
        }
    }

    fn links_read(&self) -> RwLockReadGuard<'_, LinkGraph> {
        self.links.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn links_write(&self) -> RwLockWriteGuard<'_, LinkGraph> {
        self.links.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listing children
    // ─────────────────────────────────────────────────────────────────────

    /// Maintain the `listing.tasks` derived index for a task's current
    /// back-reference. Moving a task between listings removes the stale edge.
    pub fn link_task_to_listing(&self, task_id: Uuid, listing_id: Option<Uuid>) -> LinkOutcome {
        let mut links = self.links_write();
        let previous = remove_child_edge(&mut links.listing_tasks, task_id, listing_id);

        let Some(listing_id) = listing_id else {
            drop(links);
            return if let Some(old) = previous {
                self.listings.flag_pending(old);
                LinkOutcome::Unlinked
            } else {
                LinkOutcome::AlreadyLinked
            };
        };
        if previous == Some(listing_id) {
            return LinkOutcome::AlreadyLinked;
        }
        if !self.listings.contains(listing_id) {
            return LinkOutcome::Deferred;
        }

        links
            .listing_tasks
            .entry(listing_id)
            .or_default()
            .insert(task_id);
        drop(links);
        if let Some(old) = previous {
            self.listings.flag_pending(old);
        }
        self.listings.flag_pending(listing_id);
        LinkOutcome::Linked
    }

    pub fn link_activity_to_listing(
        &self,
        activity_id: Uuid,
        listing_id: Option<Uuid>,
    ) -> LinkOutcome {
        let mut links = self.links_write();
        let previous = remove_child_edge(&mut links.listing_activities, activity_id, listing_id);

        let Some(listing_id) = listing_id else {
            drop(links);
            return if let Some(old) = previous {
                self.listings.flag_pending(old);
                LinkOutcome::Unlinked
            } else {
                LinkOutcome::AlreadyLinked
            };
        };
        if previous == Some(listing_id) {
            return LinkOutcome::AlreadyLinked;
        }
        if !self.listings.contains(listing_id) {
            return LinkOutcome::Deferred;
        }

        links
            .listing_activities
            .entry(listing_id)
            .or_default()
            .insert(activity_id);
        drop(links);
        if let Some(old) = previous {
            self.listings.flag_pending(old);
        }
        self.listings.flag_pending(listing_id);
        LinkOutcome::Linked
    }

    pub fn tasks_for_listing(&self, listing_id: Uuid) -> BTreeSet<Uuid> {
        self.links_read()
            .listing_tasks
            .get(&listing_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn activities_for_listing(&self, listing_id: Uuid) -> BTreeSet<Uuid> {
        self.links_read()
            .listing_activities
            .get(&listing_id)
            .cloned()
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Assignee bags
    // ─────────────────────────────────────────────────────────────────────

    /// Index a task-assignee join row under its parent task. Flags the parent
    /// pending when the bag actually changed.
    pub fn index_task_assignee(&self, assignee_id: Uuid, task_id: Uuid) -> LinkOutcome {
        if !self.tasks.contains(task_id) {
            return LinkOutcome::Deferred;
        }
        let inserted = self
            .links_write()
            .task_assignees
            .entry(task_id)
            .or_default()
            .insert(assignee_id);
        if inserted {
            self.tasks.flag_pending(task_id);
            LinkOutcome::Linked
        } else {
            LinkOutcome::AlreadyLinked
        }
    }

    pub fn index_activity_assignee(&self, assignee_id: Uuid, activity_id: Uuid) -> LinkOutcome {
        if !self.activities.contains(activity_id) {
            return LinkOutcome::Deferred;
        }
        let inserted = self
            .links_write()
            .activity_assignees
            .entry(activity_id)
            .or_default()
            .insert(assignee_id);
        if inserted {
            self.activities.flag_pending(activity_id);
            LinkOutcome::Linked
        } else {
            LinkOutcome::AlreadyLinked
        }
    }

    pub fn assignees_for_task(&self, task_id: Uuid) -> BTreeSet<Uuid> {
        self.links_read()
            .task_assignees
            .get(&task_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn assignees_for_activity(&self, activity_id: Uuid) -> BTreeSet<Uuid> {
        self.links_read()
            .activity_assignees
            .get(&activity_id)
            .cloned()
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listing owner / property resolution
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve the listing's owner link; returns false when the user is not
    /// local yet.
    pub fn link_listing_owner(&self, listing_id: Uuid, user_id: Uuid) -> bool {
        if !self.users.contains(user_id) {
            return false;
        }
        self.links_write().listing_owners.insert(listing_id, user_id);
        true
    }

    pub fn owner_of_listing(&self, listing_id: Uuid) -> Option<Uuid> {
        self.links_read().listing_owners.get(&listing_id).copied()
    }

    pub fn link_listing_property(&self, listing_id: Uuid, property_id: Uuid) -> bool {
        if !self.properties.contains(property_id) {
            return false;
        }
        self.links_write()
            .listing_properties
            .insert(listing_id, property_id);
        true
    }

    pub fn property_of_listing(&self, listing_id: Uuid) -> Option<Uuid> {
        self.links_read()
            .listing_properties
            .get(&listing_id)
            .copied()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Removal hooks
    // ─────────────────────────────────────────────────────────────────────

    pub fn unlink_task(&self, task_id: Uuid) {
        let mut links = self.links_write();
        remove_child_edge(&mut links.listing_tasks, task_id, None);
        links.task_assignees.remove(&task_id);
    }

    pub fn unlink_activity(&self, activity_id: Uuid) {
        let mut links = self.links_write();
        remove_child_edge(&mut links.listing_activities, activity_id, None);
        links.activity_assignees.remove(&activity_id);
    }

    pub fn unlink_listing(&self, listing_id: Uuid) {
        let mut links = self.links_write();
        links.listing_tasks.remove(&listing_id);
        links.listing_activities.remove(&listing_id);
        links.listing_owners.remove(&listing_id);
        links.listing_properties.remove(&listing_id);
    }

    pub fn unlink_task_assignee(&self, assignee_id: Uuid, task_id: Uuid) {
        let mut links = self.links_write();
        if let Some(bag) = links.task_assignees.get_mut(&task_id) {
            bag.remove(&assignee_id);
            if bag.is_empty() {
                links.task_assignees.remove(&task_id);
            }
        }
    }

    pub fn unlink_activity_assignee(&self, assignee_id: Uuid, activity_id: Uuid) {
        let mut links = self.links_write();
        if let Some(bag) = links.activity_assignees.get_mut(&activity_id) {
            bag.remove(&assignee_id);
            if bag.is_empty() {
                links.activity_assignees.remove(&activity_id);
            }
        }
    }
}

/// Remove the child's existing parent edge unless it already points at
/// `keep_if`. Returns the previous parent, if any.
fn remove_child_edge(
    index: &mut HashMap<Uuid, BTreeSet<Uuid>>,
    child_id: Uuid,
    keep_if: Option<Uuid>,
) -> Option<Uuid> {
    let previous = index
        .iter()
        .find(|(_, children)| children.contains(&child_id))
        .map(|(parent, _)| *parent);
    if let Some(parent) = previous {
        if Some(parent) != keep_if {
            if let Some(children) = index.get_mut(&parent) {
                children.remove(&child_id);
                if children.is_empty() {
                    index.remove(&parent);
                }
            }
        }
    }
    previous
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::SyncMeta;
    use crate::model::{ListingStage, ListingStatus, WorkStatus};

    fn now() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    fn listing(id: Uuid, state: SyncState) -> Listing {
        let mut meta = SyncMeta::remote(now());
        meta.state = state;
        Listing {
            id,
            address: "12 Pine St".to_string(),
            price: None,
            mls_number: None,
            kind: None,
            status: ListingStatus::Active,
            stage: ListingStage::Active,
            activated_at: None,
            pending_at: None,
            closed_at: None,
            due_date: None,
            deleted_at: None,
            owned_by: None,
            property_id: None,
            listing_type_id: None,
            meta,
        }
    }

    fn task(id: Uuid, listing_id: Option<Uuid>) -> Task {
        Task {
            id,
            title: "Call".to_string(),
            description: None,
            due_date: None,
            status: WorkStatus::Open,
            completed_at: None,
            deleted_at: None,
            listing_id,
            meta: SyncMeta::local(now()),
        }
    }

    #[test]
    fn linking_a_task_updates_both_directions_and_flags_the_listing() {
        let store = Store::new();
        let listing_id = Uuid::new_v4();
        store.listings.put(listing(listing_id, SyncState::Synced));

        let task_id = Uuid::new_v4();
        store.tasks.put(task(task_id, Some(listing_id)));
        assert_eq!(
            store.link_task_to_listing(task_id, Some(listing_id)),
            LinkOutcome::Linked
        );

        assert!(store.tasks_for_listing(listing_id).contains(&task_id));
        // dirty-tracking emulation: the children mutation re-flagged the parent
        assert_eq!(
            store.listings.get(listing_id).unwrap().meta.state,
            SyncState::Pending
        );
    }

    #[test]
    fn relinking_is_a_no_op() {
        let store = Store::new();
        let listing_id = Uuid::new_v4();
        store.listings.put(listing(listing_id, SyncState::Synced));
        let task_id = Uuid::new_v4();
        store.tasks.put(task(task_id, Some(listing_id)));

        store.link_task_to_listing(task_id, Some(listing_id));
        store.listings.mark_synced(listing_id, now());
        assert_eq!(
            store.link_task_to_listing(task_id, Some(listing_id)),
            LinkOutcome::AlreadyLinked
        );
        assert_eq!(
            store.listings.get(listing_id).unwrap().meta.state,
            SyncState::Synced
        );
    }

    #[test]
    fn moving_a_task_between_listings_drops_the_stale_edge() {
        let store = Store::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.listings.put(listing(first, SyncState::Synced));
        store.listings.put(listing(second, SyncState::Synced));
        let task_id = Uuid::new_v4();
        store.tasks.put(task(task_id, Some(first)));

        store.link_task_to_listing(task_id, Some(first));
        assert_eq!(
            store.link_task_to_listing(task_id, Some(second)),
            LinkOutcome::Linked
        );
        assert!(!store.tasks_for_listing(first).contains(&task_id));
        assert!(store.tasks_for_listing(second).contains(&task_id));
    }

    #[test]
    fn linking_against_a_missing_listing_is_deferred() {
        let store = Store::new();
        let task_id = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        store.tasks.put(task(task_id, Some(ghost)));
        assert_eq!(
            store.link_task_to_listing(task_id, Some(ghost)),
            LinkOutcome::Deferred
        );
        assert!(store.tasks_for_listing(ghost).is_empty());
    }

    #[test]
    fn assignee_index_flags_the_parent_only_on_change() {
        let store = Store::new();
        let task_id = Uuid::new_v4();
        store.tasks.put(task(task_id, None));
        store.tasks.mark_synced(task_id, now());

        let assignee_id = Uuid::new_v4();
        assert_eq!(
            store.index_task_assignee(assignee_id, task_id),
            LinkOutcome::Linked
        );
        assert_eq!(
            store.tasks.get(task_id).unwrap().meta.state,
            SyncState::Pending
        );

        store.tasks.mark_synced(task_id, now());
        assert_eq!(
            store.index_task_assignee(assignee_id, task_id),
            LinkOutcome::AlreadyLinked
        );
        assert_eq!(
            store.tasks.get(task_id).unwrap().meta.state,
            SyncState::Synced
        );
    }

    #[test]
    fn dirty_returns_pending_and_failed_in_edit_order() {
        let store = Store::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        store.tasks.put(task(a, None));
        store.tasks.put(task(b, None));
        let mut synced = task(c, None);
        synced.meta = SyncMeta::remote(now());
        store.tasks.put(synced);
        store.tasks.mark_failed(b, "boom");

        let dirty: Vec<Uuid> = store.tasks.dirty().iter().map(|t| t.id).collect();
        assert_eq!(dirty.len(), 2);
        assert!(dirty.contains(&a) && dirty.contains(&b));
    }

    #[test]
    fn unlink_task_clears_indexes() {
        let store = Store::new();
        let listing_id = Uuid::new_v4();
        store.listings.put(listing(listing_id, SyncState::Synced));
        let task_id = Uuid::new_v4();
        store.tasks.put(task(task_id, Some(listing_id)));
        store.link_task_to_listing(task_id, Some(listing_id));
        store.index_task_assignee(Uuid::new_v4(), task_id);

        store.tasks.remove(task_id);
        store.unlink_task(task_id);
        assert!(store.tasks_for_listing(listing_id).is_empty());
        assert!(store.assignees_for_task(task_id).is_empty());
    }
}
