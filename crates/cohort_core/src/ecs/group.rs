//! # Groups
//!
//! A group is a live view of the active entities that satisfy a matcher.
//! The context keeps membership current by routing component changes to
//! the groups whose matcher references the changed slot.

use indexmap::IndexSet;

use super::entity::{Entity, EntityRecord};
use super::events::GroupEventKind;
use super::matcher::Matcher;

/// Handle to a group owned by a context.
///
/// Equal matchers always resolve to the same handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u32);

impl GroupId {
    /// Position of the group in creation order.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Deferred membership notification produced by [`Group::handle_entity`].
///
/// The router collects these for every routed group before delivering any
/// of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GroupChange {
    pub(crate) group: GroupId,
    pub(crate) entity: Entity,
    pub(crate) kind: GroupEventKind,
}

/// Matcher-filtered member set.
#[derive(Debug)]
pub struct Group {
    id: GroupId,
    matcher: Matcher,
    members: IndexSet<Entity>,
}

impl Group {
    pub(crate) fn new(id: GroupId, matcher: Matcher) -> Self {
        Self {
            id,
            matcher,
            members: IndexSet::new(),
        }
    }

    /// Handle of this group.
    #[inline]
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The matcher this group filters by.
    #[inline]
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the group has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns `true` if `entity` is a member.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.members.contains(&entity)
    }

    /// Members in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.members.iter().copied()
    }

    /// Copies the members into a vector.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.members.iter().copied().collect()
    }

    pub(crate) fn matches(&self, record: &EntityRecord) -> bool {
        record.enabled && self.matcher.matches_with(|slot| record.has_component(slot))
    }

    /// Seeds membership without producing a notification.
    ///
    /// Returns `true` if the entity was added, so the caller can retain it.
    pub(crate) fn handle_entity_silently(&mut self, entity: Entity, record: &EntityRecord) -> bool {
        self.matches(record) && self.members.insert(entity)
    }

    /// Re-evaluates membership for `entity`.
    ///
    /// Returns the pending notification if membership changed.
    pub(crate) fn handle_entity(&mut self, entity: Entity, record: &EntityRecord) -> Option<GroupChange> {
        let kind = if self.matches(record) {
            if !self.members.insert(entity) {
                return None;
            }
            GroupEventKind::Added
        } else {
            if !self.members.swap_remove(&entity) {
                return None;
            }
            GroupEventKind::Removed
        };
        Some(GroupChange {
            group: self.id,
            entity,
            kind,
        })
    }

    /// Forwards a value change on a member; no membership change is possible.
    ///
    /// Returns the pending notification if `entity` is a member.
    pub(crate) fn update_entity(&self, entity: Entity) -> Option<GroupChange> {
        self.contains(entity).then_some(GroupChange {
            group: self.id,
            entity,
            kind: GroupEventKind::Updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(slots: &[usize]) -> EntityRecord {
        let mut record = EntityRecord::initialize(0, 4);
        for &slot in slots {
            record.components[slot] = Some(Box::new(slot));
        }
        record
    }

    #[test]
    fn test_handle_entity_add_then_remove() {
        let mut group = Group::new(GroupId(0), Matcher::all_of([2]));
        let entity = Entity::new(0, 0);

        let added = group.handle_entity(entity, &record_with(&[2])).unwrap();
        assert_eq!(added.kind, GroupEventKind::Added);
        assert!(group.contains(entity));

        // Still matching: no change
        assert!(group.handle_entity(entity, &record_with(&[1, 2])).is_none());

        let removed = group.handle_entity(entity, &record_with(&[])).unwrap();
        assert_eq!(removed.kind, GroupEventKind::Removed);
        assert!(group.is_empty());

        // Not a member and not matching: no change
        assert!(group.handle_entity(entity, &record_with(&[])).is_none());
    }

    #[test]
    fn test_silent_seed_and_disabled_records() {
        let mut group = Group::new(GroupId(1), Matcher::any_of([0, 1]));
        assert!(group.handle_entity_silently(Entity::new(0, 0), &record_with(&[1])));
        assert!(!group.handle_entity_silently(Entity::new(1, 0), &record_with(&[3])));

        let mut disabled = record_with(&[0]);
        disabled.enabled = false;
        assert!(!group.handle_entity_silently(Entity::new(2, 0), &disabled));

        assert_eq!(group.entities(), vec![Entity::new(0, 0)]);
    }

    #[test]
    fn test_update_entity_only_for_members() {
        let mut group = Group::new(GroupId(0), Matcher::all_of([1]));
        let member = Entity::new(0, 0);
        group.handle_entity_silently(member, &record_with(&[1]));

        assert_eq!(
            group.update_entity(member).map(|c| c.kind),
            Some(GroupEventKind::Updated)
        );
        assert!(group.update_entity(Entity::new(5, 0)).is_none());
    }
}
