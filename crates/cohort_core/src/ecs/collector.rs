//! # Collectors
//!
//! A collector watches one or more groups and accumulates the entities that
//! entered or left them, so a reactive system can process exactly the
//! entities that changed since its last run. Collected entities are
//! retained until the collector is cleared.

use indexmap::IndexSet;

use super::entity::Entity;
use super::events::GroupEventKind;
use super::group::GroupId;

/// Handle to a collector owned by a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectorId(pub(crate) u32);

/// Which group events a collector reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupTrigger {
    /// Entities entering the group.
    Added,
    /// Entities leaving the group.
    Removed,
    /// Both directions.
    AddedOrRemoved,
}

impl GroupTrigger {
    /// Returns `true` if an event of `kind` fires this trigger.
    #[inline]
    #[must_use]
    pub fn fires_on(self, kind: GroupEventKind) -> bool {
        matches!(
            (self, kind),
            (Self::Added | Self::AddedOrRemoved, GroupEventKind::Added)
                | (Self::Removed | Self::AddedOrRemoved, GroupEventKind::Removed)
        )
    }
}

/// Accumulated set of changed entities.
#[derive(Debug)]
pub struct Collector {
    id: CollectorId,
    triggers: Vec<(GroupId, GroupTrigger)>,
    collected: IndexSet<Entity>,
    active: bool,
}

impl Collector {
    pub(crate) fn new(id: CollectorId, triggers: &[(GroupId, GroupTrigger)]) -> Self {
        Self {
            id,
            triggers: triggers.to_vec(),
            collected: IndexSet::new(),
            active: true,
        }
    }

    /// Handle of this collector.
    #[inline]
    #[must_use]
    pub fn id(&self) -> CollectorId {
        self.id
    }

    /// Watched groups and the trigger for each.
    #[must_use]
    pub fn triggers(&self) -> &[(GroupId, GroupTrigger)] {
        &self.triggers
    }

    /// Returns `true` while the collector records events.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of collected entities.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.collected.len()
    }

    /// Collected entities in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.collected.iter().copied()
    }

    /// Returns `true` if the collector reacts to this event.
    pub(crate) fn wants(&self, group: GroupId, kind: GroupEventKind) -> bool {
        self.active
            && self
                .triggers
                .iter()
                .any(|&(g, trigger)| g == group && trigger.fires_on(kind))
    }

    /// Records an entity. Returns `true` if it was not collected yet, in
    /// which case the caller retains it.
    pub(crate) fn collect(&mut self, entity: Entity) -> bool {
        self.collected.insert(entity)
    }

    /// Empties the collected set, handing back the entities to release.
    pub(crate) fn drain(&mut self) -> Vec<Entity> {
        self.collected.drain(..).collect()
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_fires_on() {
        assert!(GroupTrigger::Added.fires_on(GroupEventKind::Added));
        assert!(!GroupTrigger::Added.fires_on(GroupEventKind::Removed));
        assert!(GroupTrigger::Removed.fires_on(GroupEventKind::Removed));
        assert!(GroupTrigger::AddedOrRemoved.fires_on(GroupEventKind::Added));
        assert!(!GroupTrigger::AddedOrRemoved.fires_on(GroupEventKind::Updated));
    }

    #[test]
    fn test_collect_and_drain() {
        let mut collector = Collector::new(CollectorId(0), &[(GroupId(3), GroupTrigger::Added)]);
        assert!(collector.wants(GroupId(3), GroupEventKind::Added));
        assert!(!collector.wants(GroupId(4), GroupEventKind::Added));

        assert!(collector.collect(Entity::new(1, 0)));
        assert!(!collector.collect(Entity::new(1, 0)));
        assert_eq!(collector.count(), 1);

        assert_eq!(collector.drain(), vec![Entity::new(1, 0)]);
        assert_eq!(collector.count(), 0);

        collector.set_active(false);
        assert!(!collector.wants(GroupId(3), GroupEventKind::Added));
    }
}
