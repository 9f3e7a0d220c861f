//! # Entity Management
//!
//! Entities are lightweight handles into the context's record arena:
//! - A slot in the arena
//! - A generation counter for safe reuse
//!
//! The record behind a handle carries the logical identity (creation
//! index), the lifecycle flag, the component slots and the retain tracker.

use std::fmt;

use super::component::Component;
use super::{CollectorId, GroupId};

/// Handle to an entity record.
///
/// A record is reused after its entity is destroyed and released, and the
/// generation is bumped every time. A handle whose generation no longer
/// matches refers to a dead occupant and is rejected by the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    slot: u32,
    generation: u32,
}

impl Entity {
    /// Creates a handle from an arena slot and generation.
    #[inline]
    #[must_use]
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Returns the arena slot of the record.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Returns the generation the handle was issued for.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

/// Holder of a retain on an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    /// The context's own hold, taken at creation and dropped at destruction.
    Context,
    /// Membership in a group.
    Group(GroupId),
    /// Membership in a collector's collected set.
    Collector(CollectorId),
    /// Any holder outside the context, identified by the caller.
    External(u64),
}

/// Owner-tracking reference counter.
///
/// Every owner may hold at most one retain, which catches double-retain
/// and foreign-release bugs at the call site.
#[derive(Debug, Default)]
pub struct RetainTracker {
    owners: Vec<Owner>,
}

impl RetainTracker {
    /// Number of current holders.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.owners.len()
    }

    /// Returns `true` if `owner` holds a retain.
    #[inline]
    #[must_use]
    pub fn is_retained_by(&self, owner: Owner) -> bool {
        self.owners.contains(&owner)
    }

    /// Adds a retain. Returns `false` if `owner` already holds one.
    pub fn retain(&mut self, owner: Owner) -> bool {
        if self.is_retained_by(owner) {
            return false;
        }
        self.owners.push(owner);
        true
    }

    /// Drops a retain. Returns `false` if `owner` did not hold one.
    pub fn release(&mut self, owner: Owner) -> bool {
        match self.owners.iter().position(|o| *o == owner) {
            Some(pos) => {
                self.owners.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Iterates over the current holders.
    pub fn owners(&self) -> impl Iterator<Item = Owner> + '_ {
        self.owners.iter().copied()
    }
}

/// Storage for one entity in the arena.
#[derive(Debug)]
pub(crate) struct EntityRecord {
    pub(crate) generation: u32,
    pub(crate) creation_index: u32,
    pub(crate) enabled: bool,
    pub(crate) components: Box<[Option<Box<dyn Component>>]>,
    pub(crate) retain: RetainTracker,
}

impl EntityRecord {
    /// One-time setup for a freshly allocated record.
    pub(crate) fn initialize(creation_index: u32, total_components: usize) -> Self {
        Self {
            generation: 0,
            creation_index,
            enabled: true,
            components: (0..total_components).map(|_| None).collect(),
            retain: RetainTracker::default(),
        }
    }

    /// Invalidates every handle to the record before it enters the reuse pool.
    pub(crate) fn recycle(&mut self) {
        debug_assert!(!self.enabled);
        debug_assert!(self.retain.count() == 0);
        self.generation = self.generation.wrapping_add(1);
    }

    /// Brings a recycled record back to life under a new identity.
    pub(crate) fn reactivate(&mut self, creation_index: u32) {
        debug_assert!(!self.enabled);
        debug_assert!(self.components.iter().all(Option::is_none));
        self.creation_index = creation_index;
        self.enabled = true;
    }

    #[inline]
    pub(crate) fn has_component(&self, slot: usize) -> bool {
        matches!(self.components.get(slot), Some(Some(_)))
    }

    #[inline]
    pub(crate) fn component(&self, slot: usize) -> Option<&dyn Component> {
        self.components.get(slot)?.as_deref()
    }

    /// Occupied slot indices in ascending order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.components
            .iter()
            .enumerate()
            .filter_map(|(slot, c)| c.as_ref().map(|_| slot))
    }
}
