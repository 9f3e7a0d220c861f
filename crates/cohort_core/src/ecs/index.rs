//! # Named Entity Indices
//!
//! Secondary lookups from a key derived from one component slot to the
//! entities of a group. Indices are registered on the context under a
//! unique name and kept current from the group's membership events.

use std::any::Any;
use std::fmt;
use std::hash::Hash;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;

use super::component::Component;
use super::entity::Entity;
use super::group::GroupId;
use crate::error::{ContextError, ContextResult};

/// A secondary index fed by one group.
pub trait EntityIndex: Any {
    /// Unique registry name.
    fn name(&self) -> &str;

    /// Group whose members are indexed.
    fn group(&self) -> GroupId;

    /// Slot the key is derived from.
    fn slot(&self) -> usize;

    /// Indexes `entity` under the key of `component`.
    ///
    /// # Errors
    ///
    /// Fails if `component` has the wrong type or the key is taken in a
    /// unique index.
    fn entity_added(&mut self, entity: Entity, component: &dyn Component) -> ContextResult<()>;

    /// Drops `entity` from the key of `component`.
    fn entity_removed(&mut self, entity: Entity, component: &dyn Component);

    /// Forgets every entry.
    fn clear(&mut self);

    /// Upcasts for downcasting to the concrete index type.
    fn as_any(&self) -> &dyn Any;
}

fn key_of<'c, C: Component>(name: &str, component: &'c dyn Component) -> ContextResult<&'c C> {
    component
        .downcast_ref::<C>()
        .ok_or_else(|| ContextError::IndexTypeMismatch(name.to_owned()))
}

/// Unique key to entity.
pub struct PrimaryEntityIndex<C, K> {
    name: String,
    group: GroupId,
    slot: usize,
    key: Box<dyn Fn(&C) -> K>,
    entries: FxHashMap<K, Entity>,
}

impl<C: Component, K: Eq + Hash + 'static> PrimaryEntityIndex<C, K> {
    /// Creates an index over `slot` of the members of `group`.
    pub fn new(
        name: impl Into<String>,
        group: GroupId,
        slot: usize,
        key: impl Fn(&C) -> K + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            group,
            slot,
            key: Box::new(key),
            entries: FxHashMap::default(),
        }
    }

    /// Entity registered under `key`.
    #[must_use]
    pub fn get_entity(&self, key: &K) -> Option<Entity> {
        self.entries.get(key).copied()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: Component, K: Eq + Hash + 'static> EntityIndex for PrimaryEntityIndex<C, K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn group(&self) -> GroupId {
        self.group
    }

    fn slot(&self) -> usize {
        self.slot
    }

    fn entity_added(&mut self, entity: Entity, component: &dyn Component) -> ContextResult<()> {
        let key = (self.key)(key_of::<C>(&self.name, component)?);
        if let Some(&existing) = self.entries.get(&key) {
            if existing != entity {
                return Err(ContextError::IndexKeyConflict {
                    index: self.name.clone(),
                    existing,
                });
            }
        }
        self.entries.insert(key, entity);
        Ok(())
    }

    fn entity_removed(&mut self, entity: Entity, component: &dyn Component) {
        let Some(component) = component.downcast_ref::<C>() else {
            return;
        };
        let key = (self.key)(component);
        if self.entries.get(&key) == Some(&entity) {
            self.entries.remove(&key);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<C, K> fmt::Debug for PrimaryEntityIndex<C, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryEntityIndex")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("slot", &self.slot)
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Key to every entity sharing it.
pub struct MultiEntityIndex<C, K> {
    name: String,
    group: GroupId,
    slot: usize,
    key: Box<dyn Fn(&C) -> K>,
    entries: FxHashMap<K, IndexSet<Entity>>,
}

impl<C: Component, K: Eq + Hash + 'static> MultiEntityIndex<C, K> {
    /// Creates an index over `slot` of the members of `group`.
    pub fn new(
        name: impl Into<String>,
        group: GroupId,
        slot: usize,
        key: impl Fn(&C) -> K + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            group,
            slot,
            key: Box::new(key),
            entries: FxHashMap::default(),
        }
    }

    /// Entities registered under `key`, in insertion order.
    pub fn get_entities(&self, key: &K) -> impl Iterator<Item = Entity> + '_ {
        self.entries.get(key).into_iter().flatten().copied()
    }

    /// Number of entities registered under `key`.
    #[must_use]
    pub fn count(&self, key: &K) -> usize {
        self.entries.get(key).map_or(0, IndexSet::len)
    }
}

impl<C: Component, K: Eq + Hash + 'static> EntityIndex for MultiEntityIndex<C, K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn group(&self) -> GroupId {
        self.group
    }

    fn slot(&self) -> usize {
        self.slot
    }

    fn entity_added(&mut self, entity: Entity, component: &dyn Component) -> ContextResult<()> {
        let key = (self.key)(key_of::<C>(&self.name, component)?);
        self.entries.entry(key).or_default().insert(entity);
        Ok(())
    }

    fn entity_removed(&mut self, entity: Entity, component: &dyn Component) {
        let Some(component) = component.downcast_ref::<C>() else {
            return;
        };
        let key = (self.key)(component);
        if let Some(set) = self.entries.get_mut(&key) {
            set.swap_remove(&entity);
            if set.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<C, K> fmt::Debug for MultiEntityIndex<C, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiEntityIndex")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("slot", &self.slot)
            .field("keys", &self.entries.len())
            .finish()
    }
}
