//! # Entity Context
//!
//! The central container that owns entity identity, retention, groups and
//! the routing of component changes to the groups that watch them.
//!
//! ## Destruction
//!
//! ```text
//! destroy_entity(e):
//!   1. leave the active set
//!   2. EntityWillBeDestroyed      (components still readable)
//!   3. disable + clear all slots  (routed as removals)
//!   4. EntityDestroyed
//!   5. release Owner::Context ──► count == 0 ──► reuse pool
//!                              └► count  > 0 ──► retained set
//! ```
//!
//! ## Routing
//!
//! A component change on slot `s` only reaches the groups whose matcher
//! references `s`. Adds and removes are delivered in two passes: every
//! routed group updates its membership, its retain and its indices first,
//! then the collected changes go to collectors and listeners. A listener
//! reacting to one group therefore always sees every other group in its
//! final state. Changes a listener overtakes (by destroying the entity or
//! re-adding it) are not delivered.

use std::fmt;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use super::collector::{Collector, CollectorId, GroupTrigger};
use super::component::Component;
use super::entity::{Entity, EntityRecord, Owner};
use super::events::{
    ContextEvent, ContextListener, GroupEvent, GroupEventKind, GroupListener, Listeners,
    SubscriptionId,
};
use super::group::{Group, GroupChange, GroupId};
use super::index::EntityIndex;
use super::matcher::Matcher;
use crate::config::{ContextConfig, ContextInfo};
use crate::error::{ContextError, ContextResult};
use crate::memory::{ComponentPools, ObjectPool};

/// Owner of entities, groups, collectors and named indices.
///
/// All operations are synchronous and single-threaded. Listeners receive
/// `&mut Context` and may call back into it.
///
/// # Example
///
/// ```rust,ignore
/// let mut ctx = Context::new(3, 0, None)?;
/// let moving = ctx.get_group(Matcher::all_of([POSITION, VELOCITY]))?;
///
/// let e = ctx.create_entity();
/// ctx.add_component(e, POSITION, Box::new(Position::default()))?;
/// ctx.add_component(e, VELOCITY, Box::new(Velocity::default()))?;
/// assert!(ctx.group(moving)?.contains(e));
///
/// ctx.destroy_entity(e)?;
/// ```
pub struct Context {
    info: ContextInfo,
    total_components: usize,
    creation_index: u32,

    // Entity lifecycle
    records: Vec<EntityRecord>,
    active: IndexSet<Entity>,
    entities_cache: Vec<Entity>,
    entities_cache_valid: bool,
    reusable: Vec<u32>,
    retained: IndexSet<Entity>,

    // Groups and routing
    groups: Vec<Group>,
    groups_by_matcher: FxHashMap<Matcher, GroupId>,
    groups_for_slot: Box<[Vec<GroupId>]>,
    collectors: Vec<Collector>,
    entity_indices: FxHashMap<String, Box<dyn EntityIndex>>,

    // Pools
    component_pools: ComponentPools,
    change_lists: ObjectPool<Vec<GroupChange>>,

    // Subscriptions
    listeners: Listeners<ContextListener>,
    group_listeners: Vec<Listeners<GroupListener>>,
}

impl Context {
    /// Creates a context with a fixed number of component slots.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::SlotCountMismatch`] if `info` names a
    /// different number of slots than `total_components`.
    pub fn new(
        total_components: usize,
        start_creation_index: u32,
        info: Option<ContextInfo>,
    ) -> ContextResult<Self> {
        let info = info.unwrap_or_else(|| ContextInfo::unnamed(total_components));
        if info.component_names.len() != total_components {
            return Err(ContextError::SlotCountMismatch {
                expected: total_components,
                actual: info.component_names.len(),
            });
        }

        debug!(context = %info.name, total_components, "context created");

        Ok(Self {
            info,
            total_components,
            creation_index: start_creation_index,
            records: Vec::new(),
            active: IndexSet::new(),
            entities_cache: Vec::new(),
            entities_cache_valid: true,
            reusable: Vec::new(),
            retained: IndexSet::new(),
            groups: Vec::new(),
            groups_by_matcher: FxHashMap::default(),
            groups_for_slot: (0..total_components).map(|_| Vec::new()).collect(),
            collectors: Vec::new(),
            entity_indices: FxHashMap::default(),
            component_pools: ComponentPools::new(total_components),
            change_lists: ObjectPool::new(Vec::new, Vec::clear),
            listeners: Listeners::default(),
            group_listeners: Vec::new(),
        })
    }

    /// Creates a context from a loaded configuration, reserving storage
    /// for `entity_capacity` entities up front.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::SlotCountMismatch`] if the configured slot
    /// count disagrees with the component names.
    pub fn with_config(config: &ContextConfig) -> ContextResult<Self> {
        let info = if config.component_names.is_empty() && config.total_components.is_some() {
            ContextInfo {
                name: config.name.clone(),
                ..ContextInfo::unnamed(config.total_components())
            }
        } else {
            config.info()
        };
        let mut ctx = Self::new(config.total_components(), config.start_creation_index, Some(info))?;
        ctx.records.reserve(config.entity_capacity);
        ctx.active.reserve(config.entity_capacity);
        ctx.reusable.reserve(config.entity_capacity);
        ctx.change_lists.prewarm(config.scratch_lists);
        Ok(ctx)
    }

    /// Context metadata.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &ContextInfo {
        &self.info
    }

    /// Number of component slots every entity carries.
    #[inline]
    #[must_use]
    pub fn total_components(&self) -> usize {
        self.total_components
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Creates an entity, reusing a pooled record when one is available.
    ///
    /// The entity is added to the active set and retained by the context
    /// before [`ContextEvent::EntityCreated`] fires.
    #[allow(clippy::cast_possible_truncation)]
    pub fn create_entity(&mut self) -> Entity {
        let creation_index = self.creation_index;
        self.creation_index = self.creation_index.wrapping_add(1);

        let entity = if let Some(slot) = self.reusable.pop() {
            let record = &mut self.records[slot as usize];
            record.reactivate(creation_index);
            Entity::new(slot, record.generation)
        } else {
            let slot = self.records.len() as u32;
            self.records
                .push(EntityRecord::initialize(creation_index, self.total_components));
            Entity::new(slot, 0)
        };

        self.records[entity.slot() as usize].retain.retain(Owner::Context);
        self.active.insert(entity);
        self.entities_cache_valid = false;

        trace!(context = %self.info.name, %entity, creation_index, "entity created");
        self.emit(ContextEvent::EntityCreated(entity));
        entity
    }

    /// Destroys an active entity.
    ///
    /// The entity goes back to the reuse pool immediately if the context
    /// was its only holder, otherwise it waits in the retained set until
    /// every other owner releases it.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NotInContext`] if `entity` is not active, or
    /// the first error raised by a named index while the components are
    /// cleared.
    pub fn destroy_entity(&mut self, entity: Entity) -> ContextResult<()> {
        if !self.active.swap_remove(&entity) {
            return Err(ContextError::NotInContext(entity));
        }
        self.entities_cache_valid = false;

        self.emit(ContextEvent::EntityWillBeDestroyed(entity));
        let cleared = self.clear_components(entity);
        self.emit(ContextEvent::EntityDestroyed(entity));

        self.release_owner(entity, Owner::Context)?;
        if self.records[entity.slot() as usize].generation == entity.generation() {
            self.retained.insert(entity);
        }
        trace!(context = %self.info.name, %entity, "entity destroyed");
        cleared
    }

    /// Destroys every active entity.
    ///
    /// Entities created by listeners while this runs are destroyed too.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::RetainedEntitiesRemain`] if destroyed
    /// entities are still held by owners other than the context.
    pub fn destroy_all_entities(&mut self) -> ContextResult<()> {
        while !self.active.is_empty() {
            let snapshot: Vec<Entity> = self.active.iter().copied().collect();
            for entity in snapshot {
                if self.active.contains(&entity) {
                    self.destroy_entity(entity)?;
                }
            }
        }
        self.active.clear();
        self.entities_cache_valid = false;

        if !self.retained.is_empty() {
            warn!(
                context = %self.info.name,
                retained = self.retained.len(),
                "destroyed entities are still retained"
            );
            return Err(ContextError::RetainedEntitiesRemain {
                count: self.retained.len(),
            });
        }
        Ok(())
    }

    /// Restarts creation indices at zero.
    ///
    /// Live entities keep their index, so collisions are the caller's
    /// responsibility.
    pub fn reset_creation_index(&mut self) {
        self.creation_index = 0;
    }

    /// Destroys all entities, restarts creation indices and drops every
    /// context and group subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::RetainedEntitiesRemain`] if external owners
    /// still hold destroyed entities; nothing else is reset in that case.
    pub fn reset(&mut self) -> ContextResult<()> {
        self.destroy_all_entities()?;
        self.reset_creation_index();
        self.listeners.clear();
        for listeners in &mut self.group_listeners {
            listeners.clear();
        }
        debug!(context = %self.info.name, "context reset");
        Ok(())
    }

    /// Returns `true` if `entity` is in the active set.
    #[inline]
    #[must_use]
    pub fn has_entity(&self, entity: Entity) -> bool {
        self.active.contains(&entity)
    }

    /// Number of active entities.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.active.len()
    }

    /// Number of records waiting in the reuse pool.
    #[inline]
    #[must_use]
    pub fn reusable_entities_count(&self) -> usize {
        self.reusable.len()
    }

    /// Number of destroyed entities still held by other owners.
    #[inline]
    #[must_use]
    pub fn retained_entities_count(&self) -> usize {
        self.retained.len()
    }

    /// Destroyed entities still held by other owners.
    pub fn retained_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.retained.iter().copied()
    }

    /// Iterates over the active entities.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.active.iter().copied()
    }

    /// Snapshot of the active entities, rebuilt only after the set changed.
    pub fn get_entities(&mut self) -> &[Entity] {
        if !self.entities_cache_valid {
            self.entities_cache.clear();
            self.entities_cache.extend(self.active.iter().copied());
            self.entities_cache_valid = true;
        }
        &self.entities_cache
    }

    // =========================================================================
    // Retention
    // =========================================================================

    /// Adds a retain for an external `owner`.
    ///
    /// The context, its groups and its collectors manage their own retains.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::ReservedOwner`] for any owner other than
    /// [`Owner::External`], [`ContextError::StaleEntity`] for a recycled
    /// handle and [`ContextError::AlreadyRetained`] if `owner` already
    /// holds it.
    pub fn retain(&mut self, entity: Entity, owner: Owner) -> ContextResult<()> {
        check_external(owner)?;
        let record = self.record_mut(entity)?;
        if !record.retain.retain(owner) {
            return Err(ContextError::AlreadyRetained { entity, owner });
        }
        Ok(())
    }

    /// Drops the retain held by an external `owner`.
    ///
    /// Releasing the last retain of a destroyed entity returns it to the
    /// reuse pool. A live entity is always held by the context, so an
    /// external release never recycles it.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::ReservedOwner`] for any owner other than
    /// [`Owner::External`], [`ContextError::NotRetainedBy`] if `owner`
    /// holds no retain, or [`ContextError::StaleEntity`] for a recycled
    /// handle.
    pub fn release(&mut self, entity: Entity, owner: Owner) -> ContextResult<()> {
        check_external(owner)?;
        self.release_owner(entity, owner)
    }

    /// Number of current holders of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::StaleEntity`] for a recycled handle.
    pub fn retain_count(&self, entity: Entity) -> ContextResult<usize> {
        Ok(self.record(entity)?.retain.count())
    }

    /// Returns `true` if `owner` holds a retain on `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::StaleEntity`] for a recycled handle.
    pub fn is_retained_by(&self, entity: Entity, owner: Owner) -> ContextResult<bool> {
        Ok(self.record(entity)?.retain.is_retained_by(owner))
    }

    /// Creation index of `entity`, its logical identity.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::StaleEntity`] for a recycled handle.
    pub fn creation_index(&self, entity: Entity) -> ContextResult<u32> {
        Ok(self.record(entity)?.creation_index)
    }

    /// Returns `true` until the entity's destruction starts clearing it.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::StaleEntity`] for a recycled handle.
    pub fn is_enabled(&self, entity: Entity) -> ContextResult<bool> {
        Ok(self.record(entity)?.enabled)
    }

    fn release_owner(&mut self, entity: Entity, owner: Owner) -> ContextResult<()> {
        let record = self.record_mut(entity)?;
        if !record.retain.release(owner) {
            return Err(ContextError::NotRetainedBy { entity, owner });
        }
        if record.retain.count() == 0 {
            self.on_entity_released(entity)?;
        }
        Ok(())
    }

    /// Moves a fully released entity from the retained set to the reuse pool.
    fn on_entity_released(&mut self, entity: Entity) -> ContextResult<()> {
        let record = &mut self.records[entity.slot() as usize];
        if record.enabled {
            return Err(ContextError::EntityStillEnabled(entity));
        }
        record.recycle();
        self.retained.swap_remove(&entity);
        self.reusable.push(entity.slot());
        trace!(context = %self.info.name, %entity, "entity recycled");
        Ok(())
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Stores a component in an empty slot.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::EntityNotEnabled`] for a destroyed entity,
    /// [`ContextError::ComponentAlreadyPresent`] if the slot is occupied,
    /// or the first error raised by a named index.
    pub fn add_component(
        &mut self,
        entity: Entity,
        slot: usize,
        component: Box<dyn Component>,
    ) -> ContextResult<()> {
        self.check_slot(slot)?;
        let record = self.enabled_record_mut(entity)?;
        if record.components[slot].is_some() {
            return Err(ContextError::ComponentAlreadyPresent { entity, slot });
        }
        record.components[slot] = Some(component);
        self.on_component_added_or_removed(entity, slot, None)
    }

    /// Removes the component in `slot` and parks it in the slot's pool.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::EntityNotEnabled`] for a destroyed entity,
    /// [`ContextError::ComponentNotPresent`] if the slot is empty, or the
    /// first error raised by a named index.
    pub fn remove_component(&mut self, entity: Entity, slot: usize) -> ContextResult<()> {
        self.check_slot(slot)?;
        self.enabled_record_mut(entity)?;
        self.take_component(entity, slot)
    }

    /// Stores a component, replacing the current one if present.
    ///
    /// A replacement keeps group membership unchanged and is delivered as
    /// [`GroupEventKind::Updated`]; the previous instance goes to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::EntityNotEnabled`] for a destroyed entity or
    /// the first error raised by a named index.
    pub fn replace_component(
        &mut self,
        entity: Entity,
        slot: usize,
        component: Box<dyn Component>,
    ) -> ContextResult<()> {
        self.check_slot(slot)?;
        let record = self.enabled_record_mut(entity)?;
        match record.components[slot].replace(component) {
            None => self.on_component_added_or_removed(entity, slot, None),
            Some(previous) => {
                let result = self.on_component_replaced(entity, slot, &*previous);
                self.component_pools.push(slot, previous);
                result
            }
        }
    }

    /// Component stored in `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::ComponentNotPresent`] if the slot is empty.
    pub fn get_component(&self, entity: Entity, slot: usize) -> ContextResult<&dyn Component> {
        self.check_slot(slot)?;
        self.record(entity)?
            .component(slot)
            .ok_or(ContextError::ComponentNotPresent { entity, slot })
    }

    /// Component stored in `slot`, downcast to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::ComponentNotPresent`] if the slot is empty
    /// and [`ContextError::ComponentTypeMismatch`] if it holds another type.
    pub fn get_component_as<T: Component>(&self, entity: Entity, slot: usize) -> ContextResult<&T> {
        self.get_component(entity, slot)?
            .downcast_ref::<T>()
            .ok_or(ContextError::ComponentTypeMismatch { entity, slot })
    }

    /// Returns `true` if `slot` is occupied. Stale handles have no components.
    #[must_use]
    pub fn has_component(&self, entity: Entity, slot: usize) -> bool {
        self.record(entity).is_ok_and(|r| r.has_component(slot))
    }

    /// Returns `true` if every slot in `slots` is occupied.
    #[must_use]
    pub fn has_components(&self, entity: Entity, slots: &[usize]) -> bool {
        self.record(entity)
            .is_ok_and(|r| slots.iter().all(|&slot| r.has_component(slot)))
    }

    /// Returns `true` if at least one slot in `slots` is occupied.
    #[must_use]
    pub fn has_any_component(&self, entity: Entity, slots: &[usize]) -> bool {
        self.record(entity)
            .is_ok_and(|r| slots.iter().any(|&slot| r.has_component(slot)))
    }

    /// Occupied slots in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::StaleEntity`] for a recycled handle.
    pub fn component_indices(&self, entity: Entity) -> ContextResult<Vec<usize>> {
        Ok(self.record(entity)?.occupied().collect())
    }

    /// Hands out a component for `slot`, reusing a pooled instance of the
    /// same type when one is cached. Reused instances are reset to
    /// `T::default()`.
    pub fn create_component<T: Component + Default>(&mut self, slot: usize) -> Box<T> {
        match self.component_pools.pop(slot) {
            Some(pooled) => match pooled.into_any().downcast::<T>() {
                Ok(mut component) => {
                    *component = T::default();
                    component
                }
                Err(_) => Box::default(),
            },
            None => Box::default(),
        }
    }

    /// Removed component instances cached per slot.
    #[inline]
    #[must_use]
    pub fn component_pools(&self) -> &ComponentPools {
        &self.component_pools
    }

    /// Drops the cached instances of one slot.
    pub fn clear_component_pool(&mut self, slot: usize) {
        self.component_pools.clear(slot);
    }

    /// Drops the cached instances of every slot.
    pub fn clear_component_pools(&mut self) {
        self.component_pools.clear_all();
    }

    /// Disables the entity and removes every component, routing each removal.
    fn clear_components(&mut self, entity: Entity) -> ContextResult<()> {
        let index = entity.slot() as usize;
        self.records[index].enabled = false;

        let mut result = Ok(());
        for slot in 0..self.total_components {
            if self.records[index].has_component(slot) {
                let removed = self.take_component(entity, slot);
                if result.is_ok() {
                    result = removed;
                }
            }
        }
        result
    }

    fn take_component(&mut self, entity: Entity, slot: usize) -> ContextResult<()> {
        let removed = self.records[entity.slot() as usize].components[slot]
            .take()
            .ok_or(ContextError::ComponentNotPresent { entity, slot })?;
        let result = self.on_component_added_or_removed(entity, slot, Some(&*removed));
        self.component_pools.push(slot, removed);
        result
    }

    // =========================================================================
    // Groups and routing
    // =========================================================================

    /// Returns the group for `matcher`, building it on first request.
    ///
    /// A new group is seeded silently with the matching active entities
    /// and routed every slot its matcher references, then
    /// [`ContextEvent::GroupCreated`] fires.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::SlotOutOfRange`] if the matcher references a
    /// slot this context does not have and [`ContextError::EmptyMatcher`]
    /// if it requires no component at all.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_group(&mut self, matcher: Matcher) -> ContextResult<GroupId> {
        if let Some(&id) = self.groups_by_matcher.get(&matcher) {
            return Ok(id);
        }
        if matcher.all_of_indices().is_empty() && matcher.any_of_indices().is_empty() {
            return Err(ContextError::EmptyMatcher(format!("{matcher:?}")));
        }
        for &slot in matcher.indices() {
            self.check_slot(slot)?;
        }

        let id = GroupId(self.groups.len() as u32);
        let mut group = Group::new(id, matcher.clone());
        for &entity in &self.active {
            group.handle_entity_silently(entity, &self.records[entity.slot() as usize]);
        }
        for entity in group.iter() {
            self.records[entity.slot() as usize]
                .retain
                .retain(Owner::Group(id));
        }

        for &slot in matcher.indices() {
            self.groups_for_slot[slot].push(id);
        }
        debug!(context = %self.info.name, group = id.index(), ?matcher, seeded = group.count(), "group created");
        self.groups.push(group);
        self.group_listeners.push(Listeners::default());
        self.groups_by_matcher.insert(matcher, id);

        self.emit(ContextEvent::GroupCreated(id));
        Ok(id)
    }

    /// Looks up a group by handle.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownGroup`] for a foreign handle.
    pub fn group(&self, id: GroupId) -> ContextResult<&Group> {
        self.groups.get(id.index()).ok_or(ContextError::UnknownGroup(id))
    }

    /// All groups in creation order.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// The only member of a group, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::SingleEntityViolation`] if the group has
    /// more than one member.
    pub fn single_entity(&self, id: GroupId) -> ContextResult<Option<Entity>> {
        let group = self.group(id)?;
        match group.count() {
            0 => Ok(None),
            1 => Ok(group.iter().next()),
            count => Err(ContextError::SingleEntityViolation { group: id, count }),
        }
    }

    /// Routes an add or remove on `slot` to the groups watching it.
    fn on_component_added_or_removed(
        &mut self,
        entity: Entity,
        slot: usize,
        previous: Option<&dyn Component>,
    ) -> ContextResult<()> {
        let routed = self.groups_for_slot[slot].len();
        if routed == 0 {
            return Ok(());
        }

        // Pass 1: settle every routed group, its retain and its indices.
        let mut changes = self.change_lists.get();
        let record = &self.records[entity.slot() as usize];
        for &id in &self.groups_for_slot[slot][..routed] {
            if let Some(change) = self.groups[id.index()].handle_entity(entity, record) {
                changes.push(change);
            }
        }
        let mut result = Ok(());
        for &change in &changes {
            let settled = self.settle(change, slot, previous);
            if result.is_ok() {
                result = settled;
            }
        }

        // Pass 2: deliver what listeners have not overtaken.
        for &change in &changes {
            self.deliver(change, slot, previous);
        }
        self.change_lists.push(changes);
        result
    }

    /// Forwards a replacement on `slot` to the watching groups.
    fn on_component_replaced(
        &mut self,
        entity: Entity,
        slot: usize,
        previous: &dyn Component,
    ) -> ContextResult<()> {
        let routed = self.groups_for_slot[slot].len();
        let mut result = Ok(());
        for pos in 0..routed {
            let id = self.groups_for_slot[slot][pos];
            if let Some(change) = self.groups[id.index()].update_entity(entity) {
                let settled = self.settle(change, slot, Some(previous));
                if result.is_ok() {
                    result = settled;
                }
                self.deliver(change, slot, Some(previous));
            }
        }
        result
    }

    /// Applies a membership change to the group's retain and its indices.
    ///
    /// Runs before any listener, so retains always mirror membership.
    fn settle(
        &mut self,
        change: GroupChange,
        slot: usize,
        previous: Option<&dyn Component>,
    ) -> ContextResult<()> {
        let owner = Owner::Group(change.group);
        let retained = match change.kind {
            GroupEventKind::Added => {
                let record = self.record_mut(change.entity)?;
                if record.retain.retain(owner) {
                    Ok(())
                } else {
                    Err(ContextError::AlreadyRetained { entity: change.entity, owner })
                }
            }
            GroupEventKind::Removed => self.release_owner(change.entity, owner),
            GroupEventKind::Updated => Ok(()),
        };
        let indexed = self.update_indices(change, slot, previous);
        retained.and(indexed)
    }

    /// Returns `true` while a settled change still describes the entity.
    ///
    /// A listener may destroy, recycle or re-add the entity before later
    /// changes of the same batch are delivered.
    fn is_current(&self, change: GroupChange) -> bool {
        let live = self
            .records
            .get(change.entity.slot() as usize)
            .is_some_and(|record| record.generation == change.entity.generation());
        let member = self.groups[change.group.index()].contains(change.entity);
        live && match change.kind {
            GroupEventKind::Added | GroupEventKind::Updated => member,
            GroupEventKind::Removed => !member,
        }
    }

    /// Delivers one settled group change to collectors, then listeners.
    fn deliver(&mut self, change: GroupChange, slot: usize, previous: Option<&dyn Component>) {
        if !self.is_current(change) {
            trace!(context = %self.info.name, entity = %change.entity, "skipped overtaken group change");
            return;
        }
        let previous = match change.kind {
            GroupEventKind::Added => None,
            GroupEventKind::Removed | GroupEventKind::Updated => previous,
        };
        self.update_collectors(change);
        self.emit_group(&GroupEvent {
            group: change.group,
            entity: change.entity,
            slot,
            kind: change.kind,
            previous,
        });
    }

    fn update_indices(
        &mut self,
        change: GroupChange,
        slot: usize,
        previous: Option<&dyn Component>,
    ) -> ContextResult<()> {
        let Some(record) = self
            .records
            .get(change.entity.slot() as usize)
            .filter(|record| record.generation == change.entity.generation())
        else {
            return Err(ContextError::StaleEntity(change.entity));
        };
        let mut result = Ok(());
        for index in self.entity_indices.values_mut() {
            if index.group() != change.group {
                continue;
            }
            let current = record.component(index.slot());
            let keyed_previous = if slot == index.slot() { previous } else { current };
            let outcome = match change.kind {
                GroupEventKind::Added => current.map_or(Ok(()), |c| index.entity_added(change.entity, c)),
                GroupEventKind::Removed => {
                    if let Some(c) = keyed_previous {
                        index.entity_removed(change.entity, c);
                    }
                    Ok(())
                }
                GroupEventKind::Updated if slot == index.slot() => {
                    if let Some(c) = previous {
                        index.entity_removed(change.entity, c);
                    }
                    current.map_or(Ok(()), |c| index.entity_added(change.entity, c))
                }
                GroupEventKind::Updated => Ok(()),
            };
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    }

    fn update_collectors(&mut self, change: GroupChange) {
        let Some(record) = self
            .records
            .get_mut(change.entity.slot() as usize)
            .filter(|record| record.generation == change.entity.generation())
        else {
            return;
        };
        for collector in &mut self.collectors {
            if collector.wants(change.group, change.kind) && collector.collect(change.entity) {
                let retained = record.retain.retain(Owner::Collector(collector.id()));
                debug_assert!(retained, "collector retain out of sync with its entity set");
            }
        }
    }

    // =========================================================================
    // Collectors
    // =========================================================================

    /// Creates an active collector over the given group triggers.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownGroup`] for a foreign group handle.
    #[allow(clippy::cast_possible_truncation)]
    pub fn create_collector(&mut self, triggers: &[(GroupId, GroupTrigger)]) -> ContextResult<CollectorId> {
        for &(group, _) in triggers {
            self.group(group)?;
        }
        let id = CollectorId(self.collectors.len() as u32);
        self.collectors.push(Collector::new(id, triggers));
        Ok(id)
    }

    /// Looks up a collector by handle.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownCollector`] for a foreign handle.
    pub fn collector(&self, id: CollectorId) -> ContextResult<&Collector> {
        self.collectors
            .get(id.0 as usize)
            .ok_or(ContextError::UnknownCollector(id))
    }

    /// Entities a collector has gathered since it was last cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownCollector`] for a foreign handle.
    pub fn collected(&self, id: CollectorId) -> ContextResult<Vec<Entity>> {
        Ok(self.collector(id)?.iter().collect())
    }

    /// Number of entities a collector holds.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownCollector`] for a foreign handle.
    pub fn collected_count(&self, id: CollectorId) -> ContextResult<usize> {
        Ok(self.collector(id)?.count())
    }

    /// Empties a collector and releases its retains.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownCollector`] for a foreign handle.
    pub fn clear_collected(&mut self, id: CollectorId) -> ContextResult<()> {
        let collected = self
            .collectors
            .get_mut(id.0 as usize)
            .ok_or(ContextError::UnknownCollector(id))?
            .drain();
        for entity in collected {
            self.release_owner(entity, Owner::Collector(id))?;
        }
        Ok(())
    }

    /// Resumes recording group events.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownCollector`] for a foreign handle.
    pub fn activate_collector(&mut self, id: CollectorId) -> ContextResult<()> {
        self.collectors
            .get_mut(id.0 as usize)
            .ok_or(ContextError::UnknownCollector(id))?
            .set_active(true);
        Ok(())
    }

    /// Stops recording and clears what was collected.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownCollector`] for a foreign handle.
    pub fn deactivate_collector(&mut self, id: CollectorId) -> ContextResult<()> {
        self.collectors
            .get_mut(id.0 as usize)
            .ok_or(ContextError::UnknownCollector(id))?
            .set_active(false);
        self.clear_collected(id)
    }

    // =========================================================================
    // Named indices
    // =========================================================================

    /// Registers a named index and seeds it from its group.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::IndexAlreadyExists`] if the name is taken,
    /// [`ContextError::UnknownGroup`] for a foreign group handle,
    /// [`ContextError::IndexSlotNotRequired`] unless the group's all-of
    /// list contains the index slot, or the first error raised while
    /// seeding.
    pub fn add_entity_index(&mut self, mut index: Box<dyn EntityIndex>) -> ContextResult<()> {
        if self.entity_indices.contains_key(index.name()) {
            return Err(ContextError::IndexAlreadyExists(index.name().to_owned()));
        }
        self.check_slot(index.slot())?;
        let group = self.group(index.group())?;
        if !group.matcher().all_of_indices().contains(&index.slot()) {
            return Err(ContextError::IndexSlotNotRequired {
                index: index.name().to_owned(),
                slot: index.slot(),
            });
        }
        for entity in group.iter() {
            if let Some(component) = self.records[entity.slot() as usize].component(index.slot()) {
                index.entity_added(entity, component)?;
            }
        }
        debug!(context = %self.info.name, index = index.name(), "entity index added");
        self.entity_indices.insert(index.name().to_owned(), index);
        Ok(())
    }

    /// Looks up a named index.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::IndexNotFound`] if no index has this name.
    pub fn get_entity_index(&self, name: &str) -> ContextResult<&dyn EntityIndex> {
        self.entity_indices
            .get(name)
            .map(|index| &**index)
            .ok_or_else(|| ContextError::IndexNotFound(name.to_owned()))
    }

    /// Looks up a named index of a known concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::IndexNotFound`] if no index has this name and
    /// [`ContextError::IndexTypeMismatch`] if it has another type.
    pub fn get_entity_index_as<I: EntityIndex>(&self, name: &str) -> ContextResult<&I> {
        self.get_entity_index(name)?
            .as_any()
            .downcast_ref::<I>()
            .ok_or_else(|| ContextError::IndexTypeMismatch(name.to_owned()))
    }

    /// Unregisters every named index.
    pub fn remove_entity_indices(&mut self) {
        for index in self.entity_indices.values_mut() {
            index.clear();
        }
        self.entity_indices.clear();
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribes to context lifecycle events.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&mut Context, ContextEvent) + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(Box::new(listener))
    }

    /// Drops a context subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Subscribes to membership events of one group.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UnknownGroup`] for a foreign handle.
    pub fn subscribe_group(
        &mut self,
        group: GroupId,
        listener: impl for<'a> FnMut(&mut Context, &GroupEvent<'a>) + 'static,
    ) -> ContextResult<SubscriptionId> {
        let listeners = self
            .group_listeners
            .get_mut(group.index())
            .ok_or(ContextError::UnknownGroup(group))?;
        Ok(listeners.subscribe(Box::new(listener)))
    }

    /// Drops a group subscription. Returns `false` if it was unknown.
    pub fn unsubscribe_group(&mut self, group: GroupId, id: SubscriptionId) -> bool {
        self.group_listeners
            .get_mut(group.index())
            .is_some_and(|listeners| listeners.unsubscribe(id))
    }

    /// Number of live context subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn emit(&mut self, event: ContextEvent) {
        let len = self.listeners.begin();
        for pos in 0..len {
            if let Some(mut listener) = self.listeners.take(pos) {
                listener(&mut *self, event);
                self.listeners.restore(pos, listener);
            }
        }
        self.listeners.end();
    }

    fn emit_group(&mut self, event: &GroupEvent<'_>) {
        let group = event.group.index();
        let len = self.group_listeners[group].begin();
        for pos in 0..len {
            if let Some(mut listener) = self.group_listeners[group].take(pos) {
                listener(&mut *self, event);
                self.group_listeners[group].restore(pos, listener);
            }
        }
        self.group_listeners[group].end();
    }

    // =========================================================================
    // Handle validation
    // =========================================================================

    fn record(&self, entity: Entity) -> ContextResult<&EntityRecord> {
        self.records
            .get(entity.slot() as usize)
            .filter(|r| r.generation == entity.generation())
            .ok_or(ContextError::StaleEntity(entity))
    }

    fn record_mut(&mut self, entity: Entity) -> ContextResult<&mut EntityRecord> {
        self.records
            .get_mut(entity.slot() as usize)
            .filter(|r| r.generation == entity.generation())
            .ok_or(ContextError::StaleEntity(entity))
    }

    fn enabled_record_mut(&mut self, entity: Entity) -> ContextResult<&mut EntityRecord> {
        let record = self.record_mut(entity)?;
        if !record.enabled {
            return Err(ContextError::EntityNotEnabled(entity));
        }
        Ok(record)
    }

    fn check_slot(&self, slot: usize) -> ContextResult<()> {
        if slot >= self.total_components {
            return Err(ContextError::SlotOutOfRange {
                slot,
                total: self.total_components,
            });
        }
        Ok(())
    }
}

fn check_external(owner: Owner) -> ContextResult<()> {
    match owner {
        Owner::External(_) => Ok(()),
        Owner::Context | Owner::Group(_) | Owner::Collector(_) => Err(ContextError::ReservedOwner(owner)),
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.info.name)
            .field("total_components", &self.total_components)
            .field("active", &self.active.len())
            .field("reusable", &self.reusable.len())
            .field("retained", &self.retained.len())
            .field("groups", &self.groups.len())
            .field("collectors", &self.collectors.len())
            .field("entity_indices", &self.entity_indices.len())
            .finish_non_exhaustive()
    }
}
