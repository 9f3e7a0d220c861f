//! # Context Error Types
//!
//! All errors that can occur while driving a [`Context`](crate::Context).
//!
//! Every variant is a programming error on the caller's side. The context
//! never retries and never suppresses a failure; it is surfaced to the
//! immediate caller unchanged.

use thiserror::Error;

use crate::ecs::{CollectorId, Entity, GroupId, Owner};

/// Errors that can occur in the entity context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// Tried to destroy an entity that is not in the active set.
    #[error("entity {0} is not an active entity of this context")]
    NotInContext(Entity),

    /// A full reset was attempted while external owners still hold
    /// destroyed entities.
    #[error("cannot reset context: {count} destroyed entities are still retained")]
    RetainedEntitiesRemain {
        /// Number of entities still parked in the retained set.
        count: usize,
    },

    /// The last retain of an entity was about to be released while the
    /// entity is still alive.
    #[error("entity {0} is still enabled and cannot be released to the reuse pool")]
    EntityStillEnabled(Entity),

    /// A named index is already registered under this name.
    #[error("entity index already exists: {0}")]
    IndexAlreadyExists(String),

    /// No named index is registered under this name.
    #[error("entity index not found: {0}")]
    IndexNotFound(String),

    /// A named index exists but is not of the requested concrete type.
    #[error("entity index {0} has a different concrete type")]
    IndexTypeMismatch(String),

    /// A primary index saw two entities with the same key.
    #[error("entity index {index}: key already maps to entity {existing}")]
    IndexKeyConflict {
        /// Name of the offending index.
        index: String,
        /// Entity already registered under the key.
        existing: Entity,
    },

    /// The index slot is not required by its group's all-of list, so
    /// members could gain or lose it without a group event.
    #[error("entity index {index}: slot {slot} is not required by its group")]
    IndexSlotNotRequired {
        /// Name of the rejected index.
        index: String,
        /// Slot the index is keyed on.
        slot: usize,
    },

    /// Context metadata disagrees with the fixed slot count.
    #[error("slot count mismatch: context has {expected} slots, metadata names {actual}")]
    SlotCountMismatch {
        /// Slot count fixed at construction.
        expected: usize,
        /// Slot count described by the supplied metadata.
        actual: usize,
    },

    /// The handle refers to a record that was recycled since.
    #[error("stale entity handle {0}")]
    StaleEntity(Entity),

    /// Component mutation on a destroyed entity.
    #[error("entity {0} is not enabled")]
    EntityNotEnabled(Entity),

    /// Slot index outside `0..total_components`.
    #[error("slot {slot} is out of range (context has {total} slots)")]
    SlotOutOfRange {
        /// Requested slot.
        slot: usize,
        /// Slot count of the context.
        total: usize,
    },

    /// The slot is already occupied.
    #[error("entity {entity} already has a component at slot {slot}")]
    ComponentAlreadyPresent {
        /// Target entity.
        entity: Entity,
        /// Occupied slot.
        slot: usize,
    },

    /// The slot is empty.
    #[error("entity {entity} has no component at slot {slot}")]
    ComponentNotPresent {
        /// Target entity.
        entity: Entity,
        /// Empty slot.
        slot: usize,
    },

    /// The slot holds a component of a different type.
    #[error("entity {entity} has a component of another type at slot {slot}")]
    ComponentTypeMismatch {
        /// Target entity.
        entity: Entity,
        /// Queried slot.
        slot: usize,
    },

    /// The owner already holds a retain on the entity.
    #[error("entity {entity} is already retained by {owner:?}")]
    AlreadyRetained {
        /// Target entity.
        entity: Entity,
        /// Owner that tried to retain twice.
        owner: Owner,
    },

    /// Only external owners may retain or release through the public API.
    #[error("owner {0:?} is managed by the context")]
    ReservedOwner(Owner),

    /// The owner does not hold a retain on the entity.
    #[error("entity {entity} is not retained by {owner:?}")]
    NotRetainedBy {
        /// Target entity.
        entity: Entity,
        /// Owner that tried to release.
        owner: Owner,
    },

    /// The group handle was not issued by this context.
    #[error("unknown group {0:?}")]
    UnknownGroup(GroupId),

    /// The collector handle was not issued by this context.
    #[error("unknown collector {0:?}")]
    UnknownCollector(CollectorId),

    /// `single_entity` was called on a group with more than one member.
    #[error("group {group:?} holds {count} entities, expected at most one")]
    SingleEntityViolation {
        /// Queried group.
        group: GroupId,
        /// Actual member count.
        count: usize,
    },

    /// The matcher has no all-of or any-of slot, so no component change
    /// could ever route to its group.
    #[error("matcher {0} requires no component")]
    EmptyMatcher(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for context operations.
pub type ContextResult<T> = Result<T, ContextError>;
