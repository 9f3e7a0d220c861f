//! # Cohort Core
//!
//! Entity context with reference-counted retention and incrementally
//! maintained groups, designed for:
//! - Steady-state operation without allocation (records, scratch lists and
//!   components are pooled)
//! - Group updates that only touch the groups watching the changed slot
//! - Safe deferred destruction while outside code still holds an entity
//!
//! ## Architecture Rules
//!
//! 1. **Identity is the creation index** - records are reused, handles carry
//!    a generation so a stale handle never reaches the new occupant
//! 2. **Two-phase group updates** - every routed group settles before any
//!    listener observes the change
//! 3. **Explicit errors** - every misuse surfaces as a [`ContextError`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use cohort_core::{Context, Matcher};
//!
//! let mut ctx = Context::new(3, 0, None)?;
//! let named = ctx.get_group(Matcher::all_of([NAME]))?;
//! let e = ctx.create_entity();
//! ctx.add_component(e, NAME, Box::new(Name("player")))?;
//! assert_eq!(ctx.single_entity(named)?, Some(e));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::{ContextConfig, ContextInfo};
pub use ecs::{
    Collector, CollectorId, Component, Context, ContextEvent, ContextListener, Entity,
    EntityIndex, Group, GroupEvent, GroupEventKind, GroupId, GroupListener, GroupTrigger,
    Matcher, MultiEntityIndex, Owner, PrimaryEntityIndex, RetainTracker, SubscriptionId,
};
pub use error::{ContextError, ContextResult};
pub use memory::{ComponentPools, ObjectPool};
