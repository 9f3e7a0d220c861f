//! # Entity Context
//!
//! Entities, groups and the context that ties them together.
//!
//! ## Design Philosophy
//!
//! - Entity records live in one arena and are recycled through a LIFO pool
//! - Handles carry a generation counter, identity is the creation index
//! - Groups are cached per matcher and routed per component slot
//! - Notifications go through subscription tables owned by the context

mod collector;
mod component;
mod context;
mod entity;
mod events;
mod group;
mod index;
mod matcher;

pub use collector::{Collector, CollectorId, GroupTrigger};
pub use component::Component;
pub use context::Context;
pub use entity::{Entity, Owner, RetainTracker};
pub use events::{
    ContextEvent, ContextListener, GroupEvent, GroupEventKind, GroupListener, SubscriptionId,
};
pub use group::{Group, GroupId};
pub use index::{EntityIndex, MultiEntityIndex, PrimaryEntityIndex};
pub use matcher::Matcher;
