//! # Notifications
//!
//! Events raised by the context and the subscription tables that deliver
//! them. Listeners receive `&mut Context`, so they may call back into it.
//!
//! ## Reentrancy
//!
//! A listener is detached from its table only while it runs. A nested
//! event raised from inside a listener reaches every other listener of the
//! table but not the running one. Entries added during a dispatch are not
//! invoked for the in-flight event; entries removed during a dispatch are
//! tombstoned and compacted once the outermost dispatch returns.

use super::component::Component;
use super::context::Context;
use super::entity::Entity;
use super::GroupId;

/// Lifecycle events of the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextEvent {
    /// An entity was created or reactivated and is fully registered.
    EntityCreated(Entity),
    /// An entity left the active set; its components are still readable.
    EntityWillBeDestroyed(Entity),
    /// An entity's components were cleared.
    EntityDestroyed(Entity),
    /// A group was constructed for a matcher seen for the first time.
    GroupCreated(GroupId),
}

/// What happened to a group member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupEventKind {
    /// The entity started matching.
    Added,
    /// The entity stopped matching.
    Removed,
    /// A watched component was replaced on a member.
    Updated,
}

/// Membership change delivered to group listeners.
#[derive(Clone, Copy, Debug)]
pub struct GroupEvent<'a> {
    /// Group that changed.
    pub group: GroupId,
    /// Affected entity.
    pub entity: Entity,
    /// Slot whose mutation caused the change.
    pub slot: usize,
    /// Kind of change.
    pub kind: GroupEventKind,
    /// The removed component for `Removed` caused by a slot removal, the
    /// replaced component for `Updated`, `None` otherwise. The current
    /// value can be read through the context.
    pub previous: Option<&'a dyn Component>,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Listener for context lifecycle events.
pub type ContextListener = dyn FnMut(&mut Context, ContextEvent);

/// Listener for group membership events.
pub type GroupListener = dyn for<'a> FnMut(&mut Context, &GroupEvent<'a>);

struct Entry<F: ?Sized> {
    id: SubscriptionId,
    callback: Option<Box<F>>,
    removed: bool,
}

/// Subscription table that tolerates mutation while dispatching.
pub(crate) struct Listeners<F: ?Sized> {
    entries: Vec<Entry<F>>,
    next_id: u64,
    depth: usize,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            depth: 0,
        }
    }
}

impl<F: ?Sized> Listeners<F> {
    pub(crate) fn subscribe(&mut self, callback: Box<F>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            callback: Some(callback),
            removed: false,
        });
        id
    }

    /// Returns `false` if `id` is unknown or already removed.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.id == id && !e.removed)
        else {
            return false;
        };
        if self.depth == 0 {
            self.entries.remove(pos);
        } else {
            let entry = &mut self.entries[pos];
            entry.removed = true;
            entry.callback = None;
        }
        true
    }

    pub(crate) fn clear(&mut self) {
        if self.depth == 0 {
            self.entries.clear();
        } else {
            for entry in &mut self.entries {
                entry.removed = true;
                entry.callback = None;
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.removed).count()
    }

    /// Marks the start of a dispatch and returns the entry count to visit.
    pub(crate) fn begin(&mut self) -> usize {
        self.depth += 1;
        self.entries.len()
    }

    /// Detaches the callback at `pos` if it is live and not already running.
    pub(crate) fn take(&mut self, pos: usize) -> Option<Box<F>> {
        let entry = self.entries.get_mut(pos)?;
        if entry.removed {
            return None;
        }
        entry.callback.take()
    }

    /// Reattaches a callback detached by `take`.
    pub(crate) fn restore(&mut self, pos: usize, callback: Box<F>) {
        if let Some(entry) = self.entries.get_mut(pos) {
            if !entry.removed {
                entry.callback = Some(callback);
            }
        }
    }

    /// Marks the end of a dispatch, compacting tombstones at the outermost level.
    pub(crate) fn end(&mut self) {
        self.depth -= 1;
        if self.depth == 0 {
            self.entries.retain(|e| !e.removed);
        }
    }
}
