//! # Object Pools
//!
//! LIFO caches of reusable instances for objects that are frequently
//! handed out and returned: scratch lists for the batched group update and
//! removed component instances.

use std::fmt;

use crate::ecs::Component;

/// A LIFO cache of reusable instances.
///
/// `get` hands out the most recently returned instance, or builds a new one
/// with the factory when the cache is empty. `push` clears the instance with
/// the reset function before caching it, so handed-out instances are always
/// in cleared state.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = ObjectPool::new(Vec::<u32>::new, Vec::clear);
///
/// let mut list = pool.get();
/// list.push(42);
/// pool.push(list); // cleared, capacity kept
///
/// assert!(pool.get().is_empty());
/// ```
pub struct ObjectPool<T> {
    /// Cached instances, top of stack last.
    items: Vec<T>,
    /// Builds an instance when the cache is empty.
    factory: fn() -> T,
    /// Clears an instance on return.
    reset: fn(&mut T),
}

impl<T> ObjectPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(factory: fn() -> T, reset: fn(&mut T)) -> Self {
        Self {
            items: Vec::new(),
            factory,
            reset,
        }
    }

    /// Number of cached instances.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is cached.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pops a cached instance or builds a fresh one.
    #[inline]
    pub fn get(&mut self) -> T {
        self.items.pop().unwrap_or_else(self.factory)
    }

    /// Clears `item` and caches it for reuse.
    #[inline]
    pub fn push(&mut self, mut item: T) {
        (self.reset)(&mut item);
        self.items.push(item);
    }

    /// Builds instances until at least `count` are cached.
    pub fn prewarm(&mut self, count: usize) {
        self.items.reserve(count.saturating_sub(self.items.len()));
        while self.items.len() < count {
            self.items.push((self.factory)());
        }
    }

    /// Drops every cached instance.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("len", &self.items.len())
            .finish_non_exhaustive()
    }
}

/// One LIFO stack of removed component instances per slot index.
///
/// Removed and replaced components land here so that the next
/// `create_component` for the same slot can reuse the allocation.
#[derive(Debug, Default)]
pub struct ComponentPools {
    stacks: Box<[Vec<Box<dyn Component>>]>,
}

impl ComponentPools {
    /// Creates `total_components` empty stacks.
    #[must_use]
    pub fn new(total_components: usize) -> Self {
        Self {
            stacks: (0..total_components).map(|_| Vec::new()).collect(),
        }
    }

    /// Number of slot stacks.
    #[inline]
    #[must_use]
    pub fn slots(&self) -> usize {
        self.stacks.len()
    }

    /// Number of cached instances for `slot`.
    #[inline]
    #[must_use]
    pub fn len(&self, slot: usize) -> usize {
        self.stacks.get(slot).map_or(0, Vec::len)
    }

    /// Returns `true` if no slot has a cached instance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.iter().all(Vec::is_empty)
    }

    /// Caches a removed component for `slot`.
    #[inline]
    pub(crate) fn push(&mut self, slot: usize, component: Box<dyn Component>) {
        if let Some(stack) = self.stacks.get_mut(slot) {
            stack.push(component);
        }
    }

    /// Pops the most recently cached component for `slot`.
    #[inline]
    pub(crate) fn pop(&mut self, slot: usize) -> Option<Box<dyn Component>> {
        self.stacks.get_mut(slot)?.pop()
    }

    /// Drops the cached instances of one slot.
    pub fn clear(&mut self, slot: usize) {
        if let Some(stack) = self.stacks.get_mut(slot) {
            stack.clear();
        }
    }

    /// Drops the cached instances of every slot.
    pub fn clear_all(&mut self) {
        for stack in self.stacks.iter_mut() {
            stack.clear();
        }
    }
}
