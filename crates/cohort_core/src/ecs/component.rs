//! # Component System
//!
//! Components are plain data records stored in an entity's slot array.
//! Each component type is assigned a fixed slot index by the caller; the
//! context only cares whether a slot is populated.

use std::any::Any;
use std::fmt::Debug;

/// Marker trait for data stored in an entity slot.
///
/// Implemented for every `'static` type that is `Debug`, so any plain
/// struct can be stored without extra boilerplate.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Default)]
/// struct Position { x: f32, y: f32 }
///
/// const POSITION: usize = 0;
/// ctx.add_component(entity, POSITION, Box::new(Position { x: 1.0, y: 2.0 }))?;
/// ```
pub trait Component: Any + Debug {
    /// Upcasts to `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts to `&mut dyn Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Upcasts the box to `Box<dyn Any>` for by-value downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any + Debug> Component for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    #[inline]
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn Component {
    /// Returns `true` if the boxed value is a `T`.
    #[inline]
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcasts to a concrete component type.
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcasts to a concrete component type.
    #[inline]
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
