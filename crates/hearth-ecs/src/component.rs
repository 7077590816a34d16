//! Component type registration, presence masks and column storage.
//!
//! Every component type used in the store must be registered at runtime in a
//! [`ComponentRegistry`]. Registration assigns a [`ComponentTypeId`], which is
//! also the bit position of that type in every entity's [`ComponentMask`].
//! Values live in one [`Column`] per type, indexed by entity index
//! (structure-of-arrays).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::EcsError;

/// Upper bound on registered component types (one bit each in a `u64` mask).
pub const MAX_COMPONENTS: usize = 64;

/// Marker for types that can be stored as components.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u8);

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentMask
// ---------------------------------------------------------------------------

/// Bitset of component types. Bit `n` is set when the type with
/// `ComponentTypeId(n)` is present.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// The empty mask.
    pub const EMPTY: Self = Self(0);

    /// This mask with `id` added.
    #[inline]
    pub fn with(self, id: ComponentTypeId) -> Self {
        Self(self.0 | 1u64 << id.0)
    }

    /// This mask with `id` cleared.
    #[inline]
    pub fn without(self, id: ComponentTypeId) -> Self {
        Self(self.0 & !(1u64 << id.0))
    }

    #[inline]
    pub fn has(self, id: ComponentTypeId) -> bool {
        self.0 & (1u64 << id.0) != 0
    }

    /// True when every bit of `required` is also set in `self`.
    #[inline]
    pub fn contains(self, required: ComponentMask) -> bool {
        self.0 & required.0 == required.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMask({:#b})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Maps Rust types to [`ComponentTypeId`]s and human-readable names.
///
/// Registering the same Rust type twice returns the existing id.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    names: Vec<String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`.
    pub fn register<T: Component>(&mut self, name: &str) -> Result<ComponentTypeId, EcsError> {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return Ok(existing);
        }
        if self.names.iter().any(|n| n == name) {
            return Err(EcsError::DuplicateComponentName {
                name: name.to_owned(),
            });
        }
        if self.names.len() >= MAX_COMPONENTS {
            return Err(EcsError::TooManyComponents {
                name: name.to_owned(),
                max: MAX_COMPONENTS,
            });
        }

        let id = ComponentTypeId(self.names.len() as u8);
        self.names.push(name.to_owned());
        self.by_type.insert(rust_type_id, id);
        Ok(id)
    }

    /// Look up a component type by its Rust `TypeId`.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Registered name for `id`.
    pub fn name(&self, id: ComponentTypeId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Registered names, in registration order.
    pub fn registered_names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }
}

// ---------------------------------------------------------------------------
// Column storage
// ---------------------------------------------------------------------------

/// Dense per-type storage indexed by entity index.
#[derive(Debug)]
pub(crate) struct Column<T> {
    slots: Vec<Option<T>>,
}

impl<T> Column<T> {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Store `value` at `index`, returning whatever was there.
    pub(crate) fn put(&mut self, index: usize, value: T) -> Option<T> {
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index].replace(value)
    }

    pub(crate) fn take(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index)?.take()
    }
}

/// Type-erased view of a [`Column`], so the store can clear a slot without
/// knowing the component type.
pub(crate) trait AnyColumn: Send + Sync {
    fn clear(&mut self, index: usize);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyColumn for Column<T> {
    fn clear(&mut self, index: usize) {
        self.take(index);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
