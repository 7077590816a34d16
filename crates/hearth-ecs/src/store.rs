//! The [`EntityStore`] owns entity identity and all component storage.
//!
//! Storage is structure-of-arrays: one column per registered component type,
//! indexed by entity index, plus one [`ComponentMask`] per entity index that
//! records which columns hold a value. Query matching is a mask comparison.

use crate::component::{AnyColumn, Column, Component, ComponentMask, ComponentRegistry, ComponentTypeId};
use crate::entity::{EntityAllocator, EntityId};
use crate::query::Filter;
use crate::EcsError;

/// Top-level ECS container.
pub struct EntityStore {
    allocator: EntityAllocator,
    registry: ComponentRegistry,
    /// Indexed by `ComponentTypeId.0`.
    columns: Vec<Box<dyn AnyColumn>>,
    /// Indexed by entity index. Empty for free slots.
    masks: Vec<ComponentMask>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("entity_count", &self.allocator.alive_count())
            .field("components", &self.registry.registered_names())
            .finish()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            registry: ComponentRegistry::new(),
            columns: Vec::new(),
            masks: Vec::new(),
        }
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Register a component type and allocate its column.
    ///
    /// Registering an already-known type returns its existing id.
    pub fn register_component<T: Component>(
        &mut self,
        name: &str,
    ) -> Result<ComponentTypeId, EcsError> {
        let id = self.registry.register::<T>(name)?;
        if id.0 as usize == self.columns.len() {
            self.columns.push(Box::new(Column::<T>::new()));
        }
        Ok(id)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Allocate a fresh entity with no components.
    pub fn create(&mut self) -> EntityId {
        let entity = self.allocator.allocate();
        let idx = entity.index() as usize;
        if idx >= self.masks.len() {
            self.masks.resize(idx + 1, ComponentMask::EMPTY);
        }
        self.masks[idx] = ComponentMask::EMPTY;
        tracing::trace!(entity = %entity, "entity created");
        entity
    }

    /// Remove every component of `entity` and invalidate the id.
    pub fn destroy(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        let idx = entity.index() as usize;
        let mask = std::mem::take(&mut self.masks[idx]);
        for (type_idx, column) in self.columns.iter_mut().enumerate() {
            if mask.has(ComponentTypeId(type_idx as u8)) {
                column.clear(idx);
            }
        }
        self.allocator.deallocate(entity);
        tracing::trace!(entity = %entity, "entity destroyed");
        Ok(())
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.allocator.alive_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- component access ---------------------------------------------------

    /// Attach `value` to `entity`, replacing and returning any previous value
    /// of the same type.
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) -> Result<Option<T>, EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        let Some(type_id) = self.registry.lookup::<T>() else {
            return Err(self.unknown::<T>());
        };
        let Some(column) = self.column_mut::<T>(type_id) else {
            return Err(self.unknown::<T>());
        };
        let idx = entity.index() as usize;
        let previous = column.put(idx, value);
        self.masks[idx] = self.masks[idx].with(type_id);
        Ok(previous)
    }

    /// Detach the `T` component from `entity`.
    ///
    /// Removing a component the entity does not have, or removing from a dead
    /// entity, is a no-op that returns `None`.
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> Option<T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        let type_id = self.registry.lookup::<T>()?;
        let idx = entity.index() as usize;
        let removed = self.column_mut::<T>(type_id)?.take(idx);
        self.masks[idx] = self.masks[idx].without(type_id);
        removed
    }

    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        let type_id = self.registry.lookup::<T>()?;
        self.column::<T>(type_id)?.get(entity.index() as usize)
    }

    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        let type_id = self.registry.lookup::<T>()?;
        self.column_mut::<T>(type_id)?
            .get_mut(entity.index() as usize)
    }

    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        match (self.mask(entity), self.registry.lookup::<T>()) {
            (Some(mask), Some(type_id)) => mask.has(type_id),
            _ => false,
        }
    }

    /// The component mask of a live entity.
    pub fn mask(&self, entity: EntityId) -> Option<ComponentMask> {
        if self.allocator.is_alive(entity) {
            Some(self.masks[entity.index() as usize])
        } else {
            None
        }
    }

    // -- queries ------------------------------------------------------------

    /// All live entities matching `filter`, ordered by entity index.
    pub fn query(&self, filter: &Filter) -> Vec<EntityId> {
        (0..self.allocator.capacity())
            .filter(|&idx| filter.matches(self.masks[idx]))
            .filter_map(|idx| self.allocator.live_at(idx))
            .collect()
    }

    /// All live entities, ordered by entity index.
    pub fn entities(&self) -> Vec<EntityId> {
        (0..self.allocator.capacity())
            .filter_map(|idx| self.allocator.live_at(idx))
            .collect()
    }

    // -- internals ----------------------------------------------------------

    fn column<T: Component>(&self, type_id: ComponentTypeId) -> Option<&Column<T>> {
        self.columns
            .get(type_id.0 as usize)?
            .as_any()
            .downcast_ref::<Column<T>>()
    }

    fn column_mut<T: Component>(&mut self, type_id: ComponentTypeId) -> Option<&mut Column<T>> {
        self.columns
            .get_mut(type_id.0 as usize)?
            .as_any_mut()
            .downcast_mut::<Column<T>>()
    }

    fn unknown<T: Component>(&self) -> EcsError {
        EcsError::UnknownComponent {
            name: std::any::type_name::<T>().to_owned(),
            registered: self.registry.registered_names().join(", "),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
