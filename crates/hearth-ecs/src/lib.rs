//! Hearth ECS -- structure-of-arrays entity store with transition queries.
//!
//! Entities are generational ids. Each registered component type gets one
//! column indexed by entity index, and each entity carries a bitmask of the
//! columns it occupies, so query membership is a single mask comparison.
//!
//! # Quick Start
//!
//! ```
//! use hearth_ecs::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut store = EntityStore::new();
//! store.register_component::<Position>("position").unwrap();
//! store.register_component::<Velocity>("velocity").unwrap();
//!
//! let moving = Filter::of::<(Position, Velocity)>(&store);
//! let mut arrivals = TransitionQuery::new(moving);
//!
//! let entity = store.create();
//! store.insert(entity, Position { x: 0.0, y: 0.0 }).unwrap();
//! store.insert(entity, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
//!
//! assert_eq!(store.query(&moving), vec![entity]);
//! assert_eq!(arrivals.evaluate(&store).entered, vec![entity]);
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod query;
pub mod store;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (destroyed, stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A component type was used before being registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// Two different Rust types were registered under one name.
    #[error("component name '{name}' is already registered for a different type")]
    DuplicateComponentName { name: String },

    /// The component mask has no free bit left.
    #[error("cannot register component '{name}': at most {max} component types are supported")]
    TooManyComponents { name: String, max: usize },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentMask, ComponentRegistry, ComponentTypeId};
    pub use crate::entity::EntityId;
    pub use crate::query::{ComponentSet, Filter, TransitionQuery, Transitions};
    pub use crate::store::EntityStore;
    pub use crate::EcsError;
}
