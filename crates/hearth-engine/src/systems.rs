//! The four tick phases as free functions over explicit subsystem borrows.
//!
//! Each phase touches only what it is handed. Entity iteration follows
//! [`EntityStore::query`] order (ascending index), which keeps a tick's
//! effect on the physics world reproducible.

use hearth_ecs::prelude::*;

use crate::error::PhaseError;
use crate::input::{desired_velocity, InputBuffer, InputIntent};
use crate::physics::{PhysicsHandle, PhysicsWorld, Position, Velocity};
use crate::replicate::{PlayerView, ReplicatedState};
use crate::session::SessionMap;
use crate::tick::Phase;

/// Movement tuning the input phase needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Steering {
    pub speed: f32,
    pub damping: f32,
}

/// Input phase over `{Velocity, InputIntent, PhysicsHandle}`.
///
/// Copies the latest buffered intent into each entity's [`InputIntent`],
/// then nudges its body toward the intended horizontal velocity. Returns the
/// `[dx, dz]` velocity change applied to each steered body, in query order.
pub fn apply_input(
    store: &mut EntityStore,
    filter: &Filter,
    inputs: &InputBuffer,
    physics: &mut PhysicsWorld,
    steering: Steering,
) -> Result<Vec<(EntityId, [f32; 2])>, PhaseError> {
    let entities = store.query(filter);
    let mut corrections = Vec::with_capacity(entities.len());
    for &entity in &entities {
        if let (Some(latest), Some(intent)) = (inputs.latest(entity), store.get_mut::<InputIntent>(entity)) {
            *intent = latest;
        }
        let (Some(intent), Some(handle)) = (
            store.get::<InputIntent>(entity).copied(),
            store.get::<PhysicsHandle>(entity).copied(),
        ) else {
            continue;
        };
        let desired = desired_velocity(&intent, steering.speed);
        let delta = physics
            .apply_velocity_correction(handle.body, desired, steering.damping)
            .map_err(|e| PhaseError::new(Phase::Input, e))?;
        corrections.push((entity, delta));
    }
    Ok(corrections)
}

/// Physics phase: one fixed step.
pub fn step_physics(physics: &mut PhysicsWorld) -> Result<(), PhaseError> {
    physics
        .step()
        .map_err(|e| PhaseError::new(Phase::PhysicsStep, e))
}

/// Sync phase over `{Position, Velocity, PhysicsHandle}`.
///
/// Overwrites the ECS copies from the bodies and refreshes the replicated
/// entry of the owning session, if one already exists.
pub fn sync_from_physics(
    store: &mut EntityStore,
    filter: &Filter,
    physics: &PhysicsWorld,
    sessions: &SessionMap,
    replicated: &mut ReplicatedState,
) -> Result<usize, PhaseError> {
    let entities = store.query(filter);
    for &entity in &entities {
        let Some(handle) = store.get::<PhysicsHandle>(entity).copied() else {
            continue;
        };
        let position = physics
            .read_translation(handle.body)
            .map_err(|e| PhaseError::new(Phase::Sync, e))?;
        let velocity = physics
            .read_linear_velocity(handle.body)
            .map_err(|e| PhaseError::new(Phase::Sync, e))?;
        if let Some(p) = store.get_mut::<Position>(entity) {
            *p = position;
        }
        if let Some(v) = store.get_mut::<Velocity>(entity) {
            *v = velocity;
        }
        if let Some(session) = sessions.session(entity) {
            replicated.update_player(session, position.into());
        }
    }
    Ok(entities.len())
}

/// Replicate phase: mirror enter/exit transitions of the replicated filter
/// into the player map.
///
/// An entered entity gets an entry only when it is bound to a session and
/// has a [`Position`]. Exits of entities whose session already left are a
/// no-op, since leaving removes the entry itself.
pub fn replicate_membership(
    store: &EntityStore,
    query: &mut TransitionQuery,
    sessions: &SessionMap,
    replicated: &mut ReplicatedState,
) -> Transitions {
    let transitions = query.evaluate(store);
    for &entity in &transitions.entered {
        let (Some(session), Some(position)) = (sessions.session(entity), store.get::<Position>(entity)) else {
            continue;
        };
        tracing::debug!(session = %session, entity = %entity, "player replicated");
        replicated.insert_player(session.clone(), PlayerView::from(*position));
    }
    for &entity in &transitions.exited {
        if let Some(session) = sessions.session(entity) {
            tracing::debug!(session = %session, entity = %entity, "player no longer replicated");
            replicated.remove_player(session);
        }
    }
    transitions
}
