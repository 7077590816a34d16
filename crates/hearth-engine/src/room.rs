//! One simulated room: every subsystem plus the session lifecycle.
//!
//! Network handlers ([`on_join`](Room::on_join),
//! [`on_message`](Room::on_message), [`on_leave`](Room::on_leave)) run
//! between ticks and finish their structural changes before returning, so a
//! tick never sees a half-built player.

use hearth_ecs::prelude::*;
use serde_json::Value;

use crate::config::RoomConfig;
use crate::error::{JoinError, PhaseError, RoomError};
use crate::input::{InputBuffer, InputIntent};
use crate::physics::{BodyId, BodyShape, PhysicsHandle, PhysicsWorld, Position, Velocity};
use crate::replicate::ReplicatedState;
use crate::session::{SessionId, SessionMap};
use crate::spawn::SpawnPlanner;
use crate::systems::{self, Steering};
use crate::terrain::{NoiseTerrain, TerrainHeightProvider};
use crate::tick::Phase;

/// Whether the room still accepts joins and ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Running,
    /// Torn down after a fatal failure. Terminal.
    Terminated,
}

/// A player entity that finished joining.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spawned {
    pub entity: EntityId,
    pub position: Position,
}

/// Component filters resolved once at construction.
#[derive(Debug, Clone, Copy)]
struct PhaseFilters {
    input: Filter,
    sync: Filter,
}

pub struct Room {
    config: RoomConfig,
    store: EntityStore,
    physics: PhysicsWorld,
    ground: BodyId,
    inputs: InputBuffer,
    sessions: SessionMap,
    replicated: ReplicatedState,
    spawner: SpawnPlanner,
    terrain: Box<dyn TerrainHeightProvider>,
    filters: PhaseFilters,
    replicated_query: TransitionQuery,
    state: RoomState,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("state", &self.state)
            .field("sessions", &self.sessions.len())
            .field("entities", &self.store.len())
            .field("physics", &self.physics)
            .finish()
    }
}

impl Room {
    /// Validate `config`, build the physics world and terrain ground, and
    /// publish the terrain parameters into the replicated state.
    pub fn new(config: RoomConfig, terrain: Box<dyn TerrainHeightProvider>) -> Result<Self, RoomError> {
        config.validate()?;

        let mut store = EntityStore::new();
        store.register_component::<Position>("position")?;
        store.register_component::<Velocity>("velocity")?;
        store.register_component::<InputIntent>("input_intent")?;
        store.register_component::<PhysicsHandle>("physics_handle")?;

        let filters = PhaseFilters {
            input: Filter::of::<(Velocity, InputIntent, PhysicsHandle)>(&store),
            sync: Filter::of::<(Position, Velocity, PhysicsHandle)>(&store),
        };
        let replicated_query = TransitionQuery::new(Filter::of::<(Position, Velocity, InputIntent)>(&store));

        let mut physics = PhysicsWorld::new(config.gravity, config.fixed_dt() as f32);
        let ground = physics.create_terrain_ground(terrain.as_ref(), &config.terrain);

        let spawner = SpawnPlanner::new(config.spawn_rng_seed, config.spawn_radius, config.spawn_height_offset);
        let replicated = ReplicatedState::new(&config.terrain);

        tracing::info!(
            seed = %config.terrain.seed,
            tick_rate_hz = config.tick_rate_hz,
            "room created"
        );

        Ok(Self {
            config,
            store,
            physics,
            ground,
            inputs: InputBuffer::new(),
            sessions: SessionMap::new(),
            replicated,
            spawner,
            terrain,
            filters,
            replicated_query,
            state: RoomState::Running,
        })
    }

    /// A room over fractal-noise terrain seeded from `config.terrain.seed`.
    pub fn with_noise_terrain(config: RoomConfig) -> Result<Self, RoomError> {
        let terrain = NoiseTerrain::new(&config.terrain);
        Self::new(config, Box::new(terrain))
    }

    // -- session lifecycle --------------------------------------------------

    /// Create the player entity and body for `session`.
    ///
    /// On failure nothing is left behind: the partially built entity and
    /// body are destroyed before the error is returned.
    pub fn on_join(&mut self, session: SessionId) -> Result<Spawned, JoinError> {
        if self.state == RoomState::Terminated {
            return Err(JoinError::NotRunning);
        }
        if self.sessions.contains(&session) {
            return Err(JoinError::AlreadyJoined { session });
        }

        let entity = self.store.create();
        let mut body = None;
        let position = match self.attach_player(entity, &mut body) {
            Ok(position) => position,
            Err(err) => {
                if let Some(body) = body {
                    self.physics.remove_body(body);
                }
                if let Err(e) = self.store.destroy(entity) {
                    tracing::warn!(entity = %entity, error = %e, "join rollback could not destroy entity");
                }
                tracing::warn!(session = %session, error = %err, "join rolled back");
                return Err(err);
            }
        };

        self.sessions.bind(session.clone(), entity);
        tracing::info!(
            session = %session,
            entity = %entity,
            x = position.x,
            y = position.y,
            z = position.z,
            "player joined"
        );
        Ok(Spawned { entity, position })
    }

    /// Pick a spawn point and give `entity` its components and body.
    /// `body` is set as soon as the body exists so the caller can undo it.
    fn attach_player(
        &mut self,
        entity: EntityId,
        body: &mut Option<BodyId>,
    ) -> Result<Position, JoinError> {
        let position = self.spawner.plan(self.terrain.as_ref())?;
        self.store.insert(entity, position)?;
        self.store.insert(entity, Velocity::default())?;
        self.store.insert(entity, InputIntent::default())?;
        let shape = self.player_shape();
        let handle = self.physics.create_body(position, &shape)?;
        *body = Some(handle);
        self.store.insert(entity, PhysicsHandle { body: handle })?;
        Ok(position)
    }

    /// Buffer an `"input"` payload from `session`.
    ///
    /// Returns whether the message was accepted. Messages from unknown
    /// sessions, for entities without an [`InputIntent`], or with a
    /// non-object payload are dropped.
    pub fn on_message(&mut self, session: &SessionId, payload: &Value) -> bool {
        if self.state == RoomState::Terminated {
            return false;
        }
        let Some(entity) = self.sessions.entity(session) else {
            tracing::debug!(session = %session, "input from unknown session ignored");
            return false;
        };
        if !self.store.has::<InputIntent>(entity) {
            tracing::debug!(session = %session, entity = %entity, "input for entity without intent ignored");
            return false;
        }
        let Some(intent) = InputIntent::from_payload(payload) else {
            tracing::debug!(session = %session, "malformed input payload ignored");
            return false;
        };
        self.inputs.record(entity, intent);
        true
    }

    /// Remove `session`'s player: mapping, buffered input, body, entity and
    /// replicated entry. Returns `false` for unknown sessions.
    pub fn on_leave(&mut self, session: &SessionId) -> bool {
        let Some(entity) = self.sessions.unbind(session) else {
            return false;
        };
        self.inputs.forget(entity);
        if let Some(handle) = self.store.get::<PhysicsHandle>(entity).copied() {
            self.physics.remove_body(handle.body);
        }
        if let Err(e) = self.store.destroy(entity) {
            tracing::warn!(session = %session, entity = %entity, error = %e, "leaving player had no live entity");
        }
        self.replicated.remove_player(session);
        tracing::info!(session = %session, entity = %entity, "player left");
        true
    }

    /// Evict every session and stop the room for good. Returns the evicted
    /// sessions in id order.
    pub fn teardown(&mut self) -> Vec<SessionId> {
        let evicted: Vec<SessionId> = self.sessions.sessions().cloned().collect();
        for session in &evicted {
            self.on_leave(session);
        }
        self.state = RoomState::Terminated;
        tracing::info!(evicted = evicted.len(), "room torn down");
        evicted
    }

    // -- tick phases --------------------------------------------------------

    /// Run a single tick phase against the room's subsystems.
    pub(crate) fn run_phase(&mut self, phase: Phase) -> Result<(), PhaseError> {
        match phase {
            Phase::Input => {
                let steering = Steering {
                    speed: self.config.player_speed,
                    damping: self.config.velocity_damping,
                };
                systems::apply_input(
                    &mut self.store,
                    &self.filters.input,
                    &self.inputs,
                    &mut self.physics,
                    steering,
                )?;
            }
            Phase::PhysicsStep => systems::step_physics(&mut self.physics)?,
            Phase::Sync => {
                systems::sync_from_physics(
                    &mut self.store,
                    &self.filters.sync,
                    &self.physics,
                    &self.sessions,
                    &mut self.replicated,
                )?;
            }
            Phase::Replicate => {
                systems::replicate_membership(
                    &self.store,
                    &mut self.replicated_query,
                    &self.sessions,
                    &mut self.replicated,
                );
            }
        }
        Ok(())
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RoomState::Running
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// The static terrain body.
    pub fn ground(&self) -> BodyId {
        self.ground
    }

    pub fn sessions(&self) -> &SessionMap {
        &self.sessions
    }

    pub fn replicated(&self) -> &ReplicatedState {
        &self.replicated
    }

    pub fn terrain(&self) -> &dyn TerrainHeightProvider {
        self.terrain.as_ref()
    }

    pub fn entity_of(&self, session: &SessionId) -> Option<EntityId> {
        self.sessions.entity(session)
    }

    /// The rigid body backing `session`'s player.
    pub fn body_of(&self, session: &SessionId) -> Option<BodyId> {
        let entity = self.sessions.entity(session)?;
        self.store.get::<PhysicsHandle>(entity).map(|h| h.body)
    }

    fn player_shape(&self) -> BodyShape {
        BodyShape {
            radius: self.config.player_radius,
            half_height: self.config.player_half_height,
        }
    }

    #[cfg(test)]
    pub(crate) fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }
}
