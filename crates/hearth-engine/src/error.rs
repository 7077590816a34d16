//! Error types for room bring-up, joins and tick phases.
//!
//! Stale or malformed client messages are deliberately absent: they are
//! ignored, never surfaced.

use hearth_ecs::EcsError;

use crate::physics::BodyId;
use crate::session::SessionId;
use crate::tick::Phase;

/// Rejected room configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to parse room config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures reported by the [`PhysicsWorld`](crate::physics::PhysicsWorld).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    /// The handle does not name a live rigid body.
    #[error("rigid body {body:?} does not exist")]
    MissingBody { body: BodyId },

    /// A body ended a step with a NaN or infinite translation or velocity.
    #[error("rigid body {body:?} has a non-finite state after stepping")]
    NonFinite { body: BodyId },

    /// The physics pipeline panicked mid-step.
    #[error("physics step panicked: {message}")]
    StepPanicked { message: String },

    /// A body was requested at a non-finite position. Nothing was created.
    #[error("cannot place a rigid body at ({x}, {y}, {z})")]
    InvalidPlacement { x: f32, y: f32, z: f32 },
}

impl PhysicsError {
    /// Whether the physics world itself can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NonFinite { .. } | Self::StepPanicked { .. })
    }
}

/// A spawn point could not be chosen.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpawnError {
    #[error("terrain height at ({x}, {z}) is not finite: {height}")]
    NonFiniteHeight { x: f32, z: f32, height: f32 },
}

/// Why a join was refused. The partially created entity and body have
/// already been rolled back when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("room is not accepting joins (terminated)")]
    NotRunning,

    #[error("session '{session}' has already joined")]
    AlreadyJoined { session: SessionId },

    #[error("spawn placement failed: {0}")]
    Spawn(#[from] SpawnError),

    #[error("entity setup failed: {0}")]
    Ecs(#[from] EcsError),

    #[error("physics setup failed: {0}")]
    Physics(#[from] PhysicsError),
}

/// A tick phase that failed. The rest of that tick is skipped.
#[derive(Debug, Clone, thiserror::Error)]
#[error("tick phase '{phase}' failed: {source}")]
pub struct PhaseError {
    pub phase: Phase,
    pub source: PhysicsError,
}

impl PhaseError {
    pub fn new(phase: Phase, source: PhysicsError) -> Self {
        Self { phase, source }
    }

    /// Fatal failures tear the whole room down.
    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

/// Room-level errors.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room initialization failed: {0}")]
    Config(#[from] ConfigError),

    #[error("component registration failed: {0}")]
    Ecs(#[from] EcsError),

    #[error("room has been terminated")]
    Terminated,
}
