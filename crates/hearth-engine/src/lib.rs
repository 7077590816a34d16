//! Hearth Engine -- authoritative fixed-tick room simulation.
//!
//! This crate builds on [`hearth_ecs`] to run one multiplayer room: clients
//! join and send movement intent, a rapier3d world moves their player
//! bodies over seeded terrain, and a [`ReplicatedState`](replicate::ReplicatedState)
//! mirrors every player's position for the network layer to publish.
//!
//! # Quick Start
//!
//! ```
//! use hearth_engine::prelude::*;
//! use serde_json::json;
//!
//! let room = Room::with_noise_terrain(RoomConfig::default()).unwrap();
//! let mut scheduler = TickScheduler::new(room);
//!
//! let alice = SessionId::from("alice");
//! scheduler.room_mut().on_join(alice.clone()).unwrap();
//! scheduler.room_mut().on_message(&alice, &json!({ "forward": true }));
//!
//! for _ in 0..10 {
//!     scheduler.tick();
//! }
//! assert!(scheduler.room().replicated().player(&alice).is_some());
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod input;
pub mod physics;
pub mod replicate;
pub mod room;
pub mod session;
pub mod spawn;
pub mod systems;
pub mod terrain;
pub mod tick;

/// Re-export the ECS crate for convenience.
pub use hearth_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use hearth_ecs::prelude::*;

    pub use crate::config::RoomConfig;
    pub use crate::error::{ConfigError, JoinError, PhaseError, PhysicsError, RoomError, SpawnError};
    pub use crate::input::{desired_velocity, InputBuffer, InputIntent};
    pub use crate::physics::{
        BodyId, BodyShape, GroundExtents, PhysicsHandle, PhysicsWorld, Position, Velocity,
    };
    pub use crate::replicate::{PlayerView, ReplicatedState};
    pub use crate::room::{Room, RoomState, Spawned};
    pub use crate::session::{SessionId, SessionMap};
    pub use crate::spawn::SpawnPlanner;
    pub use crate::terrain::{FlatTerrain, NoiseTerrain, TerrainConfig, TerrainHeightProvider};
    pub use crate::tick::{NetworkEvent, Phase, TickDiagnostics, TickReport, TickScheduler, Transport};
}
