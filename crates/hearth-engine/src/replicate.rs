//! The replicated world view sent to clients.
//!
//! Terrain fields are set once at room creation. Player entries follow the
//! ECS: they appear when the replicate phase sees an entity enter the
//! replicated filter, move only in the sync phase, and disappear on the
//! matching exit (or when the session leaves).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::physics::Position;
use crate::session::SessionId;
use crate::terrain::TerrainConfig;

/// Replicated position of one player.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Position> for PlayerView {
    fn from(p: Position) -> Self {
        Self { x: p.x, y: p.y, z: p.z }
    }
}

/// Everything a client needs to render the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicatedState {
    pub world_seed: String,
    pub terrain_width: f32,
    pub terrain_height: f32,
    pub terrain_subdivisions: u32,
    pub height_scale: f32,
    players: BTreeMap<SessionId, PlayerView>,
}

impl ReplicatedState {
    pub fn new(terrain: &TerrainConfig) -> Self {
        Self {
            world_seed: terrain.seed.clone(),
            terrain_width: terrain.width,
            terrain_height: terrain.height,
            terrain_subdivisions: terrain.subdivisions,
            height_scale: terrain.height_scale,
            players: BTreeMap::new(),
        }
    }

    pub fn players(&self) -> &BTreeMap<SessionId, PlayerView> {
        &self.players
    }

    pub fn player(&self, session: &SessionId) -> Option<&PlayerView> {
        self.players.get(session)
    }

    pub(crate) fn insert_player(&mut self, session: SessionId, view: PlayerView) {
        self.players.insert(session, view);
    }

    /// Overwrite an existing entry. Returns `false` if the session has no
    /// entry yet; sync never creates one.
    pub(crate) fn update_player(&mut self, session: &SessionId, view: PlayerView) -> bool {
        match self.players.get_mut(session) {
            Some(slot) => {
                *slot = view;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_player(&mut self, session: &SessionId) -> Option<PlayerView> {
        self.players.remove(session)
    }

    /// BLAKE3 hex digest of the canonical JSON form. Players are keyed by a
    /// sorted map, so equal states always hash equal.
    pub fn state_hash(&self) -> String {
        let json = serde_json::to_vec(self).expect("ReplicatedState should always be JSON-serializable");
        blake3::hash(&json).to_hex().to_string()
    }
}
