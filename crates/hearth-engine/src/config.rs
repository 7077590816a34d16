//! Room configuration.
//!
//! Loaded once before the room is built and never mutated afterwards.
//! Locating and reading the configuration file belongs to the process
//! bootstrap; this module only parses and validates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::terrain::TerrainConfig;

/// Immutable tuning for one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Ticks per second.
    pub tick_rate_hz: f64,
    /// Downward gravity magnitude (m/s^2).
    pub gravity: f32,
    /// Horizontal speed a player aims for when moving.
    pub player_speed: f32,
    /// Fraction of the gap to the desired horizontal velocity closed per tick.
    pub velocity_damping: f32,
    /// Players spawn uniformly inside this disc around the origin.
    pub spawn_radius: f32,
    /// Drop height above the terrain surface.
    pub spawn_height_offset: f32,
    /// Seed for spawn placement.
    pub spawn_rng_seed: u64,
    /// Capsule radius of a player body.
    pub player_radius: f32,
    /// Half-height of the capsule's cylindrical section.
    pub player_half_height: f32,
    pub terrain: TerrainConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20.0,
            gravity: 9.81,
            player_speed: 5.0,
            velocity_damping: 0.2,
            spawn_radius: 10.0,
            spawn_height_offset: 2.0,
            spawn_rng_seed: 0,
            player_radius: 0.5,
            player_half_height: 0.5,
            terrain: TerrainConfig::default(),
        }
    }
}

impl RoomConfig {
    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Seconds per tick.
    pub fn fixed_dt(&self) -> f64 {
        1.0 / self.tick_rate_hz
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.fixed_dt())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            return Err(invalid("tick_rate_hz", format!("must be positive and finite, got {}", self.tick_rate_hz)));
        }
        if !(self.gravity.is_finite() && self.gravity >= 0.0) {
            return Err(invalid("gravity", format!("must be a finite magnitude >= 0, got {}", self.gravity)));
        }
        if !(self.player_speed.is_finite() && self.player_speed > 0.0) {
            return Err(invalid("player_speed", format!("must be positive and finite, got {}", self.player_speed)));
        }
        if !(self.velocity_damping > 0.0 && self.velocity_damping <= 1.0) {
            return Err(invalid("velocity_damping", format!("must be in (0, 1], got {}", self.velocity_damping)));
        }
        if !(self.player_radius.is_finite() && self.player_radius > 0.0) {
            return Err(invalid("player_radius", format!("must be positive and finite, got {}", self.player_radius)));
        }
        if !(self.player_half_height.is_finite() && self.player_half_height >= 0.0) {
            return Err(invalid("player_half_height", format!("must be finite and >= 0, got {}", self.player_half_height)));
        }
        if !(self.spawn_height_offset.is_finite() && self.spawn_height_offset >= 0.0) {
            return Err(invalid("spawn_height_offset", format!("must be finite and >= 0, got {}", self.spawn_height_offset)));
        }
        self.terrain.validate()?;

        let half_extent = self.terrain.width.min(self.terrain.height) / 2.0;
        if !(self.spawn_radius.is_finite() && self.spawn_radius >= 0.0) {
            return Err(invalid("spawn_radius", format!("must be finite and >= 0, got {}", self.spawn_radius)));
        }
        if self.spawn_radius + self.player_radius > half_extent {
            return Err(invalid(
                "spawn_radius",
                format!(
                    "spawn disc ({} + player radius {}) does not fit inside the terrain half extent {}",
                    self.spawn_radius, self.player_radius, half_extent
                ),
            ));
        }
        Ok(())
    }
}

pub(crate) fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
