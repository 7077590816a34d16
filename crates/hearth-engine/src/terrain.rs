//! Terrain-height providers.
//!
//! The terrain is a `width x height` rectangle on the XZ plane centered on
//! the origin. Spawn placement samples it through [`TerrainHeightProvider`],
//! and the physics ground is a heightfield built from the same samples, so a
//! body dropped at `height_at(x, z) + offset` lands on the surface clients
//! render from the same seed.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::config::invalid;
use crate::error::ConfigError;

/// Deterministic height lookup for a given seed/configuration.
pub trait TerrainHeightProvider: Send + Sync {
    /// Surface height at world coordinates `(x, z)`.
    fn height_at(&self, x: f32, z: f32) -> f32;
}

// ---------------------------------------------------------------------------
// TerrainConfig
// ---------------------------------------------------------------------------

/// Terrain parameters. Replicated verbatim to clients at room creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub seed: String,
    /// Extent along X.
    pub width: f32,
    /// Extent along Z.
    pub height: f32,
    /// Grid cells per side of the heightfield.
    pub subdivisions: u32,
    /// Peak amplitude of the surface.
    pub height_scale: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: "hearth".to_owned(),
            width: 128.0,
            height: 128.0,
            subdivisions: 64,
            height_scale: 8.0,
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(invalid("terrain.width", format!("must be positive and finite, got {}", self.width)));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(invalid("terrain.height", format!("must be positive and finite, got {}", self.height)));
        }
        if self.subdivisions == 0 || self.subdivisions > 1024 {
            return Err(invalid("terrain.subdivisions", format!("must be in 1..=1024, got {}", self.subdivisions)));
        }
        if !self.height_scale.is_finite() {
            return Err(invalid("terrain.height_scale", format!("must be finite, got {}", self.height_scale)));
        }
        Ok(())
    }

    /// World coordinates of heightfield grid point `(row, col)`; rows run
    /// along Z and columns along X.
    pub fn grid_point(&self, row: usize, col: usize) -> (f32, f32) {
        let cells = self.subdivisions as f32;
        let x = -self.width / 2.0 + self.width * col as f32 / cells;
        let z = -self.height / 2.0 + self.height * row as f32 / cells;
        (x, z)
    }
}

/// Map a textual world seed onto the `u32` seed the noise generators take.
pub fn numeric_seed(seed: &str) -> u32 {
    let digest = blake3::hash(seed.as_bytes());
    let bytes = digest.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// A level plane. Mostly useful in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatTerrain {
    pub height: f32,
}

impl TerrainHeightProvider for FlatTerrain {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.height
    }
}

/// Rolling hills from fractal Perlin noise.
pub struct NoiseTerrain {
    fbm: Fbm<Perlin>,
    frequency: f64,
    height_scale: f32,
}

impl NoiseTerrain {
    /// Features per terrain width.
    const FEATURES_ACROSS: f64 = 4.0;
    const OCTAVES: usize = 4;

    pub fn new(config: &TerrainConfig) -> Self {
        let fbm = Fbm::<Perlin>::new(numeric_seed(&config.seed)).set_octaves(Self::OCTAVES);
        Self {
            fbm,
            frequency: Self::FEATURES_ACROSS / config.width as f64,
            height_scale: config.height_scale,
        }
    }
}

impl TerrainHeightProvider for NoiseTerrain {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        let sample = self
            .fbm
            .get([x as f64 * self.frequency, z as f64 * self.frequency]);
        sample as f32 * self.height_scale
    }
}

impl std::fmt::Debug for NoiseTerrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseTerrain")
            .field("frequency", &self.frequency)
            .field("height_scale", &self.height_scale)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
