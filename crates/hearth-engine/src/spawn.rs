//! Seeded spawn placement.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::error::SpawnError;
use crate::physics::Position;
use crate::terrain::TerrainHeightProvider;

/// Picks spawn points uniformly inside a disc around the origin, dropped a
/// fixed offset above the terrain surface.
///
/// The generator is seeded once per room, so the sequence of spawn points
/// depends only on the seed and the number of joins so far.
#[derive(Debug, Clone)]
pub struct SpawnPlanner {
    rng: Pcg64,
    radius: f32,
    height_offset: f32,
}

impl SpawnPlanner {
    pub fn new(seed: u64, radius: f32, height_offset: f32) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
            radius,
            height_offset,
        }
    }

    /// Next spawn point on `terrain`.
    ///
    /// Fails if the provider reports a NaN or infinite height there. The
    /// random draw is consumed either way.
    pub fn plan(&mut self, terrain: &dyn TerrainHeightProvider) -> Result<Position, SpawnError> {
        // sqrt keeps the density uniform over the disc area.
        let r = self.radius * self.rng.gen::<f32>().sqrt();
        let theta = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let x = r * theta.cos();
        let z = r * theta.sin();
        let height = terrain.height_at(x, z);
        if !height.is_finite() {
            return Err(SpawnError::NonFiniteHeight { x, z, height });
        }
        Ok(Position {
            x,
            y: height + self.height_offset,
            z,
        })
    }
}
