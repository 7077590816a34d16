//! rapier3d rigid-body world and the ECS components that mirror it.
//!
//! The [`PhysicsWorld`] owns every rigid body and collider. The ECS only
//! holds a [`PhysicsHandle`] per physical entity plus [`Position`] and
//! [`Velocity`] copies that the sync phase refreshes after each step.
//!
//! # Determinism
//!
//! rapier3d is compiled with `enhanced-determinism`. Combined with a fixed
//! timestep and the index-ordered queries of the store, the same joins and
//! inputs produce the same trajectories on the same platform.

use std::panic::{self, AssertUnwindSafe};

use rapier3d::na::DMatrix;
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::terrain::{TerrainConfig, TerrainHeightProvider};

// ---------------------------------------------------------------------------
// Physics component types (ECS-side)
// ---------------------------------------------------------------------------

/// Authoritative world position. Written by the sync phase only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Linear velocity as last read back from the body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// The rigid body owned by an entity. Created and destroyed together with
/// the body it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicsHandle {
    pub body: BodyId,
}

/// Opaque rigid-body identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId(RigidBodyHandle);

/// Capsule dimensions for player bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyShape {
    pub radius: f32,
    pub half_height: f32,
}

/// A flat static slab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundExtents {
    pub half_width: f32,
    pub half_depth: f32,
    pub thickness: f32,
    /// Height of the walkable top face.
    pub top_y: f32,
}

const PLAYER_FRICTION: f32 = 0.5;

// ---------------------------------------------------------------------------
// PhysicsWorld
// ---------------------------------------------------------------------------

/// Fixed-gravity, fixed-timestep rapier3d world.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    steps: u64,
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.rigid_body_set.len())
            .field("colliders", &self.collider_set.len())
            .field("steps", &self.steps)
            .finish()
    }
}

impl PhysicsWorld {
    /// Create a world pulling down along -Y with magnitude `gravity`, stepping
    /// `dt` seconds per [`step`](Self::step).
    pub fn new(gravity: f32, dt: f32) -> Self {
        let integration_params = IntegrationParameters {
            dt,
            ..IntegrationParameters::default()
        };
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, -gravity, 0.0],
            integration_params,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            steps: 0,
        }
    }

    /// Spawn a dynamic, rotation-locked capsule at `position`.
    pub fn create_body(
        &mut self,
        position: Position,
        shape: &BodyShape,
    ) -> Result<BodyId, PhysicsError> {
        if ![position.x, position.y, position.z].iter().all(|c| c.is_finite()) {
            return Err(PhysicsError::InvalidPlacement {
                x: position.x,
                y: position.y,
                z: position.z,
            });
        }
        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y, position.z])
            .lock_rotations()
            .can_sleep(false)
            .build();
        let handle = self.rigid_body_set.insert(rb);
        let collider = ColliderBuilder::capsule_y(shape.half_height, shape.radius)
            .friction(PLAYER_FRICTION)
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        Ok(BodyId(handle))
    }

    /// Add an immovable slab whose top face sits at `extents.top_y`.
    pub fn create_static_ground(&mut self, extents: &GroundExtents) -> BodyId {
        let half_thickness = extents.thickness / 2.0;
        let rb = RigidBodyBuilder::fixed()
            .translation(vector![0.0, extents.top_y - half_thickness, 0.0])
            .build();
        let handle = self.rigid_body_set.insert(rb);
        let collider =
            ColliderBuilder::cuboid(extents.half_width, half_thickness, extents.half_depth).build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        BodyId(handle)
    }

    /// Add an immovable heightfield sampled from `provider` on the terrain
    /// grid, centered on the origin.
    pub fn create_terrain_ground(
        &mut self,
        provider: &dyn TerrainHeightProvider,
        terrain: &TerrainConfig,
    ) -> BodyId {
        let points = terrain.subdivisions as usize + 1;
        let heights = DMatrix::from_fn(points, points, |row, col| {
            let (x, z) = terrain.grid_point(row, col);
            provider.height_at(x, z)
        });
        let handle = self.rigid_body_set.insert(RigidBodyBuilder::fixed().build());
        let collider =
            ColliderBuilder::heightfield(heights, vector![terrain.width, 1.0, terrain.height])
                .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        BodyId(handle)
    }

    /// Detach every collider of `body`, then remove the body itself.
    ///
    /// Returns `false` if the body did not exist.
    pub fn remove_body(&mut self, body: BodyId) -> bool {
        let Some(rb) = self.rigid_body_set.get(body.0) else {
            return false;
        };
        let colliders: Vec<ColliderHandle> = rb.colliders().to_vec();
        for collider in colliders {
            self.collider_set.remove(
                collider,
                &mut self.island_manager,
                &mut self.rigid_body_set,
                true,
            );
        }
        self.rigid_body_set
            .remove(
                body.0,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    /// Advance the simulation by one fixed timestep.
    ///
    /// A panic inside the pipeline, or any dynamic body left with a
    /// non-finite translation or velocity, is reported as a fatal error.
    pub fn step(&mut self) -> Result<(), PhysicsError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline.step(
                &self.gravity,
                &self.integration_params,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.rigid_body_set,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                &mut self.ccd_solver,
                None, // query pipeline (unused)
                &(),  // physics hooks
                &(),  // events
            );
        }));
        if let Err(payload) = outcome {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            return Err(PhysicsError::StepPanicked { message });
        }
        self.steps += 1;

        for (handle, rb) in self.rigid_body_set.iter() {
            if !rb.is_dynamic() {
                continue;
            }
            let finite = rb.translation().iter().all(|c| c.is_finite())
                && rb.linvel().iter().all(|c| c.is_finite());
            if !finite {
                return Err(PhysicsError::NonFinite {
                    body: BodyId(handle),
                });
            }
        }
        Ok(())
    }

    pub fn read_translation(&self, body: BodyId) -> Result<Position, PhysicsError> {
        let t = self.body(body)?.translation();
        Ok(Position {
            x: t.x,
            y: t.y,
            z: t.z,
        })
    }

    pub fn read_linear_velocity(&self, body: BodyId) -> Result<Velocity, PhysicsError> {
        let v = self.body(body)?.linvel();
        Ok(Velocity {
            x: v.x,
            y: v.y,
            z: v.z,
        })
    }

    /// Nudge the body's horizontal velocity toward `desired_xz` by
    /// `(desired - current) * damping`. Vertical velocity is untouched.
    ///
    /// Returns the applied `[dx, dz]` change.
    pub fn apply_velocity_correction(
        &mut self,
        body: BodyId,
        desired_xz: [f32; 2],
        damping: f32,
    ) -> Result<[f32; 2], PhysicsError> {
        let rb = self
            .rigid_body_set
            .get_mut(body.0)
            .ok_or(PhysicsError::MissingBody { body })?;
        let current = *rb.linvel();
        let delta = velocity_correction([current.x, current.z], desired_xz, damping);
        rb.set_linvel(
            vector![current.x + delta[0], current.y, current.z + delta[1]],
            true,
        );
        Ok(delta)
    }

    pub fn contains(&self, body: BodyId) -> bool {
        self.rigid_body_set.contains(body.0)
    }

    /// Number of rigid bodies, ground included.
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }

    /// Steps completed so far.
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    fn body(&self, body: BodyId) -> Result<&RigidBody, PhysicsError> {
        self.rigid_body_set
            .get(body.0)
            .ok_or(PhysicsError::MissingBody { body })
    }

    #[cfg(test)]
    pub(crate) fn corrupt_velocity(&mut self, body: BodyId) {
        if let Some(rb) = self.rigid_body_set.get_mut(body.0) {
            rb.set_linvel(vector![Real::NAN, 0.0, 0.0], true);
        }
    }
}

/// The horizontal velocity change that closes `damping` of the gap between
/// `current` and `desired`.
pub fn velocity_correction(current: [f32; 2], desired: [f32; 2], damping: f32) -> [f32; 2] {
    [
        (desired[0] - current[0]) * damping,
        (desired[1] - current[1]) * damping,
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::FlatTerrain;

    const DT: f32 = 1.0 / 20.0;

    fn capsule() -> BodyShape {
        BodyShape {
            radius: 0.5,
            half_height: 0.5,
        }
    }

    fn slab() -> GroundExtents {
        GroundExtents {
            half_width: 50.0,
            half_depth: 50.0,
            thickness: 1.0,
            top_y: 0.0,
        }
    }

    #[test]
    fn new_world_is_empty() {
        let pw = PhysicsWorld::new(9.81, DT);
        assert_eq!(pw.body_count(), 0);
        assert_eq!(pw.step_count(), 0);
    }

    #[test]
    fn create_body_places_it_at_position() {
        let mut pw = PhysicsWorld::new(9.81, DT);
        let body = pw.create_body(Position { x: 1.0, y: 5.0, z: -2.0 }, &capsule()).unwrap();
        assert!(pw.contains(body));
        assert_eq!(pw.collider_count(), 1);
        assert_eq!(
            pw.read_translation(body).unwrap(),
            Position { x: 1.0, y: 5.0, z: -2.0 }
        );
        assert_eq!(pw.read_linear_velocity(body).unwrap(), Velocity::default());
    }

    #[test]
    fn gravity_pulls_body_down() {
        let mut pw = PhysicsWorld::new(9.81, DT);
        let body = pw.create_body(Position { x: 0.0, y: 10.0, z: 0.0 }, &capsule()).unwrap();
        for _ in 0..10 {
            pw.step().unwrap();
        }
        let pos = pw.read_translation(body).unwrap();
        let vel = pw.read_linear_velocity(body).unwrap();
        assert!(pos.y < 10.0, "body should fall, got y={}", pos.y);
        assert!(vel.y < 0.0, "velocity should be downward, got {}", vel.y);
    }

    #[test]
    fn body_comes_to_rest_on_static_ground() {
        let mut pw = PhysicsWorld::new(9.81, DT);
        pw.create_static_ground(&slab());
        let body = pw.create_body(Position { x: 0.0, y: 3.0, z: 0.0 }, &capsule()).unwrap();
        for _ in 0..100 {
            pw.step().unwrap();
        }
        let pos = pw.read_translation(body).unwrap();
        // Capsule center rests at half_height + radius above the surface.
        assert!((pos.y - 1.0).abs() < 0.1, "expected rest near y=1, got {}", pos.y);
    }

    #[test]
    fn body_comes_to_rest_on_terrain_heightfield() {
        let mut pw = PhysicsWorld::new(9.81, DT);
        let terrain = TerrainConfig {
            width: 40.0,
            height: 40.0,
            subdivisions: 8,
            ..Default::default()
        };
        pw.create_terrain_ground(&FlatTerrain { height: 4.0 }, &terrain);
        let body = pw.create_body(Position { x: 1.5, y: 7.0, z: -2.5 }, &capsule()).unwrap();
        for _ in 0..100 {
            pw.step().unwrap();
        }
        let pos = pw.read_translation(body).unwrap();
        assert!((pos.y - 5.0).abs() < 0.15, "expected rest near y=5, got {}", pos.y);
    }

    #[test]
    fn remove_body_detaches_colliders() {
        let mut pw = PhysicsWorld::new(9.81, DT);
        let body = pw.create_body(Position::default(), &capsule()).unwrap();
        assert!(pw.remove_body(body));
        assert!(!pw.contains(body));
        assert_eq!(pw.body_count(), 0);
        assert_eq!(pw.collider_count(), 0);
        assert!(!pw.remove_body(body), "second removal is a no-op");
    }

    #[test]
    fn reading_a_removed_body_is_an_error() {
        let mut pw = PhysicsWorld::new(9.81, DT);
        let body = pw.create_body(Position::default(), &capsule()).unwrap();
        pw.remove_body(body);
        assert_eq!(
            pw.read_translation(body),
            Err(PhysicsError::MissingBody { body })
        );
        assert!(pw.apply_velocity_correction(body, [1.0, 0.0], 0.5).is_err());
    }

    #[test]
    fn correction_closes_fraction_of_gap_and_keeps_vertical() {
        let mut pw = PhysicsWorld::new(9.81, DT);
        let body = pw.create_body(Position { x: 0.0, y: 10.0, z: 0.0 }, &capsule()).unwrap();
        pw.step().unwrap();
        let before = pw.read_linear_velocity(body).unwrap();

        let delta = pw.apply_velocity_correction(body, [0.0, 4.0], 0.25).unwrap();
        assert_eq!(delta, [0.0, 1.0]);

        let after = pw.read_linear_velocity(body).unwrap();
        assert_eq!(after.y, before.y, "vertical velocity must not change");
        assert!((after.z - 1.0).abs() < 1e-6);
        assert_eq!(after.x, 0.0);
    }

    #[test]
    fn repeated_correction_converges_without_overshoot() {
        let mut current = [0.0f32, 0.0];
        let desired = [3.0f32, -4.0];
        for _ in 0..200 {
            let delta = velocity_correction(current, desired, 0.2);
            current = [current[0] + delta[0], current[1] + delta[1]];
            assert!(current[0] <= desired[0] && current[1] >= desired[1]);
        }
        assert!((current[0] - 3.0).abs() < 1e-3);
        assert!((current[1] + 4.0).abs() < 1e-3);
    }

    #[test]
    fn non_finite_state_is_fatal() {
        let mut pw = PhysicsWorld::new(9.81, DT);
        let body = pw.create_body(Position::default(), &capsule()).unwrap();
        pw.corrupt_velocity(body);
        let err = pw.step().unwrap_err();
        assert!(
            matches!(err, PhysicsError::NonFinite { .. } | PhysicsError::StepPanicked { .. }),
            "unexpected error {err:?}"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn non_finite_placement_is_rejected_and_recoverable() {
        let mut pw = PhysicsWorld::new(9.81, DT);
        let err = pw
            .create_body(Position { x: 1.0, y: f32::NAN, z: 0.0 }, &capsule())
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidPlacement { x, .. } if x == 1.0));
        assert!(!err.is_fatal());
        assert_eq!(pw.body_count(), 0);
        assert_eq!(pw.collider_count(), 0);
        pw.step().unwrap();
    }

    #[test]
    fn determinism_two_identical_runs() {
        fn run() -> Vec<Position> {
            let mut pw = PhysicsWorld::new(9.81, DT);
            pw.create_static_ground(&slab());
            let body = pw.create_body(Position { x: 0.0, y: 2.0, z: 0.0 }, &capsule()).unwrap();
            (0..60)
                .map(|_| {
                    pw.apply_velocity_correction(body, [1.0, 2.0], 0.2).unwrap();
                    pw.step().unwrap();
                    pw.read_translation(body).unwrap()
                })
                .collect()
        }
        assert_eq!(run(), run());
    }
}
