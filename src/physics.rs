// src/physics.rs
//
// Rapier host for the vehicle controllers.
//
// Per step:
//   1) refresh the query pipeline
//   2) per vehicle: snapshot the body into a BodyProxy, run the controller
//      against a rapier-backed GroundQuery, add collision kicks
//   3) flush the collected forces / pose writes onto the rapier body
//   4) step the pipeline, then pull exploding bodies back to a safe spot
//
// Collecting into the proxy first keeps the query borrows (bodies, colliders)
// separate from the body mutation, same as "collect impulses, apply later".

use std::collections::{BTreeMap, HashSet};

use log::{info, warn};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rapier3d::prelude::*;

use crate::config::VehicleConfig;
use crate::error::VehicleError;
use crate::host::{BodyProxy, GroundHit, GroundQuery, InputState};
use crate::telemetry::{p3, v3, Snapshot, TickTelemetry, VehicleSnapshot};
use crate::tyre::types::{Pos3, Vec3};
use crate::vehicle::auxiliary::CollisionContact;
use crate::vehicle::VehicleController;

const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);
const GROUP_OBSTACLE: Group = Group::from_bits_truncate(0b0100);

const SAFE_LIMIT: f32 = 1_000.0;

// ---------------------------------------------------------------------------
// ground query backed by rapier
// ---------------------------------------------------------------------------

/// Rays against ground + obstacles, never against the vehicle's own chassis.
pub struct RapierGround<'a> {
    pub query: &'a QueryPipeline,
    pub bodies: &'a RigidBodySet,
    pub colliders: &'a ColliderSet,
    pub exclude: RigidBodyHandle,
}

impl GroundQuery for RapierGround<'_> {
    fn cast(&self, origin: Pos3, direction: Vec3, max_distance: f32) -> Option<GroundHit> {
        let ray = Ray::new(origin, direction);
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.exclude)
            .groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND | GROUP_OBSTACLE));

        let (_, hit) = self.query.cast_ray_and_get_normal(
            self.bodies,
            self.colliders,
            &ray,
            max_distance,
            true,
            filter,
        )?;

        Some(GroundHit {
            distance: hit.time_of_impact,
            point: ray.point_at(hit.time_of_impact),
            normal: hit.normal,
        })
    }
}

fn proxy_of(body: &RigidBody) -> BodyProxy {
    let iso = body.position();
    let mut proxy = BodyProxy::new(Point::from(iso.translation.vector), iso.rotation)
        .with_velocity(*body.linvel(), *body.angvel());
    proxy.center_of_mass = *body.center_of_mass();
    proxy
}

/// Push everything the controller asked for onto the rapier body.
fn flush(proxy: &BodyProxy, body: &mut RigidBody) {
    body.reset_forces(true);
    body.reset_torques(true);

    if proxy.pose_written {
        // teleported: forces computed for the old pose are stale
        let iso = Isometry3::from_parts(Translation3::from(proxy.position.coords), proxy.orientation);
        body.set_position(iso, true);
    } else {
        for f in &proxy.forces {
            body.add_force_at_point(f.force, f.point, true);
        }
        for t in &proxy.torques {
            body.add_torque(*t, true);
        }
    }

    if proxy.linvel_written {
        body.set_linvel(proxy.linvel, true);
    }
    if proxy.angvel_written {
        body.set_angvel(proxy.angvel, true);
    }
}

/// Obstacle contacts that began since the last call.
fn contacts_started(
    narrow_phase: &NarrowPhase,
    chassis: ColliderHandle,
    obstacles: &HashSet<ColliderHandle>,
    touching: &mut HashSet<ColliderHandle>,
) -> Vec<CollisionContact> {
    let mut now = HashSet::new();
    let mut started = Vec::new();

    for pair in narrow_phase.contact_pairs_with(chassis) {
        if !pair.has_any_active_contact {
            continue;
        }
        // rapier normals point from collider1 to collider2
        let (other, chassis_first) = if pair.collider1 == chassis {
            (pair.collider2, true)
        } else {
            (pair.collider1, false)
        };
        if !obstacles.contains(&other) {
            continue;
        }
        now.insert(other);
        if touching.contains(&other) {
            continue;
        }

        for manifold in &pair.manifolds {
            let Some(contact) = manifold.data.solver_contacts.first() else { continue };
            let normal = if chassis_first { -manifold.data.normal } else { manifold.data.normal };
            started.push(CollisionContact { point: p3(contact.point), normal: v3(normal) });
        }
    }

    *touching = now;
    started
}

// ---------------------------------------------------------------------------
// world
// ---------------------------------------------------------------------------

pub struct Vehicle {
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    pub controller: VehicleController,
    pub input: InputState,
    pub last: Option<TickTelemetry>,
    touching: HashSet<ColliderHandle>,
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline,

    pub vehicles: BTreeMap<String, Vehicle>, // id -> vehicle, ordered for stable snapshots
    pub obstacles: HashSet<ColliderHandle>,
    pub tick: u64,
    rng: StdRng,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic collision kicks.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // 1000 x 2 x 1000 slab, top face at y = 0
        let ground_rb = RigidBodyBuilder::fixed()
            .translation(vector![0.0, -1.0, 0.0])
            .build();
        let ground_handle = bodies.insert(ground_rb);

        let ground_collider = ColliderBuilder::cuboid(500.0, 1.0, 500.0)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.2)
            .restitution(0.0)
            .build();
        colliders.insert_with_parent(ground_collider, ground_handle, &mut bodies);

        info!("ground inserted: {} bodies, {} colliders", bodies.len(), colliders.len());

        Self {
            gravity: vector![0.0, -9.81, 0.0],
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            vehicles: BTreeMap::new(),
            obstacles: HashSet::new(),
            tick: 0,
            rng,
        }
    }

    /// Static box the chassis can hit (and the wheels can drive on).
    pub fn add_obstacle(&mut self, center: [f32; 3], half_extents: [f32; 3]) -> ColliderHandle {
        let [x, y, z] = center;
        let [hx, hy, hz] = half_extents;

        let rb = RigidBodyBuilder::fixed().translation(vector![x, y, z]).build();
        let handle = self.bodies.insert(rb);
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .collision_groups(InteractionGroups::new(GROUP_OBSTACLE, GROUP_CHASSIS))
            .friction(0.5)
            .restitution(0.0)
            .build();

        let collider = self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        self.obstacles.insert(collider);
        collider
    }

    /// Build the controller first so a bad config never leaves a body behind.
    pub fn spawn_vehicle(
        &mut self,
        id: impl Into<String>,
        config: VehicleConfig,
        position: [f32; 3],
    ) -> Result<RigidBodyHandle, VehicleError> {
        let id = id.into();
        let controller = VehicleController::new(config)?;
        let chassis = controller.config().chassis;

        if self.vehicles.contains_key(&id) {
            warn!("vehicle '{}' already exists, replacing it", id);
            self.despawn_vehicle(&id)?;
        }

        let [hx, hy, hz] = chassis.half_extents;
        let [cx, cy, cz] = chassis.com_offset;
        let volume = 8.0 * hx * hy * hz;
        if volume <= 0.0 {
            return Err(VehicleError::InvalidTuning(format!(
                "chassis half extents must be positive, got {:?}",
                chassis.half_extents
            )));
        }
        let density = chassis.mass / volume; // ρ = m / V

        let [x, y, z] = position;
        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![x, y, z])
            .linear_damping(chassis.linear_damping)
            .angular_damping(chassis.angular_damping)
            .ccd_enabled(true)
            .build();

        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .translation(vector![cx, cy, cz])
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND | GROUP_OBSTACLE))
            .density(density)
            .friction(0.0) // tyres do all the gripping
            .restitution(0.0)
            .build();

        let body = self.bodies.insert(rb);
        let collider = self.colliders.insert_with_parent(collider, body, &mut self.bodies);

        info!("spawned '{}' ({}) at {:?}", id, controller.name(), position);

        self.vehicles.insert(
            id,
            Vehicle {
                body,
                collider,
                controller,
                input: InputState::default(),
                last: None,
                touching: HashSet::new(),
            },
        );
        Ok(body)
    }

    pub fn despawn_vehicle(&mut self, id: &str) -> Result<(), VehicleError> {
        let vehicle = self
            .vehicles
            .remove(id)
            .ok_or_else(|| VehicleError::UnknownVehicle(id.to_string()))?;

        self.bodies.remove(
            vehicle.body,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            true,
        );
        info!("despawned '{}'", id);
        Ok(())
    }

    /// Latest controls for a vehicle; they persist until replaced.
    pub fn set_input(&mut self, id: &str, input: InputState) -> Result<(), VehicleError> {
        let vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or_else(|| VehicleError::UnknownVehicle(id.to_string()))?;
        vehicle.input = input;
        Ok(())
    }

    pub fn request_reset(&mut self, id: &str) -> Result<(), VehicleError> {
        let vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or_else(|| VehicleError::UnknownVehicle(id.to_string()))?;
        vehicle.controller.request_reset();
        Ok(())
    }

    pub fn vehicle_pose(&self, id: &str) -> Result<(Pos3, UnitQuaternion<f32>), VehicleError> {
        let vehicle = self
            .vehicles
            .get(id)
            .ok_or_else(|| VehicleError::UnknownVehicle(id.to_string()))?;
        let body = self
            .bodies
            .get(vehicle.body)
            .ok_or_else(|| VehicleError::MissingRigidBody(id.to_string()))?;
        let iso = body.position();
        Ok((Point::from(iso.translation.vector), iso.rotation))
    }

    /// Run every controller, then advance rapier by `dt`.
    pub fn step(&mut self, dt: Real) -> Snapshot {
        self.query_pipeline.update(&self.colliders);

        let mut snapshots = Vec::with_capacity(self.vehicles.len());

        for (id, vehicle) in self.vehicles.iter_mut() {
            let Some(body) = self.bodies.get(vehicle.body) else {
                warn!("vehicle '{}' lost its rigid body, skipping", id);
                continue;
            };
            let mut proxy = proxy_of(body);

            let ground = RapierGround {
                query: &self.query_pipeline,
                bodies: &self.bodies,
                colliders: &self.colliders,
                exclude: vehicle.body,
            };
            let mut telemetry = vehicle.controller.tick(&mut proxy, &ground, vehicle.input, dt);

            let contacts = contacts_started(
                &self.narrow_phase,
                vehicle.collider,
                &self.obstacles,
                &mut vehicle.touching,
            );
            if !contacts.is_empty() && !proxy.pose_written {
                let kick = vehicle.controller.on_collision(&mut proxy, &contacts, &mut self.rng);
                telemetry.collision_kick = Some(v3(kick));
            }

            if let Some(body) = self.bodies.get_mut(vehicle.body) {
                flush(&proxy, body);
            }

            vehicle.last = Some(telemetry.clone());
            snapshots.push(VehicleSnapshot { id: id.clone(), telemetry });
        }

        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        // Safety: prevent bodies from exploding to insane coordinates
        for (_, body) in self.bodies.iter_mut() {
            if !body.is_dynamic() {
                continue;
            }
            let pos = *body.translation();
            let bad = !pos.iter().all(|c| c.is_finite()) || pos.iter().any(|c| c.abs() > SAFE_LIMIT);
            if bad {
                body.set_translation(vector![0.0, 1.0, 0.0], true);
                body.set_linvel(Vector::zeros(), true);
                body.set_angvel(Vector::zeros(), true);
                warn!("reset exploding body back to origin");
            }
        }

        self.tick += 1;
        Snapshot { tick: self.tick, vehicles: snapshots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_config_spawns_nothing() {
        let mut world = PhysicsWorld::with_seed(1);
        let mut cfg = VehicleConfig::sport_bike();
        cfg.wheels.truncate(1);

        let bodies_before = world.bodies.len();
        assert!(world.spawn_vehicle("p1", cfg, [0.0, 1.0, 0.0]).is_err());
        assert_eq!(world.bodies.len(), bodies_before);
        assert!(world.vehicles.is_empty());
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut world = PhysicsWorld::with_seed(1);
        assert!(matches!(
            world.set_input("ghost", InputState::default()),
            Err(VehicleError::UnknownVehicle(_))
        ));
        assert!(matches!(world.request_reset("ghost"), Err(VehicleError::UnknownVehicle(_))));
        assert!(matches!(world.despawn_vehicle("ghost"), Err(VehicleError::UnknownVehicle(_))));
    }

    #[test]
    fn respawn_replaces_body() {
        let mut world = PhysicsWorld::with_seed(1);
        let a = world.spawn_vehicle("p1", VehicleConfig::sport_bike(), [0.0, 1.0, 0.0]).unwrap();
        let b = world.spawn_vehicle("p1", VehicleConfig::sport_bike(), [5.0, 1.0, 0.0]).unwrap();
        assert_ne!(a, b);
        assert!(world.bodies.get(a).is_none());
        assert_eq!(world.vehicles.len(), 1);
    }

    #[test]
    fn explosion_guard_leaves_fixed_bodies_alone() {
        let mut world = PhysicsWorld::with_seed(1);
        let far = world.add_obstacle([2_000.0, 0.5, 0.0], [1.0, 0.5, 1.0]);
        let h = world.spawn_vehicle("p1", VehicleConfig::sport_bike(), [0.0, 1.0, 0.0]).unwrap();
        world.bodies[h].set_translation(vector![5_000.0, 1.0, 0.0], true);

        world.step(1.0 / 60.0);

        let parent = world.colliders[far].parent().unwrap();
        assert_eq!(world.bodies[parent].translation().x, 2_000.0);
        // the runaway chassis is pulled back near the origin
        assert!(world.bodies[h].translation().x.abs() < 1.0);
    }

    #[test]
    fn ray_hits_ground_top_face() {
        let mut world = PhysicsWorld::with_seed(1);
        let h = world.spawn_vehicle("p1", VehicleConfig::sport_bike(), [0.0, 3.0, 0.0]).unwrap();
        world.query_pipeline.update(&world.colliders);

        let ground = RapierGround {
            query: &world.query_pipeline,
            bodies: &world.bodies,
            colliders: &world.colliders,
            exclude: h,
        };
        // starts inside the chassis, which must be ignored
        let hit = ground.cast(point![0.0, 3.0, 0.0], vector![0.0, -1.0, 0.0], 10.0).unwrap();
        assert!((hit.distance - 3.0).abs() < 1e-3);
        assert!((hit.normal.y - 1.0).abs() < 1e-3);
        assert!(ground.cast(point![0.0, 3.0, 0.0], vector![0.0, -1.0, 0.0], 2.0).is_none());
    }
}
