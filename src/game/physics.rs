//! rapier2d adapter
//!
//! [`RigidBodyWorld`] owns the rapier simulation and hides its handles behind
//! stable [`BodyId`]s. Each [`step`](RigidBodyWorld::step) returns the batch of
//! collision pairs that started during that step, so callers never act from
//! inside rapier's event dispatch.

use hashbrown::HashMap;
use rapier2d::prelude::*;

use crate::util::vec2::Vec2;

/// Stable body identity. Assigned at creation, never reused by this world.
pub type BodyId = u64;

/// Surface properties handed to rapier colliders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub friction: f32,
    pub restitution: f32,
}

/// Kinematic state of one body after the last step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec2,
    /// Orientation in radians
    pub angle: f32,
    /// Linear velocity in world units per second
    pub velocity: Vec2,
}

/// Two bodies that started touching during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionPair {
    pub body_a: BodyId,
    pub body_b: BodyId,
}

impl CollisionPair {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self { body_a, body_b }
    }

    /// Order-independent key used for sorting
    fn sort_key(&self) -> (BodyId, BodyId) {
        (self.body_a.min(self.body_b), self.body_a.max(self.body_b))
    }
}

struct BodyEntry {
    body: RigidBodyHandle,
    collider: ColliderHandle,
}

/// The rigid-body collaborator
pub struct RigidBodyWorld {
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
    bodies: HashMap<BodyId, BodyEntry>,
    collider_to_body: HashMap<ColliderHandle, BodyId>,
    next_id: BodyId,
}

impl RigidBodyWorld {
    /// Create an empty world with the given gravity vector
    pub fn new(gravity: Vec2) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![gravity.x, gravity.y],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            bodies: HashMap::new(),
            collider_to_body: HashMap::new(),
            next_id: 1,
        }
    }

    /// Add a dynamic disc at rest
    pub fn add_circle(&mut self, center: Vec2, radius: f32, material: Material) -> BodyId {
        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![center.x, center.y])
            .build();
        let collider = ColliderBuilder::ball(radius)
            .friction(material.friction)
            .restitution(material.restitution)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.insert(rb, collider)
    }

    /// Add an immovable axis-aligned box
    pub fn add_static_box(&mut self, center: Vec2, size: Vec2, material: Material) -> BodyId {
        let rb = RigidBodyBuilder::fixed()
            .translation(vector![center.x, center.y])
            .build();
        let collider = ColliderBuilder::cuboid(size.x / 2.0, size.y / 2.0)
            .friction(material.friction)
            .restitution(material.restitution)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.insert(rb, collider)
    }

    fn insert(&mut self, rb: RigidBody, collider: Collider) -> BodyId {
        let id = self.next_id;
        self.next_id += 1;

        let body = self.rigid_body_set.insert(rb);
        let collider =
            self.collider_set
                .insert_with_parent(collider, body, &mut self.rigid_body_set);
        self.collider_to_body.insert(collider, id);
        self.bodies.insert(id, BodyEntry { body, collider });
        id
    }

    /// Remove a body and its collider. Returns false if it was not present.
    pub fn remove(&mut self, id: BodyId) -> bool {
        let Some(entry) = self.bodies.remove(&id) else {
            return false;
        };
        self.collider_to_body.remove(&entry.collider);
        self.rigid_body_set.remove(
            entry.body,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        true
    }

    /// Drop every body and all solver state. Identities keep counting up.
    pub fn reset(&mut self) {
        let next_id = self.next_id;
        let gravity = Vec2::new(self.gravity.x, self.gravity.y);
        *self = Self::new(gravity);
        self.next_id = next_id;
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Returns the collision pairs that started during this step, ordered by
    /// (smaller id, larger id) so resolution order does not depend on rapier's
    /// internal event delivery order.
    pub fn step(&mut self, dt: f32) -> Vec<CollisionPair> {
        self.integration_params.dt = dt;

        let (collision_send, collision_recv) =
            rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) =
            rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

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
            None,
            &(),
            &event_handler,
        );

        let mut started = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            if let CollisionEvent::Started(h1, h2, _flags) = event {
                let a = self.collider_to_body.get(&h1).copied();
                let b = self.collider_to_body.get(&h2).copied();
                if let (Some(a), Some(b)) = (a, b) {
                    started.push(CollisionPair::new(a, b));
                }
            }
        }
        started.sort_by_key(CollisionPair::sort_key);
        started
    }

    /// Current state of a body, if it exists
    pub fn state(&self, id: BodyId) -> Option<BodyState> {
        let entry = self.bodies.get(&id)?;
        let rb = self.rigid_body_set.get(entry.body)?;
        let translation = rb.translation();
        let linvel = rb.linvel();
        Some(BodyState {
            position: Vec2::new(translation.x, translation.y),
            angle: rb.rotation().angle(),
            velocity: Vec2::new(linvel.x, linvel.y),
        })
    }

    #[inline]
    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATERIAL: Material = Material {
        friction: 0.006,
        restitution: 0.1,
    };
    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut world = RigidBodyWorld::new(Vec2::ZERO);
        let a = world.add_circle(Vec2::new(0.0, 0.0), 10.0, MATERIAL);
        let b = world.add_circle(Vec2::new(50.0, 0.0), 10.0, MATERIAL);
        assert!(b > a);

        assert!(world.remove(a));
        let c = world.add_circle(Vec2::new(100.0, 0.0), 10.0, MATERIAL);
        assert!(c > b);

        world.reset();
        assert_eq!(world.body_count(), 0);
        let d = world.add_circle(Vec2::new(0.0, 0.0), 10.0, MATERIAL);
        assert!(d > c);
    }

    #[test]
    fn test_remove_missing_body_is_noop() {
        let mut world = RigidBodyWorld::new(Vec2::ZERO);
        assert!(!world.remove(42));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_state_reads_back_exact_spawn_position() {
        let mut world = RigidBodyWorld::new(Vec2::ZERO);
        let id = world.add_circle(Vec2::new(100.5, 32.0), 24.0, MATERIAL);
        let state = world.state(id).unwrap();
        assert_eq!(state.position, Vec2::new(100.5, 32.0));
        assert_eq!(state.velocity, Vec2::ZERO);
        assert_eq!(state.angle, 0.0);
    }

    #[test]
    fn test_gravity_pulls_down() {
        let mut world = RigidBodyWorld::new(Vec2::new(0.0, 1000.0));
        let id = world.add_circle(Vec2::new(100.0, 100.0), 10.0, MATERIAL);
        for _ in 0..10 {
            world.step(DT);
        }
        let state = world.state(id).unwrap();
        assert!(state.position.y > 100.0, "y grows downward, got {}", state.position.y);
        assert!(state.velocity.y > 0.0);
    }

    #[test]
    fn test_static_box_does_not_move() {
        let mut world = RigidBodyWorld::new(Vec2::new(0.0, 1000.0));
        let id = world.add_static_box(Vec2::new(0.0, 0.0), Vec2::new(64.0, 64.0), MATERIAL);
        for _ in 0..10 {
            world.step(DT);
        }
        assert_eq!(world.state(id).unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn test_overlapping_discs_report_started_pair() {
        let mut world = RigidBodyWorld::new(Vec2::ZERO);
        let a = world.add_circle(Vec2::new(100.0, 100.0), 24.0, MATERIAL);
        let b = world.add_circle(Vec2::new(101.0, 100.0), 24.0, MATERIAL);

        let pairs = world.step(DT);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].sort_key(), (a, b));
    }

    #[test]
    fn test_started_pair_reported_once() {
        let mut world = RigidBodyWorld::new(Vec2::ZERO);
        world.add_circle(Vec2::new(100.0, 100.0), 24.0, MATERIAL);
        world.add_circle(Vec2::new(140.0, 100.0), 24.0, MATERIAL);

        let mut total = 0;
        for _ in 0..5 {
            total += world.step(DT).len();
        }
        assert_eq!(total, 1);
    }

    #[test]
    fn test_pairs_sorted_by_id() {
        let mut world = RigidBodyWorld::new(Vec2::ZERO);
        let ids: Vec<BodyId> = (0..4)
            .map(|i| world.add_circle(Vec2::new(100.0 + i as f32 * 30.0, 100.0), 20.0, MATERIAL))
            .collect();

        let pairs = world.step(DT);
        let keys: Vec<_> = pairs.iter().map(|p| p.sort_key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&(ids[0], ids[1])));
    }
}
