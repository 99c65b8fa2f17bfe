//! Entity registry
//!
//! The authoritative set of fruit and wall bodies. Owns the rigid-body world;
//! every add or remove is applied to it immediately. Input validation belongs
//! to the spawn gate, so the only check here is the tier bound.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::game::constants::{physics, world};
use crate::game::physics::{BodyId, CollisionPair, Material, RigidBodyWorld};
use crate::game::snapshot::{BodyLabel, BodyRecord};
use crate::game::tiers::{TierIndex, TierTable};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Tier index {0} is outside the tier table (max {1})")]
    InvalidTier(TierIndex, TierIndex),
}

/// Geometry of one wall
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallSpec {
    pub center: Vec2,
    pub size: Vec2,
}

/// Everything needed to build (and rebuild) a world
#[derive(Debug, Clone)]
pub struct WorldSettings {
    pub width: f32,
    pub height: f32,
    pub wall_pad: f32,
    pub floor_lift: f32,
    pub gravity: Vec2,
    pub material: Material,
    pub tiers: Arc<TierTable>,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            width: world::WIDTH,
            height: world::HEIGHT,
            wall_pad: world::WALL_PAD,
            floor_lift: world::FLOOR_LIFT,
            gravity: Vec2::new(0.0, physics::GRAVITY),
            material: Material {
                friction: physics::FRICTION,
                restitution: physics::RESTITUTION,
            },
            tiers: Arc::new(TierTable::standard()),
        }
    }
}

impl WorldSettings {
    /// Standard well with gravity switched off
    pub fn zero_gravity() -> Self {
        Self {
            gravity: Vec2::ZERO,
            ..Self::default()
        }
    }

    /// Floor, left wall, right wall. The inner faces of the side walls sit at
    /// x = 0 and x = width.
    pub fn wall_layout(&self) -> [WallSpec; 3] {
        let pad = self.wall_pad;
        [
            WallSpec {
                center: Vec2::new(self.width / 2.0, self.height + pad / 2.0 - self.floor_lift),
                size: Vec2::new(self.width, pad),
            },
            WallSpec {
                center: Vec2::new(-pad / 2.0, self.height / 2.0),
                size: Vec2::new(pad, self.height),
            },
            WallSpec {
                center: Vec2::new(self.width + pad / 2.0, self.height / 2.0),
                size: Vec2::new(pad, self.height),
            },
        ]
    }
}

#[derive(Debug, Clone, Copy)]
struct FruitMeta {
    tier: TierIndex,
    /// Set once the fruit has been through a physics step
    stepped: bool,
}

/// Read-only view of a live fruit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FruitView {
    pub id: BodyId,
    pub tier: TierIndex,
    pub position: Vec2,
    pub angle: f32,
    pub velocity: Vec2,
    pub stepped: bool,
}

pub struct EntityRegistry {
    settings: WorldSettings,
    physics: RigidBodyWorld,
    fruits: HashMap<BodyId, FruitMeta>,
    walls: Vec<BodyId>,
}

impl EntityRegistry {
    /// Build a world containing only the three walls
    pub fn new(settings: WorldSettings) -> Self {
        let physics = RigidBodyWorld::new(settings.gravity);
        let mut registry = Self {
            settings,
            physics,
            fruits: HashMap::new(),
            walls: Vec::with_capacity(3),
        };
        registry.build_walls();
        registry
    }

    fn build_walls(&mut self) {
        for wall in self.settings.wall_layout() {
            let id = self
                .physics
                .add_static_box(wall.center, wall.size, self.settings.material);
            self.walls.push(id);
        }
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn tiers(&self) -> &TierTable {
        &self.settings.tiers
    }

    /// Create a fruit at rest at `(x, y)`
    pub fn add_fruit(&mut self, x: f32, y: f32, tier: TierIndex) -> Result<BodyId, RegistryError> {
        let radius = match self.settings.tiers.get(tier) {
            Some(t) => t.radius,
            None => {
                return Err(RegistryError::InvalidTier(tier, self.settings.tiers.max_tier()));
            }
        };
        let id = self
            .physics
            .add_circle(Vec2::new(x, y), radius, self.settings.material);
        self.fruits.insert(id, FruitMeta { tier, stepped: false });
        Ok(id)
    }

    /// Remove bodies by id. Unknown ids are ignored.
    pub fn remove_bodies(&mut self, ids: &[BodyId]) {
        for &id in ids {
            let known = self.fruits.remove(&id).is_some() || {
                let before = self.walls.len();
                self.walls.retain(|&w| w != id);
                self.walls.len() != before
            };
            if known {
                self.physics.remove(id);
            }
        }
    }

    /// Destroy every body and rebuild the walls from the settings
    pub fn clear(&mut self) {
        self.physics.reset();
        self.fruits.clear();
        self.walls.clear();
        self.build_walls();
    }

    /// Advance the physics world; returns the collision pairs that started
    pub fn step(&mut self, dt: f32) -> Vec<CollisionPair> {
        let pairs = self.physics.step(dt);
        for meta in self.fruits.values_mut() {
            meta.stepped = true;
        }
        pairs
    }

    pub fn fruit(&self, id: BodyId) -> Option<FruitView> {
        let meta = self.fruits.get(&id)?;
        let state = self.physics.state(id)?;
        Some(FruitView {
            id,
            tier: meta.tier,
            position: state.position,
            angle: state.angle,
            velocity: state.velocity,
            stepped: meta.stepped,
        })
    }

    /// All live fruit in ascending id order
    pub fn fruits(&self) -> Vec<FruitView> {
        let mut ids: Vec<BodyId> = self.fruits.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(|id| self.fruit(id)).collect()
    }

    #[inline]
    pub fn is_wall(&self, id: BodyId) -> bool {
        self.walls.contains(&id)
    }

    #[inline]
    pub fn fruit_count(&self) -> usize {
        self.fruits.len()
    }

    #[inline]
    pub fn wall_count(&self) -> usize {
        self.walls.len()
    }

    /// Every live body in ascending id order (walls first, since they are
    /// created before any fruit of the same world)
    pub fn all_bodies(&self) -> Vec<BodyRecord> {
        let mut records = Vec::with_capacity(self.walls.len() + self.fruits.len());

        for &id in &self.walls {
            if let Some(state) = self.physics.state(id) {
                records.push(BodyRecord {
                    id,
                    x: state.position.x,
                    y: state.position.y,
                    angle: state.angle,
                    size_index: None,
                    label: BodyLabel::Wall,
                });
            }
        }
        for (&id, meta) in &self.fruits {
            if let Some(state) = self.physics.state(id) {
                records.push(BodyRecord {
                    id,
                    x: state.position.x,
                    y: state.position.y,
                    angle: state.angle,
                    size_index: Some(meta.tier),
                    label: BodyLabel::Fruit,
                });
            }
        }

        records.sort_by_key(|r| r.id);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EntityRegistry {
        EntityRegistry::new(WorldSettings::zero_gravity())
    }

    #[test]
    fn test_new_world_has_three_walls() {
        let reg = registry();
        let bodies = reg.all_bodies();
        assert_eq!(bodies.len(), 3);
        assert!(bodies.iter().all(|b| b.is_wall() && b.size_index.is_none()));
        assert_eq!(reg.fruit_count(), 0);
    }

    #[test]
    fn test_wall_layout_matches_well() {
        let settings = WorldSettings::default();
        let [floor, left, right] = settings.wall_layout();
        assert_eq!(floor.center, Vec2::new(320.0, 944.0));
        assert_eq!(floor.size, Vec2::new(640.0, 64.0));
        assert_eq!(left.center, Vec2::new(-32.0, 480.0));
        assert_eq!(right.center, Vec2::new(672.0, 480.0));
        // Inner faces at 0 and width
        assert_eq!(left.center.x + left.size.x / 2.0, 0.0);
        assert_eq!(right.center.x - right.size.x / 2.0, settings.width);
    }

    #[test]
    fn test_add_fruit() {
        let mut reg = registry();
        let id = reg.add_fruit(100.0, 200.0, 3).unwrap();
        let fruit = reg.fruit(id).unwrap();
        assert_eq!(fruit.tier, 3);
        assert_eq!(fruit.position, Vec2::new(100.0, 200.0));
        assert!(!fruit.stepped);
        assert_eq!(reg.fruit_count(), 1);
        assert!(!reg.is_wall(id));
    }

    #[test]
    fn test_add_fruit_rejects_out_of_table_tier() {
        let mut reg = registry();
        assert_eq!(
            reg.add_fruit(100.0, 100.0, 11),
            Err(RegistryError::InvalidTier(11, 10))
        );
        assert_eq!(reg.fruit_count(), 0);
        assert_eq!(reg.all_bodies().len(), 3);
    }

    #[test]
    fn test_remove_bodies() {
        let mut reg = registry();
        let a = reg.add_fruit(100.0, 100.0, 0).unwrap();
        let b = reg.add_fruit(300.0, 100.0, 0).unwrap();
        reg.remove_bodies(&[a, 9999]);
        assert!(reg.fruit(a).is_none());
        assert!(reg.fruit(b).is_some());
        assert_eq!(reg.all_bodies().len(), 4);
    }

    #[test]
    fn test_step_marks_fruit_stepped() {
        let mut reg = registry();
        let id = reg.add_fruit(100.0, 100.0, 0).unwrap();
        reg.step(physics::DT);
        assert!(reg.fruit(id).unwrap().stepped);
    }

    #[test]
    fn test_all_bodies_sorted_walls_first() {
        let mut reg = registry();
        reg.add_fruit(500.0, 100.0, 1).unwrap();
        reg.add_fruit(100.0, 100.0, 0).unwrap();
        let bodies = reg.all_bodies();
        let ids: Vec<_> = bodies.iter().map(|b| b.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert!(bodies[..3].iter().all(|b| b.is_wall()));
        assert_eq!(bodies[3].size_index, Some(1));
        assert_eq!(bodies[4].size_index, Some(0));
    }

    #[test]
    fn test_clear_rebuilds_identical_walls() {
        let mut reg = registry();
        let before: Vec<_> = reg.all_bodies().iter().map(|b| (b.x, b.y, b.angle)).collect();
        reg.add_fruit(100.0, 100.0, 0).unwrap();

        reg.clear();
        let bodies = reg.all_bodies();
        assert_eq!(bodies.len(), 3);
        assert_eq!(reg.fruit_count(), 0);
        let after: Vec<_> = bodies.iter().map(|b| (b.x, b.y, b.angle)).collect();
        assert_eq!(before, after);
    }
}
