//! Spawn gate: the only path from client drop requests to physics state.

use crate::game::constants::spawn::PREVIEW_HEIGHT;
use crate::game::physics::BodyId;
use crate::game::registry::{EntityRegistry, RegistryError};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpawnError {
    #[error("Tier index {0} is outside the tier table")]
    InvalidTier(i32),
    #[error("Drop coordinate is not finite")]
    NonFiniteCoordinate,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Validates and clamps drop requests
#[derive(Debug, Clone, Copy)]
pub struct SpawnGate {
    preview_height: f32,
}

impl Default for SpawnGate {
    fn default() -> Self {
        Self {
            preview_height: PREVIEW_HEIGHT,
        }
    }
}

impl SpawnGate {
    pub fn new(preview_height: f32) -> Self {
        Self { preview_height }
    }

    pub fn preview_height(&self) -> f32 {
        self.preview_height
    }

    /// Drop a fruit of `tier_index` at horizontal position `x`.
    ///
    /// `x` is clamped so the whole circle lies between the side walls; the
    /// fruit always appears at the preview height.
    pub fn request_drop(
        &self,
        registry: &mut EntityRegistry,
        x: f32,
        tier_index: i32,
    ) -> Result<BodyId, SpawnError> {
        let tier = registry
            .tiers()
            .checked_index(tier_index)
            .ok_or(SpawnError::InvalidTier(tier_index))?;
        if !Vec2::new(x, self.preview_height).is_finite() {
            return Err(SpawnError::NonFiniteCoordinate);
        }

        let radius = registry
            .tiers()
            .get(tier)
            .map(|t| t.radius)
            .unwrap_or_default();
        let x = clamp_drop_x(x, radius, registry.settings().width);

        Ok(registry.add_fruit(x, self.preview_height, tier)?)
    }
}

/// Clamp `x` into `[radius, width - radius]`
#[inline]
pub fn clamp_drop_x(x: f32, radius: f32, width: f32) -> f32 {
    x.max(radius).min(width - radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::registry::WorldSettings;

    fn setup() -> (SpawnGate, EntityRegistry) {
        (
            SpawnGate::default(),
            EntityRegistry::new(WorldSettings::zero_gravity()),
        )
    }

    #[test]
    fn test_clamps_far_left() {
        let (gate, mut reg) = setup();
        let id = gate.request_drop(&mut reg, -1000.0, 0).unwrap();
        assert_eq!(reg.fruit(id).unwrap().position.x, 24.0);
    }

    #[test]
    fn test_clamps_far_right() {
        let (gate, mut reg) = setup();
        let id = gate.request_drop(&mut reg, 10000.0, 0).unwrap();
        assert_eq!(reg.fruit(id).unwrap().position.x, 640.0 - 24.0);
    }

    #[test]
    fn test_clamp_uses_tier_radius() {
        let (gate, mut reg) = setup();
        let id = gate.request_drop(&mut reg, 0.0, 10).unwrap();
        assert_eq!(reg.fruit(id).unwrap().position.x, 192.0);
    }

    #[test]
    fn test_in_range_x_untouched() {
        let (gate, mut reg) = setup();
        let id = gate.request_drop(&mut reg, 321.5, 2).unwrap();
        assert_eq!(reg.fruit(id).unwrap().position.x, 321.5);
    }

    #[test]
    fn test_spawns_at_preview_height() {
        let (gate, mut reg) = setup();
        let id = gate.request_drop(&mut reg, 300.0, 4).unwrap();
        let fruit = reg.fruit(id).unwrap();
        assert_eq!(fruit.position.y, PREVIEW_HEIGHT);
        assert_eq!(fruit.tier, 4);
    }

    #[test]
    fn test_rejects_invalid_tier() {
        let (gate, mut reg) = setup();
        assert_eq!(
            gate.request_drop(&mut reg, 100.0, 11),
            Err(SpawnError::InvalidTier(11))
        );
        assert_eq!(
            gate.request_drop(&mut reg, 100.0, -1),
            Err(SpawnError::InvalidTier(-1))
        );
        assert_eq!(reg.fruit_count(), 0);
    }

    #[test]
    fn test_rejects_non_finite_x() {
        let (gate, mut reg) = setup();
        assert_eq!(
            gate.request_drop(&mut reg, f32::NAN, 0),
            Err(SpawnError::NonFiniteCoordinate)
        );
        assert_eq!(
            gate.request_drop(&mut reg, f32::NEG_INFINITY, 0),
            Err(SpawnError::NonFiniteCoordinate)
        );
        assert_eq!(reg.fruit_count(), 0);
    }

    #[test]
    fn test_rejects_non_finite_preview_height() {
        let gate = SpawnGate::new(f32::INFINITY);
        let mut reg = EntityRegistry::new(WorldSettings::zero_gravity());
        assert_eq!(
            gate.request_drop(&mut reg, 100.0, 0),
            Err(SpawnError::NonFiniteCoordinate)
        );
        assert_eq!(reg.fruit_count(), 0);
    }

    #[test]
    fn test_clamp_drop_x() {
        assert_eq!(clamp_drop_x(-5.0, 10.0, 100.0), 10.0);
        assert_eq!(clamp_drop_x(500.0, 10.0, 100.0), 90.0);
        assert_eq!(clamp_drop_x(50.0, 10.0, 100.0), 50.0);
    }
}
