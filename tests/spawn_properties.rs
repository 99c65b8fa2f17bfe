//! Drop gate invariants over arbitrary client input

use fruit_merge_server::game::registry::{EntityRegistry, WorldSettings};
use fruit_merge_server::game::spawn::SpawnGate;
use proptest::prelude::*;

fn finite_x() -> impl Strategy<Value = f32> {
    prop_oneof![
        -2000.0f32..2000.0,
        any::<f32>().prop_filter("finite", |x| x.is_finite()),
    ]
}

proptest! {
    #[test]
    fn dropped_fruit_stays_inside_the_well(x in finite_x(), tier in 0i32..11) {
        let mut registry = EntityRegistry::new(WorldSettings::default());
        let gate = SpawnGate::default();
        let width = registry.settings().width;

        let id = gate.request_drop(&mut registry, x, tier).unwrap();
        let fruit = registry.fruit(id).unwrap();
        let radius = registry.tiers().get(fruit.tier).unwrap().radius;

        prop_assert_eq!(i32::from(fruit.tier), tier);
        prop_assert!(fruit.position.x - radius >= -1e-3);
        prop_assert!(fruit.position.x + radius <= width + 1e-3);
        prop_assert!((fruit.position.y - gate.preview_height()).abs() < 1e-3);
    }

    #[test]
    fn out_of_range_tier_spawns_nothing(
        x in finite_x(),
        tier in prop_oneof![i32::MIN..0, 11i32..=i32::MAX],
    ) {
        let mut registry = EntityRegistry::new(WorldSettings::default());
        let gate = SpawnGate::default();

        prop_assert!(gate.request_drop(&mut registry, x, tier).is_err());
        prop_assert_eq!(registry.fruit_count(), 0);
        prop_assert_eq!(registry.wall_count(), 3);
    }

    #[test]
    fn in_range_x_is_left_alone(tier in 0i32..11, t in 0.0f32..=1.0) {
        let mut registry = EntityRegistry::new(WorldSettings::default());
        let gate = SpawnGate::default();
        let radius = registry.tiers().get(tier as u8).unwrap().radius;
        let x = radius + t * (registry.settings().width - 2.0 * radius);

        let id = gate.request_drop(&mut registry, x, tier).unwrap();
        let fruit = registry.fruit(id).unwrap();
        prop_assert!((fruit.position.x - x).abs() < 1e-3);
    }
}
