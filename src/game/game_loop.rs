//! Synchronous tick: STEP → RESOLVE → PUBLISH
//!
//! The loop owns the registry and the per-tick systems. It never blocks; the
//! async driver in `net::game_session` calls [`GameLoop::tick`] at the fixed
//! rate and applies queued drops in between.

use tracing::{debug, info};

use crate::game::constants::physics::DT;
use crate::game::loss::{LossDetector, LossRules};
use crate::game::merge::{MergeEvents, MergeResolver};
use crate::game::physics::BodyId;
use crate::game::registry::{EntityRegistry, WorldSettings};
use crate::game::snapshot::WorldSnapshot;
use crate::game::spawn::{SpawnError, SpawnGate};
use crate::game::tiers::TierTable;

/// Game loop configuration
#[derive(Debug, Clone)]
pub struct GameLoopConfig {
    /// Fixed physics step in seconds
    pub dt: f32,
    pub world: WorldSettings,
    pub loss: LossRules,
    pub spawn: SpawnGate,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            dt: DT,
            world: WorldSettings::default(),
            loss: LossRules::default(),
            spawn: SpawnGate::default(),
        }
    }
}

impl GameLoopConfig {
    /// Validate settings before the loop starts
    pub fn validate(&self) -> Result<(), String> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err("dt must be positive".to_string());
        }
        if !(self.world.width > 0.0 && self.world.height > 0.0) {
            return Err("World width and height must be positive".to_string());
        }
        if !(self.loss.line > 0.0 && self.loss.line < self.world.height) {
            return Err("Loss line must lie inside the world".to_string());
        }

        let tiers = TierTable::new(self.world.tiers.iter().copied().collect())
            .map_err(|e| e.to_string())?;
        let widest = tiers.get(tiers.max_tier()).map(|t| t.radius * 2.0);
        if widest.is_some_and(|d| d > self.world.width) {
            return Err("Largest fruit does not fit between the walls".to_string());
        }
        Ok(())
    }
}

/// A round ended and the world was rebuilt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetEvent {
    /// Fruit whose settled position ended the round
    pub trigger: BodyId,
    pub final_score: u64,
    pub fruit_cleared: usize,
}

/// Everything a single tick produced
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub merges: MergeEvents,
    pub reset: Option<ResetEvent>,
    /// Post-resolution state (post-reset if a reset happened)
    pub snapshot: WorldSnapshot,
}

pub struct GameLoop {
    config: GameLoopConfig,
    registry: EntityRegistry,
    resolver: MergeResolver,
    loss: LossDetector,
    tick: u64,
    score: u64,
    resets: u64,
}

impl GameLoop {
    pub fn new(config: GameLoopConfig) -> Self {
        let registry = EntityRegistry::new(config.world.clone());
        let loss = LossDetector::new(config.loss);
        Self {
            config,
            registry,
            resolver: MergeResolver::new(),
            loss,
            tick: 0,
            score: 0,
            resets: 0,
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Score of the current round
    pub fn score(&self) -> u64 {
        self.score
    }

    /// Number of rounds lost since start
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Apply a client drop. Visible to the next step.
    pub fn request_drop(&mut self, x: f32, size_index: i32) -> Result<BodyId, SpawnError> {
        self.config.spawn.request_drop(&mut self.registry, x, size_index)
    }

    /// Run one full tick
    pub fn tick(&mut self) -> TickOutcome {
        self.tick += 1;

        // STEP
        let pairs = self.registry.step(self.config.dt);

        // RESOLVE
        let merges = self.resolver.resolve(&mut self.registry, &pairs);
        for merge in &merges {
            self.score += u64::from(merge.score_awarded);
        }

        let reset = self
            .loss
            .check(&self.registry.fruits())
            .map(|trigger| self.reset_world(trigger));

        // PUBLISH
        let snapshot = self.snapshot();
        TickOutcome {
            merges,
            reset,
            snapshot,
        }
    }

    fn reset_world(&mut self, trigger: BodyId) -> ResetEvent {
        let event = ResetEvent {
            trigger,
            final_score: self.score,
            fruit_cleared: self.registry.fruit_count(),
        };
        info!(
            "Round lost at tick {} (fruit {} settled above the line), score {}, {} fruit cleared",
            self.tick, trigger, event.final_score, event.fruit_cleared
        );

        self.registry.clear();
        self.loss.reset();
        self.score = 0;
        self.resets += 1;
        debug!("World rebuilt with {} walls", self.registry.wall_count());
        event
    }

    /// Current registry state as a broadcast snapshot
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            score: self.score,
            bodies: self.registry.all_bodies(),
        }
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new(GameLoopConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::snapshot::BodyLabel;
    use crate::game::tiers::Tier;
    use std::sync::Arc;

    #[test]
    fn test_default_config_is_valid() {
        // Covers the built-in tier table, which is checked through TierTable::new
        assert!(GameLoopConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_custom_tier_table() {
        let mut config = GameLoopConfig::default();
        config.world.tiers = Arc::new(
            TierTable::new(vec![
                Tier { radius: 20.0, score_value: 1 },
                Tier { radius: 30.0, score_value: 3 },
            ])
            .unwrap(),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_fruit_and_bad_line() {
        let mut narrow = GameLoopConfig::default();
        narrow.world.width = 300.0;
        assert!(narrow.validate().is_err());

        let mut low_line = GameLoopConfig::default();
        low_line.loss.line = low_line.world.height + 1.0;
        assert!(low_line.validate().is_err());
    }

    fn zero_gravity_loop() -> GameLoop {
        GameLoop::new(GameLoopConfig {
            world: WorldSettings::zero_gravity(),
            ..GameLoopConfig::default()
        })
    }

    #[test]
    fn test_tick_counts_and_publishes_walls() {
        let mut game = GameLoop::default();
        let outcome = game.tick();
        assert_eq!(outcome.snapshot.tick, 1);
        assert_eq!(outcome.snapshot.bodies.len(), 3);
        assert!(outcome.reset.is_none());
        assert!(outcome.merges.is_empty());
    }

    #[test]
    fn test_drop_visible_in_next_snapshot() {
        let mut game = GameLoop::default();
        game.request_drop(300.0, 0).unwrap();
        let outcome = game.tick();
        let fruit: Vec<_> = outcome.snapshot.fruit().collect();
        assert_eq!(fruit.len(), 1);
        assert_eq!(fruit[0].size_index, Some(0));
        assert!(fruit[0].y > 32.0, "gravity moved the fruit during the step");
    }

    #[test]
    fn test_falling_drop_does_not_lose() {
        let mut game = GameLoop::default();
        game.request_drop(300.0, 0).unwrap();
        for _ in 0..5 {
            assert!(game.tick().reset.is_none());
        }
    }

    #[test]
    fn test_settled_fruit_above_line_resets_world() {
        let mut game = zero_gravity_loop();
        game.request_drop(300.0, 0).unwrap();

        let outcome = game.tick();
        let reset = outcome.reset.expect("fruit resting at preview height loses");
        assert_eq!(reset.fruit_cleared, 1);
        assert_eq!(outcome.snapshot.bodies.len(), 3);
        assert!(outcome.snapshot.bodies.iter().all(|b| b.label == BodyLabel::Wall));
        assert_eq!(game.resets(), 1);

        // Next drop still works
        game.request_drop(300.0, 1).unwrap();
        assert_eq!(game.registry().fruit_count(), 1);
    }

    #[test]
    fn test_reset_walls_are_identical_every_time() {
        let mut game = zero_gravity_loop();
        let mut layouts = Vec::new();
        for _ in 0..3 {
            game.request_drop(300.0, 0).unwrap();
            let outcome = game.tick();
            assert!(outcome.reset.is_some());
            let layout: Vec<_> = outcome
                .snapshot
                .bodies
                .iter()
                .map(|b| (b.label, b.x, b.y, b.angle))
                .collect();
            assert_eq!(layout.len(), 3);
            layouts.push(layout);
        }
        assert_eq!(layouts[0], layouts[1]);
        assert_eq!(layouts[1], layouts[2]);
    }

    #[test]
    fn test_merge_updates_score() {
        let mut game = GameLoop::default();
        game.request_drop(100.0, 0).unwrap();
        game.request_drop(101.0, 0).unwrap();
        let outcome = game.tick();
        assert_eq!(outcome.merges.len(), 1);
        assert_eq!(outcome.snapshot.score, 3);
        assert_eq!(game.score(), 3);
        // The merge product sits at the preview height with no velocity but
        // has not been stepped, so it does not end the round.
        assert!(outcome.reset.is_none());
    }

    #[test]
    fn test_reset_clears_score() {
        let mut game = zero_gravity_loop();
        game.request_drop(100.0, 0).unwrap();
        game.request_drop(101.0, 0).unwrap();
        let first = game.tick();
        assert_eq!(first.merges.len(), 1);
        assert_eq!(game.score(), 3);

        // The merged fruit stays put without gravity and loses next tick
        let second = game.tick();
        let reset = second.reset.expect("merged fruit settles above the line");
        assert_eq!(reset.final_score, 3);
        assert_eq!(second.snapshot.score, 0);
        assert_eq!(game.score(), 0);
    }
}
