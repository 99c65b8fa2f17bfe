//! Loss detection
//!
//! A fruit that has settled above the loss line ends the round. "Settled"
//! means |vy| is under the epsilon after a physics step; fruit created during
//! the current tick (merge products) have not been stepped yet and are never
//! sampled.

use hashbrown::HashMap;

use crate::game::constants::loss;
use crate::game::physics::BodyId;
use crate::game::registry::FruitView;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossRules {
    /// Fruit with y below this are above the line
    pub line: f32,
    pub settle_epsilon: f32,
    /// Consecutive settled samples before the round is lost
    pub settle_ticks: u32,
}

impl Default for LossRules {
    fn default() -> Self {
        Self {
            line: loss::LINE,
            settle_epsilon: loss::SETTLE_EPSILON,
            settle_ticks: loss::SETTLE_TICKS,
        }
    }
}

impl LossRules {
    /// Whether a single fruit sample counts toward a loss
    pub fn is_loss_sample(&self, fruit: &FruitView) -> bool {
        fruit.stepped
            && fruit.position.y < self.line
            && fruit.velocity.y > -self.settle_epsilon
            && fruit.velocity.y < self.settle_epsilon
    }
}

#[derive(Debug, Default)]
pub struct LossDetector {
    rules: LossRules,
    /// Consecutive loss samples per fruit
    streaks: HashMap<BodyId, u32>,
}

impl LossDetector {
    pub fn new(rules: LossRules) -> Self {
        Self {
            rules,
            streaks: HashMap::new(),
        }
    }

    /// Sample every live fruit once. Returns the fruit that triggered the
    /// loss, if any.
    pub fn check(&mut self, fruits: &[FruitView]) -> Option<BodyId> {
        let mut streaks = HashMap::with_capacity(self.streaks.len());
        let mut trigger = None;

        for fruit in fruits {
            if !self.rules.is_loss_sample(fruit) {
                continue;
            }
            let streak = self.streaks.get(&fruit.id).copied().unwrap_or(0) + 1;
            if streak >= self.rules.settle_ticks && trigger.is_none() {
                trigger = Some(fruit.id);
            }
            streaks.insert(fruit.id, streak);
        }

        self.streaks = streaks;
        trigger
    }

    /// Forget all streaks (after a world reset)
    pub fn reset(&mut self) {
        self.streaks.clear();
    }
}
