//! Merge resolution
//!
//! Runs once per tick over the collision pairs that started during the step.
//! Two fruit of the same tier merge into one fruit of the next tier at their
//! midpoint. A fruit can be consumed by at most one merge per tick: the first
//! qualifying pair in batch order wins and later pairs naming either body are
//! skipped.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::{debug, error};

use crate::game::physics::{BodyId, CollisionPair};
use crate::game::registry::EntityRegistry;
use crate::game::tiers::TierIndex;
use crate::util::vec2::Vec2;

/// One completed merge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeEvent {
    pub consumed: [BodyId; 2],
    pub created: BodyId,
    /// Tier of the created fruit
    pub tier: TierIndex,
    pub position: Vec2,
    pub score_awarded: u32,
}

/// Merges produced by one resolution pass
pub type MergeEvents = SmallVec<[MergeEvent; 4]>;

#[derive(Debug, Default)]
pub struct MergeResolver {
    /// Bodies already consumed during the current pass
    pending: FxHashSet<BodyId>,
}

impl MergeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one tick's worth of collision-start pairs
    pub fn resolve(&mut self, registry: &mut EntityRegistry, pairs: &[CollisionPair]) -> MergeEvents {
        self.pending.clear();
        let mut merges = MergeEvents::new();

        for pair in pairs {
            if pair.body_a == pair.body_b {
                continue;
            }
            if registry.is_wall(pair.body_a) || registry.is_wall(pair.body_b) {
                continue;
            }
            if self.pending.contains(&pair.body_a) || self.pending.contains(&pair.body_b) {
                continue;
            }
            let (Some(a), Some(b)) = (registry.fruit(pair.body_a), registry.fruit(pair.body_b)) else {
                continue;
            };
            if a.tier != b.tier || registry.tiers().is_max(a.tier) {
                continue;
            }

            let tier = a.tier + 1;
            let Some(score_awarded) = registry.tiers().get(tier).map(|t| t.score_value) else {
                error!("Merge of tier {} has no successor in the tier table", a.tier);
                continue;
            };
            let position = a.position.midpoint(b.position);

            let created = match registry.add_fruit(position.x, position.y, tier) {
                Ok(id) => id,
                Err(e) => {
                    error!("Failed to create merged fruit: {}", e);
                    continue;
                }
            };
            self.pending.insert(a.id);
            self.pending.insert(b.id);
            registry.remove_bodies(&[a.id, b.id]);

            debug!(
                "Merged {} + {} -> {} (tier {}) at ({:.1}, {:.1})",
                a.id, b.id, created, tier, position.x, position.y
            );
            merges.push(MergeEvent {
                consumed: [a.id, b.id],
                created,
                tier,
                position,
                score_awarded,
            });
        }

        merges
    }
}
