//! Per-tick world snapshot broadcast to every session

use serde::{Deserialize, Serialize};

use crate::game::physics::BodyId;
use crate::game::tiers::TierIndex;

/// What kind of body a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyLabel {
    Fruit,
    Wall,
}

/// One live body at a tick boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRecord {
    pub id: BodyId,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    /// Tier index for fruit, `None` for walls
    pub size_index: Option<TierIndex>,
    pub label: BodyLabel,
}

impl BodyRecord {
    pub fn is_fruit(&self) -> bool {
        self.label == BodyLabel::Fruit
    }

    pub fn is_wall(&self) -> bool {
        self.label == BodyLabel::Wall
    }
}

/// Every live body plus round bookkeeping for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    /// Score of the current round
    pub score: u64,
    /// Bodies in ascending id order
    pub bodies: Vec<BodyRecord>,
}

impl WorldSnapshot {
    pub fn fruit(&self) -> impl Iterator<Item = &BodyRecord> {
        self.bodies.iter().filter(|b| b.is_fruit())
    }

    pub fn walls(&self) -> impl Iterator<Item = &BodyRecord> {
        self.bodies.iter().filter(|b| b.is_wall())
    }
}
