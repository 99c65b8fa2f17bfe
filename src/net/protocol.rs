use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::game_loop::{GameLoopConfig, ResetEvent};
use crate::game::merge::MergeEvent;
use crate::game::snapshot::WorldSnapshot;
use crate::game::tiers::{Tier, TierIndex};

/// Unique session identifier
pub type SessionId = Uuid;

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Drop a fruit. `x` is clamped and `size_index` validated server-side.
    Drop { x: f32, size_index: i32 },
    /// Ping for latency measurement
    Ping { timestamp: u64 },
    /// Request to leave the game
    Leave,
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Sent once when a session joins
    Welcome(WelcomeInfo),
    /// Full world state, once per tick
    Update(WorldSnapshot),
    /// Game event notification
    Event(GameEvent),
    /// Pong response with server timestamp
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

/// Static game description so clients need no hard-coded tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeInfo {
    pub session_id: SessionId,
    pub world_width: f32,
    pub world_height: f32,
    pub loss_line: f32,
    pub tiers: Vec<Tier>,
}

impl WelcomeInfo {
    /// Describe the world the game loop is actually running
    pub fn new(session_id: SessionId, config: &GameLoopConfig) -> Self {
        Self {
            session_id,
            world_width: config.world.width,
            world_height: config.world.height,
            loss_line: config.loss.line,
            tiers: config.world.tiers.iter().copied().collect(),
        }
    }
}

/// Gameplay events, sent in the tick they happen (before that tick's update)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Merged {
        tier: TierIndex,
        x: f32,
        y: f32,
        score_awarded: u32,
    },
    WorldReset {
        final_score: u64,
    },
}

impl From<&MergeEvent> for GameEvent {
    fn from(merge: &MergeEvent) -> Self {
        GameEvent::Merged {
            tier: merge.tier,
            x: merge.position.x,
            y: merge.position.y,
            score_awarded: merge.score_awarded,
        }
    }
}

impl From<&ResetEvent> for GameEvent {
    fn from(reset: &ResetEvent) -> Self {
        GameEvent::WorldReset {
            final_score: reset.final_score,
        }
    }
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers (compatible with TypeScript client)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
