pub mod constants;
pub mod tiers;
pub mod physics;
pub mod registry;
pub mod snapshot;
pub mod spawn;
pub mod merge;
pub mod loss;
pub mod game_loop;
