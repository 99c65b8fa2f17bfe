//! Fruit Merge Server Library
//!
//! A shared-world physics puzzle server: clients drop fruit into one well,
//! equal fruit merge into the next tier, and every session receives the full
//! world state each tick over WebTransport.

pub mod config;
pub mod util;
pub mod game;
pub mod net;
pub mod metrics;
