pub mod protocol;
pub mod framing;
pub mod commands;
pub mod game_session;
pub mod tls;
pub mod transport;
