//! Game session - owns the game loop, applies queued commands and fans state
//! out to every connected session

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::constants::physics;
use crate::game::game_loop::{GameLoop, GameLoopConfig, TickOutcome};
use crate::metrics::Metrics;
use crate::net::commands::{CommandBuffer, CommandSender, SessionCommand};
use crate::net::protocol::{encode, GameEvent, ServerMessage, SessionId};

/// An encoded message ready for framing. Shared by every recipient.
pub type Frame = Arc<[u8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Outbound queue is full; this frame is lost for this session only
    #[error("Session queue full")]
    Lagging,
    /// Session is gone
    #[error("Session closed")]
    Closed,
}

/// Outbound side of one session. Delivery never blocks the game loop.
pub trait SessionSink: Send {
    fn send(&mut self, frame: Frame) -> Result<(), SinkError>;
}

/// Sink backed by a bounded tokio channel drained by the session's writer task
pub struct ChannelSink {
    sender: mpsc::Sender<Frame>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<Frame>) -> Self {
        Self { sender }
    }
}

impl SessionSink for ChannelSink {
    fn send(&mut self, frame: Frame) -> Result<(), SinkError> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Lagging,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

pub struct GameSession {
    game_loop: GameLoop,
    sinks: HashMap<SessionId, Box<dyn SessionSink>>,
    commands: CommandBuffer,
    metrics: Arc<Metrics>,
}

impl GameSession {
    pub fn new(config: GameLoopConfig, metrics: Arc<Metrics>) -> Self {
        Self::with_command_buffer(config, CommandBuffer::default(), metrics)
    }

    pub fn with_command_buffer(
        config: GameLoopConfig,
        commands: CommandBuffer,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            game_loop: GameLoop::new(config),
            sinks: HashMap::new(),
            commands,
            metrics,
        }
    }

    /// Handle for connection tasks to submit commands
    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    pub fn game_loop(&self) -> &GameLoop {
        &self.game_loop
    }

    pub fn session_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn has_session(&self, session_id: &SessionId) -> bool {
        self.sinks.contains_key(session_id)
    }

    /// Apply every queued command. Drops land in the world before the next step.
    pub fn apply_commands(&mut self) {
        for command in self.commands.drain() {
            match command {
                SessionCommand::Join { session_id, sink } => {
                    debug!("Session {} joined the game", session_id);
                    self.sinks.insert(session_id, sink);
                }
                SessionCommand::Drop {
                    session_id,
                    x,
                    size_index,
                } => match self.game_loop.request_drop(x, size_index) {
                    Ok(id) => {
                        self.metrics.drops_accepted.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            "Session {} dropped fruit {} (tier {}) at x={}",
                            session_id, id, size_index, x
                        );
                    }
                    Err(e) => {
                        self.metrics.drops_rejected.fetch_add(1, Ordering::Relaxed);
                        debug!("Rejected drop from {}: {}", session_id, e);
                    }
                },
                SessionCommand::Leave { session_id } => {
                    if self.sinks.remove(&session_id).is_some() {
                        debug!("Session {} left the game", session_id);
                    }
                }
            }
        }
    }

    /// One full cycle: commands, tick, publish
    pub fn run_tick(&mut self) -> TickOutcome {
        self.apply_commands();
        let outcome = self.game_loop.tick();
        self.record_outcome(&outcome);

        for merge in &outcome.merges {
            self.broadcast(&ServerMessage::Event(GameEvent::from(merge)));
        }
        if let Some(reset) = &outcome.reset {
            self.broadcast(&ServerMessage::Event(GameEvent::from(reset)));
        }
        self.broadcast(&ServerMessage::Update(outcome.snapshot.clone()));

        outcome
    }

    fn record_outcome(&self, outcome: &TickOutcome) {
        let registry = self.game_loop.registry();
        self.metrics
            .fruit_count
            .store(registry.fruit_count() as u64, Ordering::Relaxed);
        self.metrics
            .wall_count
            .store(registry.wall_count() as u64, Ordering::Relaxed);
        self.metrics
            .score
            .store(self.game_loop.score(), Ordering::Relaxed);
        self.metrics
            .merges_total
            .fetch_add(outcome.merges.len() as u64, Ordering::Relaxed);
        if outcome.reset.is_some() {
            self.metrics.resets_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Encode once and hand the frame to every sink. Returns how many sinks
    /// accepted it. Lagging sinks miss this frame; closed sinks are removed.
    pub fn broadcast(&mut self, message: &ServerMessage) -> usize {
        let frame: Frame = match encode(message) {
            Ok(data) => data.into(),
            Err(e) => {
                warn!("Failed to encode message for broadcast: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (session_id, sink) in self.sinks.iter_mut() {
            match sink.send(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    self.metrics.record_frame_sent(frame.len());
                }
                Err(SinkError::Lagging) => {
                    self.metrics.record_frame_dropped();
                    debug!("Session {} lagging, frame dropped", session_id);
                }
                Err(SinkError::Closed) => closed.push(*session_id),
            }
        }

        for session_id in closed {
            self.sinks.remove(&session_id);
            debug!("Session {} sink closed, removed", session_id);
        }

        delivered
    }
}

/// Start the fixed-rate game loop task. The task owns the session for the
/// life of the process.
pub fn start_game_loop(mut session: GameSession) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tick_duration = Duration::from_micros(physics::TICK_DURATION_MICROS);
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Game loop started at {} Hz", physics::TICK_RATE);
        let start = Instant::now();
        let log_every = u64::from(physics::TICK_RATE) * 30;
        let mut tick_count: u64 = 0;

        loop {
            ticker.tick().await;
            tick_count += 1;

            let tick_start = Instant::now();
            session.run_tick();
            session.metrics.record_tick_time(tick_start.elapsed());

            if tick_count % log_every == 0 {
                let game = session.game_loop();
                info!(
                    "Game: {}s, tick {}, {} sessions, {} fruit, score {}, {} resets",
                    start.elapsed().as_secs(),
                    game.current_tick(),
                    session.session_count(),
                    game.registry().fruit_count(),
                    game.score(),
                    game.resets()
                );
            }
        }
    })
}
