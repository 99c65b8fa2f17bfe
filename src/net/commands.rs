//! Lock-free command buffer between connection tasks and the game loop
//!
//! Connection handlers push commands with `try_send`; the game loop drains
//! everything pending right before each physics step, so a drop received
//! during tick N is visible to the step of tick N+1.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::game::constants::net::COMMAND_BUFFER_CAPACITY;
use crate::net::game_session::SessionSink;
use crate::net::protocol::SessionId;

/// Command from a connection task to the game loop
pub enum SessionCommand {
    /// Start receiving updates
    Join {
        session_id: SessionId,
        sink: Box<dyn SessionSink>,
    },
    /// Client drop request
    Drop {
        session_id: SessionId,
        x: f32,
        size_index: i32,
    },
    /// Stop receiving updates
    Leave { session_id: SessionId },
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionCommand::Join { session_id, .. } => {
                f.debug_struct("Join").field("session_id", session_id).finish()
            }
            SessionCommand::Drop {
                session_id,
                x,
                size_index,
            } => f
                .debug_struct("Drop")
                .field("session_id", session_id)
                .field("x", x)
                .field("size_index", size_index)
                .finish(),
            SessionCommand::Leave { session_id } => {
                f.debug_struct("Leave").field("session_id", session_id).finish()
            }
        }
    }
}

/// Bounded MPSC buffer. The game loop keeps this, connections get
/// [`CommandSender`] clones.
pub struct CommandBuffer {
    sender: Sender<SessionCommand>,
    receiver: Receiver<SessionCommand>,
}

impl CommandBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Create a new sender handle for a connection
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Take every pending command in arrival order
    pub fn drain(&self) -> Vec<SessionCommand> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new(COMMAND_BUFFER_CAPACITY)
    }
}

/// Clonable sender handle for connection handlers
#[derive(Clone)]
pub struct CommandSender {
    sender: Sender<SessionCommand>,
}

impl CommandSender {
    /// Submit a command without blocking
    #[inline]
    pub fn try_send(&self, command: SessionCommand) -> Result<(), CommandBufferError> {
        self.sender.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => CommandBufferError::Full,
            TrySendError::Disconnected(_) => CommandBufferError::Disconnected,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandBufferError {
    #[error("Command buffer full")]
    Full,
    #[error("Game loop stopped")]
    Disconnected,
}
