//! WebTransport server implementation
//!
//! Each session gets one bidirectional stream. The read half feeds the
//! command buffer; the write half is owned by a writer task draining the
//! session's bounded outbound queue.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::game::game_loop::GameLoopConfig;
use crate::metrics::Metrics;
use crate::net::commands::{CommandBufferError, CommandSender, SessionCommand};
use crate::net::framing::{read_message, write_message, FramingError};
use crate::net::game_session::{ChannelSink, Frame};
use crate::net::protocol::{decode, encode, ClientMessage, ServerMessage, SessionId, WelcomeInfo};
use crate::net::tls::TlsConfig;

/// WebTransport server
pub struct WebTransportServer {
    config: ServerConfig,
    tls_config: TlsConfig,
    commands: CommandSender,
    metrics: Arc<Metrics>,
    /// Settings of the running game, advertised in each Welcome
    game: Arc<GameLoopConfig>,
}

impl WebTransportServer {
    pub fn new(
        config: ServerConfig,
        tls_config: TlsConfig,
        commands: CommandSender,
        metrics: Arc<Metrics>,
        game: Arc<GameLoopConfig>,
    ) -> Self {
        Self {
            config,
            tls_config,
            commands,
            metrics,
            game,
        }
    }

    pub fn cert_hash(&self) -> &str {
        self.tls_config.cert_hash()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    /// Accept sessions forever
    pub async fn run(self) -> anyhow::Result<()> {
        use wtransport::Endpoint;

        let bind_addr = self.bind_addr();
        let server_config = wtransport::ServerConfig::builder()
            .with_bind_address(bind_addr)
            .with_identity(self.tls_config.identity)
            .build();

        let server = Endpoint::server(server_config)?;

        tracing::info!("WebTransport server listening on {}", bind_addr);

        let limits = SessionLimits {
            max_sessions: self.config.max_sessions,
            queue_depth: self.config.session_queue_depth,
        };

        loop {
            let incoming = server.accept().await;
            let commands = self.commands.clone();
            let metrics = self.metrics.clone();
            let game = self.game.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(incoming, commands, metrics, game, limits).await {
                    tracing::warn!("Connection error: {}", e);
                }
            });
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SessionLimits {
    max_sessions: usize,
    queue_depth: usize,
}

/// Counts a live session in `connections_active` until dropped
struct ConnectionGuard {
    metrics: Arc<Metrics>,
}

impl ConnectionGuard {
    fn try_acquire(metrics: &Arc<Metrics>, max_sessions: usize) -> Option<Self> {
        let previous = metrics.connections_active.fetch_add(1, Ordering::Relaxed);
        if previous as usize >= max_sessions {
            metrics.connections_active.fetch_sub(1, Ordering::Relaxed);
            return None;
        }
        Some(Self {
            metrics: metrics.clone(),
        })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.metrics.connections_active.fetch_sub(1, Ordering::Relaxed);
    }
}

async fn handle_connection(
    incoming: wtransport::endpoint::IncomingSession,
    commands: CommandSender,
    metrics: Arc<Metrics>,
    game: Arc<GameLoopConfig>,
    limits: SessionLimits,
) -> anyhow::Result<()> {
    let session_request = incoming.await?;

    let Some(_guard) = ConnectionGuard::try_acquire(&metrics, limits.max_sessions) else {
        tracing::warn!(
            "Rejecting session from {}: at capacity ({} sessions)",
            session_request.authority(),
            limits.max_sessions
        );
        session_request.not_found().await;
        return Ok(());
    };

    tracing::debug!(
        "New session from {}, path {}",
        session_request.authority(),
        session_request.path()
    );

    let connection = session_request.accept().await?;
    let (mut send, mut recv) = connection.accept_bi().await?;

    let session_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<Frame>(limits.queue_depth);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = write_message(&mut send, &frame).await {
                tracing::debug!("Session {} write failed: {}", session_id, e);
                break;
            }
        }
    });

    queue_direct(&tx, &ServerMessage::Welcome(WelcomeInfo::new(session_id, &game)));
    if let Err(e) = commands.try_send(SessionCommand::Join {
        session_id,
        sink: Box::new(ChannelSink::new(tx.clone())),
    }) {
        tracing::warn!("Session {} could not join: {}", session_id, e);
        writer.abort();
        return Ok(());
    }
    tracing::info!("Session {} connected", session_id);

    loop {
        let data = match read_message(&mut recv).await {
            Ok(data) => data,
            Err(FramingError::ConnectionClosed) => break,
            Err(FramingError::MessageTooLarge(len, max)) => {
                tracing::warn!(
                    "Session {} sent oversized message ({} > {}), closing",
                    session_id,
                    len,
                    max
                );
                break;
            }
            Err(FramingError::Io(e)) => {
                tracing::debug!("Session {} read error: {}", session_id, e);
                break;
            }
        };
        metrics.messages_received.fetch_add(1, Ordering::Relaxed);

        let message: ClientMessage = match decode(&data) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Session {}: {}", session_id, e);
                continue;
            }
        };

        if !dispatch(session_id, message, &commands, &tx) {
            break;
        }
    }

    if let Err(e) = commands.try_send(SessionCommand::Leave { session_id }) {
        tracing::debug!("Session {} leave not queued: {}", session_id, e);
    }
    drop(tx);
    // The game loop drops its sink on Leave, which ends the writer.
    let _ = writer.await;

    tracing::info!("Session {} disconnected", session_id);
    Ok(())
}

/// Apply one client message. Returns false when the session should close.
fn dispatch(
    session_id: SessionId,
    message: ClientMessage,
    commands: &CommandSender,
    direct: &mpsc::Sender<Frame>,
) -> bool {
    match message {
        ClientMessage::Drop { x, size_index } => {
            match commands.try_send(SessionCommand::Drop {
                session_id,
                x,
                size_index,
            }) {
                Ok(()) => true,
                Err(CommandBufferError::Full) => {
                    tracing::warn!("Command buffer full, drop from {} discarded", session_id);
                    true
                }
                Err(CommandBufferError::Disconnected) => false,
            }
        }
        ClientMessage::Ping { timestamp } => {
            queue_direct(
                direct,
                &ServerMessage::Pong {
                    client_timestamp: timestamp,
                    server_timestamp: now_millis(),
                },
            );
            true
        }
        ClientMessage::Leave => false,
    }
}

/// Queue a message for this session only, bypassing the broadcast
fn queue_direct(direct: &mpsc::Sender<Frame>, message: &ServerMessage) {
    match encode(message) {
        Ok(data) => {
            if direct.try_send(data.into()).is_err() {
                tracing::debug!("Direct message dropped, session queue full or closed");
            }
        }
        Err(e) => tracing::warn!("Failed to encode direct message: {}", e),
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
