//! Server network layer handling TCP connections and the session loop

use crate::client_manager::ClientManager;
use crate::game::{GameConfig, Outbox, SessionManager};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    read_frame, write_frame, Frame, JoinRequest, OutboundEnvelope, ProtocolError, TextMessage,
    JOIN_CHANNEL, MESSAGE_COMMAND_CHANNEL, TEXT_CHANNEL,
};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::interval;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    FrameReceived { client_id: u32, frame: Frame },
    ClientDisconnected { client_id: u32 },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_clients: usize,
    pub players_per_room: usize,
    pub survey: String,
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: 32,
            players_per_room: 2,
            survey: "Pick the taboo word".to_string(),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Main server coordinating connections and room sessions
pub struct Server {
    listener: TcpListener,
    clients: ClientManager,
    sessions: SessionManager,
    idle_timeout: Duration,
    rng: StdRng,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(addr: &str, config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            clients: ClientManager::new(config.max_clients),
            sessions: SessionManager::new(GameConfig {
                players_per_room: config.players_per_room,
                survey: config.survey,
            }),
            idle_timeout: config.idle_timeout,
            rng: StdRng::from_entropy(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Main server loop
    pub async fn run(mut self) -> Result<(), ServerError> {
        let mut timeout_interval = interval(Duration::from_secs(1));

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept_connection(stream, addr).await,
                    Err(e) => error!("Failed to accept connection: {}", e),
                },

                message = self.server_rx.recv() => match message {
                    Some(ServerMessage::FrameReceived { client_id, frame }) => {
                        self.handle_frame(client_id, frame);
                    }
                    Some(ServerMessage::ClientDisconnected { client_id }) => {
                        self.disconnect(client_id);
                    }
                    None => break,
                },

                _ = timeout_interval.tick() => {
                    for client_id in self.clients.check_timeouts(self.idle_timeout) {
                        self.release_seat(client_id);
                    }
                },
            }
        }

        Ok(())
    }

    async fn accept_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (reader, mut writer) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let Some(client_id) = self.clients.add_client(addr, outbound_tx) else {
            warn!("Refusing {}: server full", addr);
            let refusal = Frame::new(
                TEXT_CHANNEL,
                &TextMessage {
                    message: "Server full".to_string(),
                    room: None,
                },
            );
            if let Ok(frame) = refusal {
                let _ = write_frame(&mut writer, &frame).await;
            }
            let _ = writer.shutdown().await;
            return;
        };

        spawn_connection_receiver(client_id, reader, self.server_tx.clone());
        spawn_connection_sender(client_id, writer, outbound_rx);
    }

    /// Routes one inbound frame by channel
    fn handle_frame(&mut self, client_id: u32, frame: Frame) {
        self.clients.touch(client_id);

        match frame.channel.as_str() {
            JOIN_CHANNEL => {
                let request: JoinRequest = match frame.decode() {
                    Ok(request) => request,
                    Err(e) => {
                        warn!("Malformed join from client {}: {}", client_id, e);
                        return;
                    }
                };
                if !self.clients.set_name(client_id, &request.name) {
                    warn!("Client {} sent a second join", client_id);
                    return;
                }
                info!("Client {} joined as '{}'", client_id, request.name);

                match self.sessions.join(client_id, &request.name, &mut self.rng) {
                    Ok(outbox) => self.deliver(outbox),
                    Err(e) => error!("Failed to seat client {}: {}", client_id, e),
                }
            }

            MESSAGE_COMMAND_CHANNEL => {
                let envelope = match OutboundEnvelope::from_value(frame.payload) {
                    Ok(envelope) => envelope,
                    Err(ProtocolError::UnrecognizedCommand(tag)) => {
                        warn!("Unrecognized command '{}' from client {}", tag, client_id);
                        return;
                    }
                    Err(e) => {
                        warn!("Malformed command from client {}: {}", client_id, e);
                        return;
                    }
                };
                debug!(
                    "{} (client {}) sent '{}' for {}",
                    self.clients.name(client_id).unwrap_or("unnamed"),
                    client_id,
                    envelope.command.event(),
                    envelope.room
                );

                match self.sessions.handle_command(client_id, envelope) {
                    Ok(outbox) => self.deliver(outbox),
                    Err(e) => warn!("Rejected command from client {}: {}", client_id, e),
                }
            }

            other => {
                warn!("Unexpected '{}' frame from client {}", other, client_id);
            }
        }
    }

    fn disconnect(&mut self, client_id: u32) {
        if self.clients.remove_client(client_id) {
            self.release_seat(client_id);
        }
    }

    fn release_seat(&mut self, client_id: u32) {
        match self.sessions.leave(client_id) {
            Ok(outbox) => self.deliver(outbox),
            Err(e) => error!("Failed to release client {}: {}", client_id, e),
        }
    }

    fn deliver(&self, outbox: Outbox) {
        for (client_id, frame) in outbox {
            if !self.clients.send(client_id, frame) {
                debug!("Dropped frame for departed client {}", client_id);
            }
        }
    }
}

/// Spawns task that forwards frames from one connection to the main loop
fn spawn_connection_receiver(
    client_id: u32,
    mut reader: OwnedReadHalf,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    let message = ServerMessage::FrameReceived { client_id, frame };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send frame to main loop: {}", e);
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Closing client {}: {}", client_id, e);
                    break;
                }
            }
        }
        let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });
    });
}

/// Spawns task that drains one connection's outbound queue
fn spawn_connection_sender(
    client_id: u32,
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<Frame>,
) {
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame).await {
                error!("Failed to send to client {}: {}", client_id, e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });
}
