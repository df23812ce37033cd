use crate::dispatch::Dispatcher;
use crate::input::{parse_action, AnswerSheet, SurveyForm, UserAction, HELP_TEXT};
use crate::relay::{CommandRelay, RelayError, SessionContext};
use crate::rendering::{InstructionView, TerminalView};
use crate::transport::{ChannelTransport, Transport, TransportError};
use log::{debug, error, info, warn};
use shared::{
    read_frame, write_frame, Frame, JoinRequest, Joined, ProtocolError, RoomId, TextMessage,
    COMMAND_CHANNEL, JOINED_CHANNEL, JOIN_CHANNEL, TEXT_CHANNEL,
};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server closed the connection")]
    ConnectionClosed,
}

/// Connected player session before and after room assignment
pub struct Client {
    frames: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::UnboundedSender<Frame>,
    writer: JoinHandle<()>,
    name: String,
}

impl Client {
    /// Connects to the server and sends the join request
    pub async fn connect(server_addr: &str, name: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server_addr).await?;
        let (reader, writer) = stream.into_split();

        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        spawn_network_receiver(reader, frames_tx);
        let writer = spawn_network_sender(writer, outbound_rx);

        let join = Frame::new(JOIN_CHANNEL, &JoinRequest {
            name: name.to_string(),
        })?;
        outbound.send(join).map_err(|_| TransportError::Closed)?;
        info!("Joining as '{}'", name);

        Ok(Self {
            frames,
            outbound,
            writer,
            name: name.to_string(),
        })
    }

    /// Waits for the server to place this player in a room
    ///
    /// Text frames that arrive in the meantime are shown on `view`.
    pub async fn wait_for_room<V: InstructionView>(
        &mut self,
        view: &mut V,
    ) -> Result<Joined, ClientError> {
        while let Some(frame) = self.frames.recv().await {
            match frame.channel.as_str() {
                JOINED_CHANNEL => return Ok(frame.decode()?),
                TEXT_CHANNEL => match frame.decode::<TextMessage>() {
                    Ok(text) => view.show_message(&text.message),
                    Err(e) => warn!("Malformed text frame: {}", e),
                },
                other => debug!("Ignoring '{}' frame before room assignment", other),
            }
        }
        Err(ClientError::ConnectionClosed)
    }

    /// Session context that queues commands for `room` on this connection
    pub fn session(&self, room: RoomId) -> SessionContext<ChannelTransport> {
        SessionContext::new(room, ChannelTransport::new(self.outbound.clone()))
    }

    /// Closes the outbound queue and waits until queued frames are written
    ///
    /// Sessions handed out by [`Client::session`] must be dropped first.
    pub async fn shutdown(self) {
        drop(self.outbound);
        if let Err(e) = self.writer.await {
            error!("Network sender failed: {}", e);
        }
    }

    /// Runs the relay against stdin and the server until either side ends
    pub async fn run(mut self, form: AnswerSheet) -> Result<(), ClientError> {
        let mut view = TerminalView::new(std::io::stdout());
        let joined = self.wait_for_room(&mut view).await?;
        info!(
            "{} joined {} as {:?} (user {})",
            self.name, joined.room, joined.role, joined.user
        );

        let session = self.session(joined.room);
        let mut relay = CommandRelay::new(session, view, form);
        let mut dispatcher = command_dispatcher();
        relay.view_mut().show_message(HELP_TEXT);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                frame = self.frames.recv() => match frame {
                    Some(frame) => {
                        dispatcher.dispatch(&mut relay, frame);
                    }
                    None => {
                        info!("Server closed the connection");
                        break;
                    }
                },

                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if !handle_line(&mut relay, &line) {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading stdin: {}", e);
                        break;
                    }
                },
            }
        }

        drop(relay);
        self.shutdown().await;
        Ok(())
    }
}

/// Handlers for the channels a player receives once seated in a room
pub fn command_dispatcher<T, V, F>() -> Dispatcher<CommandRelay<T, V, F>>
where
    T: Transport + 'static,
    V: InstructionView + 'static,
    F: SurveyForm + 'static,
{
    let mut dispatcher: Dispatcher<CommandRelay<T, V, F>> = Dispatcher::new();

    dispatcher.on(COMMAND_CHANNEL, |relay, payload| relay.on_command(&payload));
    dispatcher.on(TEXT_CHANNEL, |relay, payload| {
        match serde_json::from_value::<TextMessage>(payload) {
            Ok(text) => relay.view_mut().show_message(&text.message),
            Err(e) => warn!("Malformed text frame: {}", e),
        }
    });

    dispatcher
}

/// Applies one line of player input; returns false when the session should end
pub fn handle_line<T, V>(relay: &mut CommandRelay<T, V, AnswerSheet>, line: &str) -> bool
where
    T: Transport,
    V: InstructionView,
{
    let Some(action) = parse_action(line) else {
        if !line.trim().is_empty() {
            relay.view_mut().show_message(HELP_TEXT);
        }
        return true;
    };

    match action {
        UserAction::Ready(answer) => {
            if let Err(e) = relay.confirm_ready(answer) {
                error!("Failed to confirm ready: {}", e);
                return false;
            }
        }
        UserAction::Answer(answer) => {
            relay.form_mut().push(answer);
            let count = relay.form_mut().len();
            relay
                .view_mut()
                .show_message(&format!("Answer {} recorded.", count));
        }
        UserAction::Clear => {
            relay.form_mut().clear();
            relay.view_mut().show_message("Answers cleared.");
        }
        UserAction::Submit => match relay.on_submit() {
            Ok(()) => {
                relay.form_mut().clear();
                relay.view_mut().show_message("Answers submitted.");
            }
            Err(RelayError::Validation(e)) => {
                relay
                    .view_mut()
                    .show_message(&format!("Cannot submit yet: {}", e));
            }
            Err(RelayError::SubmitNotArmed) => {
                relay
                    .view_mut()
                    .show_message("There is no survey to answer right now.");
            }
            Err(RelayError::Transport(e)) => {
                error!("Failed to submit answers: {}", e);
                return false;
            }
        },
        UserAction::Help => relay.view_mut().show_message(HELP_TEXT),
        UserAction::Quit => return false,
    }

    true
}

/// Spawns task that forwards decoded frames from the socket
fn spawn_network_receiver(mut reader: OwnedReadHalf, frames_tx: mpsc::UnboundedSender<Frame>) {
    tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    if frames_tx.send(frame).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Error receiving frame: {}", e);
                    break;
                }
            }
        }
    });
}

/// Spawns task that drains the outbound queue onto the socket
fn spawn_network_sender(
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<Frame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame).await {
                error!("Failed to send '{}' frame: {}", frame.channel, e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    })
}
