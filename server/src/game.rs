//! Room bookkeeping and the ready/survey round flow
//!
//! All methods return the frames to deliver as `(client_id, frame)` pairs
//! instead of sending them, so the flow can be driven without sockets.

use log::{debug, info};
use rand::Rng;
use serde_json::Value;
use shared::{
    Command, Frame, InboundEnvelope, Joined, OutboundEnvelope, ProtocolError, Role, RoomId,
    TextMessage, COMMAND_CHANNEL, JOINED_CHANNEL, TEXT_CHANNEL,
};
use std::collections::HashMap;
use thiserror::Error;

pub const READY_PROMPT: &str =
    "Are you ready? Once you answer 'yes' you will see the survey.";
pub const ALREADY_READY: &str = "You have already clicked 'ready'.";
pub const NOT_READY: &str =
    "OK, read the instructions carefully and click on <yes> once you are ready.";
pub const WAITING_FOR_PARTNER: &str = "Now, waiting for your partner to click 'ready'.";
pub const ROUND_STARTS: &str = "Woo-Hoo! The game will begin now.";
pub const ANSWERS_RECEIVED: &str = "Thank you, your answers were recorded.";
pub const ALREADY_SUBMITTED: &str = "You have already submitted your answers.";
pub const ROUND_COMPLETE: &str = "All answers are in. Thank you for playing!";
pub const ROOM_CLOSED: &str = "Your partner has left, so this round cannot start.";

/// Frames to deliver, addressed by client id
pub type Outbox = Vec<(u32, Frame)>;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("client {0} is not seated in a room")]
    NotSeated(u32),
    #[error("message addressed to room {got}, client is in {expected}")]
    WrongRoom { expected: RoomId, got: RoomId },
    #[error("clients may not send '{0}' commands")]
    UnexpectedCommand(&'static str),
    #[error("the round in {0} has not started")]
    RoundNotStarted(RoomId),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Joined,
    Ready,
    Done,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub role: Role,
    pub status: PlayerStatus,
    pub answers: Option<Value>,
}

#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub players: Vec<Player>,
    pub round_started: bool,
    pub round_complete: bool,
    /// Set when a player leaves before the round started
    pub closed: bool,
}

impl Room {
    fn player_mut(&mut self, client_id: u32) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == client_id)
    }

    fn all(&self, status: PlayerStatus) -> bool {
        self.players.iter().all(|p| p.status == status)
    }

    fn broadcast(&self, frame: &Frame, outbox: &mut Outbox) {
        for player in &self.players {
            outbox.push((player.id, frame.clone()));
        }
    }

    /// Ends the round once every remaining player has submitted
    fn complete_if_done(&mut self, outbox: &mut Outbox) -> Result<(), ProtocolError> {
        if !self.round_started || self.round_complete || !self.all(PlayerStatus::Done) {
            return Ok(());
        }
        self.round_complete = true;

        for player in &self.players {
            if let Some(answers) = &player.answers {
                info!("{} survey result for {}: {}", self.id, player.name, answers);
            }
        }
        self.broadcast(&text_frame(Some(&self.id), ROUND_COMPLETE)?, outbox);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub players_per_room: usize,
    pub survey: String,
}

pub struct SessionManager {
    config: GameConfig,
    waiting: Vec<(u32, String)>,
    rooms: HashMap<RoomId, Room>,
    seats: HashMap<u32, RoomId>,
    next_room: u32,
}

impl SessionManager {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            waiting: Vec::new(),
            rooms: HashMap::new(),
            seats: HashMap::new(),
            next_room: 1,
        }
    }

    /// Queues a player and opens a room once enough are waiting
    pub fn join<R: Rng>(
        &mut self,
        client_id: u32,
        name: &str,
        rng: &mut R,
    ) -> Result<Outbox, GameError> {
        self.waiting.push((client_id, name.to_string()));
        debug!("{} waiting for a room ({} queued)", name, self.waiting.len());

        if self.waiting.len() < self.config.players_per_room.max(1) {
            let message = "Waiting for another player to join...";
            return Ok(vec![(client_id, text_frame(None, message)?)]);
        }

        let seated: Vec<(u32, String)> = self
            .waiting
            .drain(..self.config.players_per_room.max(1))
            .collect();
        self.open_room(seated, rng)
    }

    fn open_room<R: Rng>(
        &mut self,
        seated: Vec<(u32, String)>,
        rng: &mut R,
    ) -> Result<Outbox, GameError> {
        let room_id = RoomId::new(format!("room{}", self.next_room));
        self.next_room += 1;

        let explainer = rng.gen_range(0..seated.len());
        let players: Vec<Player> = seated
            .into_iter()
            .enumerate()
            .map(|(index, (id, name))| Player {
                id,
                name,
                role: if index == explainer {
                    Role::Explainer
                } else {
                    Role::Guesser
                },
                status: PlayerStatus::Joined,
                answers: None,
            })
            .collect();

        let mut outbox = Outbox::new();
        for player in &players {
            info!("{} is the {:?} in {}", player.name, player.role, room_id);
            let joined = Joined {
                room: room_id.clone(),
                user: player.id,
                role: player.role,
            };
            outbox.push((player.id, Frame::new(JOINED_CHANNEL, &joined)?));

            let greeting = format!(
                "Welcome to the taboo round, {}! You are the {}.",
                player.name,
                match player.role {
                    Role::Explainer => "explainer",
                    Role::Guesser => "guesser",
                }
            );
            outbox.push((player.id, text_frame(Some(&room_id), &greeting)?));
            outbox.push((player.id, text_frame(Some(&room_id), READY_PROMPT)?));
            self.seats.insert(player.id, room_id.clone());
        }

        self.rooms.insert(
            room_id.clone(),
            Room {
                id: room_id,
                players,
                round_started: false,
                round_complete: false,
                closed: false,
            },
        );

        Ok(outbox)
    }

    /// Applies one `{command, room}` envelope sent by `client_id`
    pub fn handle_command(
        &mut self,
        client_id: u32,
        envelope: OutboundEnvelope,
    ) -> Result<Outbox, GameError> {
        let room_id = self
            .seats
            .get(&client_id)
            .cloned()
            .ok_or(GameError::NotSeated(client_id))?;

        if envelope.room != room_id {
            return Err(GameError::WrongRoom {
                expected: room_id,
                got: envelope.room,
            });
        }

        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(GameError::NotSeated(client_id))?;

        match envelope.command {
            Command::ConfirmReady { answer } => match answer.as_str() {
                Some("yes") => confirm_ready(room, client_id, &self.config.survey),
                Some("no") => Ok(vec![(client_id, text_frame(Some(&room.id), NOT_READY)?)]),
                _ => {
                    debug!("Ignoring confirm_ready answer {} in {}", answer, room.id);
                    Ok(Outbox::new())
                }
            },
            Command::SubmitSurvey { answers } => submit_survey(room, client_id, answers),
            Command::Survey { .. } => Err(GameError::UnexpectedCommand("survey")),
        }
    }

    /// Removes a player, telling whoever is left in their room
    pub fn leave(&mut self, client_id: u32) -> Result<Outbox, GameError> {
        self.waiting.retain(|(id, _)| *id != client_id);

        let Some(room_id) = self.seats.remove(&client_id) else {
            return Ok(Outbox::new());
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return Ok(Outbox::new());
        };

        let mut outbox = Outbox::new();
        if let Some(index) = room.players.iter().position(|p| p.id == client_id) {
            let player = room.players.remove(index);
            let message = format!("{} has left the game.", player.name);
            room.broadcast(&text_frame(Some(&room_id), &message)?, &mut outbox);
        }

        if room.players.is_empty() {
            info!("Closing empty {}", room_id);
            self.rooms.remove(&room_id);
        } else if room.round_started {
            room.complete_if_done(&mut outbox)?;
        } else if !room.closed {
            info!("{} lost a player before the round started", room_id);
            room.closed = true;
            room.broadcast(&text_frame(Some(&room_id), ROOM_CLOSED)?, &mut outbox);
        }

        Ok(outbox)
    }

    pub fn room_of(&self, client_id: u32) -> Option<&RoomId> {
        self.seats.get(&client_id)
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

fn confirm_ready(room: &mut Room, client_id: u32, survey: &str) -> Result<Outbox, GameError> {
    let room_id = room.id.clone();
    if room.closed {
        return Ok(vec![(client_id, text_frame(Some(&room_id), ROOM_CLOSED)?)]);
    }
    let Some(player) = room.player_mut(client_id) else {
        return Err(GameError::NotSeated(client_id));
    };

    if player.status != PlayerStatus::Joined {
        return Ok(vec![(client_id, text_frame(Some(&room_id), ALREADY_READY)?)]);
    }
    player.status = PlayerStatus::Ready;

    if !room.all(PlayerStatus::Ready) {
        return Ok(vec![(
            client_id,
            text_frame(Some(&room_id), WAITING_FOR_PARTNER)?,
        )]);
    }

    info!("All players ready in {}, starting round", room_id);
    room.round_started = true;

    let mut outbox = Outbox::new();
    room.broadcast(&text_frame(Some(&room_id), ROUND_STARTS)?, &mut outbox);
    let command = InboundEnvelope::new(&Command::Survey {
        survey: survey.to_string(),
    })?;
    room.broadcast(&Frame::new(COMMAND_CHANNEL, &command)?, &mut outbox);
    Ok(outbox)
}

fn submit_survey(room: &mut Room, client_id: u32, answers: Value) -> Result<Outbox, GameError> {
    if !room.round_started {
        return Err(GameError::RoundNotStarted(room.id.clone()));
    }

    let room_id = room.id.clone();
    let Some(player) = room.player_mut(client_id) else {
        return Err(GameError::NotSeated(client_id));
    };

    match player.status {
        PlayerStatus::Done => {
            return Ok(vec![(
                client_id,
                text_frame(Some(&room_id), ALREADY_SUBMITTED)?,
            )]);
        }
        PlayerStatus::Joined => return Err(GameError::RoundNotStarted(room_id)),
        PlayerStatus::Ready => {}
    }

    info!("{} submitted {} in {}", player.name, answers, room_id);
    player.answers = Some(answers);
    player.status = PlayerStatus::Done;

    let mut outbox = vec![(client_id, text_frame(Some(&room_id), ANSWERS_RECEIVED)?)];
    room.complete_if_done(&mut outbox)?;
    Ok(outbox)
}

fn text_frame(room: Option<&RoomId>, message: &str) -> Result<Frame, ProtocolError> {
    Frame::new(
        TEXT_CHANNEL,
        &TextMessage {
            message: message.to_string(),
            room: room.cloned(),
        },
    )
}
