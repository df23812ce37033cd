//! Command relay between server commands and player responses
//!
//! The relay turns a `survey` command into rendered instructions plus an armed
//! submit action, and turns player actions into `confirm_ready` and
//! `submit_survey` envelopes for the current room. Anything else arriving on
//! the command channel is logged and dropped.

use crate::input::{SurveyForm, ValidationError};
use crate::rendering::InstructionView;
use crate::transport::{Transport, TransportError};
use log::{debug, info, warn};
use serde_json::Value;
use shared::{
    Command, InboundEnvelope, OutboundEnvelope, ProtocolError, RoomId, MESSAGE_COMMAND_CHANNEL,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("survey form is invalid: {0}")]
    Validation(#[from] ValidationError),
    #[error("no survey is waiting for answers")]
    SubmitNotArmed,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Room and connection a relay speaks for
pub struct SessionContext<T: Transport> {
    room: RoomId,
    transport: T,
}

impl<T: Transport> SessionContext<T> {
    pub fn new(room: RoomId, transport: T) -> Self {
        Self { room, transport }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Wraps `command` in a `{command, room}` envelope and emits it
    pub fn emit_command(&mut self, command: Command) -> Result<(), TransportError> {
        let envelope = OutboundEnvelope::new(command, self.room.clone());
        let payload = serde_json::to_value(&envelope).map_err(ProtocolError::from)?;
        self.transport.emit(MESSAGE_COMMAND_CHANNEL, payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    AwaitingSurvey,
    /// Instructions are shown and the submit action is armed
    SurveyShown,
    Submitted,
}

pub struct CommandRelay<T: Transport, V: InstructionView, F: SurveyForm> {
    session: SessionContext<T>,
    view: V,
    form: F,
    state: RelayState,
}

impl<T, V, F> CommandRelay<T, V, F>
where
    T: Transport,
    V: InstructionView,
    F: SurveyForm,
{
    pub fn new(session: SessionContext<T>, view: V, form: F) -> Self {
        Self {
            session,
            view,
            form,
            state: RelayState::AwaitingSurvey,
        }
    }

    /// Handles one `{command}` payload from the command channel
    ///
    /// A new survey always replaces the previous one, so at most one submit
    /// action is ever armed.
    pub fn on_command(&mut self, payload: &Value) {
        let envelope: InboundEnvelope = match serde_json::from_value(payload.clone()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping command payload without a command: {}", e);
                return;
            }
        };

        match envelope.parse_command() {
            Ok(Command::Survey { survey }) => {
                if self.state == RelayState::SurveyShown {
                    debug!("Replacing armed survey in room {}", self.session.room());
                }
                self.view.show_instructions(&survey);
                self.state = RelayState::SurveyShown;
                info!("Survey received in room {}", self.session.room());
            }
            Ok(other) => {
                warn!("Ignoring '{}' command from server", other.event());
            }
            Err(ProtocolError::UnrecognizedCommand(tag)) => {
                warn!("Unrecognized command '{}'", tag);
            }
            Err(e) => {
                warn!("Dropping malformed command: {}", e);
            }
        }
    }

    /// Fires the armed submit action
    ///
    /// An invalid form emits nothing and keeps the action armed for a retry.
    pub fn on_submit(&mut self) -> Result<(), RelayError> {
        if self.state != RelayState::SurveyShown {
            return Err(RelayError::SubmitNotArmed);
        }

        self.form.validate()?;
        let answers = self.form.answers();
        self.session.emit_command(Command::SubmitSurvey { answers })?;

        self.state = RelayState::Submitted;
        info!("Survey answers submitted to room {}", self.session.room());
        Ok(())
    }

    pub fn confirm_ready(&mut self, answer: impl Into<Value>) -> Result<(), TransportError> {
        let answer = answer.into();
        debug!("Confirming ready with {}", answer);
        self.session.emit_command(Command::ConfirmReady { answer })
    }

    pub fn is_armed(&self) -> bool {
        self.state == RelayState::SurveyShown
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn session(&self) -> &SessionContext<T> {
        &self.session
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn form_mut(&mut self) -> &mut F {
        &mut self.form
    }
}
