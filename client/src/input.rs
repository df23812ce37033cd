//! Survey form state and terminal command parsing

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no answers given")]
    NoAnswers,
    #[error("answer {0} is blank")]
    BlankAnswer(usize),
    #[error("at most {max} answers allowed, got {got}")]
    TooManyAnswers { max: usize, got: usize },
}

/// Form collaborator consulted by the relay on submit
pub trait SurveyForm {
    fn validate(&self) -> Result<(), ValidationError>;
    fn answers(&self) -> Value;
}

/// Answers typed in by the player, in entry order
#[derive(Debug, Clone, Default)]
pub struct AnswerSheet {
    answers: Vec<String>,
    max_answers: Option<usize>,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_answers(max_answers: usize) -> Self {
        Self {
            answers: Vec::new(),
            max_answers: Some(max_answers),
        }
    }

    pub fn push(&mut self, answer: impl Into<String>) {
        self.answers.push(answer.into());
    }

    pub fn clear(&mut self) {
        self.answers.clear();
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

impl SurveyForm for AnswerSheet {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.answers.is_empty() {
            return Err(ValidationError::NoAnswers);
        }
        if let Some(index) = self.answers.iter().position(|a| a.trim().is_empty()) {
            return Err(ValidationError::BlankAnswer(index + 1));
        }
        match self.max_answers {
            Some(max) if self.answers.len() > max => Err(ValidationError::TooManyAnswers {
                max,
                got: self.answers.len(),
            }),
            _ => Ok(()),
        }
    }

    fn answers(&self) -> Value {
        Value::from(
            self.answers
                .iter()
                .map(|a| a.trim().to_string())
                .collect::<Vec<_>>(),
        )
    }
}

/// One line of terminal input, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Ready(String),
    Answer(String),
    Clear,
    Submit,
    Quit,
    Help,
}

pub fn parse_action(line: &str) -> Option<UserAction> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "ready" if !rest.is_empty() => Some(UserAction::Ready(rest.to_ascii_lowercase())),
        "answer" => Some(UserAction::Answer(rest.to_string())),
        "clear" => Some(UserAction::Clear),
        "submit" => Some(UserAction::Submit),
        "quit" | "exit" => Some(UserAction::Quit),
        "help" | "?" => Some(UserAction::Help),
        _ => None,
    }
}

pub const HELP_TEXT: &str = "Commands: ready yes|no, answer <text>, clear, submit, quit";
