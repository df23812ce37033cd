//! # Survey Client Library
//!
//! Client side of the taboo round: it receives commands pushed by the game
//! server, shows survey instructions to the player and sends their responses
//! back to the room they were seated in.
//!
//! ## Module Organization
//!
//! ### Relay Module (`relay`)
//! The command relay proper. A `survey` command renders instructions and arms
//! a single submit action; submitting validates the form and emits one
//! `submit_survey` envelope. `confirm_ready` can be sent at any time. The room
//! and transport are injected through a `SessionContext`.
//!
//! ### Dispatch Module (`dispatch`)
//! Channel-keyed handler registry. Inbound frames are routed to the handler
//! registered for their channel on the task that owns the relay.
//!
//! ### Transport Module (`transport`)
//! The `Transport` seam and its queue-backed implementation. Emitting never
//! waits for the network.
//!
//! ### Input Module (`input`)
//! Survey form state (`AnswerSheet`), its validation errors and parsing of
//! terminal commands.
//!
//! ### Rendering Module (`rendering`)
//! The `InstructionView` seam and a terminal implementation.
//!
//! ### Network Module (`network`)
//! TCP connection handling, the join handshake and the interactive loop that
//! ties stdin and server frames to the relay.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::AnswerSheet;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect("127.0.0.1:8080", "alice").await?;
//!     client.run(AnswerSheet::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod dispatch;
pub mod input;
pub mod network;
pub mod relay;
pub mod rendering;
pub mod transport;
