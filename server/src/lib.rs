//! # Survey Server Library
//!
//! Coordinating server for the taboo survey round. It pairs incoming players
//! into rooms, walks each room through the ready check, pushes the `survey`
//! command once everyone is ready and records the answers players submit.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! One task owns all room and connection state. Per-connection reader tasks
//! forward decoded frames to it over an mpsc channel, and per-connection
//! writer tasks drain an outbound queue each. No state is shared behind
//! locks.
//!
//! ### Named Channels
//! Frames carry a channel name and a JSON payload. Clients send `join` and
//! `message_command`; the server answers on `joined`, `text` and `command`.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, capacity limits, display names, outbound queues and
//! idle-timeout detection.
//!
//! ### Game Module (`game`)
//! Rooms and the round flow: role assignment, `confirm_ready` handling,
//! survey dispatch and answer collection. Pure logic that returns the frames
//! to deliver.
//!
//! ### Network Module (`network`)
//! TCP accept loop, connection tasks and routing of frames to the game module.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:8080", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
