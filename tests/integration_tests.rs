//! Integration tests for the survey client and server
//!
//! These tests run a real server on a loopback port and talk to it with the
//! shared framing and the client relay.

use client::input::AnswerSheet;
use client::relay::{CommandRelay, SessionContext};
use client::rendering::InstructionView;
use client::transport::ChannelTransport;
use serde_json::json;
use server::game::{NOT_READY, ROOM_CLOSED, ROUND_COMPLETE, WAITING_FOR_PARTNER};
use server::network::{Server, ServerConfig};
use shared::{
    read_frame, write_frame, Frame, JoinRequest, Joined, TextMessage, COMMAND_CHANNEL,
    JOINED_CHANNEL, JOIN_CHANNEL, MESSAGE_COMMAND_CHANNEL, TEXT_CHANNEL,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(config: ServerConfig) -> SocketAddr {
    let server = Server::bind("127.0.0.1:0", config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn join(addr: SocketAddr, name: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let frame = Frame::new(JOIN_CHANNEL, &JoinRequest {
        name: name.to_string(),
    })
    .unwrap();
    write_frame(&mut stream, &frame).await.unwrap();
    stream
}

/// Reads frames until one arrives on `channel`
async fn next_on<R: AsyncRead + Unpin>(stream: &mut R, channel: &str) -> Frame {
    loop {
        let frame = timeout(WAIT, read_frame(stream))
            .await
            .expect("timed out waiting for frame")
            .unwrap()
            .expect("connection closed");
        if frame.channel == channel {
            return frame;
        }
    }
}

/// Reads text frames until one carries `message`
async fn expect_text<R: AsyncRead + Unpin>(stream: &mut R, message: &str) {
    loop {
        let text: TextMessage = next_on(stream, TEXT_CHANNEL).await.decode().unwrap();
        if text.message == message {
            return;
        }
    }
}

async fn send_command<W: AsyncWrite + Unpin>(stream: &mut W, payload: serde_json::Value) {
    let frame = Frame {
        channel: MESSAGE_COMMAND_CHANNEL.to_string(),
        payload,
    };
    write_frame(stream, &frame).await.unwrap();
}

async fn seated_pair(addr: SocketAddr) -> (TcpStream, TcpStream, Joined) {
    let mut alice = join(addr, "alice").await;
    let mut bob = join(addr, "bob").await;

    let alice_joined: Joined = next_on(&mut alice, JOINED_CHANNEL).await.decode().unwrap();
    let bob_joined: Joined = next_on(&mut bob, JOINED_CHANNEL).await.decode().unwrap();
    assert_eq!(alice_joined.room, bob_joined.room);
    assert_ne!(alice_joined.role, bob_joined.role);

    (alice, bob, alice_joined)
}

#[derive(Default)]
struct RecordingView {
    shown: Vec<String>,
}

impl InstructionView for RecordingView {
    fn show_instructions(&mut self, instructions: &str) {
        self.shown.push(instructions.to_string());
    }
}

/// Full round: ready check, survey push, relay submission, round completion
#[tokio::test]
async fn survey_round_over_tcp() {
    let addr = start_server(ServerConfig {
        survey: "Pick the taboo word".to_string(),
        ..ServerConfig::default()
    })
    .await;
    let (mut alice, mut bob, joined) = seated_pair(addr).await;

    let (tx, mut outbound) = mpsc::unbounded_channel();
    let session = SessionContext::new(joined.room.clone(), ChannelTransport::new(tx));
    let mut relay = CommandRelay::new(session, RecordingView::default(), AnswerSheet::new());

    relay.confirm_ready("yes").unwrap();
    write_frame(&mut alice, &outbound.try_recv().unwrap())
        .await
        .unwrap();
    expect_text(&mut alice, WAITING_FOR_PARTNER).await;

    send_command(
        &mut bob,
        json!({"command": {"event": "confirm_ready", "answer": "yes"}, "room": joined.room}),
    )
    .await;

    let survey = next_on(&mut alice, COMMAND_CHANNEL).await;
    relay.on_command(&survey.payload);
    assert_eq!(relay.view().shown, vec!["Pick the taboo word".to_string()]);
    assert!(relay.is_armed());

    let bob_survey = next_on(&mut bob, COMMAND_CHANNEL).await;
    assert_eq!(
        bob_survey.payload,
        json!({"command": {"event": "survey", "survey": "Pick the taboo word"}})
    );

    relay.form_mut().push("cat");
    relay.form_mut().push("dog");
    relay.on_submit().unwrap();
    let submitted = outbound.try_recv().unwrap();
    assert_eq!(
        submitted.payload,
        json!({
            "command": {"event": "submit_survey", "answers": ["cat", "dog"]},
            "room": joined.room
        })
    );
    assert!(outbound.try_recv().is_err());
    write_frame(&mut alice, &submitted).await.unwrap();

    send_command(
        &mut bob,
        json!({"command": {"event": "submit_survey", "answers": ["bird"]}, "room": joined.room}),
    )
    .await;

    expect_text(&mut alice, ROUND_COMPLETE).await;
    expect_text(&mut bob, ROUND_COMPLETE).await;
}

/// Unknown commands are dropped without closing the connection
#[tokio::test]
async fn unrecognized_command_is_ignored() {
    let addr = start_server(ServerConfig::default()).await;
    let (mut alice, _bob, joined) = seated_pair(addr).await;

    send_command(
        &mut alice,
        json!({"command": {"event": "choose_grid", "answer": "2"}, "room": joined.room}),
    )
    .await;
    send_command(
        &mut alice,
        json!({"command": {"event": "confirm_ready", "answer": "no"}, "room": joined.room}),
    )
    .await;

    expect_text(&mut alice, NOT_READY).await;
}

/// Commands addressed to another room have no effect
#[tokio::test]
async fn wrong_room_is_rejected() {
    let addr = start_server(ServerConfig::default()).await;
    let (mut alice, _bob, joined) = seated_pair(addr).await;

    send_command(
        &mut alice,
        json!({"command": {"event": "confirm_ready", "answer": "no"}, "room": "room999"}),
    )
    .await;
    send_command(
        &mut alice,
        json!({"command": {"event": "confirm_ready", "answer": "yes"}, "room": joined.room}),
    )
    .await;

    loop {
        let text: TextMessage = next_on(&mut alice, TEXT_CHANNEL).await.decode().unwrap();
        assert_ne!(text.message, NOT_READY);
        if text.message == WAITING_FOR_PARTNER {
            break;
        }
    }
}

/// The remaining player hears about a partner leaving
#[tokio::test]
async fn partner_leaving_is_announced() {
    let addr = start_server(ServerConfig::default()).await;
    let (alice, mut bob, _joined) = seated_pair(addr).await;

    drop(alice);
    expect_text(&mut bob, "alice has left the game.").await;
    expect_text(&mut bob, ROOM_CLOSED).await;
}

/// An idle connection is dropped and its partner told, like a disconnect
#[tokio::test]
async fn idle_client_is_dropped() {
    let addr = start_server(ServerConfig {
        idle_timeout: Duration::from_millis(200),
        ..ServerConfig::default()
    })
    .await;
    let (mut alice, bob, joined) = seated_pair(addr).await;
    let (mut bob_reader, mut bob_writer) = bob.into_split();
    let ping = json!({
        "command": {"event": "confirm_ready", "answer": "maybe"},
        "room": joined.room
    });

    // bob keeps talking so only alice goes idle
    let keep_alive = tokio::spawn(async move {
        loop {
            send_command(&mut bob_writer, ping.clone()).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    expect_text(&mut bob_reader, "alice has left the game.").await;
    keep_alive.abort();

    loop {
        match timeout(WAIT, read_frame(&mut alice)).await.unwrap() {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => panic!("Expected a clean close, got {}", e),
        }
    }
}

/// A full server refuses new connections
#[tokio::test]
async fn full_server_refuses_connection() {
    let addr = start_server(ServerConfig {
        max_clients: 1,
        ..ServerConfig::default()
    })
    .await;

    let mut first = join(addr, "alice").await;
    expect_text(&mut first, "Waiting for another player to join...").await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    expect_text(&mut second, "Server full").await;

    let closed = timeout(WAIT, read_frame(&mut second)).await.unwrap();
    assert!(matches!(closed, Ok(None)));
}
