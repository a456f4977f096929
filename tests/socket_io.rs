//! End-to-end tests against an in-process Socket.IO server.
//!
//! The server side is scripted by hand with tokio-tungstenite: it speaks
//! just enough Engine.IO v4 / Socket.IO v5 to exercise the handshake,
//! room join, message exchange, heartbeat and shutdown.

use std::time::Duration;

use anyhow::{Context, anyhow};
use counsel_chat::{
    ChatMessage, ChatTransport, MessageDraft, ReconnectPolicy, RoomId, Subscription,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing_subscriber::EnvFilter;

const OPEN: &str =
    r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Scripted Server
// ============================================================================

/// Pushed to the server to make it close the current socket.
const CLOSE: &str = "<close>";

/// Handles to a scripted server.
struct ServerScript {
    /// Request URI of each websocket upgrade.
    uris: mpsc::UnboundedReceiver<String>,
    /// Text frames received from the client, across connections.
    frames: mpsc::UnboundedReceiver<String>,
    /// Text frames to push to the client, or [`CLOSE`].
    push: mpsc::UnboundedSender<String>,
    task: JoinHandle<anyhow::Result<()>>,
}

/// Serves `connections` sockets one after another, replying to each
/// namespace CONNECT with `connect_reply`.
async fn spawn_server(
    connect_reply: &'static str,
    connections: usize,
) -> anyhow::Result<(String, ServerScript)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);

    let (uri_tx, uri_rx) = mpsc::unbounded_channel();
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();

    let task = tokio::spawn(async move {
        for _ in 0..connections {
            let (stream, _) = listener.accept().await?;
            let uri_tx = uri_tx.clone();
            let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                let _ = uri_tx.send(request.uri().to_string());
                Ok(response)
            };
            let mut ws = accept_hdr_async(stream, callback).await?;

            ws.send(Message::Text(OPEN.into())).await?;

            loop {
                tokio::select! {
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let text = text.as_str().to_string();
                            if text.starts_with("40") {
                                ws.send(Message::Text(connect_reply.into())).await?;
                            }
                            let _ = frames_tx.send(text);
                        }
                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                        Some(Ok(_)) => {}
                    },
                    push = push_rx.recv() => match push {
                        Some(text) if text == CLOSE => {
                            let _ = ws.close(None).await;
                            break;
                        }
                        Some(text) => ws.send(Message::Text(text.into())).await?,
                        None => return anyhow::Ok(()),
                    },
                }
            }
        }

        anyhow::Ok(())
    });

    Ok((
        url,
        ServerScript {
            uris: uri_rx,
            frames: frames_rx,
            push: push_tx,
            task,
        },
    ))
}

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> anyhow::Result<T> {
    timeout(WAIT, rx.recv())
        .await
        .context("timed out waiting for value")?
        .ok_or_else(|| anyhow!("channel closed"))
}

/// Parses a `42[...]` frame into its JSON array.
fn event_frame(frame: &str) -> anyhow::Result<Value> {
    let body = frame
        .strip_prefix("42")
        .ok_or_else(|| anyhow!("not an event frame: {frame}"))?;
    Ok(serde_json::from_str(body)?)
}

fn build(url: &str) -> anyhow::Result<ChatTransport> {
    build_with(url, ReconnectPolicy::disabled())
}

fn build_with(url: &str, policy: ReconnectPolicy) -> anyhow::Result<ChatTransport> {
    Ok(ChatTransport::builder()
        .server_url(url)
        .reconnect_policy(policy)
        .build()?)
}

/// Reconnects almost immediately.
fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy::new().with_delays(Duration::from_millis(10), Duration::from_millis(50))
}

fn record_states(chat: &ChatTransport) -> (Subscription, mpsc::UnboundedReceiver<bool>) {
    let (state_tx, states) = mpsc::unbounded_channel::<bool>();
    let subscription = chat.on_connection_change(move |connected| {
        let _ = state_tx.send(connected);
    });
    (subscription, states)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_session() -> anyhow::Result<()> {
    init_tracing();

    let (url, mut server) = spawn_server(r#"40{"sid":"sock-1"}"#, 1).await?;
    let chat = build(&url)?;

    let (message_tx, mut messages) = mpsc::unbounded_channel::<ChatMessage>();
    let _messages = chat.on_message(move |message| {
        let _ = message_tx.send(message.clone());
    });
    let (_states, mut states) = record_states(&chat);

    chat.connect(9, 42, Some("secret"));

    // Handshake
    let uri = recv(&mut server.uris).await?;
    assert!(uri.starts_with("/socket.io/?"), "unexpected uri {uri}");
    assert!(uri.contains("EIO=4"));
    assert!(uri.contains("transport=websocket"));
    assert!(uri.contains("token=secret"));

    assert_eq!(recv(&mut server.frames).await?, r#"40{"token":"secret"}"#);
    assert!(recv(&mut states).await?);
    assert!(chat.is_connected());

    // Room join
    let join = event_frame(&recv(&mut server.frames).await?)?;
    assert_eq!(join, json!(["join_room", { "roomId": 9 }]));

    // Inbound message without room falls back to the joined room
    server.push.send(
        r#"42["new_message",{"message":{"id":1,"message":"hi","senderId":2,"senderName":"Bob","createdAt":"T"}}]"#
            .to_string(),
    )?;
    let message = recv(&mut messages).await?;
    assert_eq!(message.message, "hi");
    assert_eq!(message.user_name.as_deref(), Some("Bob"));
    assert_eq!(message.room_id, RoomId::from(9));

    // Outbound message
    chat.send_message(MessageDraft::new("hi back"));
    let sent = event_frame(&recv(&mut server.frames).await?)?;
    assert_eq!(
        sent,
        json!(["send_message", { "roomId": 9, "content": "hi back", "type": "text" }])
    );

    // Heartbeat
    server.push.send("2".to_string())?;
    assert_eq!(recv(&mut server.frames).await?, "3");

    // Shutdown
    chat.disconnect();
    assert!(!recv(&mut states).await?);
    assert_eq!(recv(&mut server.frames).await?, "41");

    timeout(WAIT, server.task).await???;
    Ok(())
}

#[tokio::test]
async fn test_rejected_connect_notifies_disconnected() -> anyhow::Result<()> {
    init_tracing();

    let (url, mut server) = spawn_server(r#"44{"message":"invalid token"}"#, 1).await?;
    let chat = build(&url)?;
    let (_states, mut states) = record_states(&chat);

    chat.connect("room-a", "user-1", Some("expired"));

    assert_eq!(recv(&mut server.frames).await?, r#"40{"token":"expired"}"#);
    assert!(!recv(&mut states).await?);

    // The client gives up and drops the socket.
    timeout(WAIT, server.task).await???;
    assert!(!chat.is_connected());
    assert!(states.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn test_server_disconnect_notifies_listeners() -> anyhow::Result<()> {
    init_tracing();

    let (url, mut server) = spawn_server(r#"40{"sid":"sock-2"}"#, 1).await?;
    let chat = build_with(&url, fast_policy())?;
    let (_states, mut states) = record_states(&chat);

    chat.connect(3, 4, None);
    assert_eq!(recv(&mut server.frames).await?, "40");
    assert!(recv(&mut states).await?);

    server.push.send("41".to_string())?;
    assert!(!recv(&mut states).await?);
    assert!(!chat.is_connected());

    // A server-side disconnect is final.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(states.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn test_lost_socket_reconnects_and_rejoins() -> anyhow::Result<()> {
    init_tracing();

    let (url, mut server) = spawn_server(r#"40{"sid":"sock-3"}"#, 2).await?;
    let chat = build_with(&url, fast_policy())?;
    let (_states, mut states) = record_states(&chat);

    chat.connect(9, 42, Some("secret"));

    // First socket
    recv(&mut server.uris).await?;
    assert_eq!(recv(&mut server.frames).await?, r#"40{"token":"secret"}"#);
    assert!(recv(&mut states).await?);
    let join = event_frame(&recv(&mut server.frames).await?)?;
    assert_eq!(join, json!(["join_room", { "roomId": 9 }]));

    server.push.send(CLOSE.to_string())?;
    assert!(!recv(&mut states).await?);

    // Second socket, same credentials and room
    let uri = recv(&mut server.uris).await?;
    assert!(uri.contains("token=secret"));
    assert_eq!(recv(&mut server.frames).await?, r#"40{"token":"secret"}"#);
    assert!(recv(&mut states).await?);
    let join = event_frame(&recv(&mut server.frames).await?)?;
    assert_eq!(join, json!(["join_room", { "roomId": 9 }]));

    chat.send_message(MessageDraft::new("still here"));
    let sent = event_frame(&recv(&mut server.frames).await?)?;
    assert_eq!(sent[0], "send_message");

    chat.disconnect();
    assert!(!recv(&mut states).await?);
    assert_eq!(recv(&mut server.frames).await?, "41");

    timeout(WAIT, server.task).await???;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_notifies_once() -> anyhow::Result<()> {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let chat = build_with(&url, fast_policy().with_max_attempts(1))?;
    let (_states, mut states) = record_states(&chat);

    chat.connect(9, 1, None);
    assert!(!recv(&mut states).await?);

    // The retry fails too and the budget runs out without a second notification.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(states.try_recv().is_err());
    assert!(!chat.is_connected());

    Ok(())
}
