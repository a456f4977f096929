//! Interactive chat client.
//!
//! Demonstrates:
//! - Building a ChatTransport from environment settings
//! - Listening for messages, typing indicators and connection changes
//! - Sending stdin lines as messages with a typing indicator
//!
//! Environment:
//!   CHAT_SERVER_URL  server base URL (default http://localhost:5000)
//!   CHAT_ROOM        room to join (default 1)
//!   CHAT_USER        user id (default 1)
//!   CHAT_TOKEN       auth token (optional)
//!
//! Usage:
//!   cargo run --example chat_client
//!   cargo run --example chat_client -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::sync::Arc;

use anyhow::Context;
use counsel_chat::{ChatTransport, MessageDraft, RoomId, TypingRoster, UserId, WireId};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Configuration
// ============================================================================

/// Demo settings read from the environment.
#[derive(Debug, Clone)]
struct Settings {
    server_url: String,
    room: RoomId,
    user: UserId,
    token: Option<String>,
    debug: bool,
}

impl Settings {
    fn from_env() -> Self {
        Self {
            server_url: env::var("CHAT_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            room: RoomId::new(id_from_env("CHAT_ROOM")),
            user: UserId::new(id_from_env("CHAT_USER")),
            token: env::var("CHAT_TOKEN").ok(),
            debug: env::args().any(|a| a == "--debug"),
        }
    }
}

/// Numeric ids stay numeric on the wire.
fn id_from_env(key: &str) -> WireId {
    match env::var(key) {
        Ok(value) => value
            .parse::<i64>()
            .map_or_else(|_| WireId::from(value.clone()), WireId::from),
        Err(_) => WireId::from(1),
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "counsel_chat=debug"
    } else {
        "counsel_chat=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();
    init_logging(settings.debug);

    if let Err(e) = run(settings).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    println!("=== Chat client: {} ===\n", settings.server_url);

    let chat = ChatTransport::builder()
        .server_url(settings.server_url.as_str())
        .build()
        .context("invalid chat configuration")?;

    let _connection = chat.on_connection_change(|connected| {
        println!("[{}]", if connected { "online" } else { "offline" });
    });

    let _messages = chat.on_message(|message| {
        let author = message.user_name.as_deref().unwrap_or("unknown");
        println!("{} <{author}> {}", message.created_at, message.message);
    });

    let roster = Arc::new(Mutex::new(TypingRoster::new()));
    let _typing = {
        let roster = Arc::clone(&roster);
        chat.on_typing(move |status| {
            let mut roster = roster.lock();
            if roster.apply(status) {
                let typing = roster.typing_in(&status.room_id);
                if !typing.is_empty() {
                    println!("  ({} typing...)", typing.join(", "));
                }
            }
        })
    };

    let _rooms = chat.on_room_event(|event| {
        println!("  [{:?}] room {}", event.kind, event.room_id);
    });

    chat.connect(
        settings.room.clone(),
        settings.user.clone(),
        settings.token.as_deref(),
    );

    println!("Type a message and press Enter. Ctrl+C to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                chat.notify_typing(settings.room.clone());
                chat.send_message(MessageDraft::new(line).from_sender(settings.user.clone(), "me"));
                chat.stop_typing(settings.room.clone());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    chat.disconnect();
    println!("\nBye.");
    Ok(())
}
