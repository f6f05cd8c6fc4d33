//! Interactive read-eval-print loop.
//!
//! Reads commands and chat lines from stdin while a background tick
//! renders messages and notices that arrived through the session.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use surge_client::{ChatSession, ClientConfig, ConnectionState};
use surge_core::{ChatMessage, MessageKind, Notice};
use tokio::io::{AsyncBufReadExt, BufReader};

const USERNAME_FILE: &str = "~/.config/surge/last-user";

/// Resolve the username: stored value as the prompt default, stdin
/// answer wins.
pub fn resolve_username() -> Result<String> {
    let stored = read_stored_username();
    match &stored {
        Some(name) => print!("username [{name}]: "),
        None => print!("username: "),
    }
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("Failed to read username")?;
    let answer = answer.trim();

    if answer.is_empty() {
        stored.context("No username given")
    } else {
        Ok(answer.to_string())
    }
}

/// Persist the username for the next run. Best effort.
pub fn remember_username(name: &str) {
    let path = PathBuf::from(shellexpand::tilde(USERNAME_FILE).as_ref());
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(error) = std::fs::write(&path, name) {
        tracing::debug!(%error, "Could not store username");
    }
}

fn read_stored_username() -> Option<String> {
    let path = PathBuf::from(shellexpand::tilde(USERNAME_FILE).as_ref());
    let contents = std::fs::read_to_string(path).ok()?;
    let name = contents.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Drive the REPL until EOF or `/quit`.
pub async fn run(session: ChatSession, config: &ClientConfig) -> Result<()> {
    let mut active = config
        .rooms
        .first()
        .map(|room| room.id.clone())
        .unwrap_or_else(|| "general".to_string());
    println!("active room: {active} (/help for commands)");

    let mut rendered: HashMap<String, usize> = HashMap::new();
    let mut status = session.watch_status();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(Duration::from_millis(400));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    None => break,
                    Some(line) => {
                        if let Flow::Quit = handle_line(&session, &mut active, line.trim()).await {
                            break;
                        }
                    }
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let link = *status.borrow();
                match link.state {
                    ConnectionState::Reconnecting => {
                        println!("! reconnecting (attempt {})", link.reconnect_attempts);
                    }
                    ConnectionState::Failed => {
                        println!("! connection failed, type /connect to retry");
                    }
                    ConnectionState::Connected => println!("! connected"),
                    ConnectionState::Disconnected | ConnectionState::Connecting => {}
                }
            }
            _ = tick.tick() => {
                render_new_messages(&session, &mut rendered);
                render_notices(&session);
            }
        }
    }

    session.shutdown();
    Ok(())
}

async fn handle_line(session: &ChatSession, active: &mut String, line: &str) -> Flow {
    if line.is_empty() {
        return Flow::Continue;
    }
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "/help" => {
            println!("/rooms /join <room> /who /dm <user-id> <text>");
            println!("/edit <msg-id> <text> /delete <msg-id> /read <msg-id>");
            println!("/status /connect /disconnect /quit");
            println!("anything else is sent to the active room");
        }
        "/rooms" => {
            for room in session.rooms() {
                let marker = if room.id == *active { "*" } else { " " };
                println!(
                    "{marker} {} ({}) - {} messages, {} online",
                    room.id,
                    room.name,
                    room.messages.len(),
                    room.presence.len()
                );
            }
        }
        "/join" => {
            if rest.is_empty() {
                println!("usage: /join <room>");
            } else if session.room(rest).is_some() {
                session.set_active_room().await;
                *active = rest.to_string();
                println!("active room: {active}");
            } else {
                println!("unknown room: {rest}");
            }
        }
        "/who" => {
            if let Some(room) = session.room(active) {
                for user in &room.presence {
                    let typing = if room.is_typing(&user.id) {
                        " (typing)"
                    } else {
                        ""
                    };
                    println!("  {} [{}]{typing}", user.name, user.id);
                }
            }
        }
        "/dm" => match rest.split_once(' ') {
            Some((to, text)) if !text.trim().is_empty() => {
                if !session.send_direct_message(to, text.trim()).await {
                    println!("! not connected, message dropped");
                }
            }
            _ => println!("usage: /dm <user-id> <text>"),
        },
        "/edit" => match rest.split_once(' ') {
            Some((id, text)) if !text.trim().is_empty() => {
                if !session.edit_message(active, id, text.trim()).await {
                    println!("! not connected, edit dropped");
                }
            }
            _ => println!("usage: /edit <msg-id> <text>"),
        },
        "/delete" => {
            if rest.is_empty() {
                println!("usage: /delete <msg-id>");
            } else if !session.delete_message(active, rest).await {
                println!("! not connected, delete dropped");
            }
        }
        "/read" => {
            if rest.is_empty() {
                println!("usage: /read <msg-id>");
            } else if !session.mark_read(active, rest).await {
                println!("! not connected, receipt dropped");
            }
        }
        "/status" => {
            let link = session.status();
            println!("{:?}, attempts: {}", link.state, link.reconnect_attempts);
        }
        "/connect" => session.connect(),
        "/disconnect" => session.disconnect(),
        "/quit" => return Flow::Quit,
        _ if command.starts_with('/') => println!("unknown command: {command}"),
        _ => {
            if !session.send_message(active, line).await {
                println!("! not connected, message dropped");
            }
        }
    }
    Flow::Continue
}

fn render_new_messages(session: &ChatSession, rendered: &mut HashMap<String, usize>) {
    for room in session.rooms() {
        let seen = rendered.entry(room.id.clone()).or_insert(0);
        for message in room.messages.iter().skip(*seen) {
            println!("{}", format_message(&room.id, message));
        }
        *seen = room.messages.len();
    }
}

fn render_notices(session: &ChatSession) {
    for notice in session.take_notices() {
        match notice {
            Notice::DirectMessage { from, text } => {
                println!("(dm) {}: {text}", from.name);
            }
            Notice::ServerError { message } => {
                println!("! server error: {message}");
            }
        }
    }
}

fn format_message(room_id: &str, message: &ChatMessage) -> String {
    if message.is_deleted {
        return format!("[{room_id}] (message deleted)");
    }
    let author = message.author.as_deref().unwrap_or("?");
    let edited = if message.is_edited { " (edited)" } else { "" };
    match message.kind {
        MessageKind::System => format!("[{room_id}] * {}", message.text),
        MessageKind::Sent => format!("[{room_id}] you: {}{edited}", message.text),
        MessageKind::Received | MessageKind::DirectMessage => {
            format!("[{room_id}] {author}: {}{edited}", message.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message_variants() {
        let mut message = ChatMessage::new(
            "m1",
            MessageKind::Received,
            "hello",
            "bob",
            "2026-08-29T10:00:00Z",
        );
        assert_eq!(format_message("general", &message), "[general] bob: hello");

        message.kind = MessageKind::Sent;
        message.is_edited = true;
        assert_eq!(
            format_message("general", &message),
            "[general] you: hello (edited)"
        );

        message.is_deleted = true;
        assert_eq!(format_message("general", &message), "[general] (message deleted)");

        let system = ChatMessage::system("bob joined the room");
        assert_eq!(
            format_message("general", &system),
            "[general] * bob joined the room"
        );
    }
}
