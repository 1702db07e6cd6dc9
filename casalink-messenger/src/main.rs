//! CasaLink Messenger
//!
//! Terminal client for the marketplace's messaging subsystem. Lists
//! conversations, reads threads, sends messages, and can watch a thread
//! live on the configured poll interval.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use casalink_api::{Message, RestClient};
use casalink_messaging::{MessagingSession, SyncScheduler};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;

use config::Config;

#[derive(Parser)]
#[command(name = "casalink-messenger", version, about = "CasaLink messaging from the terminal")]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long)]
    server: Option<String>,

    /// Bearer token (overrides the config file)
    #[arg(long)]
    token: Option<String>,

    /// Authenticated user id (overrides the config file)
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List conversations, most recent first
    Conversations,

    /// Show the thread with one counterparty
    Thread {
        /// Counterparty user id
        counterparty_id: String,
    },

    /// Send a message to a counterparty
    Send {
        /// Recipient user id
        counterparty_id: String,

        /// Message text
        content: String,
    },

    /// Watch a thread, printing new messages as they arrive
    Watch {
        /// Counterparty user id
        counterparty_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| tracing_subscriber::EnvFilter::new("casalink_messenger=info,casalink_messaging=info"),
        ))
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    let server = cli.server.unwrap_or_else(|| config.server.url.clone());
    let Some(token) = cli.token.or_else(|| config.server.token.clone()) else {
        bail!("no API token configured; pass --token or set server.token in the config file");
    };
    let Some(user_id) = cli.user.or_else(|| config.server.user_id.clone()) else {
        bail!("no user id configured; pass --user or set server.user_id in the config file");
    };

    let api = RestClient::with_timeout(&server, &token, config.sync.request_timeout())
        .context("Failed to create API client")?;
    let session = MessagingSession::new(Arc::new(api), &user_id);

    match cli.command {
        Command::Conversations => list_conversations(&session).await,
        Command::Thread { counterparty_id } => show_thread(&session, &counterparty_id).await,
        Command::Send {
            counterparty_id,
            content,
        } => send_message(&session, &counterparty_id, &content).await,
        Command::Watch { counterparty_id } => {
            watch_thread(&session, &counterparty_id, &config).await
        }
    }
}

async fn list_conversations(session: &MessagingSession) -> Result<()> {
    session
        .refresh_conversations()
        .await
        .context("Failed to fetch conversations")?;

    let conversations = session.conversations().await;
    if conversations.is_empty() {
        println!("No conversations yet.");
        return Ok(());
    }

    for conversation in &conversations {
        let unread = if conversation.unread_count > 0 {
            format!(" [{} unread]", conversation.unread_count)
        } else {
            String::new()
        };
        let prefix = if conversation.is_last_sender { "you: " } else { "" };
        let preview: String = conversation.last_message.chars().take(60).collect();

        println!(
            "{:<20} {}  {}{}{}",
            conversation.counterparty.name,
            conversation
                .last_message_time
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M"),
            prefix,
            preview,
            unread,
        );
    }

    let unread_total = session.unread_total().await;
    if unread_total > 0 {
        println!("\n{} unread in total", unread_total);
    }

    Ok(())
}

async fn show_thread(session: &MessagingSession, counterparty_id: &str) -> Result<()> {
    session
        .select(counterparty_id)
        .await
        .context("Failed to load thread")?;

    let name = session
        .counterparty_profile()
        .await
        .map(|p| p.name)
        .unwrap_or_else(|| counterparty_id.to_string());

    let messages = session.thread_messages().await;
    if messages.is_empty() {
        println!("No messages with {} yet.", name);
        return Ok(());
    }

    for message in &messages {
        print_message(session, &name, message);
    }

    Ok(())
}

async fn send_message(
    session: &MessagingSession,
    counterparty_id: &str,
    content: &str,
) -> Result<()> {
    match session.send_to(counterparty_id, content).await {
        Ok(message) => {
            info!("message {} delivered", message.id);
            println!("Sent to {}.", counterparty_id);
            Ok(())
        }
        Err(error) => bail!("{}", error.user_message()),
    }
}

async fn watch_thread(
    session: &MessagingSession,
    counterparty_id: &str,
    config: &Config,
) -> Result<()> {
    session
        .select(counterparty_id)
        .await
        .context("Failed to load thread")?;

    let name = session
        .counterparty_profile()
        .await
        .map(|p| p.name)
        .unwrap_or_else(|| counterparty_id.to_string());

    println!("Watching thread with {} (Ctrl-C to stop)...", name);

    let scheduler = SyncScheduler::new(&config.sync);
    let _thread_sync = scheduler.watch_thread(session.clone());
    let _list_sync = scheduler.watch_conversations(session.clone());

    let mut printed = 0usize;
    loop {
        let messages = session.thread_messages().await;
        for message in &messages[printed.min(messages.len())..] {
            print_message(session, &name, message);
        }
        printed = messages.len();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
    }

    println!("\nStopped watching.");
    Ok(())
}

fn print_message(session: &MessagingSession, counterparty_name: &str, message: &Message) {
    let sender = if message.sender_id == session.self_id() {
        "you"
    } else {
        counterparty_name
    };
    println!(
        "[{}] {}: {}",
        message.timestamp.with_timezone(&Local).format("%H:%M"),
        sender,
        message.content
    );
}
