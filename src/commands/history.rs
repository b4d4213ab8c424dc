//! History command handlers
//!
//! Show the saved conversation (or the backend's record of it), clear the
//! saved messages, or forget the session entirely.

use super::build_controller;
use crate::backend::{BackendClient, HttpBackend, RemoteMessage};
use crate::chat::{saved_messages, saved_session, Message};
use crate::config::Config;
use crate::error::{DocchatError, Result};
use crate::storage::open_store;
use chrono::{DateTime, NaiveDateTime};
use colored::Colorize;
use prettytable::{format, Table};

/// Longest message excerpt shown in the table
const EXCERPT_CHARS: usize = 60;

/// Minute-precision time shown in the table
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Paging and output options for `history`
#[derive(Debug, Clone, Copy)]
pub struct HistoryArgs {
    /// Read from the backend instead of local storage
    pub remote: bool,
    /// Maximum number of messages
    pub limit: usize,
    /// Messages to skip
    pub offset: usize,
    /// Emit JSON instead of a table
    pub json: bool,
}

/// Handle `docchat history`
pub async fn show_history(config: &Config, args: HistoryArgs) -> Result<()> {
    if args.remote {
        show_remote_history(config, args).await
    } else {
        show_local_history(config, args)
    }
}

fn show_local_history(config: &Config, args: HistoryArgs) -> Result<()> {
    let store = open_store(&config.storage)?;
    let messages: Vec<Message> = saved_messages(&store)
        .into_iter()
        .skip(args.offset)
        .take(args.limit)
        .collect();

    if args.json {
        let json = serde_json::to_string_pretty(&messages).map_err(DocchatError::from)?;
        println!("{}", json);
        return Ok(());
    }

    if messages.is_empty() {
        println!("{}", "No conversation history found.".yellow());
        return Ok(());
    }

    let mut table = history_table();
    for message in &messages {
        let role = match &message.status {
            Some(status) => format!("{} ({:?})", message.role, status).to_lowercase(),
            None => message.role.to_string(),
        };
        table.add_row(prettytable::row![
            display_time(&message.timestamp),
            role.cyan(),
            excerpt(&message.content),
            message.sources().len()
        ]);
    }

    println!("\nConversation History:");
    table.printstd();
    println!();
    if let Some(session) = saved_session(&store) {
        println!("Session: {}", session.id.cyan());
        println!();
    }
    Ok(())
}

async fn show_remote_history(config: &Config, args: HistoryArgs) -> Result<()> {
    let store = open_store(&config.storage)?;
    let Some(session) = saved_session(&store) else {
        println!(
            "{}",
            "No saved session. Start one with `docchat chat`.".yellow()
        );
        return Ok(());
    };

    let backend = HttpBackend::new(&config.backend)?;
    let messages = backend
        .fetch_history(&session.id, args.limit, args.offset)
        .await?;

    if args.json {
        let json = serde_json::to_string_pretty(&messages).map_err(DocchatError::from)?;
        println!("{}", json);
        return Ok(());
    }

    if messages.is_empty() {
        println!("{}", "The backend has no messages for this session.".yellow());
        return Ok(());
    }

    let mut table = history_table();
    for message in &messages {
        add_remote_row(&mut table, message);
    }

    println!("\nBackend history for session {}:", session.id.cyan());
    table.printstd();
    println!();
    Ok(())
}

fn history_table() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "Time".bold(),
        "Role".bold(),
        "Message".bold(),
        "Sources".bold()
    ]);
    table
}

fn add_remote_row(table: &mut Table, message: &RemoteMessage) {
    let sources = message.sources.as_ref().map(Vec::len).unwrap_or(0);
    table.add_row(prettytable::row![
        display_time(&message.timestamp),
        message.role.cyan(),
        excerpt(&message.content),
        sources
    ]);
}

/// Render an ISO-8601 timestamp for a table cell
///
/// Offset-less timestamps are shown as written; unparseable text is shown
/// unchanged.
fn display_time(timestamp: &str) -> String {
    if let Ok(time) = DateTime::parse_from_rfc3339(timestamp) {
        return time.naive_utc().format(TIME_FORMAT).to_string();
    }
    match NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(time) => time.format(TIME_FORMAT).to_string(),
        Err(_) => timestamp.to_string(),
    }
}

/// First line of `content`, shortened to fit a table cell
fn excerpt(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > EXCERPT_CHARS || content.lines().nth(1).is_some() {
        let short: String = line.chars().take(EXCERPT_CHARS - 3).collect();
        format!("{}...", short)
    } else {
        line.to_string()
    }
}

/// Handle `docchat clear`
pub fn clear_history(config: &Config) -> Result<()> {
    let controller = build_controller(config)?;
    controller.clear();
    println!("{}", "Cleared conversation history.".green());
    Ok(())
}

/// Handle `docchat reset`
pub fn reset_session(config: &Config) -> Result<()> {
    let controller = build_controller(config)?;
    controller.reset();
    println!(
        "{}",
        "Forgot the session and its history. The next chat starts fresh.".green()
    );
    Ok(())
}
