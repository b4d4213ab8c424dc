//! Special commands parser for interactive chat mode
//!
//! This module parses the special commands that can be entered during an
//! interactive chat session. Special commands allow users to:
//! - Clear the conversation
//! - Show or hide the transcript
//! - Tell the assistant which page they are reading
//! - Retry a failed message or rate an answer
//! - Exit the session
//!
//! Commands are prefixed with `/`. The command word is case-insensitive;
//! arguments (page paths, comments) are kept as typed.

use crate::backend::Rating;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
///
/// These commands act on the conversation state rather than being sent to
/// the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Empty the conversation; the session is kept
    Clear,

    /// Show or hide the transcript
    Toggle,

    /// Set the page forwarded as context with later questions
    SetPage(String),

    /// Resubmit the most recent failed message
    Retry,

    /// Rate the most recent answer
    Rate {
        /// The judgment
        rating: Rating,
        /// Optional free text
        comment: Option<String>,
    },

    /// Display session and request status
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent to the assistant as a question.
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if input starts with "/" but is
/// not a valid command, `CommandError::MissingArgument` if a command needs
/// an argument that was not given and `CommandError::UnsupportedArgument`
/// for an invalid argument.
///
/// # Examples
///
/// ```
/// use docchat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/page /docs/Intro").unwrap();
/// assert_eq!(cmd, SpecialCommand::SetPage("/docs/Intro".to_string()));
///
/// let cmd = parse_special_command("what is a servo?").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // If input doesn't start with "/", it's a question (except exit/quit)
    if !trimmed.starts_with('/') {
        return Ok(match lower.as_str() {
            "exit" | "quit" => SpecialCommand::Exit,
            _ => SpecialCommand::None,
        });
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match command.as_str() {
        "/clear" => Ok(SpecialCommand::Clear),
        "/toggle" | "/hide" | "/show" => Ok(SpecialCommand::Toggle),
        "/retry" => Ok(SpecialCommand::Retry),
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        "/page" => {
            if rest.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/page".to_string(),
                    usage: "/page <path>".to_string(),
                })
            } else {
                Ok(SpecialCommand::SetPage(rest.to_string()))
            }
        }

        "/rate" => {
            let (value, comment) = match rest.split_once(char::is_whitespace) {
                Some((value, comment)) => (value, Some(comment.trim().to_string())),
                None => (rest, None),
            };
            if value.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "/rate".to_string(),
                    usage: "/rate <up|neutral|down> [comment]".to_string(),
                });
            }
            let rating = Rating::parse_str(value).map_err(|_| CommandError::UnsupportedArgument {
                command: "/rate".to_string(),
                arg: value.to_string(),
            })?;
            Ok(SpecialCommand::Rate {
                rating,
                comment: comment.filter(|c| !c.is_empty()),
            })
        }

        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

/// Display help text for special commands
///
/// # Examples
///
/// ```
/// use docchat::commands::special_commands::print_help;
///
/// print_help();
/// ```
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

CONVERSATION:
  /clear          - Delete all messages (the session is kept)
  /retry          - Resend the most recent failed message
  /rate <up|neutral|down> [comment]
                  - Rate the most recent answer

CONTEXT:
  /page <path>    - Tell the assistant which page you are reading

DISPLAY:
  /toggle         - Hide or show the conversation transcript
  /status         - Show session and request status

OTHER:
  /help           - Show this help message
  /quit, exit     - Exit the session

While a question is pending, press Ctrl-C to abort it.
"#
    );
}
