/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `chat`     — Interactive chat session
- `history`  — Inspect, clear or reset the saved conversation

These handlers are intentionally small and use the library components:
the storage layer, the HTTP backend and the session controller.
*/

use crate::backend::HttpBackend;
use crate::chat::{Message, Role, SessionController};
use crate::config::Config;
use crate::error::Result;
use crate::storage::{open_store, PersistentStore};

// Special commands parser for the interactive session
pub mod special_commands;

// History command handlers
pub mod history;

/// Controller wired to the configured store and HTTP backend
pub type CliController = SessionController<Box<dyn PersistentStore>, HttpBackend>;

/// Build a controller from configuration without mounting it
///
/// # Errors
///
/// Returns error if the store cannot be opened or the HTTP client cannot be
/// built
pub fn build_controller(config: &Config) -> Result<CliController> {
    let store = open_store(&config.storage)?;
    let backend = HttpBackend::new(&config.backend)?;
    Ok(SessionController::new(store, backend, config.chat.clone()))
}

/// Print one message with its sources
pub fn print_message(message: &Message) {
    use colored::Colorize;

    match message.role {
        Role::User => {
            let marker = if message.is_failed() {
                " (not delivered, /retry to resend)".red().to_string()
            } else {
                String::new()
            };
            println!("{} {}{}", "you>".cyan().bold(), message.content, marker);
        }
        Role::Assistant => {
            let label = "assistant>".green().bold();
            if message.is_error_notice() {
                println!("{} {}", label, message.content.red());
            } else {
                println!("{} {}", label, message.content);
            }

            let sources = message.sources();
            if !sources.is_empty() {
                println!("  {}", "Sources:".dimmed());
                for (i, source) in sources.iter().enumerate() {
                    println!(
                        "  [{}] {} ({}) {}",
                        i + 1,
                        source.title,
                        source.url.underline(),
                        source.relevance_percent().yellow()
                    );
                }
            }
        }
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat session handler.
    //!
    //! Builds the session controller, mounts it, and runs a readline-based
    //! loop that submits questions and renders answers with their sources.

    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use crate::backend::BackendClient;
    use crate::chat::{MountOutcome, SubmitOutcome};
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::future::Future;

    /// Start an interactive chat session
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `page` - Optional page to forward as context instead of the default
    pub async fn run_chat(config: Config, page: Option<String>) -> Result<()> {
        tracing::info!("Starting interactive chat session");

        let controller = build_controller(&config)?;
        if let Some(page) = page {
            controller.set_current_page(page);
        }

        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(&config);
        controller.toggle_open();

        match controller.mount().await {
            MountOutcome::Restored => {
                let restored = controller.snapshot().messages;
                if !restored.is_empty() {
                    println!("{}\n", "Restored previous conversation:".dimmed());
                    for message in &restored {
                        print_message(message);
                    }
                    println!();
                }
            }
            MountOutcome::SessionUnavailable => {
                println!(
                    "{}\n",
                    "Assistant service unavailable; a session will be created on your first question."
                        .yellow()
                );
            }
            MountOutcome::SessionCreated | MountOutcome::AlreadyMounted => {}
        }

        loop {
            match rl.readline(&format!("{} ", "docchat>".cyan())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}\n", e.to_string().red());
                            continue;
                        }
                    };

                    match command {
                        SpecialCommand::Clear => {
                            controller.clear();
                            println!("{}\n", "Conversation cleared.".green());
                        }
                        SpecialCommand::Toggle => {
                            if controller.toggle_open() {
                                for message in &controller.snapshot().messages {
                                    print_message(message);
                                }
                                println!();
                            } else {
                                println!("{}\n", "Transcript hidden. /toggle to show.".dimmed());
                            }
                        }
                        SpecialCommand::SetPage(path) => {
                            controller.set_current_page(path.clone());
                            println!("Now reading {}\n", path.cyan());
                        }
                        SpecialCommand::Retry => match controller.last_failed_message() {
                            Some(id) => {
                                let outcome =
                                    abortable(&controller, controller.retry(&id)).await;
                                render_outcome(&controller, outcome);
                            }
                            None => println!("{}\n", "Nothing to retry.".yellow()),
                        },
                        SpecialCommand::Rate { rating, comment } => {
                            match controller.last_assistant_message() {
                                Some(id) => {
                                    if controller.rate(&id, rating, comment).await {
                                        println!("{}\n", "Thanks for the feedback!".green());
                                    } else {
                                        println!("{}\n", "Feedback could not be sent.".yellow());
                                    }
                                }
                                None => println!("{}\n", "No answer to rate yet.".yellow()),
                            }
                        }
                        SpecialCommand::ShowStatus => print_status(&controller),
                        SpecialCommand::Help => print_help(),
                        SpecialCommand::Exit => break,
                        SpecialCommand::None => {
                            let outcome =
                                abortable(&controller, controller.submit(trimmed)).await;
                            render_outcome(&controller, outcome);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Await an exchange, aborting it if the user presses Ctrl-C
    async fn abortable<S, B>(
        controller: &SessionController<S, B>,
        exchange: impl Future<Output = SubmitOutcome>,
    ) -> SubmitOutcome
    where
        S: PersistentStore,
        B: BackendClient,
    {
        println!("{}", "Thinking... (Ctrl-C to abort)".dimmed());

        tokio::pin!(exchange);
        tokio::select! {
            outcome = &mut exchange => outcome,
            _ = tokio::signal::ctrl_c() => {
                controller.abort();
                exchange.await
            }
        }
    }

    fn render_outcome<S, B>(controller: &SessionController<S, B>, outcome: SubmitOutcome)
    where
        S: PersistentStore,
        B: BackendClient,
    {
        if outcome == SubmitOutcome::Ignored {
            println!("{}\n", "A request is already in progress.".yellow());
            return;
        }

        let state = controller.snapshot();
        if !state.open {
            println!("{}\n", "Answer received. /toggle to show.".dimmed());
            return;
        }

        // The exchange appended exactly one assistant message after the user turn
        if let [.., user, reply] = state.messages.as_slice() {
            print_message(user);
            print_message(reply);
        }
        println!();
    }

    /// Display welcome banner at the start of the session
    fn print_welcome_banner(config: &Config) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║              docchat - Documentation Assistant               ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Course:  {}", config.chat.course.cyan());
        println!("Backend: {}", config.backend.base_url);
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

    /// Display session details for the `/status` command
    fn print_status<S, B>(controller: &SessionController<S, B>)
    where
        S: PersistentStore,
        B: BackendClient,
    {
        let state = controller.snapshot();
        let context = controller.context();

        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    docchat Session Status                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!(
            "Session:           {}",
            state
                .session_id()
                .map(|id| id.cyan().to_string())
                .unwrap_or_else(|| "none".yellow().to_string())
        );
        println!("Request:           {}", state.request_status());
        println!("Current Page:      {}", context.current_page);
        println!("Course:            {}", context.course);
        println!("Conversation Size: {} messages", state.messages.len());
        println!(
            "Transcript:        {}",
            if state.open { "shown" } else { "hidden" }
        );
        println!();
    }
}
