//! Interactive investigation shell.
//!
//! Commands run inline; questions are sent from background tasks so several
//! sessions can wait on the backend at once. Status changes and answers are
//! printed by a listener on the service's event stream.

mod command;
mod helper;

use anyhow::Result;
use colored::Colorize;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use sleuth_application::{InvestigationService, SendOutcome, SessionEvent, SkipReason};
use sleuth_core::session::{MessageRole, PreparationState};
use tokio::sync::broadcast::error::RecvError;

use crate::render;
use crate::selector;
use command::{HELP, ReplCommand};
use helper::SessionHelper;

pub async fn run(service: InvestigationService) -> Result<()> {
    let listener = tokio::spawn(listen(service.clone(), service.subscribe()));

    let helper = SessionHelper::default();
    let mut rl: Editor<SessionHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(helper.clone()));

    println!("{}", "=== Sleuth ===".bright_magenta().bold());
    println!(
        "{}",
        "Type '/new <address>' to start an investigation, '/help' for commands, or 'quit' to exit."
            .bright_black()
    );
    match service.active_session().await {
        Some(session) => println!(
            "{} {} ({})",
            "Active session:".bright_black(),
            session.tag.bold(),
            render::status_label(&session)
        ),
        None => println!("{}", "No active session.".bright_black()),
    }
    println!();

    loop {
        helper.refresh(&service.sessions().await);
        let prompt = match service.active_session().await {
            Some(session) => format!("{}> ", session.tag),
            None => ">> ".to_string(),
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let command = command::parse(&line);
                if !matches!(command, ReplCommand::Empty) {
                    let _ = rl.add_history_entry(line.trim());
                }
                if command == ReplCommand::Quit {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
                if let Err(e) = execute(&service, command).await {
                    eprintln!("{}", format!("Error: {e:#}").red());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {err:?}").red());
                break;
            }
        }
    }

    service.shutdown();
    listener.abort();
    Ok(())
}

async fn execute(service: &InvestigationService, command: ReplCommand) -> Result<()> {
    match command {
        ReplCommand::New(address) => {
            let session = service.create_session(&address).await?;
            println!(
                "{} {} {}",
                "Started".bright_green(),
                session.tag.bold(),
                "- preparing, you can ask once it is ready.".bright_black()
            );
        }
        ReplCommand::List => {
            let active = service.active_session().await.map(|s| s.id);
            render::print_sessions(&service.sessions().await, active.as_ref());
        }
        ReplCommand::Use(reference) => {
            let sessions = service.sessions().await;
            let Some(id) = selector::resolve(&sessions, &reference) else {
                println!("{}", format!("No session matches '{reference}'.").yellow());
                return Ok(());
            };
            service.set_active(&id).await?;
            if let Some(session) = service.session(&id).await {
                println!(
                    "{} {} ({})",
                    "Switched to".bright_green(),
                    session.tag.bold(),
                    render::status_label(&session)
                );
            }
            render::print_history(&service.history(&id).await?);
        }
        ReplCommand::Delete(reference) => {
            let id = match reference {
                Some(reference) => selector::resolve(&service.sessions().await, &reference),
                None => service.active_session().await.map(|s| s.id),
            };
            let Some(id) = id else {
                println!("{}", "No such session.".yellow());
                return Ok(());
            };
            if let Some(removed) = service.delete_session(&id).await? {
                println!("{} {}", "Deleted".bright_green(), removed.tag.bold());
            }
        }
        ReplCommand::History => match service.active_session().await {
            Some(session) => render::print_history(&service.history(&session.id).await?),
            None => println!("{}", "No active session.".yellow()),
        },
        ReplCommand::Help => println!("{}", HELP.bright_black()),
        ReplCommand::Ask(query) => ask(service, query).await,
        ReplCommand::Usage(usage) => println!("{} {}", "Usage:".yellow(), usage),
        ReplCommand::Unknown(name) => {
            println!("{}", format!("Unknown command {name}. Try /help.").bright_black());
        }
        ReplCommand::Empty | ReplCommand::Quit => {}
    }
    Ok(())
}

async fn ask(service: &InvestigationService, query: String) {
    let Some(session) = service.active_session().await else {
        println!("{}", "No active session. Start one with /new <address>.".yellow());
        return;
    };

    let service = service.clone();
    tokio::spawn(async move {
        match service.send_message(&session.id, &query).await {
            Ok(SendOutcome::Skipped(SkipReason::NotReady(PreparationState::Preparing))) => {
                println!("{}", format!("{} is still preparing.", session.tag).yellow());
            }
            Ok(SendOutcome::Skipped(SkipReason::NotReady(_))) => {
                println!(
                    "{}",
                    format!("{} failed to prepare; start a new session.", session.tag).red()
                );
            }
            Ok(SendOutcome::Skipped(SkipReason::AlreadyPending)) => {
                println!(
                    "{}",
                    format!("{} is still answering the previous question.", session.tag).yellow()
                );
            }
            Ok(SendOutcome::Discarded) => {
                println!("{}", "Session was deleted; answer discarded.".bright_black());
            }
            Ok(SendOutcome::Answered(_)) | Ok(SendOutcome::Failed { .. }) => {}
            Err(e) => eprintln!("{}", format!("Error: {e}").red()),
        }
    });
}

/// Prints asynchronously arriving status changes and answers.
async fn listen(
    service: InvestigationService,
    mut events: tokio::sync::broadcast::Receiver<SessionEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "[Repl] Event listener lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            SessionEvent::StatusChanged {
                session_id,
                state,
                message,
            } => {
                let tag = match service.session(&session_id).await {
                    Some(session) => session.tag,
                    None => continue,
                };
                let detail = message.map(|m| format!(" - {m}")).unwrap_or_default();
                let line = match state {
                    PreparationState::Preparing => format!("[{tag}] preparing{detail}").yellow(),
                    PreparationState::Done => format!("[{tag}] ready{detail}").green(),
                    PreparationState::Error => format!("[{tag}] preparation failed{detail}").red(),
                };
                println!("\n{line}");
            }
            SessionEvent::MessageAppended {
                session_id,
                message,
            } if message.role == MessageRole::Assistant => {
                if let Some(session) = service.session(&session_id).await {
                    println!("\n{}", format!("[{}]", session.tag).bright_magenta());
                }
                render::print_message(&message);
                println!();
            }
            SessionEvent::PersistenceFailed { message } => {
                eprintln!("{}", format!("Warning: could not save state ({message})").red());
            }
            _ => {}
        }
    }
}
