//! Terminal formatting shared by the REPL and the one-shot commands.

use colored::Colorize;
use sleuth_core::session::{Message, MessageRole, PreparationState, Session, SessionId};

pub fn status_label(session: &Session) -> String {
    let label = match session.status {
        PreparationState::Preparing => "preparing".yellow(),
        PreparationState::Done => "ready".green(),
        PreparationState::Error => "error".red(),
    };
    if session.pending {
        format!("{} {}", label, "(waiting for answer)".bright_black())
    } else {
        label.to_string()
    }
}

pub fn print_sessions(sessions: &[Session], active: Option<&SessionId>) {
    if sessions.is_empty() {
        println!("{}", "No sessions. Start one with /new <address>.".bright_black());
        return;
    }

    for (index, session) in sessions.iter().enumerate() {
        let marker = if Some(&session.id) == active { "*" } else { " " };
        println!(
            "{} {:>2}. {}  {}  {}",
            marker.bright_magenta().bold(),
            index + 1,
            session.tag.bold(),
            status_label(session),
            session.subject_address.bright_black(),
        );
        if let Some(message) = &session.status_message {
            println!("       {}", message.bright_black());
        }
    }
}

pub fn print_message(message: &Message) {
    match message.role {
        MessageRole::User => println!("{}", format!("> {}", message.content).green()),
        MessageRole::Assistant => {
            for line in message.content.lines() {
                println!("{}", line.bright_blue());
            }
            if let Some(citations) = &message.citations {
                println!("{}", format!("Sources ({}):", citations.len()).bright_black());
                for (index, citation) in citations.iter().enumerate() {
                    let reference = citation
                        .reference
                        .as_deref()
                        .map(|r| format!(" [{r}]"))
                        .unwrap_or_default();
                    println!(
                        "{}",
                        format!("  {}. {}{}", index + 1, first_line(&citation.content), reference)
                            .bright_black()
                    );
                }
            }
        }
    }
}

pub fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("{}", "No messages yet.".bright_black());
        return;
    }
    for message in messages {
        print_message(message);
        println!();
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
