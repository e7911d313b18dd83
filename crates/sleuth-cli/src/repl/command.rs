/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    New(String),
    List,
    Use(String),
    /// Delete the given session, or the active one
    Delete(Option<String>),
    History,
    Help,
    Quit,
    /// Plain text, sent to the active session
    Ask(String),
    Empty,
    /// A slash command used incorrectly; carries the usage line
    Usage(&'static str),
    Unknown(String),
}

pub const COMMANDS: &[&str] = &["/new", "/list", "/use", "/delete", "/history", "/help"];

pub const HELP: &str = "\
/new <address>     start investigating an address
/list              list sessions (* marks the active one)
/use <n|id>        switch to a session
/delete [n|id]     delete a session (default: the active one)
/history           show the active session's messages
/help              show this help
quit               exit

Anything else is sent as a question to the active session.";

pub fn parse(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    if line == "quit" || line == "exit" {
        return ReplCommand::Quit;
    }
    if !line.starts_with('/') {
        return ReplCommand::Ask(line.to_string());
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    match name {
        "/new" if rest.is_empty() => ReplCommand::Usage("/new <address>"),
        "/new" => ReplCommand::New(rest.to_string()),
        "/list" | "/ls" => ReplCommand::List,
        "/use" if rest.is_empty() => ReplCommand::Usage("/use <n|id>"),
        "/use" => ReplCommand::Use(rest.to_string()),
        "/delete" | "/rm" if rest.is_empty() => ReplCommand::Delete(None),
        "/delete" | "/rm" => ReplCommand::Delete(Some(rest.to_string())),
        "/history" => ReplCommand::History,
        "/help" | "/?" => ReplCommand::Help,
        "/quit" | "/exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    }
}
