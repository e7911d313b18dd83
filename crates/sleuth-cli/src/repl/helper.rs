use std::borrow::Cow;
use std::sync::{Arc, PoisonError, RwLock};

use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use sleuth_core::session::Session;

use super::command::COMMANDS;

/// Session as offered for `/use` and `/delete` completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChoice {
    pub id: String,
    pub tag: String,
}

/// Editor helper for the investigation shell.
///
/// Completes slash commands and, after `/use` or `/delete`, session ids.
/// The session list is refreshed by the loop before each prompt.
#[derive(Clone, Default)]
pub struct SessionHelper {
    choices: Arc<RwLock<Vec<SessionChoice>>>,
}

impl SessionHelper {
    pub fn refresh(&self, sessions: &[Session]) {
        let choices = sessions
            .iter()
            .map(|s| SessionChoice {
                id: s.id.to_string(),
                tag: s.tag.clone(),
            })
            .collect();
        *self.choices.write().unwrap_or_else(PoisonError::into_inner) = choices;
    }

    fn candidates(&self, line: &str) -> (usize, Vec<Pair>) {
        let Some(rest) = line.strip_prefix('/') else {
            return (0, Vec::new());
        };

        let Some((name, arg)) = rest.split_once(' ') else {
            let pairs = COMMANDS
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.to_string(),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return (0, pairs);
        };

        if !takes_session(name) || arg.contains(' ') {
            return (0, Vec::new());
        }

        let start = line.len() - arg.len();
        let choices = self.choices.read().unwrap_or_else(PoisonError::into_inner);
        let pairs = choices
            .iter()
            .filter(|c| c.id.starts_with(arg))
            .map(|c| Pair {
                display: format!("{}  {}", short_id(&c.id), c.tag),
                replacement: c.id.clone(),
            })
            .collect();
        (start, pairs)
    }
}

fn takes_session(name: &str) -> bool {
    matches!(name, "use" | "delete" | "rm")
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn argument_hint(command: &str) -> Option<&'static str> {
    match command {
        "/new" => Some(" <address>"),
        "/use" => Some(" <n|id>"),
        "/delete" => Some(" [n|id]"),
        _ => None,
    }
}

impl Helper for SessionHelper {}

impl Completer for SessionHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(&line[..pos]))
    }
}

impl Hinter for SessionHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() || !line.starts_with('/') || line.contains(' ') {
            return None;
        }

        if let Some(hint) = argument_hint(line) {
            return Some(hint.to_string());
        }

        COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for SessionHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if !line.starts_with('/') {
            return Cow::Borrowed(line);
        }
        match line.split_once(' ') {
            Some((name, rest)) => Cow::Owned(format!("{} {}", name.bright_cyan(), rest)),
            None => Cow::Owned(line.bright_cyan().to_string()),
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(hint.bright_black().to_string())
    }

    fn highlight_char(&self, line: &str, _pos: usize, _forced: bool) -> bool {
        line.starts_with('/')
    }
}

impl Validator for SessionHelper {}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_core::session::SessionId;

    fn helper() -> SessionHelper {
        let mut first = Session::new("0xABC");
        first.id = SessionId::from("aaaa1111-0000");
        let mut second = Session::new("0xDEF");
        second.id = SessionId::from("bbbb2222-0000");

        let helper = SessionHelper::default();
        helper.refresh(&[first, second]);
        helper
    }

    fn replacements(pairs: &[Pair]) -> Vec<&str> {
        pairs.iter().map(|p| p.replacement.as_str()).collect()
    }

    #[test]
    fn test_completes_command_names() {
        let (start, pairs) = helper().candidates("/de");
        assert_eq!(start, 0);
        assert_eq!(replacements(&pairs), vec!["/delete "]);
    }

    #[test]
    fn test_completes_session_ids_after_use() {
        let (start, pairs) = helper().candidates("/use bb");
        assert_eq!(start, 5);
        assert_eq!(replacements(&pairs), vec!["bbbb2222-0000"]);
        assert_eq!(pairs[0].display, "bbbb2222  0xdef");

        let (_, pairs) = helper().candidates("/delete ");
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_no_completion_for_questions_or_new() {
        assert!(helper().candidates("what is").1.is_empty());
        assert!(helper().candidates("/new aa").1.is_empty());
    }
}
