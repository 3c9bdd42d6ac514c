//! Line-oriented command input.
//!
//! Frontends that read whole lines (terminal, simulation scripts) turn them
//! into [`UserIntent`]s here. Plain text is a message; a leading `/` starts a
//! command. `//` escapes a message that begins with a slash.

use thiserror::Error;

use crate::UserIntent;

/// Command summary shown by `/help`.
pub const HELP: &str = "/global | /open <user id or name> | /find <name> | /show | /hide | \
                        /focus | /blur | /quit";

/// Input that is neither a message nor a known command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Command not recognized.
    #[error("unknown command /{0} (try /help)")]
    UnknownCommand(String),

    /// Command needs an argument.
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
}

/// Parse one input line. Blank lines yield `None`.
///
/// Message text is kept as typed. Commands and their arguments are trimmed.
///
/// # Errors
///
/// - `InputError::UnknownCommand` for an unrecognized `/command`
/// - `InputError::MissingArgument` for `/open` or `/find` without argument
pub fn parse_line(line: &str) -> Result<Option<UserIntent>, InputError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if let Some(escaped) = line.trim_start().strip_prefix("//") {
        return Ok(Some(UserIntent::Send(format!("/{escaped}"))));
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return Ok(Some(UserIntent::Send(line.to_string())));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    let intent = match name {
        "global" | "g" => UserIntent::OpenGlobal,
        "open" | "o" => UserIntent::Open { target: required(arg, "open")? },
        "find" | "f" => UserIntent::Search { query: required(arg, "find")? },
        "show" => UserIntent::ShowWidget,
        "hide" => UserIntent::HideWidget,
        "focus" => UserIntent::Focus(true),
        "blur" => UserIntent::Focus(false),
        "help" | "h" => UserIntent::Help,
        "quit" | "q" => UserIntent::Quit,
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(Some(intent))
}

fn required(arg: &str, command: &'static str) -> Result<String, InputError> {
    if arg.is_empty() { Err(InputError::MissingArgument(command)) } else { Ok(arg.to_string()) }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse_line("  hello there "), Ok(Some(UserIntent::Send("  hello there ".into()))));
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse_line("   "), Ok(None));
    }

    #[test]
    fn commands() {
        assert_eq!(parse_line("/global"), Ok(Some(UserIntent::OpenGlobal)));
        assert_eq!(parse_line("/open sam"), Ok(Some(UserIntent::Open { target: "sam".into() })));
        assert_eq!(parse_line("/f  al "), Ok(Some(UserIntent::Search { query: "al".into() })));
        assert_eq!(parse_line("/blur"), Ok(Some(UserIntent::Focus(false))));
        assert_eq!(parse_line("/q"), Ok(Some(UserIntent::Quit)));
    }

    #[test]
    fn double_slash_escapes() {
        assert_eq!(parse_line("//shrug"), Ok(Some(UserIntent::Send("/shrug".into()))));
    }

    #[test]
    fn bad_commands() {
        assert_eq!(parse_line("/open"), Err(InputError::MissingArgument("open")));
        assert_eq!(parse_line("/dance"), Err(InputError::UnknownCommand("dance".into())));
    }

    proptest! {
        #[test]
        fn text_without_slash_is_sent_verbatim(text in "[a-zA-Z0-9 ,.!?]{1,40}") {
            prop_assume!(!text.trim().is_empty());
            prop_assert_eq!(parse_line(&text), Ok(Some(UserIntent::Send(text.clone()))));
        }
    }
}
