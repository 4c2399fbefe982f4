//! Command parsing for the chat application.
//!
//! Input starting with `:` controls the session and input starting with `!` escapes to the
//! shell.  Neither is sent to the chat endpoint.

use crate::model::KnownModel;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Start a new conversation history.
    NewHistory,

    /// List the available models.
    ListModels,

    /// Switch to another model.
    SetModel(KnownModel),

    /// Print the current model.
    ShowModel,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Run a shell command; an empty command starts an interactive shell.
    Shell(String),

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be sent as a
/// prompt.
///
/// # Examples
///
/// ```
/// # use duckchat::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command(":newhist"), Some(ChatCommand::NewHistory));
/// assert_eq!(parse_command("!ls"), Some(ChatCommand::Shell("ls".to_string())));
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if let Some(shell) = input.strip_prefix('!') {
        return Some(ChatCommand::Shell(shell.trim().to_string()));
    }

    let rest = input.strip_prefix(':')?;
    let mut parts = rest.split_whitespace();
    let command = parts.next().unwrap_or_default().to_lowercase();
    let argument = parts.next();

    let result = match command.as_str() {
        "newhist" | "clear" => ChatCommand::NewHistory,
        "listmodels" | "models" => ChatCommand::ListModels,
        "setmodel" | "model" => match argument {
            Some(alias) => match alias.parse::<KnownModel>() {
                Ok(model) => ChatCommand::SetModel(model),
                Err(err) => ChatCommand::Invalid(err.to_string()),
            },
            None => ChatCommand::ShowModel,
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "" => ChatCommand::Invalid("missing command after ':'".to_string()),
        other => ChatCommand::Invalid(format!("Unknown command ':{other}'; try :help")),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  :newhist               Start a new conversation history
  :listmodels            Print available models
  :setmodel [MODEL]      Set the model; with no argument, print the current model
  :help                  Display this help
  :quit                  Exit the chat
  !                      Start an interactive shell
  !<command>             Run a shell command"#
}
