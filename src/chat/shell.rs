//! The `!` shell escape.

use std::process::{Command, ExitStatus};

use crate::error::{Error, Result};

/// Prompt shown by an interactive shell started from the chat.
const SHELL_PROMPT: &str = "(exit to return) >";

/// Run `command` through `sh -c`, or start an interactive login shell when it is empty.
///
/// The child inherits the terminal.  A non-zero exit status is returned, not treated as an
/// error.
pub fn spawn_shell(command: &str) -> Result<ExitStatus> {
    let command = command.trim();
    let mut child = if command.is_empty() {
        let mut cmd = Command::new("bash");
        cmd.arg("-li").env("PS1", SHELL_PROMPT);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    };
    tracing::debug!(command = ?child, "spawning shell");
    child
        .status()
        .map_err(|err| Error::io(format!("failed to run shell command '{command}'"), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_is_reported() {
        assert!(spawn_shell("true").unwrap().success());
        assert_eq!(spawn_shell("exit 3").unwrap().code(), Some(3));
    }
}
