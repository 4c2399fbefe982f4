//! Chat application module for interactive conversations.
//!
//! This module holds the pieces of the `duckchat` binary that sit around the protocol layer:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: `:` command and `!` shell-escape parsing
//! - [`render`]: terminal output
//! - [`shell`]: running shell escapes

mod commands;
mod config;
mod render;
mod shell;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, DEFAULT_BASE_URL};
pub use render::{PlainTextRenderer, Renderer};
pub use shell::spawn_shell;
