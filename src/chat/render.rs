//! Output rendering for the chat application.
//!
//! The chat binary prints through the [`Renderer`] trait so that styling can be switched off
//! when output is piped.  [`PlainTextRenderer`] writes to stdout by default and to any
//! `Write` for tests.

use std::io::{self, Stdout, Write};

use crate::model::KnownModel;

/// ANSI escape code for cyan text (used for the model label and banner).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for dark red text (used for input warnings).
const ANSI_DARK_RED: &str = "\x1b[2;31m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering chat output.
pub trait Renderer {
    /// Print the banner shown when the chat starts.
    fn print_welcome(&mut self, version: &str, model: &str);

    /// Print a complete answer, labelled with the model that produced it.
    fn print_answer(&mut self, model: &str, text: &str);

    /// Print the alias and backend identifier of every known model.
    fn print_models(&mut self);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print a warning about the user's input.
    fn print_warning(&mut self, warning: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Consumes the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Renderer for PlainTextRenderer<W> {
    fn print_welcome(&mut self, version: &str, model: &str) {
        let banner = self.styled(
            ANSI_CYAN,
            &format!("Welcome to duckchat-{version}, model: {model}"),
        );
        self.line(&banner);
        self.line("---");
    }

    fn print_answer(&mut self, model: &str, text: &str) {
        let label = self.styled(ANSI_CYAN, model);
        self.line(&format!("{label}: {text}"));
    }

    fn print_models(&mut self) {
        for model in KnownModel::ALL {
            self.line(&format!("{} {}", model.alias(), model.model_id()));
        }
    }

    fn print_error(&mut self, error: &str) {
        let tag = self.styled(ANSI_RED, "EE:");
        self.line(&format!("{tag} {error}"));
    }

    fn print_warning(&mut self, warning: &str) {
        let warning = self.styled(ANSI_DARK_RED, warning);
        self.line(&warning);
    }

    fn print_info(&mut self, info: &str) {
        self.line(info);
    }
}
