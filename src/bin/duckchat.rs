//! Interactive chat with the DuckDuckGo chat API.
//!
//! # Usage
//!
//! ```bash
//! # Chat with the default model
//! duckchat
//!
//! # Pick a model by alias
//! duckchat --model claude-3-haiku
//!
//! # Ask one question about a file and exit
//! duckchat --one-shot "Explain this code:" --file src/main.rs
//!
//! # Show what the client is doing
//! duckchat --debug
//! ```
//!
//! # Commands
//!
//! While chatting:
//! - `:newhist` - Start a new conversation history
//! - `:listmodels` - Print available models
//! - `:setmodel [MODEL]` - Change the model, or print it
//! - `:help` - Show available commands
//! - `:quit` - Exit the application
//! - `!` / `!command` - Start a shell, or run a command

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use duckchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, help_text, parse_command,
    spawn_shell,
};
use duckchat::{ChatSession, Error, HttpTransport};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main entry point for the duckchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("duckchat [OPTIONS]");
    let config = match ChatConfig::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("duckchat: {err}");
            std::process::exit(2);
        }
    };
    init_logging(config.debug);

    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    if config.list_models {
        renderer.print_models();
        return Ok(());
    }

    renderer.print_welcome(VERSION, config.model.alias());

    // Ctrl+C while a request is in flight ends the program; at the prompt rustyline sees it.
    ctrlc::set_handler(|| {
        println!();
        std::process::exit(0);
    })?;

    let mut session = ChatSession::with_timeout(
        config.base_url.clone(),
        config.model.model_id(),
        config.timeout,
    );
    if let Err(err) = session.initialize().await {
        report(&mut renderer, &err);
        std::process::exit(1);
    }

    if config.one_shot.is_some() {
        let prompt = match config.one_shot_prompt() {
            Ok(Some(prompt)) => prompt,
            Ok(None) => return Ok(()),
            Err(err) => {
                report(&mut renderer, &err);
                std::process::exit(1);
            }
        };
        match session.prompt(&prompt).await {
            Ok(answer) => renderer.print_answer(session.model(), &answer),
            Err(err) => {
                report(&mut renderer, &err);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let mut rl = DefaultEditor::new()?;
    loop {
        let line = match rl.readline("you: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            renderer.print_warning("Your prompt is empty!");
            continue;
        }
        let _ = rl.add_history_entry(line);

        if let Some(cmd) = parse_command(line) {
            if !run_command(cmd, &mut session, &mut renderer) {
                break;
            }
            continue;
        }

        match session.prompt(line).await {
            Ok(answer) => renderer.print_answer(session.model(), &answer),
            Err(err) => report(&mut renderer, &err),
        }
    }

    Ok(())
}

/// Runs one command.  Returns false when the chat should end.
fn run_command(
    cmd: ChatCommand,
    session: &mut ChatSession<HttpTransport>,
    renderer: &mut dyn Renderer,
) -> bool {
    match cmd {
        ChatCommand::Quit => return false,
        ChatCommand::NewHistory => {
            session.clear();
            renderer.print_info("Started a new conversation history.");
        }
        ChatCommand::ListModels => renderer.print_models(),
        ChatCommand::SetModel(model) => {
            session.set_model(model.model_id());
            renderer.print_info(&format!("Model changed to: {}", model.alias()));
        }
        ChatCommand::ShowModel => renderer.print_info(session.model()),
        ChatCommand::Help => renderer.print_info(help_text()),
        ChatCommand::Shell(command) => {
            if let Err(err) = spawn_shell(&command) {
                renderer.print_error(&err.to_string());
            }
        }
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    true
}

fn report(renderer: &mut dyn Renderer, err: &Error) {
    renderer.print_error(&err.to_string());
    if let Some(body) = err.body().filter(|body| !body.is_empty()) {
        renderer.print_error(body);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
