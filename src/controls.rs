//! Text command controls read from standard input

use std::io::BufRead;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::shared::UiEvent;

/// A user command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    TogglePause,
    Swap,
    /// Select the source currency
    From(String),
    /// Select the target currency
    To(String),
    Status,
    Quit,
}

/// Parses a command line like "pause", "p", "from eur", "TO JPY"
pub fn parse_command(line: &str) -> Result<ControlCommand> {
    let mut parts = line.split_whitespace();
    let verb = parts
        .next()
        .ok_or_else(|| anyhow!("Empty command"))?
        .to_lowercase();
    let argument = parts.next();

    if parts.next().is_some() {
        return Err(anyhow!("Too many arguments in command: {}", line.trim()));
    }

    let command = match (verb.as_str(), argument) {
        ("pause", None) => ControlCommand::Pause,
        ("resume", None) => ControlCommand::Resume,
        ("toggle" | "p", None) => ControlCommand::TogglePause,
        ("swap" | "s", None) => ControlCommand::Swap,
        ("status", None) => ControlCommand::Status,
        ("quit" | "q" | "exit", None) => ControlCommand::Quit,
        ("from", Some(code)) => ControlCommand::From(code.to_uppercase()),
        ("to", Some(code)) => ControlCommand::To(code.to_uppercase()),
        ("from" | "to", None) => return Err(anyhow!("'{}' needs a currency code", verb)),
        _ => return Err(anyhow!("Unknown command: {}", line.trim())),
    };

    Ok(command)
}

/// Forward parsed commands from `reader` until quit or end of input.
///
/// End of input sends [`UiEvent::Shutdown`]; unparsable lines are logged and skipped.
pub fn forward_commands<R: BufRead>(reader: R, events: &Sender<UiEvent>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read control input: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(command) => {
                debug!("Control command: {:?}", command);
                let quit = command == ControlCommand::Quit;
                if events.send(UiEvent::Control(command)).is_err() || quit {
                    return;
                }
            }
            Err(e) => warn!("{} (commands: pause, resume, toggle, swap, from <CODE>, to <CODE>, status, quit)", e),
        }
    }

    let _ = events.send(UiEvent::Shutdown);
}

/// Read commands from stdin on a dedicated thread
pub fn spawn_stdin_controls(events: Sender<UiEvent>) -> Result<JoinHandle<()>> {
    info!("Controls: pause | resume | toggle (p) | swap (s) | from <CODE> | to <CODE> | status | quit (q)");

    std::thread::Builder::new()
        .name("controls".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            forward_commands(stdin.lock(), &events);
        })
        .context("Failed to spawn control input thread")
}
