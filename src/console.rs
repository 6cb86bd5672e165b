//! Terminal command input
//!
//! Lines are read on a plain OS thread and forwarded over a channel. A
//! blocking read never sits on the runtime's blocking pool, so the process
//! can exit as soon as the interview result is printed.

use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::session::SessionHandle;

/// What one typed line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    Submit,
    Retry,
    /// Ask before ending
    ConfirmEnd,
    End,
    Continue,
    Quit,
    Unknown(String),
}

/// Interprets typed lines, including the end-interview confirmation
#[derive(Debug, Default)]
pub struct CommandConsole {
    confirming_end: bool,
}

impl CommandConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interpret(&mut self, line: &str) -> ConsoleAction {
        let command = line.trim().to_lowercase();

        if self.confirming_end {
            self.confirming_end = false;
            return match command.as_str() {
                "y" | "yes" => ConsoleAction::End,
                _ => ConsoleAction::Continue,
            };
        }

        match command.as_str() {
            "" | "s" | "submit" => ConsoleAction::Submit,
            "r" | "retry" => ConsoleAction::Retry,
            "e" | "end" => {
                self.confirming_end = true;
                ConsoleAction::ConfirmEnd
            }
            "q" | "quit" => ConsoleAction::Quit,
            _ => ConsoleAction::Unknown(command),
        }
    }
}

/// Forward lines from a blocking reader on a detached thread
///
/// The channel closes at end of input or on a read error. The thread is
/// never joined; it ends with the reader or with the process.
pub fn spawn_line_reader<R>(reader: R) -> mpsc::UnboundedReceiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    let spawned = std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("Console input closed");
        });

    if let Err(e) = spawned {
        warn!("Console input unavailable: {}", e);
    }

    rx
}

/// Drive a session from typed commands until quit or end of input
pub async fn run_console(handle: SessionHandle, mut lines: mpsc::UnboundedReceiver<String>) {
    let mut console = CommandConsole::new();

    while let Some(line) = lines.recv().await {
        match console.interpret(&line) {
            ConsoleAction::Submit => handle.stop_and_submit(),
            ConsoleAction::Retry => handle.retry(),
            ConsoleAction::ConfirmEnd => {
                println!("Are you sure you want to end the interview now? [y/N]")
            }
            ConsoleAction::End => handle.end_interview(),
            ConsoleAction::Continue => println!("-- Continuing interview"),
            ConsoleAction::Quit => {
                handle.shutdown();
                break;
            }
            ConsoleAction::Unknown(other) => println!("Unknown command: {}", other),
        }
    }
}
