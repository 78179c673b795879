//! Command tokens sent to a running exposure.

use core::fmt;
use core::str::FromStr;
use std::sync::mpsc::Sender;

use log::debug;

use crate::error::{bounded, ConfigError};

/// A command for the exposure worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Pause after the current layer
    Pause,
    /// Resume or confirm
    Continue,
    /// Stop the print
    Exit,
    /// Raise the platform, wait and return
    UpDown,
    /// Ask for a resin refill
    FeedMe,
    /// Refill requested with the printer button
    FeedMeByButton,
    /// Reject a prompt
    Back,
}

impl Command {
    /// Every command.
    pub const ALL: [Command; 7] = [
        Command::Pause,
        Command::Continue,
        Command::Exit,
        Command::UpDown,
        Command::FeedMe,
        Command::FeedMeByButton,
        Command::Back,
    ];

    /// Wire token of the command.
    pub const fn token(self) -> &'static str {
        match self {
            Command::Pause => "pause",
            Command::Continue => "continue",
            Command::Exit => "exit",
            Command::UpDown => "updown",
            Command::FeedMe => "feedme",
            Command::FeedMeByButton => "feedmeByButton",
            Command::Back => "back",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Command {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.token() == s)
            .ok_or_else(|| ConfigError::InvalidCommand(bounded(s)))
    }
}

/// Sending side of the command channel.
///
/// Sending never blocks. Commands sent after the worker ended are dropped.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    pub(crate) fn new(tx: Sender<Command>) -> Self {
        Self { tx }
    }

    /// Queue a command. Returns false if the worker is gone.
    pub fn send(&self, command: Command) -> bool {
        debug!("command: {}", command);
        self.tx.send(command).is_ok()
    }

    /// Parse and queue a command token.
    ///
    /// # Errors
    ///
    /// `InvalidCommand` for an unknown token.
    pub fn send_token(&self, token: &str) -> Result<bool, ConfigError> {
        Ok(self.send(token.parse()?))
    }
}
