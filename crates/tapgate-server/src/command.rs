//! Console command protocol.
//!
//! One command per line:
//!
//! ```text
//! login <user>       wait for <user>'s card
//! identify           identify whoever taps next
//! register <user>    register the next tapped card to <user>
//! tap <card>         present a card to the reader
//! ban <card>         ban a card
//! help               list commands
//! ```

use std::{fmt, str::FromStr};

use tapgate_core::{CardId, PayloadError};
use thiserror::Error;

/// Usage text printed by `help`.
pub const HELP: &str = "commands: login <user> | identify | register <user> | tap <card> | \
                        ban <card> | help";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log a user in with their card.
    Login {
        /// User to log in.
        username: String,
    },
    /// Identify the next tapped card.
    Identify,
    /// Register the next tapped card.
    Register {
        /// User to register the card to.
        username: String,
    },
    /// Present a card to the reader.
    Tap {
        /// Card placed on the antenna.
        card: CardId,
    },
    /// Ban a card.
    Ban {
        /// Card to ban.
        card: CardId,
    },
    /// Show usage.
    Help,
}

impl Command {
    /// Whether the command waits for a scan.
    pub fn needs_scan(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Identify | Self::Register { .. })
    }
}

/// A console line that is not a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Blank line.
    #[error("empty command")]
    Empty,

    /// First word is not a known command.
    #[error("unknown command {0:?}")]
    Unknown(String),

    /// Required argument is missing.
    #[error("{command} needs an argument")]
    MissingArgument {
        /// Command name.
        command: &'static str,
    },

    /// More words than the command takes.
    #[error("{command} takes no further arguments")]
    TrailingArguments {
        /// Command name.
        command: &'static str,
    },

    /// Card argument is not a card identifier.
    #[error(transparent)]
    InvalidCard(#[from] PayloadError),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(CommandError::Empty);
        };

        let (command, arg) = match name.to_ascii_lowercase().as_str() {
            "login" => ("login", words.next()),
            "register" => ("register", words.next()),
            "tap" => ("tap", words.next()),
            "ban" => ("ban", words.next()),
            "identify" => ("identify", None),
            "help" | "?" => ("help", None),
            _ => return Err(CommandError::Unknown(name.to_string())),
        };

        if words.next().is_some() {
            return Err(CommandError::TrailingArguments { command });
        }

        let required = || arg.ok_or(CommandError::MissingArgument { command });

        match command {
            "login" => Ok(Self::Login { username: required()?.to_string() }),
            "register" => Ok(Self::Register { username: required()?.to_string() }),
            "tap" => Ok(Self::Tap { card: required()?.parse()? }),
            "ban" => Ok(Self::Ban { card: required()?.parse()? }),
            "identify" => Ok(Self::Identify),
            _ => Ok(Self::Help),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username } => write!(f, "login {username}"),
            Self::Identify => write!(f, "identify"),
            Self::Register { username } => write!(f, "register {username}"),
            Self::Tap { card } => write!(f, "tap {card}"),
            Self::Ban { card } => write!(f, "ban {card}"),
            Self::Help => write!(f, "help"),
        }
    }
}
