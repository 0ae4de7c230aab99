//! Control commands
//!
//! Administrative commands read from the control endpoint. One command per
//! connection, as a single line of text:
//!
//! - `exit`             - stop the daemon
//! - `load <key_id>`    - load a key into the cache
//! - `remove <key_id>`  - erase one cached key
//! - `remove-all`       - erase every cached key

use std::fmt;

use crate::buffer::KeyId;
use crate::error::{KeywardError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Exit,
    Load(KeyId),
    Remove(KeyId),
    RemoveAll,
}

impl ControlCommand {
    /// Parse a command line; surrounding whitespace is ignored
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        match (verb, arg.is_empty()) {
            ("exit", true) => Ok(ControlCommand::Exit),
            ("remove-all", true) => Ok(ControlCommand::RemoveAll),
            ("load", false) => Ok(ControlCommand::Load(KeyId::from(arg))),
            ("remove", false) => Ok(ControlCommand::Remove(KeyId::from(arg))),
            ("load", true) | ("remove", true) => Err(KeywardError::Protocol(format!(
                "control command '{}' needs a key identifier",
                verb
            ))),
            _ => Err(KeywardError::Protocol(format!(
                "unrecognized control command: {:?}",
                line
            ))),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Exit => write!(f, "exit"),
            ControlCommand::Load(id) => write!(f, "load {}", id),
            ControlCommand::Remove(id) => write!(f, "remove {}", id),
            ControlCommand::RemoveAll => write!(f, "remove-all"),
        }
    }
}
