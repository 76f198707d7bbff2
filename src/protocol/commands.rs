//! Module `command`
//!
//! Defines the FTP commands understood by the session engine and the
//! structures describing the outcome of dispatching one of them.

use crate::protocol::responses::Reply;

/// Represents an FTP command parsed from the client input.
///
/// Commands that take an argument store the single argument token; an absent
/// argument is stored as an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    USER(String), // Username, acknowledged but not validated
    PASS(String), // Password, acknowledged but not validated
    SYST,
    TYPE(String), // Representation type, not enforced
    PASV,         // Enter passive mode
    LIST,
    RETR(String), // Retrieve/download file
    CWD(String),  // Change working directory
    CDUP,
    PWD,
    QUIT,
    UNKNOWN(String), // Unrecognized verb, kept for logging
}

/// Represents the outcome status of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Struct encapsulating the full result of a command execution.
///
/// `message` is the final reply; intermediate replies (150 during transfers)
/// are written by the handler itself before it returns.
#[derive(Debug)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub message: Option<Reply>,
}

impl CommandResult {
    pub fn success(reply: Reply) -> Self {
        Self {
            status: CommandStatus::Success,
            message: Some(reply),
        }
    }

    pub fn failure(reason: impl Into<String>, reply: Reply) -> Self {
        Self {
            status: CommandStatus::Failure(reason.into()),
            message: Some(reply),
        }
    }

    pub fn close(reply: Reply) -> Self {
        Self {
            status: CommandStatus::CloseConnection,
            message: Some(reply),
        }
    }
}
