//! FTP Command parsing
//!
//! Splits one control line into a verb and at most one argument token.
//! Verbs are matched case-sensitively; arguments containing spaces are not
//! supported, everything after the first argument token is ignored.

use crate::protocol::Command;

/// Parse a command line (terminator already stripped) into a `Command`.
pub fn parse_command(raw: &str) -> Command {
    let mut parts = raw.split_whitespace();
    let verb = parts.next().unwrap_or("");
    let arg = parts.next().unwrap_or("").to_string();

    match verb {
        "USER" => Command::USER(arg),
        "PASS" => Command::PASS(arg),
        "SYST" => Command::SYST,
        "TYPE" => Command::TYPE(arg),
        "PASV" => Command::PASV,
        "LIST" => Command::LIST,
        "RETR" => Command::RETR(arg),
        "CWD" => Command::CWD(arg),
        "CDUP" => Command::CDUP,
        "PWD" => Command::PWD,
        "QUIT" => Command::QUIT,
        other => Command::UNKNOWN(other.to_string()),
    }
}
