//! FTP Response handling
//!
//! Defines FTP response codes, the fixed reply texts clients expect, and the
//! control channel writer that delivers them.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::net::SocketAddrV4;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Standard FTP response codes
pub const DATA_OPENING: u16 = 150;
pub const OK: u16 = 200;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const CLOSING: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const PASSIVE_MODE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATHNAME_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const SERVICE_UNAVAILABLE: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const TRANSFER_ABORTED: u16 = 426;
pub const SYNTAX_ERROR: u16 = 500;
pub const FILE_UNAVAILABLE: u16 = 550;

/// A single-line control channel reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    text: Cow<'static, str>,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}\r\n", self.code, self.text)
    }
}

/// Encodes a passive endpoint as the `h1,h2,h3,h4,p1,p2` tuple of a 227 reply.
pub fn format_pasv_address(addr: SocketAddrV4) -> String {
    let [h1, h2, h3, h4] = addr.ip().octets();
    let port = addr.port();
    format!("{},{},{},{},{},{}", h1, h2, h3, h4, port >> 8, port & 0xff)
}

pub fn greeting() -> Reply {
    Reply::new(READY, "FTP server ready.")
}

pub fn need_password() -> Reply {
    Reply::new(PASSWORD_REQUIRED, "User name okay, need password.")
}

pub fn logged_in() -> Reply {
    Reply::new(LOGIN_SUCCESS, "User logged in.")
}

pub fn system_type() -> Reply {
    Reply::new(SYSTEM_TYPE, "UNIX Type: L8")
}

pub fn type_set(representation: &str) -> Reply {
    Reply::new(OK, format!("Type set to {}.", representation))
}

pub fn entering_passive_mode(addr: SocketAddrV4) -> Reply {
    Reply::new(
        PASSIVE_MODE,
        format!("Entering Passive Mode ({}).", format_pasv_address(addr)),
    )
}

pub fn about_to_open_data_connection() -> Reply {
    Reply::new(DATA_OPENING, "File status okay; about to open data connection.")
}

pub fn transfer_complete() -> Reply {
    Reply::new(TRANSFER_COMPLETE, "Transfer complete.")
}

pub fn transfer_aborted() -> Reply {
    Reply::new(TRANSFER_ABORTED, "Connection closed; transfer aborted.")
}

pub fn use_pasv_first() -> Reply {
    Reply::new(CANT_OPEN_DATA, "Use PASV first.")
}

pub fn cant_open_data_connection() -> Reply {
    Reply::new(CANT_OPEN_DATA, "Can't open data connection.")
}

pub fn failed_to_open_directory() -> Reply {
    Reply::new(FILE_UNAVAILABLE, "Failed to open directory.")
}

pub fn file_not_found() -> Reply {
    Reply::new(FILE_UNAVAILABLE, "File not found.")
}

pub fn directory_not_found() -> Reply {
    Reply::new(FILE_UNAVAILABLE, "Directory not found.")
}

pub fn access_denied() -> Reply {
    Reply::new(FILE_UNAVAILABLE, "Access denied.")
}

pub fn internal_error() -> Reply {
    Reply::new(FILE_UNAVAILABLE, "Internal error.")
}

pub fn directory_changed() -> Reply {
    Reply::new(FILE_ACTION_OK, "Directory changed.")
}

/// 257 reply for PWD; embedded quotes are doubled as RFC 959 requires.
pub fn current_directory(path: &str) -> Reply {
    Reply::new(
        PATHNAME_CREATED,
        format!("\"{}\" is current directory.", path.replace('"', "\"\"")),
    )
}

pub fn goodbye() -> Reply {
    Reply::new(CLOSING, "Goodbye.")
}

pub fn unknown_command() -> Reply {
    Reply::new(SYNTAX_ERROR, "Unknown command.")
}

pub fn command_too_long() -> Reply {
    Reply::new(SYNTAX_ERROR, "Command line too long.")
}

pub fn idle_timeout() -> Reply {
    Reply::new(SERVICE_UNAVAILABLE, "Timeout.")
}

pub fn too_many_connections() -> Reply {
    Reply::new(SERVICE_UNAVAILABLE, "Too many connections, try again later.")
}

/// Write half of the control connection.
///
/// Every reply is flushed before `send` returns, so a reply is on the wire
/// before the caller touches the data channel. A peer that stops draining
/// its receive buffer fails the send with `TimedOut` once `write_timeout`
/// elapses.
pub struct ControlChannel<W> {
    writer: W,
    write_timeout: Duration,
}

impl<W: AsyncWrite + Unpin> ControlChannel<W> {
    pub fn new(writer: W, write_timeout: Duration) -> Self {
        Self {
            writer,
            write_timeout,
        }
    }

    pub async fn send(&mut self, reply: &Reply) -> io::Result<()> {
        let line = reply.to_string();
        let limit = self.write_timeout;
        let writer = &mut self.writer;
        let write = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };

        match timeout(limit, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("control reply stalled for {:?}", limit),
            )),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}
