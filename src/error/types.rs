//! Error types
//!
//! Defines domain-specific error types for each module of the FTP server.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Path confinement errors raised while resolving client-supplied paths.
#[derive(Debug, Error)]
pub enum JailError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("path escapes the server root: {0}")]
    AccessDenied(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("server root unavailable: {0}")]
    RootUnavailable(#[source] io::Error),

    #[error("path too long ({0} bytes)")]
    PathTooLong(usize),
}

/// Data channel errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("data channel not initialized, PASV required")]
    UsePassiveFirst,

    #[error("failed to bind passive listener on {0}: {1}")]
    Bind(SocketAddr, #[source] io::Error),

    #[error("failed to accept data connection: {0}")]
    Accept(#[source] io::Error),

    #[error("no data connection within {0:?}")]
    AcceptTimeout(Duration),

    #[error("data connection write stalled for {0:?}")]
    WriteTimeout(Duration),

    #[error("transfer failed: {0}")]
    Io(#[from] io::Error),
}

/// Storage errors raised while preparing a transfer source.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open directory {}: {1}", .0.display())]
    OpenDirectory(PathBuf, #[source] io::Error),

    #[error("failed to open file {}: {1}", .0.display())]
    OpenFile(PathBuf, #[source] io::Error),

    #[error(transparent)]
    Jail(#[from] JailError),
}

/// Startup errors; these are the only errors that stop the process.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind control socket {0}: {1}")]
    Bind(String, #[source] io::Error),

    #[error("server root {} is not usable: {1}", .0.display())]
    Root(PathBuf, #[source] io::Error),
}
