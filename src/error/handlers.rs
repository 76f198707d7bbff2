//! Error handlers
//!
//! Translates domain errors into the FTP replies sent on the control channel.

use log::{error, warn};

use crate::error::types::{JailError, StorageError, TransferError};
use crate::protocol::responses::{self, Reply};

/// Reply for a failed CWD/CDUP resolution.
pub fn directory_error_reply(err: &JailError) -> Reply {
    match err {
        JailError::AccessDenied(path) => {
            warn!("Rejected directory change outside root: {}", path);
            responses::access_denied()
        }
        JailError::RootUnavailable(e) => {
            error!("Server root unavailable: {}", e);
            responses::internal_error()
        }
        JailError::NotFound(_)
        | JailError::NotADirectory(_)
        | JailError::NotAFile(_)
        | JailError::PathTooLong(_) => responses::directory_not_found(),
    }
}

/// Reply for a failed RETR source lookup.
pub fn file_error_reply(err: &StorageError) -> Reply {
    match err {
        StorageError::Jail(JailError::AccessDenied(path)) => {
            warn!("Rejected file access outside root: {}", path);
            responses::access_denied()
        }
        StorageError::Jail(JailError::RootUnavailable(e)) => {
            error!("Server root unavailable: {}", e);
            responses::internal_error()
        }
        StorageError::Jail(_) => responses::file_not_found(),
        StorageError::OpenFile(path, e) => {
            warn!("Failed to open {}: {}", path.display(), e);
            responses::file_not_found()
        }
        StorageError::OpenDirectory(path, e) => {
            error!("Failed to open directory {}: {}", path.display(), e);
            responses::failed_to_open_directory()
        }
    }
}

/// Reply for a data channel failure that happened before any data was sent.
pub fn transfer_error_reply(err: &TransferError) -> Reply {
    match err {
        TransferError::UsePassiveFirst => responses::use_pasv_first(),
        TransferError::WriteTimeout(_) | TransferError::Io(_) => {
            error!("Data transfer aborted: {}", err);
            responses::transfer_aborted()
        }
        TransferError::Bind(..) | TransferError::Accept(_) | TransferError::AcceptTimeout(_) => {
            error!("Data connection unavailable: {}", err);
            responses::cant_open_data_connection()
        }
    }
}
