//! Module `file_ops`
//!
//! Streams transfer payloads over an accepted data connection: raw file bytes
//! for RETR and rendered listing lines for LIST.

use log::info;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::TransferError;
use crate::storage::DirectoryListing;
use crate::transfer::DataConnection;

/// Copies the file byte-for-byte to the data connection.
pub async fn send_file(
    conn: &mut DataConnection,
    mut file: File,
    buffer_size: usize,
) -> Result<u64, TransferError> {
    let mut buffer = vec![0u8; buffer_size];
    let mut total_bytes_sent = 0u64;

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        conn.send(&buffer[..n]).await?;
        total_bytes_sent += n as u64;
    }

    info!(
        "File download sent {} bytes to {}",
        total_bytes_sent,
        conn.peer_addr()
    );
    Ok(total_bytes_sent)
}

/// Writes each listing line as soon as it is rendered.
pub async fn send_listing(
    conn: &mut DataConnection,
    mut listing: DirectoryListing,
) -> Result<usize, TransferError> {
    let mut entries = 0usize;
    while let Some(line) = listing.next_line().await? {
        conn.send(line.as_bytes()).await?;
        entries += 1;
    }

    info!(
        "Directory listing sent {} entries to {}",
        entries,
        conn.peer_addr()
    );
    Ok(entries)
}
