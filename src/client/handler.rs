use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::client::Session;
use crate::config::ServerConfig;
use crate::protocol::responses;
use crate::protocol::{Command, CommandStatus, handle_command, parse_command};

/// One control line as read off the socket.
#[derive(Debug, PartialEq, Eq)]
pub enum ControlLine {
    Line(String),
    TooLong,
    Eof,
}

/// Handles one FTP control connection until QUIT, EOF, idle timeout, or a
/// control channel I/O error.
///
/// The session, and with it any pending data channel listener, is dropped
/// when this returns.
pub async fn handle_client(stream: TcpStream, root: PathBuf, config: Arc<ServerConfig>) {
    let (peer_addr, local_ip) = match (stream.peer_addr(), stream.local_addr()) {
        (Ok(peer), Ok(local)) => (peer, local.ip()),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to read connection addresses: {}", e);
            return;
        }
    };

    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut session = Session::new(
        write_half,
        root,
        local_ip,
        peer_addr,
        config.control_write_timeout(),
    );

    if let Err(e) = run_session(&mut reader, &mut session, &config).await {
        error!("Control connection to {} failed: {}", peer_addr, e);
    }

    session.close();
    info!("Client {} disconnected", peer_addr);
}

/// Greets the client, then reads and dispatches commands one at a time.
///
/// Only control channel I/O failures are returned as errors; command
/// failures are replied to and the loop continues.
pub async fn run_session<R, W>(
    reader: &mut R,
    session: &mut Session<W>,
    config: &ServerConfig,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let client_addr = session.peer_addr();
    session.reply(&responses::greeting()).await?;

    loop {
        let line = match timeout(
            config.idle_timeout(),
            read_command_line(reader, config.max_command_length),
        )
        .await
        {
            Ok(line) => line?,
            Err(_) => {
                warn!("Client {} idle for {:?}", client_addr, config.idle_timeout());
                session.reply(&responses::idle_timeout()).await?;
                return Ok(());
            }
        };

        let line = match line {
            ControlLine::Line(line) => line,
            ControlLine::TooLong => {
                warn!("Client {} sent an over-long command line", client_addr);
                session.reply(&responses::command_too_long()).await?;
                continue;
            }
            ControlLine::Eof => {
                info!("Connection closed by client {}", client_addr);
                return Ok(());
            }
        };

        let command = parse_command(&line);
        match &command {
            Command::PASS(_) => debug!("Received from {}: PASS ****", client_addr),
            other => debug!("Received from {}: {:?}", client_addr, other),
        }

        // a transfer must not outlive the control connection that asked for it
        let result = tokio::select! {
            biased;
            result = handle_command(session, &command, config) => result?,
            _ = control_closed(reader) => {
                warn!(
                    "Client {} closed the control connection during {:?}, abandoning it",
                    client_addr, command
                );
                return Ok(());
            }
        };
        if let Some(reply) = &result.message {
            session.reply(reply).await?;
        }

        match result.status {
            CommandStatus::CloseConnection => {
                info!("Client {} requested to quit", client_addr);
                return Ok(());
            }
            CommandStatus::Failure(reason) => {
                debug!("Command from {} failed: {}", client_addr, reason);
            }
            CommandStatus::Success => {}
        }
    }
}

/// Completes once the control connection reaches EOF or fails. Input the
/// client sends ahead stays buffered for the next read.
async fn control_closed<R>(reader: &mut R)
where
    R: AsyncBufRead + Unpin,
{
    match reader.fill_buf().await {
        Ok(buf) if buf.is_empty() => {}
        Err(e) => debug!("Control connection read failed: {}", e),
        Ok(_) => std::future::pending::<()>().await,
    }
}

/// Reads one CRLF- or LF-terminated line of at most `max_len` bytes
/// (terminator excluded). Longer lines are consumed and discarded.
pub async fn read_command_line<R>(
    reader: &mut R,
    max_len: usize,
) -> std::io::Result<ControlLine>
where
    R: AsyncBufRead + Unpin,
{
    let limit = (max_len + 2) as u64;
    let mut buf = Vec::new();
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(ControlLine::Eof);
    }

    if !buf.ends_with(b"\n") && n as u64 == limit {
        discard_line(reader).await?;
        return Ok(ControlLine::TooLong);
    }

    if buf.ends_with(b"\n") {
        buf.pop();
    }
    if buf.ends_with(b"\r") {
        buf.pop();
    }
    if buf.len() > max_len {
        return Ok(ControlLine::TooLong);
    }

    Ok(ControlLine::Line(String::from_utf8_lossy(&buf).into_owned()))
}

async fn discard_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut scratch = Vec::new();
    loop {
        scratch.clear();
        let n = (&mut *reader).take(4096).read_until(b'\n', &mut scratch).await?;
        if n == 0 || scratch.ends_with(b"\n") {
            return Ok(());
        }
    }
}
