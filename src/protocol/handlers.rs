//! Command handlers module.
//!
//! Routes a parsed command to its handler. Each handler returns the final
//! reply in a [`CommandResult`]; LIST and RETR additionally write the 150
//! preliminary reply themselves once the data connection is up, so it always
//! precedes the first data byte, and the 226 is only produced after the data
//! connection has been shut down.

use std::net::{Ipv4Addr, SocketAddrV4};

use log::{error, info, warn};
use tokio::io::AsyncWrite;

use crate::client::Session;
use crate::config::ServerConfig;
use crate::error::TransferError;
use crate::error::handlers::{directory_error_reply, file_error_reply, transfer_error_reply};
use crate::navigate::{self, PARENT_DIRECTORY};
use crate::protocol::responses;
use crate::protocol::{Command, CommandResult};
use crate::storage::{open_directory, prepare_file_retrieval};
use crate::transfer::{DataConnection, PassiveListener, send_file, send_listing};

/// Dispatches a received FTP command to its corresponding handler.
///
/// # Returns
///
/// * `Ok(CommandResult)` - outcome and final reply, not yet sent
/// * `Err(io::Error)` - the control channel failed; the session must end
pub async fn handle_command<W: AsyncWrite + Unpin>(
    session: &mut Session<W>,
    command: &Command,
    config: &ServerConfig,
) -> std::io::Result<CommandResult> {
    let result = match command {
        Command::USER(username) => handle_cmd_user(session, username),
        Command::PASS(_) => handle_cmd_pass(session),
        Command::SYST => CommandResult::success(responses::system_type()),
        Command::TYPE(representation) => handle_cmd_type(representation),
        Command::PASV => handle_cmd_pasv(session, config).await,
        Command::LIST => handle_cmd_list(session, config).await?,
        Command::RETR(filename) => handle_cmd_retr(session, filename, config).await?,
        Command::CWD(path) => handle_cmd_cwd(session, path).await,
        Command::CDUP => handle_cmd_cwd(session, PARENT_DIRECTORY).await,
        Command::PWD => handle_cmd_pwd(session),
        Command::QUIT => handle_cmd_quit(session),
        Command::UNKNOWN(verb) => handle_cmd_unknown(verb),
    };
    Ok(result)
}

/// Handles the USER command. Credentials are acknowledged, never checked.
fn handle_cmd_user<W: AsyncWrite + Unpin>(
    session: &mut Session<W>,
    username: &str,
) -> CommandResult {
    let username = (!username.is_empty()).then(|| username.to_string());
    session.set_username(username);
    CommandResult::success(responses::need_password())
}

/// Handles the PASS command.
fn handle_cmd_pass<W: AsyncWrite + Unpin>(session: &mut Session<W>) -> CommandResult {
    session.set_logged_in(true);
    info!(
        "Client {} logged in as {}",
        session.peer_addr(),
        session.username().unwrap_or("anonymous")
    );
    CommandResult::success(responses::logged_in())
}

/// Handles the TYPE command. The representation type is echoed, not enforced.
fn handle_cmd_type(representation: &str) -> CommandResult {
    let representation = if representation.is_empty() {
        "I".to_string()
    } else {
        representation.to_ascii_uppercase()
    };
    CommandResult::success(responses::type_set(&representation))
}

/// Handles the PASV command: binds a fresh listener on an ephemeral port and
/// reports the address the client should connect to.
async fn handle_cmd_pasv<W: AsyncWrite + Unpin>(
    session: &mut Session<W>,
    config: &ServerConfig,
) -> CommandResult {
    let bind_ip = match (session.passive_bind_ip(), config.passive_address) {
        (Some(ip), _) => ip,
        (None, Some(_)) => Ipv4Addr::UNSPECIFIED,
        (None, None) => {
            warn!(
                "Client {} reached us over IPv6 and no passive_address is configured",
                session.peer_addr()
            );
            return CommandResult::failure(
                "no IPv4 address to advertise",
                responses::cant_open_data_connection(),
            );
        }
    };

    match session.data_channel_mut().open_passive(bind_ip).await {
        Ok(bound) => {
            let advertised_ip = config.passive_address.unwrap_or(*bound.ip());
            let advertised = SocketAddrV4::new(advertised_ip, bound.port());
            info!(
                "Client {} bound to data socket {} in PASV mode (advertised {})",
                session.peer_addr(),
                bound,
                advertised
            );
            CommandResult::success(responses::entering_passive_mode(advertised))
        }
        Err(e) => {
            let reply = transfer_error_reply(&e);
            CommandResult::failure(e.to_string(), reply)
        }
    }
}

/// Accepts the data connection for a transfer and announces it with 150.
///
/// The listener has already been taken out of the session, so the channel is
/// idle again whatever happens here.
async fn open_transfer<W: AsyncWrite + Unpin>(
    session: &mut Session<W>,
    listener: PassiveListener,
    config: &ServerConfig,
) -> std::io::Result<Result<DataConnection, CommandResult>> {
    match listener.accept_once(config.transfer_timeouts()).await {
        Ok(conn) => {
            session
                .reply(&responses::about_to_open_data_connection())
                .await?;
            Ok(Ok(conn))
        }
        Err(e) => {
            let reply = transfer_error_reply(&e);
            Ok(Err(CommandResult::failure(e.to_string(), reply)))
        }
    }
}

/// Shuts the data connection down and turns the transfer outcome into the
/// final reply.
async fn finish_transfer(
    conn: DataConnection,
    outcome: Result<(), TransferError>,
) -> CommandResult {
    let peer = conn.peer_addr();
    let closed = conn.close().await;

    match outcome.and(closed) {
        Ok(bytes) => {
            info!("Data connection to {} closed after {} bytes", peer, bytes);
            CommandResult::success(responses::transfer_complete())
        }
        Err(e) => {
            error!("Transfer to {} aborted: {}", peer, e);
            CommandResult::failure(e.to_string(), responses::transfer_aborted())
        }
    }
}

/// Handles the LIST command: streams the current directory's listing over
/// the data channel.
async fn handle_cmd_list<W: AsyncWrite + Unpin>(
    session: &mut Session<W>,
    config: &ServerConfig,
) -> std::io::Result<CommandResult> {
    // 1. Data channel must be listening; taking it makes the channel single-use
    let listener = match session.data_channel_mut().take_listener() {
        Ok(listener) => listener,
        Err(e) => {
            return Ok(CommandResult::failure(e.to_string(), transfer_error_reply(&e)));
        }
    };

    // 2. Open the directory before committing to a transfer
    let listing = match open_directory(session.current_dir()).await {
        Ok(listing) => listing,
        Err(e) => {
            return Ok(CommandResult::failure(e.to_string(), file_error_reply(&e)));
        }
    };

    // 3. Accept the data connection, then 150
    let mut conn = match open_transfer(session, listener, config).await? {
        Ok(conn) => conn,
        Err(result) => return Ok(result),
    };

    info!(
        "Client {} listing {}",
        session.peer_addr(),
        session.current_virtual_path()
    );

    // 4. Stream, close, then 226
    let outcome = send_listing(&mut conn, listing).await.map(|_| ());
    Ok(finish_transfer(conn, outcome).await)
}

/// Handles the RETR command: streams the file's exact bytes over the data
/// channel.
async fn handle_cmd_retr<W: AsyncWrite + Unpin>(
    session: &mut Session<W>,
    filename: &str,
    config: &ServerConfig,
) -> std::io::Result<CommandResult> {
    // 1. Data channel must be listening
    let listener = match session.data_channel_mut().take_listener() {
        Ok(listener) => listener,
        Err(e) => {
            return Ok(CommandResult::failure(e.to_string(), transfer_error_reply(&e)));
        }
    };

    // 2. Resolve and open the file inside the jail
    let file = match prepare_file_retrieval(session.jail(), session.current_dir(), filename).await
    {
        Ok(file) => file,
        Err(e) => {
            return Ok(CommandResult::failure(e.to_string(), file_error_reply(&e)));
        }
    };

    // 3. Accept the data connection, then 150
    let mut conn = match open_transfer(session, listener, config).await? {
        Ok(conn) => conn,
        Err(result) => return Ok(result),
    };

    info!(
        "Client {} retrieving {} from {}",
        session.peer_addr(),
        filename,
        session.current_virtual_path()
    );

    // 4. Stream, close, then 226
    let outcome = send_file(&mut conn, file, config.buffer_size)
        .await
        .map(|_| ());
    Ok(finish_transfer(conn, outcome).await)
}

/// Handles CWD and CDUP: the current directory only changes when the jail
/// accepts the target as an existing directory.
async fn handle_cmd_cwd<W: AsyncWrite + Unpin>(
    session: &mut Session<W>,
    path: &str,
) -> CommandResult {
    match navigate::change_directory(session.jail(), session.current_dir(), path).await {
        Ok(new_dir) => {
            session.set_current_dir(new_dir);
            CommandResult::success(responses::directory_changed())
        }
        Err(e) => {
            warn!("Client {} CWD {} failed: {}", session.peer_addr(), path, e);
            let reply = directory_error_reply(&e);
            CommandResult::failure(e.to_string(), reply)
        }
    }
}

/// Handles the PWD command: reports the current directory relative to the
/// jail root.
fn handle_cmd_pwd<W: AsyncWrite + Unpin>(session: &Session<W>) -> CommandResult {
    let path = navigate::working_directory(session.jail(), session.current_dir());
    CommandResult::success(responses::current_directory(&path))
}

/// Handles the QUIT command: releases session resources and signals close.
fn handle_cmd_quit<W: AsyncWrite + Unpin>(session: &mut Session<W>) -> CommandResult {
    session.close();
    CommandResult::close(responses::goodbye())
}

/// Handles unknown or unsupported commands.
fn handle_cmd_unknown(verb: &str) -> CommandResult {
    info!("Unknown command: {}", verb);
    CommandResult::failure("Unknown command", responses::unknown_command())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CommandStatus, parse_command};
    use crate::transfer::ChannelState;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    fn config() -> ServerConfig {
        ServerConfig {
            data_accept_timeout_secs: 1,
            ..ServerConfig::default()
        }
    }

    fn session_on(local_ip: IpAddr) -> (TempDir, PathBuf, Session<Vec<u8>>) {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ftp");
        std::fs::create_dir_all(root.join("pub")).unwrap();
        std::fs::write(root.join("pub/readme.txt"), b"hello ftp\n").unwrap();
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        let root = root.canonicalize().unwrap();
        let peer = SocketAddr::new(local_ip, 40000);
        let session = Session::new(
            Vec::new(),
            root.clone(),
            local_ip,
            peer,
            config().control_write_timeout(),
        );
        (dir, root, session)
    }

    fn session() -> (TempDir, PathBuf, Session<Vec<u8>>) {
        session_on(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    async fn run(session: &mut Session<Vec<u8>>, line: &str) -> CommandResult {
        handle_command(session, &parse_command(line), &config())
            .await
            .unwrap()
    }

    fn reply_text(result: &CommandResult) -> String {
        result.message.as_ref().unwrap().to_string()
    }

    #[tokio::test]
    async fn login_is_acknowledged_without_validation() {
        let (_dir, _root, mut session) = session();
        let result = run(&mut session, "USER nobody").await;
        assert_eq!(reply_text(&result), "331 User name okay, need password.\r\n");
        assert!(!session.is_logged_in());

        let result = run(&mut session, "PASS whatever").await;
        assert_eq!(reply_text(&result), "230 User logged in.\r\n");
        assert!(session.is_logged_in());
        assert_eq!(session.username(), Some("nobody"));
    }

    #[tokio::test]
    async fn syst_and_type_replies() {
        let (_dir, _root, mut session) = session();
        assert_eq!(reply_text(&run(&mut session, "SYST").await), "215 UNIX Type: L8\r\n");
        assert_eq!(reply_text(&run(&mut session, "TYPE I").await), "200 Type set to I.\r\n");
        assert_eq!(reply_text(&run(&mut session, "TYPE a").await), "200 Type set to A.\r\n");
        assert_eq!(reply_text(&run(&mut session, "TYPE").await), "200 Type set to I.\r\n");
    }

    #[tokio::test]
    async fn cwd_into_child_then_pwd() {
        let (_dir, root, mut session) = session();
        let result = run(&mut session, "CWD pub").await;
        assert_eq!(result.status, CommandStatus::Success);
        assert_eq!(reply_text(&result), "250 Directory changed.\r\n");
        assert_eq!(session.current_dir(), root.join("pub"));

        let result = run(&mut session, "PWD").await;
        assert_eq!(reply_text(&result), "257 \"/pub\" is current directory.\r\n");
    }

    #[tokio::test]
    async fn pwd_at_root_is_slash() {
        let (_dir, _root, mut session) = session();
        assert_eq!(
            reply_text(&run(&mut session, "PWD").await),
            "257 \"/\" is current directory.\r\n"
        );
    }

    #[tokio::test]
    async fn cwd_escape_is_denied_and_directory_unchanged() {
        let (_dir, root, mut session) = session();
        let result = run(&mut session, "CWD ../etc").await;
        assert_eq!(reply_text(&result), "550 Access denied.\r\n");
        assert_eq!(session.current_dir(), root);
    }

    #[tokio::test]
    async fn cwd_missing_is_not_found() {
        let (_dir, root, mut session) = session();
        let result = run(&mut session, "CWD nowhere").await;
        assert_eq!(reply_text(&result), "550 Directory not found.\r\n");
        assert_eq!(session.current_dir(), root);

        let result = run(&mut session, "CWD pub/readme.txt").await;
        assert_eq!(reply_text(&result), "550 Directory not found.\r\n");
    }

    #[tokio::test]
    async fn cdup_at_root_leaves_directory_unchanged() {
        let (_dir, root, mut session) = session();
        let result = run(&mut session, "CDUP").await;
        assert_eq!(result.status, CommandStatus::Success);
        assert_eq!(reply_text(&result), "250 Directory changed.\r\n");
        assert_eq!(session.current_dir(), root);

        let result = run(&mut session, "CWD ..").await;
        assert_eq!(reply_text(&result), "250 Directory changed.\r\n");
        assert_eq!(session.current_dir(), root);

        run(&mut session, "CWD pub").await;
        let result = run(&mut session, "CDUP").await;
        assert_eq!(reply_text(&result), "250 Directory changed.\r\n");
        assert_eq!(session.current_dir(), root);
    }

    #[tokio::test]
    async fn empty_cwd_is_noop() {
        let (_dir, root, mut session) = session();
        run(&mut session, "CWD pub").await;
        let result = run(&mut session, "CWD").await;
        assert_eq!(reply_text(&result), "250 Directory changed.\r\n");
        assert_eq!(session.current_dir(), root.join("pub"));
    }

    #[tokio::test]
    async fn transfers_without_pasv_are_rejected() {
        let (_dir, _root, mut session) = session();
        assert_eq!(reply_text(&run(&mut session, "LIST").await), "425 Use PASV first.\r\n");
        assert_eq!(
            reply_text(&run(&mut session, "RETR pub/readme.txt").await),
            "425 Use PASV first.\r\n"
        );
        assert_eq!(
            reply_text(&run(&mut session, "RETR missing").await),
            "425 Use PASV first.\r\n"
        );
    }

    #[tokio::test]
    async fn pasv_reports_bound_port() {
        let (_dir, _root, mut session) = session();
        let result = run(&mut session, "PASV").await;
        let text = reply_text(&result);
        assert!(text.starts_with("227 Entering Passive Mode (127,0,0,1,"));
        assert!(text.ends_with(").\r\n"));
        assert_eq!(session.data_channel().state(), ChannelState::Listening);

        let tuple = &text[text.find('(').unwrap() + 1..text.find(')').unwrap()];
        let nums: Vec<u16> = tuple.split(',').map(|n| n.parse().unwrap()).collect();
        assert_ne!(nums[4] * 256 + nums[5], 0);
    }

    #[tokio::test]
    async fn pasv_over_native_ipv6_needs_configured_address() {
        let (_dir, _root, mut session) = session_on(IpAddr::V6(Ipv6Addr::LOCALHOST));
        let result = run(&mut session, "PASV").await;
        assert_eq!(reply_text(&result), "425 Can't open data connection.\r\n");
        assert_eq!(session.data_channel().state(), ChannelState::Idle);

        let config = ServerConfig {
            passive_address: Some(Ipv4Addr::new(203, 0, 113, 9)),
            ..config()
        };
        let result = handle_command(&mut session, &Command::PASV, &config)
            .await
            .unwrap();
        let text = reply_text(&result);
        assert!(text.starts_with("227 Entering Passive Mode (203,0,113,9,"), "{}", text);
        assert_eq!(session.data_channel().state(), ChannelState::Listening);
    }

    #[tokio::test]
    async fn ipv4_mapped_control_address_is_unwrapped() {
        let mapped = IpAddr::V6(Ipv4Addr::LOCALHOST.to_ipv6_mapped());
        let (_dir, _root, mut session) = session_on(mapped);
        let text = reply_text(&run(&mut session, "PASV").await);
        assert!(text.starts_with("227 Entering Passive Mode (127,0,0,1,"), "{}", text);
    }

    #[tokio::test]
    async fn failed_retr_consumes_the_channel() {
        let (_dir, _root, mut session) = session();
        run(&mut session, "PASV").await;
        let result = run(&mut session, "RETR missing.txt").await;
        assert_eq!(reply_text(&result), "550 File not found.\r\n");
        assert_eq!(session.data_channel().state(), ChannelState::Idle);

        let result = run(&mut session, "RETR pub/readme.txt").await;
        assert_eq!(reply_text(&result), "425 Use PASV first.\r\n");
    }

    #[tokio::test]
    async fn retr_outside_root_is_denied() {
        let (dir, _root, mut session) = session();
        std::fs::write(dir.path().join("etc/passwd"), b"root:x:0:0").unwrap();
        run(&mut session, "PASV").await;
        let result = run(&mut session, "RETR ../etc/passwd").await;
        assert_eq!(reply_text(&result), "550 Access denied.\r\n");
        // no preliminary reply was written
        let sent = String::from_utf8(session.control().get_ref().clone()).unwrap();
        assert!(!sent.contains("150"));
    }

    #[tokio::test]
    async fn retr_without_client_connection_times_out() {
        let (_dir, _root, mut session) = session();
        run(&mut session, "PASV").await;
        let result = run(&mut session, "RETR pub/readme.txt").await;
        assert_eq!(reply_text(&result), "425 Can't open data connection.\r\n");
        assert_eq!(session.data_channel().state(), ChannelState::Idle);
    }

    #[tokio::test]
    async fn quit_closes_session() {
        let (_dir, _root, mut session) = session();
        run(&mut session, "PASV").await;
        let result = run(&mut session, "QUIT").await;
        assert_eq!(result.status, CommandStatus::CloseConnection);
        assert_eq!(reply_text(&result), "221 Goodbye.\r\n");
        assert_eq!(session.data_channel().state(), ChannelState::Idle);
    }

    #[tokio::test]
    async fn unknown_and_lowercase_verbs_are_rejected() {
        let (_dir, _root, mut session) = session();
        assert_eq!(reply_text(&run(&mut session, "NOPE").await), "500 Unknown command.\r\n");
        assert_eq!(reply_text(&run(&mut session, "pwd").await), "500 Unknown command.\r\n");
    }
}
