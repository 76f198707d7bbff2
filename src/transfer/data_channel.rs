//! Module `data_channel`
//!
//! Passive-mode data channel lifecycle.
//!
//! A session's [`DataChannel`] is either idle or holding one
//! [`PassiveListener`]. Taking the listener out for a transfer returns the
//! channel to idle; [`PassiveListener::accept_once`] consumes the listener
//! and yields a single-use [`DataConnection`], which is closed when the
//! transfer finishes or when it is dropped. Every transfer therefore needs a
//! fresh PASV.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::error::TransferError;

/// Bounds on the blocking data channel operations.
#[derive(Debug, Clone, Copy)]
pub struct TransferTimeouts {
    pub accept: Duration,
    pub write: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Listening,
}

/// Per-session slot for the pending passive listener.
#[derive(Debug, Default)]
pub struct DataChannel {
    listener: Option<PassiveListener>,
}

impl DataChannel {
    pub fn state(&self) -> ChannelState {
        match self.listener {
            Some(_) => ChannelState::Listening,
            None => ChannelState::Idle,
        }
    }

    /// Binds a fresh listener on an OS-chosen port of `bind_ip`.
    ///
    /// Any listener left over from an earlier PASV is closed once the new
    /// one is bound.
    pub async fn open_passive(
        &mut self,
        bind_ip: Ipv4Addr,
    ) -> Result<SocketAddrV4, TransferError> {
        let requested = SocketAddrV4::new(bind_ip, 0);
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|e| TransferError::Bind(requested.into(), e))?;

        let local_addr = match listener.local_addr() {
            Ok(SocketAddr::V4(addr)) => addr,
            Ok(other) => {
                return Err(TransferError::Bind(
                    other,
                    std::io::Error::new(
                        std::io::ErrorKind::AddrNotAvailable,
                        "passive listener is not IPv4",
                    ),
                ));
            }
            Err(e) => return Err(TransferError::Bind(requested.into(), e)),
        };

        debug!("Passive listener bound to {}", local_addr);
        let replaced = self.listener.replace(PassiveListener {
            listener,
            local_addr,
        });
        if let Some(previous) = replaced {
            info!(
                "Replaced unused passive listener on {}",
                previous.local_addr()
            );
        }
        Ok(local_addr)
    }

    /// Takes the pending listener for a transfer, leaving the channel idle.
    pub fn take_listener(&mut self) -> Result<PassiveListener, TransferError> {
        self.listener.take().ok_or(TransferError::UsePassiveFirst)
    }

    /// Drops any pending listener.
    pub fn close(&mut self) {
        if let Some(listener) = self.listener.take() {
            debug!("Closed passive listener on {}", listener.local_addr());
        }
    }
}

/// A bound passive listener awaiting exactly one client connection.
#[derive(Debug)]
pub struct PassiveListener {
    listener: TcpListener,
    local_addr: SocketAddrV4,
}

impl PassiveListener {
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    /// Waits for one connection; the listening socket is closed on return
    /// whatever the outcome.
    pub async fn accept_once(
        self,
        timeouts: TransferTimeouts,
    ) -> Result<DataConnection, TransferError> {
        let PassiveListener {
            listener,
            local_addr,
        } = self;
        let accepted = timeout(timeouts.accept, listener.accept()).await;
        drop(listener);

        match accepted {
            Ok(Ok((stream, peer))) => {
                info!("Data connection accepted from {} on {}", peer, local_addr);
                Ok(DataConnection {
                    stream,
                    peer,
                    write_timeout: timeouts.write,
                    bytes_sent: 0,
                })
            }
            Ok(Err(e)) => Err(TransferError::Accept(e)),
            Err(_) => {
                warn!(
                    "No data connection on {} within {:?}",
                    local_addr, timeouts.accept
                );
                Err(TransferError::AcceptTimeout(timeouts.accept))
            }
        }
    }
}

/// An accepted, single-use data connection.
#[derive(Debug)]
pub struct DataConnection {
    stream: TcpStream,
    peer: SocketAddr,
    write_timeout: Duration,
    bytes_sent: u64,
}

impl DataConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Writes the whole buffer, failing if the peer stalls for longer than
    /// the write timeout.
    pub async fn send(&mut self, buf: &[u8]) -> Result<(), TransferError> {
        match timeout(self.write_timeout, self.stream.write_all(buf)).await {
            Ok(result) => {
                result?;
                self.bytes_sent += buf.len() as u64;
                Ok(())
            }
            Err(_) => Err(TransferError::WriteTimeout(self.write_timeout)),
        }
    }

    /// Flushes and shuts the connection down, returning the byte count.
    pub async fn close(mut self) -> Result<u64, TransferError> {
        match timeout(self.write_timeout, self.stream.shutdown()).await {
            Ok(result) => {
                result?;
                Ok(self.bytes_sent)
            }
            Err(_) => Err(TransferError::WriteTimeout(self.write_timeout)),
        }
    }
}
