//! Module `state`
//!
//! Per-connection session state: the control channel writer, the jail and
//! current directory, the pending data channel, and the placeholder login
//! acknowledgement.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWrite;

use crate::protocol::{ControlChannel, Reply};
use crate::storage::PathJail;
use crate::transfer::DataChannel;

/// State of one control connection.
///
/// `current_dir` is always canonical and inside `jail.root()`; it is only
/// replaced with paths returned by [`PathJail::resolve_directory`].
pub struct Session<W> {
    control: ControlChannel<W>,
    jail: PathJail,
    current_dir: PathBuf,
    data_channel: DataChannel,
    local_ip: IpAddr,
    peer_addr: SocketAddr,
    username: Option<String>,
    logged_in: bool,
}

impl<W: AsyncWrite + Unpin> Session<W> {
    /// `root` must already be canonical. `write_timeout` bounds every
    /// control reply.
    pub fn new(
        writer: W,
        root: PathBuf,
        local_ip: IpAddr,
        peer_addr: SocketAddr,
        write_timeout: Duration,
    ) -> Self {
        Self {
            control: ControlChannel::new(writer, write_timeout),
            jail: PathJail::new(root.clone()),
            current_dir: root,
            data_channel: DataChannel::default(),
            local_ip,
            peer_addr,
            username: None,
            logged_in: false,
        }
    }

    /// Writes and flushes one reply on the control channel.
    pub async fn reply(&mut self, reply: &Reply) -> std::io::Result<()> {
        self.control.send(reply).await
    }

    pub fn control(&self) -> &ControlChannel<W> {
        &self.control
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn jail(&self) -> &PathJail {
        &self.jail
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// Current directory as the client sees it (`/` is the jail root).
    pub fn current_virtual_path(&self) -> String {
        self.jail.virtual_path(&self.current_dir)
    }

    pub fn data_channel(&self) -> &DataChannel {
        &self.data_channel
    }

    pub fn data_channel_mut(&mut self) -> &mut DataChannel {
        &mut self.data_channel
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// IPv4 address of the control connection's local end, which is where
    /// the passive listener binds. `None` on a native IPv6 connection.
    pub fn passive_bind_ip(&self) -> Option<Ipv4Addr> {
        match self.local_ip {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(ip) => ip.to_ipv4_mapped(),
        }
    }

    // --------------------
    // Setter methods
    // --------------------

    pub(crate) fn set_current_dir(&mut self, path: PathBuf) {
        self.current_dir = path;
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
        self.logged_in = false;
    }

    pub fn set_logged_in(&mut self, logged_in: bool) {
        self.logged_in = logged_in;
    }

    /// Releases session resources: the pending passive listener is closed.
    pub fn close(&mut self) {
        self.data_channel.close();
        self.logged_in = false;
    }
}
