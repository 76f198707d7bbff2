//! Transfer module for FTP server
//!
//! Handles the passive data channel and the payloads sent over it.

pub mod data_channel;
pub mod file_ops;

pub use data_channel::{
    ChannelState, DataChannel, DataConnection, PassiveListener, TransferTimeouts,
};
pub use file_ops::{send_file, send_listing};
