//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "jail-ftp-server",
    version,
    about = "Minimal passive-mode FTP server jailed to one directory"
)]
pub struct Cli {
    /// Directory to serve; overrides `server_root` from the configuration
    pub root: Option<PathBuf>,

    /// Configuration file (TOML); defaults to ./config.toml when present
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind the control connection to
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Control connection port
    #[arg(short, long)]
    pub port: Option<u16>,
}
