//! Jail FTP Server - Entry Point
//!
//! A minimal passive-mode FTP server that confines every client to one
//! directory tree.

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use jail_ftp_server::cli::Cli;
use jail_ftp_server::error::ServerError;
use jail_ftp_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG overrides the default level
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match serve(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(cli: &Cli) -> Result<(), ServerError> {
    let config = ServerConfig::load(cli.config.as_deref())?.apply_cli(cli)?;

    info!("Launching FTP server...");
    let server = Server::bind(config).await?;

    tokio::select! {
        _ = server.run() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        }
    }

    Ok(())
}
