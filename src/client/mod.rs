//! Client session management
//!
//! Handles the per-connection read loop and session state.

pub mod handler;
pub mod state;

pub use handler::handle_client;
pub use state::Session;
