//! File system storage
//!
//! Path confinement, directory listings, and transfer source preparation.

pub mod jail;
pub mod listing;
pub mod operations;

pub use jail::PathJail;
pub use listing::{DirectoryEntry, DirectoryListing};
pub use operations::{open_directory, prepare_file_retrieval};
