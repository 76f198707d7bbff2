//! Storage operations
//!
//! Prepares the sources of data transfers: the directory behind LIST and the
//! jailed file behind RETR.

use std::path::Path;

use log::info;
use tokio::fs::File;

use crate::error::StorageError;
use crate::storage::jail::PathJail;
use crate::storage::listing::DirectoryListing;

/// Opens `current_dir` for listing.
pub async fn open_directory(current_dir: &Path) -> Result<DirectoryListing, StorageError> {
    DirectoryListing::open(current_dir)
        .await
        .map_err(|e| StorageError::OpenDirectory(current_dir.to_path_buf(), e))
}

/// Resolves `filename` inside the jail and opens it for reading.
pub async fn prepare_file_retrieval(
    jail: &PathJail,
    current_dir: &Path,
    filename: &str,
) -> Result<File, StorageError> {
    let file_path = jail.resolve_file(current_dir, filename).await?;

    let file = File::open(&file_path)
        .await
        .map_err(|e| StorageError::OpenFile(file_path.clone(), e))?;

    info!(
        "Prepared file retrieval for {} (virtual: {}, real: {})",
        filename,
        jail.virtual_path(&file_path),
        file_path.display()
    );

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JailError;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn retrieval_opens_jailed_file() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("data.bin"), [0u8, 1, 2, 255]).unwrap();
        let jail = PathJail::new(root.clone());

        let mut file = prepare_file_retrieval(&jail, &root, "data.bin").await.unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, vec![0u8, 1, 2, 255]);
    }

    #[tokio::test]
    async fn retrieval_outside_root_is_denied() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("root")).unwrap();
        std::fs::write(dir.path().join("secret"), b"s").unwrap();
        let root = dir.path().join("root").canonicalize().unwrap();
        let jail = PathJail::new(root.clone());

        let err = prepare_file_retrieval(&jail, &root, "../secret")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Jail(JailError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn unreadable_directory_is_reported() {
        let dir = tempdir().unwrap();
        let err = open_directory(&dir.path().join("missing")).await.err().unwrap();
        assert!(matches!(err, StorageError::OpenDirectory(..)));
    }
}
