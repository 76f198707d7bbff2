//! Path confinement
//!
//! Resolves client-supplied paths against the session root and current
//! directory. A path is accepted only when it resolves (symlinks followed,
//! `.`/`..` eliminated) to the root itself or a descendant of it; the
//! comparison is component-wise, so `/srv/ftp2` is never inside `/srv/ftp`.

use std::path::{Component, Path, PathBuf};

use log::debug;
use tokio::fs;

use crate::error::JailError;

/// Upper bound on a composed candidate path, checked before composition.
pub const MAX_PATH_LENGTH: usize = 4096;

#[derive(Debug, Clone)]
pub struct PathJail {
    root: PathBuf,
}

impl PathJail {
    /// `root` should already be canonical; it is re-resolved on every lookup.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Builds the unresolved candidate: absolute arguments start at the jail
    /// root, anything else is relative to `current_dir`.
    fn compose(&self, current_dir: &Path, arg: &str) -> Result<PathBuf, JailError> {
        let base = if arg.starts_with('/') {
            &self.root
        } else {
            current_dir
        };

        let length = base.as_os_str().len() + 1 + arg.len();
        if length > MAX_PATH_LENGTH {
            return Err(JailError::PathTooLong(length));
        }

        let relative = arg.trim_start_matches('/');
        if relative.is_empty() {
            Ok(base.to_path_buf())
        } else {
            Ok(base.join(relative))
        }
    }

    /// Resolves `arg` to a canonical path inside the root.
    ///
    /// Resolution failure of the candidate is always `NotFound`; the
    /// confinement check runs on every successful resolution.
    pub async fn resolve(&self, current_dir: &Path, arg: &str) -> Result<PathBuf, JailError> {
        let candidate = self.compose(current_dir, arg)?;

        let root = fs::canonicalize(&self.root)
            .await
            .map_err(JailError::RootUnavailable)?;

        let resolved = match fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(e) => {
                debug!("Cannot resolve {}: {}", candidate.display(), e);
                return Err(JailError::NotFound(arg.to_string()));
            }
        };

        if !resolved.starts_with(&root) {
            return Err(JailError::AccessDenied(arg.to_string()));
        }

        Ok(resolved)
    }

    /// Resolves `arg` and requires the target to be a directory (CWD, CDUP).
    pub async fn resolve_directory(
        &self,
        current_dir: &Path,
        arg: &str,
    ) -> Result<PathBuf, JailError> {
        let resolved = self.resolve(current_dir, arg).await?;
        match fs::metadata(&resolved).await {
            Ok(meta) if meta.is_dir() => Ok(resolved),
            Ok(_) => Err(JailError::NotADirectory(arg.to_string())),
            Err(_) => Err(JailError::NotFound(arg.to_string())),
        }
    }

    /// Resolves `arg` and requires the target to be a regular file (RETR).
    pub async fn resolve_file(&self, current_dir: &Path, arg: &str) -> Result<PathBuf, JailError> {
        let resolved = self.resolve(current_dir, arg).await?;
        match fs::metadata(&resolved).await {
            Ok(meta) if meta.is_file() => Ok(resolved),
            Ok(_) => Err(JailError::NotAFile(arg.to_string())),
            Err(_) => Err(JailError::NotFound(arg.to_string())),
        }
    }

    /// Client-visible form of a resolved path: `/` for the root itself,
    /// `/a/b` for descendants.
    pub fn virtual_path(&self, path: &Path) -> String {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return "/".to_string();
        };

        let segments: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        format!("/{}", segments.join("/"))
    }
}
