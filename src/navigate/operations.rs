//! Navigation operations implementation

use std::path::{Path, PathBuf};

use log::info;

use crate::error::JailError;
use crate::storage::PathJail;

/// Argument CDUP is equivalent to.
pub const PARENT_DIRECTORY: &str = "..";

/// Resolves the target of a CWD; the caller commits the returned path.
///
/// A target made only of `.` and `..` segments climbs no higher than the
/// root, so `CDUP` at the root stays at the root. On error the caller's
/// current directory must stay untouched.
pub async fn change_directory(
    jail: &PathJail,
    current_dir: &Path,
    target_path: &str,
) -> Result<PathBuf, JailError> {
    let new_dir = match clamp_to_root(jail, current_dir, target_path) {
        Some(ancestor) => jail.resolve_directory(&ancestor, "").await?,
        None => jail.resolve_directory(current_dir, target_path).await?,
    };

    info!(
        "Changed directory to {} (real: {})",
        jail.virtual_path(&new_dir),
        new_dir.display()
    );

    Ok(new_dir)
}

/// Lexical ancestor for `.`/`..`-only targets, never above the root.
///
/// `current_dir` is canonical, so dropping trailing components matches what
/// resolving `..` would give.
fn clamp_to_root(jail: &PathJail, current_dir: &Path, target_path: &str) -> Option<PathBuf> {
    let segments: Vec<&str> = target_path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    if segments.is_empty() || segments.iter().any(|segment| *segment != PARENT_DIRECTORY) {
        return None;
    }

    let mut dir = if target_path.starts_with('/') {
        jail.root().to_path_buf()
    } else {
        current_dir.to_path_buf()
    };
    for _ in &segments {
        if dir == jail.root() || !dir.pop() {
            break;
        }
    }
    Some(dir)
}

/// Path of `current_dir` relative to the jail root, `/` for the root itself.
pub fn working_directory(jail: &PathJail, current_dir: &Path) -> String {
    jail.virtual_path(current_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn cwd_then_pwd_reports_child() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let root = dir.path().canonicalize().unwrap();
        let jail = PathJail::new(root.clone());

        let new_dir = change_directory(&jail, &root, "sub").await.unwrap();
        assert_eq!(working_directory(&jail, &new_dir), "/sub");
        assert_eq!(working_directory(&jail, &root), "/");
    }

    #[tokio::test]
    async fn cdup_at_root_stays_at_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let jail = PathJail::new(root.clone());

        assert_eq!(
            change_directory(&jail, &root, PARENT_DIRECTORY).await.unwrap(),
            root
        );
        assert_eq!(change_directory(&jail, &root, "/..").await.unwrap(), root);
        assert_eq!(change_directory(&jail, &root, "../../.").await.unwrap(), root);
    }

    #[tokio::test]
    async fn parent_segments_climb_until_root() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        let root = dir.path().canonicalize().unwrap();
        let jail = PathJail::new(root.clone());
        let deep = root.join("a/b");

        assert_eq!(
            change_directory(&jail, &deep, "..").await.unwrap(),
            root.join("a")
        );
        assert_eq!(change_directory(&jail, &deep, "../../..").await.unwrap(), root);
    }

    #[tokio::test]
    async fn parent_then_name_outside_root_is_still_denied() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("root")).unwrap();
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        let root = dir.path().join("root").canonicalize().unwrap();
        let jail = PathJail::new(root.clone());

        assert!(matches!(
            change_directory(&jail, &root, "../etc").await,
            Err(JailError::AccessDenied(_))
        ));
    }
}
