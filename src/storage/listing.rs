//! Directory listing
//!
//! Renders directory entries in the `ls -l` style layout that listing-aware
//! FTP clients parse:
//!
//! ```text
//! drwxr-xr-x 1 owner group     4096 Mar 05 14:07 pub
//! -rw-r--r-- 1 owner group       10 Jan 12  2021 readme.txt
//! ```

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use log::debug;
use tokio::fs;

/// Owner/group placeholder when an id has no name.
pub const UNKNOWN_OWNER: &str = "unknown";

/// Entries modified longer ago than this show a year instead of a time.
const RECENT_WINDOW: Duration = Duration::from_secs(180 * 24 * 60 * 60);

/// One directory entry, collected only for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub owner: String,
    pub group: String,
    pub modified: SystemTime,
    /// The nine owner/group/other rwx bits.
    pub permissions: u32,
}

impl DirectoryEntry {
    pub fn from_metadata(name: String, metadata: &Metadata) -> Self {
        let (owner, group, permissions) = ownership(metadata);
        Self {
            name,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            owner,
            group,
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            permissions,
        }
    }

    /// Renders the entry as one CRLF-terminated listing line.
    pub fn render(&self, now: DateTime<Local>) -> String {
        format!(
            "{}{} 1 {} {} {:>8} {} {}\r\n",
            if self.is_dir { 'd' } else { '-' },
            format_permissions(self.permissions),
            self.owner,
            self.group,
            self.size,
            format_timestamp(self.modified, now),
            self.name
        )
    }
}

/// Renders the nine permission bits as `rwxrwxrwx`, `-` for cleared bits.
pub fn format_permissions(mode: u32) -> String {
    const FLAGS: [char; 3] = ['r', 'w', 'x'];
    (0..9)
        .map(|i| {
            if mode & (0o400 >> i) != 0 {
                FLAGS[i % 3]
            } else {
                '-'
            }
        })
        .collect()
}

fn format_timestamp(modified: SystemTime, now: DateTime<Local>) -> String {
    let modified: DateTime<Local> = modified.into();
    let recent = match (now - modified).to_std() {
        Ok(age) => age <= RECENT_WINDOW,
        // modified in the future
        Err(_) => false,
    };

    if recent {
        modified.format("%b %d %H:%M").to_string()
    } else {
        modified.format("%b %d  %Y").to_string()
    }
}

#[cfg(unix)]
fn ownership(metadata: &Metadata) -> (String, String, u32) {
    use std::os::unix::fs::MetadataExt;

    (
        user_name(metadata.uid()),
        group_name(metadata.gid()),
        metadata.mode() & 0o777,
    )
}

#[cfg(not(unix))]
fn ownership(metadata: &Metadata) -> (String, String, u32) {
    let mut mode = if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    };
    if metadata.is_dir() {
        mode |= 0o111;
    }
    (UNKNOWN_OWNER.to_string(), UNKNOWN_OWNER.to_string(), mode)
}

#[cfg(unix)]
pub fn user_name(uid: u32) -> String {
    uzers::get_user_by_uid(uid)
        .map(|user| user.name().to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_OWNER.to_string())
}

#[cfg(unix)]
pub fn group_name(gid: u32) -> String {
    uzers::get_group_by_gid(gid)
        .map(|group| group.name().to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_OWNER.to_string())
}

/// Lazily enumerates one directory, yielding a rendered line per entry.
///
/// Entries whose metadata cannot be read (deleted mid-listing, dangling
/// symlinks, permission errors) are skipped.
pub struct DirectoryListing {
    dir: PathBuf,
    entries: fs::ReadDir,
    now: DateTime<Local>,
}

impl DirectoryListing {
    pub async fn open(dir: &Path) -> io::Result<Self> {
        let entries = fs::read_dir(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
            now: Local::now(),
        })
    }

    /// Next rendered entry, `None` once the directory is exhausted.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        while let Some(entry) = self.entries.next_entry().await? {
            // follow symlinks like stat(2)
            let metadata = match fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(
                        "Skipping {} in {}: {}",
                        entry.file_name().to_string_lossy(),
                        self.dir.display(),
                        e
                    );
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let line = DirectoryEntry::from_metadata(name, &metadata).render(self.now);
            return Ok(Some(line));
        }
        Ok(None)
    }
}
