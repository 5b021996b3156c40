//! Directory nodes and identity helpers.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::media::{MediaItem, MediaKind};

/// Unique identifier of a persisted directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectoryId(pub u64);

/// Unique identifier of a persisted media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaId(pub u64);

/// The `(name, parent path)` pair that identifies a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryKey {
    pub name: CompactString,
    pub parent: PathBuf,
}

impl DirectoryKey {
    /// Split a directory path into its identifying pair.
    ///
    /// A filesystem root has no file name; its whole path becomes the name
    /// and the parent is empty.
    pub fn from_path(path: &Path) -> Self {
        match (path.file_name(), path.parent()) {
            (Some(name), Some(parent)) => Self {
                name: CompactString::new(name.to_string_lossy()),
                parent: parent.to_path_buf(),
            },
            _ => Self {
                name: CompactString::new(path.to_string_lossy()),
                parent: PathBuf::new(),
            },
        }
    }

    /// Rebuild the full path.
    pub fn path(&self) -> PathBuf {
        if self.parent.as_os_str().is_empty() {
            PathBuf::from(self.name.as_str())
        } else {
            self.parent.join(self.name.as_str())
        }
    }
}

/// A directory together with (some of) its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryNode {
    /// Directory name (not full path).
    pub name: CompactString,

    /// Full path of the directory.
    pub path: PathBuf,

    /// `max(ctime, mtime)` in ms observed when the directory was scanned.
    pub last_modified: i64,

    /// Wall-clock ms of the last successful reconciliation.
    pub last_scanned: Option<i64>,

    /// Whether the children of this directory were listed.
    pub scanned: bool,

    /// Whether `media` is only a preview of the full child set.
    pub is_partial: bool,

    /// Child directories.
    pub directories: Vec<DirectoryNode>,

    /// Photos and videos directly inside this directory.
    pub media: Vec<MediaItem>,
}

impl DirectoryNode {
    /// Create an empty, unscanned node for `path`.
    pub fn new(path: impl Into<PathBuf>, last_modified: i64) -> Self {
        let path = path.into();
        let name = DirectoryKey::from_path(&path).name;
        Self {
            name,
            path,
            last_modified,
            last_scanned: None,
            scanned: false,
            is_partial: false,
            directories: Vec::new(),
            media: Vec::new(),
        }
    }

    /// Identity of this directory.
    pub fn key(&self) -> DirectoryKey {
        DirectoryKey::from_path(&self.path)
    }

    /// The `(last_modified, last_scanned)` pair a caller can hand back later.
    pub fn signature(&self) -> Signature {
        Signature {
            last_modified: self.last_modified,
            last_scanned: self.last_scanned,
        }
    }

    /// Look up a direct media child by name.
    pub fn find_media(&self, name: &str) -> Option<&MediaItem> {
        self.media.iter().find(|m| m.name == name)
    }

    /// Look up a direct subdirectory by name.
    pub fn find_directory(&self, name: &str) -> Option<&DirectoryNode> {
        self.directories.iter().find(|d| d.name == name)
    }

    /// Number of direct photo children.
    pub fn photo_count(&self) -> usize {
        self.count_kind(MediaKind::Photo)
    }

    /// Number of direct video children.
    pub fn video_count(&self) -> usize {
        self.count_kind(MediaKind::Video)
    }

    fn count_kind(&self, kind: MediaKind) -> usize {
        self.media.iter().filter(|m| m.kind() == kind).count()
    }

    /// Total media items in this subtree.
    pub fn total_media(&self) -> usize {
        self.media.len()
            + self
                .directories
                .iter()
                .map(DirectoryNode::total_media)
                .sum::<usize>()
    }

    /// Sort media by creation date, then name, recursively.
    pub fn sort_media_by_date(&mut self) {
        self.media.sort_by(|a, b| {
            a.metadata
                .creation_date()
                .cmp(&b.metadata.creation_date())
                .then_with(|| a.name.cmp(&b.name))
        });
        self.directories.sort_by(|a, b| a.name.cmp(&b.name));
        for child in &mut self.directories {
            child.sort_media_by_date();
        }
    }
}

/// A directory's `(last_modified, last_scanned)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub last_modified: i64,
    pub last_scanned: Option<i64>,
}

impl Signature {
    pub fn new(last_modified: i64, last_scanned: Option<i64>) -> Self {
        Self {
            last_modified,
            last_scanned,
        }
    }
}

/// Milliseconds since the Unix epoch; negative before it.
pub fn system_time_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(err) => -i64::try_from(err.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
