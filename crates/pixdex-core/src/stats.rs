//! Scan report and statistics.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::ScanWarning;
use crate::media::MediaKind;
use crate::node::DirectoryNode;

/// Summary statistics for a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Photos extracted.
    pub photos: u64,
    /// Videos extracted.
    pub videos: u64,
    /// Directories listed (scanned or not).
    pub directories: u64,
    /// Entries skipped for an unsupported extension, hidden flag or ignore pattern.
    pub ignored: u64,
    /// Total bytes of extracted media.
    pub media_bytes: u64,
    /// Maximum depth reached.
    pub max_depth: u32,
    /// Largest media file (path, size).
    pub largest_file: Option<(PathBuf, u64)>,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an extracted media file.
    pub fn record_media(&mut self, path: PathBuf, kind: MediaKind, size: u64, depth: u32) {
        match kind {
            MediaKind::Photo => self.photos += 1,
            MediaKind::Video => self.videos += 1,
        }
        self.media_bytes += size;
        self.max_depth = self.max_depth.max(depth);

        if self.largest_file.as_ref().is_none_or(|(_, s)| size > *s) {
            self.largest_file = Some((path, size));
        }
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.directories += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a skipped entry.
    pub fn record_ignored(&mut self) {
        self.ignored += 1;
    }

    /// Total media extracted.
    pub fn total_media(&self) -> u64 {
        self.photos + self.videos
    }
}

/// Result of scanning one directory tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Root node of the scanned tree.
    pub root: DirectoryNode,

    /// When this scan was performed.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Summary statistics.
    pub stats: ScanStats,

    /// Warnings encountered during the scan.
    pub warnings: Vec<ScanWarning>,
}

impl ScanReport {
    /// Create a new scan report.
    pub fn new(
        root: DirectoryNode,
        stats: ScanStats,
        scan_duration: Duration,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            root,
            scanned_at: SystemTime::now(),
            scan_duration,
            stats,
            warnings,
        }
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_stats_default() {
        let stats = ScanStats::default();
        assert_eq!(stats.total_media(), 0);
        assert_eq!(stats.directories, 0);
        assert!(stats.largest_file.is_none());
    }

    #[test]
    fn test_scan_stats_record_media() {
        let mut stats = ScanStats::new();
        stats.record_media(PathBuf::from("/a/small.jpg"), MediaKind::Photo, 100, 1);
        stats.record_media(PathBuf::from("/a/b/big.mp4"), MediaKind::Video, 5000, 2);

        assert_eq!(stats.photos, 1);
        assert_eq!(stats.videos, 1);
        assert_eq!(stats.media_bytes, 5100);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(
            stats.largest_file,
            Some((PathBuf::from("/a/b/big.mp4"), 5000))
        );
    }
}
