//! JWalk-based directory scanner with parallel metadata extraction.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use compact_str::CompactString;
use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use pixdex_core::{
    DirectoryNode, MediaItem, MediaKind, MediaMetadata, ScanConfig, ScanError, ScanReport, ScanStats,
    ScanWarning, WarningKind, now_millis, system_time_millis,
};
use pixdex_meta::{MetadataExtractor, Parsers};

use crate::progress::{ScanPhase, ScanProgress};

/// Media extracted between two progress updates.
const PROGRESS_INTERVAL: u64 = 64;

/// Lists directories, classifies entries and extracts media metadata.
pub struct DirectoryScanner {
    config: ScanConfig,
    extractor: MetadataExtractor,
    ignore: GlobSet,
    pool: Option<Arc<ThreadPool>>,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl DirectoryScanner {
    /// Create a scanner. Fails on an invalid ignore pattern or thread pool.
    pub fn new(config: ScanConfig, parsers: Parsers) -> Result<Self, ScanError> {
        let ignore = build_globset(&config.ignore_patterns)?;
        let pool = match config.threads {
            0 => None,
            n => Some(Arc::new(
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("pixdex-extract-{i}"))
                    .build()
                    .map_err(|e| ScanError::InvalidConfig {
                        message: e.to_string(),
                    })?,
            )),
        };
        let extractor = MetadataExtractor::new(config.metadata.clone(), parsers);
        let (progress_tx, _) = broadcast::channel(100);
        Ok(Self {
            config,
            extractor,
            ignore,
            pool,
            progress_tx,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan `path` down to the configured depth.
    ///
    /// Errors on the requested directory itself are fatal; problems with
    /// entries below it become warnings.
    pub fn scan(&self, path: &Path) -> Result<ScanReport, ScanError> {
        let start = Instant::now();
        let (root, root_modified) = stat_directory(path)?;

        let mut stats = ScanStats::new();
        let mut warnings = Vec::new();
        let mut listing = self.list(&root, &mut stats, &mut warnings);
        self.publish(ScanProgress {
            phase: ScanPhase::Listing,
            dirs_listed: stats.directories,
            media_total: listing.media.len() as u64,
            current_path: root.clone(),
            warnings_count: warnings.len() as u64,
            elapsed: start.elapsed(),
            ..ScanProgress::new()
        });

        let media = std::mem::take(&mut listing.media);
        let media_total = media.len() as u64;
        let extracted = self.extract_all(media, start);

        let mut media_by_parent: HashMap<PathBuf, Vec<MediaItem>> = HashMap::new();
        for (entry, metadata) in extracted {
            stats.record_media(entry.path, metadata.kind(), metadata.file_size(), entry.depth);
            media_by_parent
                .entry(entry.parent)
                .or_default()
                .push(MediaItem::new(entry.name, metadata));
        }

        let scanned_at = now_millis();
        let root_node = self.build_node(
            &root,
            0,
            root_modified,
            &mut listing.dirs,
            &mut media_by_parent,
            scanned_at,
        );

        let scan_duration = start.elapsed();
        self.publish(ScanProgress {
            phase: ScanPhase::Done,
            dirs_listed: stats.directories,
            media_extracted: media_total,
            media_total,
            bytes_extracted: stats.media_bytes,
            current_path: root.clone(),
            warnings_count: warnings.len() as u64,
            elapsed: scan_duration,
        });
        debug!(
            path = %root.display(),
            media = stats.total_media(),
            directories = stats.directories,
            ignored = stats.ignored,
            elapsed_ms = scan_duration.as_millis() as u64,
            "Scan finished"
        );

        Ok(ScanReport::new(root_node, stats, scan_duration, warnings))
    }

    /// Whether a directory at `depth` below the root gets its children listed.
    fn within_depth(&self, depth: u32) -> bool {
        self.config.max_depth.is_none_or(|max| depth <= max)
    }

    fn is_excluded(&self, name: &str) -> bool {
        excluded(name, self.config.include_hidden, &self.ignore)
    }

    /// Walk the tree and classify every entry.
    fn list(&self, root: &Path, stats: &mut ScanStats, warnings: &mut Vec<ScanWarning>) -> Listing {
        let parallelism = match self.config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };
        // Subdirectories one level past the scan depth are listed but not read.
        let read_depth = self.config.max_depth.map_or(usize::MAX, |d| d as usize + 1);
        let include_hidden = self.config.include_hidden;
        let ignore = self.ignore.clone();

        let walker = WalkDir::new(root)
            .parallelism(parallelism)
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(1)
            .max_depth(read_depth)
            .process_read_dir(move |_depth, _path, _state, children| {
                for entry in children.iter_mut().flatten() {
                    let prune = entry.depth >= read_depth
                        || excluded(&entry.file_name.to_string_lossy(), include_hidden, &ignore);
                    if prune && entry.file_type.is_dir() {
                        entry.read_children_path = None;
                    }
                }
            });

        let mut listing = Listing::default();
        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let kind = match err.io_error().map(std::io::Error::kind) {
                        Some(std::io::ErrorKind::PermissionDenied) => WarningKind::PermissionDenied,
                        _ => WarningKind::ReadError,
                    };
                    push_warning(warnings, ScanWarning::new(path, err.to_string(), kind));
                    continue;
                }
            };

            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();
            if self.is_excluded(&file_name) {
                stats.record_ignored();
                continue;
            }

            let file_type = entry.file_type();
            let depth = entry.depth() as u32;
            let Some(parent) = path.parent().map(Path::to_path_buf) else {
                continue;
            };

            if file_type.is_dir() {
                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(err) => {
                        push_warning(
                            warnings,
                            ScanWarning::new(&path, err.to_string(), WarningKind::MetadataError),
                        );
                        continue;
                    }
                };
                stats.record_dir(depth);
                if stats.directories % PROGRESS_INTERVAL == 0 {
                    self.publish(ScanProgress {
                        dirs_listed: stats.directories,
                        media_total: listing.media.len() as u64,
                        current_path: path.clone(),
                        warnings_count: warnings.len() as u64,
                        ..ScanProgress::new()
                    });
                }
                listing.dirs.entry(parent).or_default().push(DirEntryInfo {
                    path,
                    last_modified: last_modified(&metadata),
                });
            } else if file_type.is_file() {
                let Some(kind) = self.config.classify(&file_name) else {
                    stats.record_ignored();
                    continue;
                };
                listing.media.push(MediaEntry {
                    parent,
                    name: file_name.into(),
                    path,
                    kind,
                    depth,
                });
            } else {
                // Symlinks and special files.
                stats.record_ignored();
            }
        }
        listing
    }

    /// Extract metadata for every media entry on the rayon pool.
    fn extract_all(&self, media: Vec<MediaEntry>, start: Instant) -> Vec<(MediaEntry, MediaMetadata)> {
        let media_total = media.len() as u64;
        let done = AtomicU64::new(0);
        let bytes = AtomicU64::new(0);

        let run = || {
            media
                .into_par_iter()
                .map(|entry| {
                    let metadata = self.extractor.extract(&entry.path, entry.kind);
                    let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                    let total_bytes =
                        bytes.fetch_add(metadata.file_size(), Ordering::Relaxed) + metadata.file_size();
                    if count % PROGRESS_INTERVAL == 0 {
                        self.publish(ScanProgress {
                            phase: ScanPhase::Extracting,
                            media_extracted: count,
                            media_total,
                            bytes_extracted: total_bytes,
                            current_path: entry.path.clone(),
                            elapsed: start.elapsed(),
                            ..ScanProgress::new()
                        });
                    }
                    (entry, metadata)
                })
                .collect::<Vec<_>>()
        };

        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    /// Assemble a node from the listing, recursing into scanned subdirectories.
    fn build_node(
        &self,
        path: &Path,
        depth: u32,
        last_modified: i64,
        dirs: &mut HashMap<PathBuf, Vec<DirEntryInfo>>,
        media: &mut HashMap<PathBuf, Vec<MediaItem>>,
        scanned_at: i64,
    ) -> DirectoryNode {
        let mut node = DirectoryNode::new(path, last_modified);
        if !self.within_depth(depth) {
            return node;
        }

        node.scanned = true;
        node.last_scanned = Some(scanned_at);
        for child in dirs.remove(path).unwrap_or_default() {
            let child_node = self.build_node(
                &child.path,
                depth + 1,
                child.last_modified,
                dirs,
                media,
                scanned_at,
            );
            node.directories.push(child_node);
        }
        node.directories.sort_by(|a, b| a.name.cmp(&b.name));
        node.media = media.remove(path).unwrap_or_default();
        node.media.sort_by(|a, b| a.name.cmp(&b.name));
        node
    }

    fn publish(&self, progress: ScanProgress) {
        // No receivers is fine.
        let _ = self.progress_tx.send(progress);
    }
}

impl std::fmt::Debug for DirectoryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryScanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Canonicalize `path`, check it is a directory and read its timestamp.
pub fn stat_directory(path: &Path) -> Result<(PathBuf, i64), ScanError> {
    let canonical = path.canonicalize().map_err(|e| ScanError::io(path, e))?;
    let metadata = std::fs::metadata(&canonical).map_err(|e| ScanError::io(&canonical, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory { path: canonical });
    }
    let modified = last_modified(&metadata);
    Ok((canonical, modified))
}

/// `max(ctime, mtime)` in milliseconds.
pub fn last_modified(metadata: &Metadata) -> i64 {
    let mtime = metadata.modified().map(system_time_millis).unwrap_or(0);
    mtime.max(change_time(metadata))
}

#[cfg(unix)]
fn change_time(metadata: &Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ctime() * 1000 + metadata.ctime_nsec() / 1_000_000
}

#[cfg(not(unix))]
fn change_time(metadata: &Metadata) -> i64 {
    metadata.created().map(system_time_millis).unwrap_or(0)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
            message: format!("invalid ignore pattern {pattern:?}: {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ScanError::InvalidConfig {
        message: e.to_string(),
    })
}

fn excluded(name: &str, include_hidden: bool, ignore: &GlobSet) -> bool {
    (!include_hidden && name.starts_with('.')) || ignore.is_match(name)
}

fn push_warning(warnings: &mut Vec<ScanWarning>, warning: ScanWarning) {
    warn!(path = %warning.path.display(), kind = ?warning.kind, "{}", warning.message);
    warnings.push(warning);
}

#[derive(Default)]
struct Listing {
    dirs: HashMap<PathBuf, Vec<DirEntryInfo>>,
    media: Vec<MediaEntry>,
}

struct DirEntryInfo {
    path: PathBuf,
    last_modified: i64,
}

struct MediaEntry {
    parent: PathBuf,
    name: CompactString,
    path: PathBuf,
    kind: MediaKind,
    depth: u32,
}
