//! Async reconciliation engine.
//!
//! Answers listing requests from the store when the staleness policy
//! allows it and rescans otherwise. Passes over the same directory are
//! serialized with a per-path mutex; background rescans run on the tokio
//! runtime and are tracked so callers can wait for them.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use pixdex_core::{
    DirectoryId, DirectoryKey, DirectoryNode, IndexConfig, ScanError, Signature, now_millis,
};
use pixdex_meta::Parsers;
use pixdex_scan::{DirectoryScanner, stat_directory};

use crate::error::{IndexError, StoreError};
use crate::policy::{Decision, StalenessPolicy};
use crate::reconcile::plan_level;
use crate::store::{DirectoryRecord, MediaStore, StoredDirectory, StoredMedia, WriteBatch};

/// Answer to a listing request.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryListing {
    /// The caller's copy is current.
    NotModified,
    /// The directory with its media and previews of its subdirectories.
    Directory {
        node: DirectoryNode,
        source: ListingSource,
    },
}

impl DirectoryListing {
    pub fn node(&self) -> Option<&DirectoryNode> {
        match self {
            DirectoryListing::NotModified => None,
            DirectoryListing::Directory { node, .. } => Some(node),
        }
    }
}

/// How a returned tree was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListingSource {
    /// Scanned and reconciled during this request.
    Scanned,
    /// Read from the store.
    Persisted { background_rescan: bool },
}

/// Row writes of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub levels: u64,
    /// Levels left alone because a newer pass already wrote them.
    pub levels_skipped: u64,
    pub directories_inserted: u64,
    pub directories_deleted: u64,
    pub media_inserted: u64,
    pub media_updated: u64,
    pub media_deleted: u64,
}

impl PassStats {
    fn record(&mut self, batch: &WriteBatch) {
        self.levels += 1;
        self.directories_inserted += batch.insert_directories.len() as u64;
        self.directories_deleted += batch.delete_directories.len() as u64;
        self.media_inserted += batch.insert_media.len() as u64;
        self.media_updated += batch.update_media.len() as u64;
        self.media_deleted += batch.delete_media.len() as u64;
    }
}

/// Keeps a [`MediaStore`] consistent with the filesystem.
///
/// Cheap to clone; clones share the store, scanner and locks.
#[derive(Clone)]
pub struct ReconciliationEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: IndexConfig,
    policy: StalenessPolicy,
    scanner: DirectoryScanner,
    store: Arc<dyn MediaStore>,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    pending: DashSet<PathBuf>,
    tracker: TaskTracker,
}

impl ReconciliationEngine {
    /// Create an engine. Fails when the scan settings are invalid.
    pub fn new(
        config: IndexConfig,
        parsers: Parsers,
        store: Arc<dyn MediaStore>,
    ) -> Result<Self, IndexError> {
        let scanner = DirectoryScanner::new(config.scan.clone(), parsers)?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                policy: StalenessPolicy::from_config(&config),
                config,
                scanner,
                store,
                locks: DashMap::new(),
                pending: DashSet::new(),
                tracker: TaskTracker::new(),
            }),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn MediaStore> {
        &self.inner.store
    }

    /// List `path`, rescanning as the staleness policy requires.
    ///
    /// `known` is the signature of the caller's copy from an earlier
    /// listing, if any.
    pub async fn list(
        &self,
        path: impl AsRef<Path>,
        known: Option<Signature>,
    ) -> Result<DirectoryListing, IndexError> {
        let inner = &self.inner;
        let requested = path.as_ref().to_path_buf();
        let (path, disk_modified) =
            tokio::task::spawn_blocking(move || stat_directory(&requested))
                .await
                .unwrap_or_else(|e| {
                    Err(ScanError::Other {
                        message: e.to_string(),
                    })
                })?;

        if let Some(listing) = inner.answer_from_store(&path, disk_modified, known)? {
            return Ok(listing);
        }

        let _guard = inner.lock_path(&path).await;
        // A pass that finished while we waited may have made the scan moot.
        if let Some(listing) = inner.answer_from_store(&path, disk_modified, known)? {
            return Ok(listing);
        }

        let node = inner.rescan(&path).await?;
        Ok(DirectoryListing::Directory {
            node,
            source: ListingSource::Scanned,
        })
    }

    /// Number of background rescans queued or running.
    pub fn pending_rescans(&self) -> usize {
        self.inner.pending.len()
    }

    /// Wait until every background rescan spawned so far has finished.
    pub async fn wait_for_background(&self) {
        let tracker = &self.inner.tracker;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("config", &self.inner.config)
            .field("pending", &self.inner.pending.len())
            .finish_non_exhaustive()
    }
}

/// Holds the pass lock of one path; drops the map entry when unused.
struct PathGuard<'a> {
    locks: &'a DashMap<PathBuf, Arc<Mutex<()>>>,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.path, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl EngineInner {
    async fn lock_path(&self, path: &Path) -> PathGuard<'_> {
        let lock = self
            .locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        PathGuard {
            locks: &self.locks,
            path: path.to_path_buf(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Serve from the store if the policy allows it. `None` means rescan.
    fn answer_from_store(
        self: &Arc<Self>,
        path: &Path,
        disk_modified: i64,
        known: Option<Signature>,
    ) -> Result<Option<DirectoryListing>, IndexError> {
        let persisted = self.store.directory(&DirectoryKey::from_path(path))?;
        let decision = self.policy.decide(
            persisted.as_ref().map(|dir| dir.record.state()),
            disk_modified,
            known,
            now_millis(),
        );

        match (decision, persisted) {
            (Decision::NotModified, _) => {
                debug!(path = %path.display(), "Caller copy is current");
                Ok(Some(DirectoryListing::NotModified))
            }
            (Decision::Serve { background_rescan }, Some(dir)) => {
                if background_rescan {
                    self.schedule_rescan(path.to_path_buf());
                }
                let node = self.load_view(&dir)?;
                Ok(Some(DirectoryListing::Directory {
                    node,
                    source: ListingSource::Persisted { background_rescan },
                }))
            }
            (Decision::Rescan(reason), _) => {
                debug!(path = %path.display(), ?reason, "Rescan required");
                Ok(None)
            }
            (Decision::Serve { .. }, None) => Ok(None),
        }
    }

    fn schedule_rescan(self: &Arc<Self>, path: PathBuf) {
        if !self.pending.insert(path.clone()) {
            debug!(path = %path.display(), "Background rescan already pending");
            return;
        }
        let inner = Arc::clone(self);
        self.tracker.spawn(async move {
            let result = {
                let _guard = inner.lock_path(&path).await;
                inner.rescan(&path).await
            };
            inner.pending.remove(&path);
            if let Err(e) = result {
                warn!(path = %path.display(), error = %e, "Background rescan failed");
            }
        });
    }

    /// Scan `path`, reconcile the store and return the persisted view.
    /// The caller holds the path lock.
    async fn rescan(self: &Arc<Self>, path: &Path) -> Result<DirectoryNode, IndexError> {
        let start = Instant::now();
        let scanned_at = now_millis();
        let inner = Arc::clone(self);
        let scan_path = path.to_path_buf();
        let report = tokio::task::spawn_blocking(move || inner.scanner.scan(&scan_path))
            .await
            .unwrap_or_else(|e| {
                Err(ScanError::Other {
                    message: e.to_string(),
                })
            })?;
        if report.has_warnings() {
            debug!(
                path = %path.display(),
                warnings = report.warnings.len(),
                "Scan finished with warnings"
            );
        }

        let root_id = self.ensure_root(&report.root)?;
        let stats = self.reconcile(report.root, root_id, scanned_at).await?;
        info!(
            path = %path.display(),
            levels = stats.levels,
            levels_skipped = stats.levels_skipped,
            media_inserted = stats.media_inserted,
            media_updated = stats.media_updated,
            media_deleted = stats.media_deleted,
            directories_inserted = stats.directories_inserted,
            directories_deleted = stats.directories_deleted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Reconciled directory"
        );

        let dir = self
            .store
            .directory(&DirectoryKey::from_path(path))?
            .ok_or_else(|| StoreError::Inconsistent(format!("{} vanished", path.display())))?;
        Ok(self.load_view(&dir)?)
    }

    fn ensure_root(&self, root: &DirectoryNode) -> Result<DirectoryId, StoreError> {
        if let Some(dir) = self.store.directory(&root.key())? {
            return Ok(dir.id);
        }
        let mut batch = WriteBatch::new();
        batch
            .insert_directories
            .push(DirectoryRecord::unscanned(&root.path, root.last_modified));
        self.store
            .commit(batch)?
            .first()
            .copied()
            .ok_or_else(|| StoreError::Inconsistent("no id for inserted directory".into()))
    }

    /// Apply the scanned tree level by level, top down. Each level below
    /// the root takes its own path lock before reading the store.
    ///
    /// `scanned_at` is when the scan started; it becomes each level's
    /// `last_scanned`. A subdirectory whose stored `last_scanned` is newer
    /// was rescanned on its own meanwhile, so it and its subtree are
    /// skipped.
    async fn reconcile(
        &self,
        root: DirectoryNode,
        root_id: DirectoryId,
        scanned_at: i64,
    ) -> Result<PassStats, IndexError> {
        let mut stats = PassStats::default();
        let mut queue = VecDeque::from([(root, root_id, true)]);

        while let Some((mut node, id, is_root)) = queue.pop_front() {
            let _guard = if is_root {
                None
            } else {
                Some(self.lock_path(&node.path).await)
            };
            if !is_root && self.is_superseded(&node, scanned_at)? {
                debug!(path = %node.path.display(), "Newer pass already reconciled level");
                stats.levels_skipped += 1;
                continue;
            }
            let mut plan = plan_level(self.store.as_ref(), id, &mut node, scanned_at)?;
            let batch = std::mem::take(&mut plan.batch);
            stats.record(&batch);
            let inserted = self.store.commit(batch)?;
            queue.extend(
                plan.resolve_children(&inserted)
                    .map(|(child, child_id)| (child, child_id, false)),
            );
        }
        Ok(stats)
    }

    fn is_superseded(&self, node: &DirectoryNode, scanned_at: i64) -> Result<bool, StoreError> {
        Ok(self
            .store
            .directory(&node.key())?
            .and_then(|dir| dir.record.last_scanned)
            .is_some_and(|last_scanned| last_scanned > scanned_at))
    }

    /// Build the listing view of a persisted directory: its full media set
    /// and a creation-date preview for each subdirectory.
    fn load_view(&self, dir: &StoredDirectory) -> Result<DirectoryNode, StoreError> {
        let mut node = node_from_record(&dir.record);
        node.media = self
            .store
            .media(dir.id)?
            .iter()
            .map(StoredMedia::to_item)
            .collect();

        for child in self.store.child_directories(&node.path)? {
            let mut child_node = node_from_record(&child.record);
            child_node.media = self
                .store
                .media_preview(child.id, self.config.preview_size)?
                .iter()
                .map(StoredMedia::to_item)
                .collect();
            child_node.is_partial = true;
            node.directories.push(child_node);
        }
        node.sort_media_by_date();
        Ok(node)
    }
}

fn node_from_record(record: &DirectoryRecord) -> DirectoryNode {
    let mut node = DirectoryNode::new(record.path(), record.last_modified);
    node.last_scanned = record.last_scanned;
    node.scanned = record.scanned;
    node
}
