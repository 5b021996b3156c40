//! Persistence seam and the in-memory store.
//!
//! The engine only talks to [`MediaStore`]. [`MemoryStore`] keeps the whole
//! index in memory and can be snapshotted to a JSON file between runs.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pixdex_core::{DirectoryId, DirectoryKey, MediaId, MediaItem, MediaMetadata, Signature};

use crate::error::StoreError;
use crate::policy::PersistedState;

/// Persisted fields of a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecord {
    pub name: CompactString,
    pub parent: PathBuf,
    pub last_modified: i64,
    pub last_scanned: Option<i64>,
    pub scanned: bool,
}

impl DirectoryRecord {
    /// Record for a directory seen but not yet listed.
    pub fn unscanned(path: &Path, last_modified: i64) -> Self {
        let key = DirectoryKey::from_path(path);
        Self {
            name: key.name,
            parent: key.parent,
            last_modified,
            last_scanned: None,
            scanned: false,
        }
    }

    pub fn key(&self) -> DirectoryKey {
        DirectoryKey {
            name: self.name.clone(),
            parent: self.parent.clone(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.key().path()
    }

    pub fn signature(&self) -> Signature {
        Signature::new(self.last_modified, self.last_scanned)
    }

    pub fn state(&self) -> PersistedState {
        PersistedState {
            signature: self.signature(),
            scanned: self.scanned,
        }
    }
}

/// A directory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDirectory {
    pub id: DirectoryId,
    #[serde(flatten)]
    pub record: DirectoryRecord,
}

/// A media row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub id: MediaId,
    pub directory: DirectoryId,
    pub name: CompactString,
    pub metadata: MediaMetadata,
}

impl StoredMedia {
    pub fn to_item(&self) -> MediaItem {
        MediaItem::new(self.name.clone(), self.metadata.clone())
    }
}

/// Mutations applied together by [`MediaStore::commit`].
///
/// Deleting a directory removes its whole subtree and the media in it.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub insert_directories: Vec<DirectoryRecord>,
    pub update_directories: Vec<(DirectoryId, DirectoryRecord)>,
    pub delete_directories: Vec<DirectoryId>,
    pub insert_media: Vec<(DirectoryId, MediaItem)>,
    pub update_media: Vec<(MediaId, MediaItem)>,
    pub delete_media: Vec<MediaId>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of mutations in the batch.
    pub fn len(&self) -> usize {
        self.insert_directories.len()
            + self.update_directories.len()
            + self.delete_directories.len()
            + self.insert_media.len()
            + self.update_media.len()
            + self.delete_media.len()
    }
}

/// Storage backend of the index.
///
/// Reads never observe a partially applied batch.
pub trait MediaStore: Send + Sync {
    /// Look up a directory by its `(name, parent)` pair.
    fn directory(&self, key: &DirectoryKey) -> Result<Option<StoredDirectory>, StoreError>;

    /// Directories whose parent path is `parent`, ordered by name.
    fn child_directories(&self, parent: &Path) -> Result<Vec<StoredDirectory>, StoreError>;

    /// All media of a directory.
    fn media(&self, directory: DirectoryId) -> Result<Vec<StoredMedia>, StoreError>;

    /// Up to `limit` media of a directory, oldest creation date first.
    fn media_preview(
        &self,
        directory: DirectoryId,
        limit: usize,
    ) -> Result<Vec<StoredMedia>, StoreError>;

    /// Apply a batch atomically. Returns the ids assigned to
    /// `insert_directories`, in order.
    fn commit(&self, batch: WriteBatch) -> Result<Vec<DirectoryId>, StoreError>;
}

/// Cumulative write counters of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStats {
    pub commits: u64,
    pub directories_inserted: u64,
    pub directories_updated: u64,
    pub directories_deleted: u64,
    pub media_inserted: u64,
    pub media_updated: u64,
    pub media_deleted: u64,
}

impl WriteStats {
    /// Row writes of any kind.
    pub fn total_writes(&self) -> u64 {
        self.directories_inserted
            + self.directories_updated
            + self.directories_deleted
            + self.media_inserted
            + self.media_updated
            + self.media_deleted
    }
}

/// On-disk form of a [`MemoryStore`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    next_directory_id: u64,
    next_media_id: u64,
    directories: Vec<StoredDirectory>,
    media: Vec<StoredMedia>,
}

#[derive(Debug, Default)]
struct StoreState {
    next_directory_id: u64,
    next_media_id: u64,
    directories: BTreeMap<DirectoryId, StoredDirectory>,
    media: BTreeMap<MediaId, StoredMedia>,
    by_key: HashMap<DirectoryKey, DirectoryId>,
    media_by_directory: HashMap<DirectoryId, BTreeSet<MediaId>>,
    stats: WriteStats,
}

impl StoreState {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = Self {
            next_directory_id: snapshot.next_directory_id,
            next_media_id: snapshot.next_media_id,
            directories: snapshot
                .directories
                .into_iter()
                .map(|dir| (dir.id, dir))
                .collect(),
            media: snapshot.media.into_iter().map(|m| (m.id, m)).collect(),
            ..Self::default()
        };
        state.rebuild_indexes();
        state
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            next_directory_id: self.next_directory_id,
            next_media_id: self.next_media_id,
            directories: self.directories.values().cloned().collect(),
            media: self.media.values().cloned().collect(),
        }
    }

    fn rebuild_indexes(&mut self) {
        self.by_key = self
            .directories
            .values()
            .map(|dir| (dir.record.key(), dir.id))
            .collect();
        self.media_by_directory.clear();
        for media in self.media.values() {
            self.media_by_directory
                .entry(media.directory)
                .or_default()
                .insert(media.id);
        }
    }

    fn media_in(&self, directory: DirectoryId) -> impl Iterator<Item = &StoredMedia> {
        self.media_by_directory
            .get(&directory)
            .into_iter()
            .flatten()
            .filter_map(|id| self.media.get(id))
    }

    fn validate(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        let mut new_keys = HashSet::new();
        for record in &batch.insert_directories {
            let key = record.key();
            if self.by_key.contains_key(&key) || !new_keys.insert(key) {
                return Err(StoreError::DuplicateDirectory(record.path()));
            }
        }
        for (id, record) in &batch.update_directories {
            let existing = self
                .directories
                .get(id)
                .ok_or(StoreError::UnknownDirectory(*id))?;
            if existing.record.key() != record.key() {
                if let Some(other) = self.by_key.get(&record.key()) {
                    if other != id {
                        return Err(StoreError::DuplicateDirectory(record.path()));
                    }
                }
            }
        }
        for id in &batch.delete_directories {
            if !self.directories.contains_key(id) {
                return Err(StoreError::UnknownDirectory(*id));
            }
        }

        let mut new_media = HashSet::new();
        for (directory, item) in &batch.insert_media {
            if !self.directories.contains_key(directory) {
                return Err(StoreError::UnknownDirectory(*directory));
            }
            let taken = self.media_in(*directory).any(|m| m.name == item.name);
            if taken || !new_media.insert((*directory, item.name.clone())) {
                return Err(StoreError::DuplicateMedia {
                    directory: *directory,
                    name: item.name.to_string(),
                });
            }
        }
        for (id, _) in &batch.update_media {
            if !self.media.contains_key(id) {
                return Err(StoreError::UnknownMedia(*id));
            }
        }
        for id in &batch.delete_media {
            if !self.media.contains_key(id) {
                return Err(StoreError::UnknownMedia(*id));
            }
        }
        Ok(())
    }

    fn apply(&mut self, batch: WriteBatch) -> Vec<DirectoryId> {
        self.stats.commits += 1;

        for id in batch.delete_media {
            self.remove_media(id);
        }
        for id in batch.delete_directories {
            self.remove_subtree(id);
        }

        let mut inserted = Vec::with_capacity(batch.insert_directories.len());
        for record in batch.insert_directories {
            self.next_directory_id += 1;
            let id = DirectoryId(self.next_directory_id);
            self.by_key.insert(record.key(), id);
            self.directories.insert(id, StoredDirectory { id, record });
            self.stats.directories_inserted += 1;
            inserted.push(id);
        }
        for (id, record) in batch.update_directories {
            if let Some(dir) = self.directories.get_mut(&id) {
                self.by_key.remove(&dir.record.key());
                self.by_key.insert(record.key(), id);
                dir.record = record;
                self.stats.directories_updated += 1;
            }
        }

        for (directory, item) in batch.insert_media {
            self.next_media_id += 1;
            let id = MediaId(self.next_media_id);
            self.media.insert(
                id,
                StoredMedia {
                    id,
                    directory,
                    name: item.name,
                    metadata: item.metadata,
                },
            );
            self.media_by_directory
                .entry(directory)
                .or_default()
                .insert(id);
            self.stats.media_inserted += 1;
        }
        for (id, item) in batch.update_media {
            if let Some(media) = self.media.get_mut(&id) {
                media.name = item.name;
                media.metadata = item.metadata;
                self.stats.media_updated += 1;
            }
        }
        inserted
    }

    fn remove_media(&mut self, id: MediaId) {
        if let Some(media) = self.media.remove(&id) {
            if let Some(ids) = self.media_by_directory.get_mut(&media.directory) {
                ids.remove(&id);
            }
            self.stats.media_deleted += 1;
        }
    }

    fn remove_subtree(&mut self, id: DirectoryId) {
        let Some(root) = self.directories.get(&id) else {
            return;
        };
        let root_path = root.record.path();
        let doomed: Vec<DirectoryId> = self
            .directories
            .values()
            .filter(|dir| dir.id == id || dir.record.parent.starts_with(&root_path))
            .map(|dir| dir.id)
            .collect();

        for dir_id in doomed {
            let media: Vec<MediaId> = self
                .media_by_directory
                .remove(&dir_id)
                .map(|ids| ids.into_iter().collect())
                .unwrap_or_default();
            for media_id in media {
                if self.media.remove(&media_id).is_some() {
                    self.stats.media_deleted += 1;
                }
            }
            if let Some(dir) = self.directories.remove(&dir_id) {
                self.by_key.remove(&dir.record.key());
                self.stats.directories_deleted += 1;
            }
        }
    }
}

/// In-memory [`MediaStore`] with optional JSON snapshots.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`save`](Self::save). A missing file
    /// yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let contents = match std::fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let snapshot: Snapshot = serde_json::from_slice(&contents)?;
        let state = StoreState::from_snapshot(snapshot);
        debug!(
            path = %path.display(),
            directories = state.directories.len(),
            media = state.media.len(),
            "Loaded index snapshot"
        );
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Write a snapshot, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let json = serde_json::to_vec(&state.snapshot())?;
        drop(state);

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        file.write_all(&json)
            .map_err(|e| StoreError::io(file.path(), e))?;
        file.persist(path)
            .map_err(|e| StoreError::io(path, e.error))?;
        Ok(())
    }

    /// Write counters since this store was created or loaded.
    pub fn write_stats(&self) -> WriteStats {
        self.state
            .read()
            .map(|state| state.stats)
            .unwrap_or_default()
    }

    /// Number of directory rows.
    pub fn directory_count(&self) -> usize {
        self.state
            .read()
            .map(|state| state.directories.len())
            .unwrap_or_default()
    }

    /// Number of media rows.
    pub fn media_count(&self) -> usize {
        self.state
            .read()
            .map(|state| state.media.len())
            .unwrap_or_default()
    }
}

impl MediaStore for MemoryStore {
    fn directory(&self, key: &DirectoryKey) -> Result<Option<StoredDirectory>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .by_key
            .get(key)
            .and_then(|id| state.directories.get(id))
            .cloned())
    }

    fn child_directories(&self, parent: &Path) -> Result<Vec<StoredDirectory>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let mut children: Vec<StoredDirectory> = state
            .directories
            .values()
            .filter(|dir| dir.record.parent == parent)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.record.name.cmp(&b.record.name));
        Ok(children)
    }

    fn media(&self, directory: DirectoryId) -> Result<Vec<StoredMedia>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.media_in(directory).cloned().collect())
    }

    fn media_preview(
        &self,
        directory: DirectoryId,
        limit: usize,
    ) -> Result<Vec<StoredMedia>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let mut media: Vec<&StoredMedia> = state.media_in(directory).collect();
        media.sort_by(|a, b| {
            a.metadata
                .creation_date()
                .cmp(&b.metadata.creation_date())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(media.into_iter().take(limit).cloned().collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<Vec<DirectoryId>, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.validate(&batch)?;
        Ok(state.apply(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixdex_core::{PhotoMetadata, VideoMetadata};

    fn photo(name: &str, creation_date: i64) -> MediaItem {
        MediaItem::new(
            name,
            MediaMetadata::Photo(PhotoMetadata {
                creation_date,
                ..PhotoMetadata::default()
            }),
        )
    }

    fn insert_root(store: &MemoryStore, path: &str) -> DirectoryId {
        let mut batch = WriteBatch::new();
        batch
            .insert_directories
            .push(DirectoryRecord::unscanned(Path::new(path), 1));
        store.commit(batch).unwrap()[0]
    }

    #[test]
    fn test_commit_and_lookup() {
        let store = MemoryStore::new();
        let root = insert_root(&store, "/photos");

        let mut batch = WriteBatch::new();
        batch
            .insert_directories
            .push(DirectoryRecord::unscanned(Path::new("/photos/b"), 2));
        batch
            .insert_directories
            .push(DirectoryRecord::unscanned(Path::new("/photos/a"), 3));
        batch.insert_media.push((root, photo("x.jpg", 5)));
        let ids = store.commit(batch).unwrap();
        assert_eq!(ids.len(), 2);

        let found = store
            .directory(&DirectoryKey::from_path(Path::new("/photos/a")))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, ids[1]);
        assert_eq!(found.record.last_modified, 3);

        let children = store.child_directories(Path::new("/photos")).unwrap();
        let names: Vec<_> = children.iter().map(|c| c.record.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(store.media(root).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_batch_is_not_applied() {
        let store = MemoryStore::new();
        let root = insert_root(&store, "/photos");
        let before = store.write_stats();

        let mut batch = WriteBatch::new();
        batch.insert_media.push((root, photo("a.jpg", 0)));
        batch.insert_media.push((root, photo("a.jpg", 0)));
        assert!(matches!(
            store.commit(batch),
            Err(StoreError::DuplicateMedia { .. })
        ));

        let mut batch = WriteBatch::new();
        batch.insert_media.push((root, photo("b.jpg", 0)));
        batch.delete_media.push(MediaId(999));
        assert!(matches!(
            store.commit(batch),
            Err(StoreError::UnknownMedia(MediaId(999)))
        ));

        assert!(store.media(root).unwrap().is_empty());
        assert_eq!(store.write_stats(), before);
    }

    #[test]
    fn test_delete_directory_cascades() {
        let store = MemoryStore::new();
        let root = insert_root(&store, "/photos");
        let sub = insert_root(&store, "/photos/sub");
        let deep = insert_root(&store, "/photos/sub/deep");
        let sibling = insert_root(&store, "/photos/subway");

        let mut batch = WriteBatch::new();
        batch.insert_media.push((sub, photo("a.jpg", 0)));
        batch.insert_media.push((deep, photo("b.jpg", 0)));
        batch.insert_media.push((root, photo("c.jpg", 0)));
        store.commit(batch).unwrap();

        let mut batch = WriteBatch::new();
        batch.delete_directories.push(sub);
        store.commit(batch).unwrap();

        assert_eq!(store.directory_count(), 2);
        assert_eq!(store.media_count(), 1);
        assert!(store.media(deep).unwrap().is_empty());
        assert!(
            store
                .directory(&DirectoryKey::from_path(Path::new("/photos/subway")))
                .unwrap()
                .is_some_and(|d| d.id == sibling)
        );
        let stats = store.write_stats();
        assert_eq!(stats.directories_deleted, 2);
        assert_eq!(stats.media_deleted, 2);
    }

    #[test]
    fn test_preview_orders_by_creation_date() {
        let store = MemoryStore::new();
        let root = insert_root(&store, "/photos");
        let mut batch = WriteBatch::new();
        batch.insert_media.push((root, photo("late.jpg", 300)));
        batch.insert_media.push((root, photo("early.jpg", 100)));
        batch.insert_media.push((
            root,
            MediaItem::new(
                "clip.mp4",
                MediaMetadata::Video(VideoMetadata {
                    creation_date: 200,
                    ..VideoMetadata::default()
                }),
            ),
        ));
        store.commit(batch).unwrap();

        let preview = store.media_preview(root, 2).unwrap();
        let names: Vec<_> = preview.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["early.jpg", "clip.mp4"]);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("index.json");

        let store = MemoryStore::new();
        let root = insert_root(&store, "/photos");
        let mut batch = WriteBatch::new();
        batch.insert_media.push((root, photo("a.jpg", 42)));
        store.commit(batch).unwrap();
        store.save(&file).unwrap();

        let loaded = MemoryStore::load(&file).unwrap();
        let dir = loaded
            .directory(&DirectoryKey::from_path(Path::new("/photos")))
            .unwrap()
            .unwrap();
        assert_eq!(dir.id, root);
        let media = loaded.media(root).unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].metadata.creation_date(), 42);
        assert_eq!(loaded.write_stats(), WriteStats::default());

        // Ids keep counting after a reload.
        let next = insert_root(&loaded, "/other");
        assert!(next > root);
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = MemoryStore::load(&temp.path().join("absent.json")).unwrap();
        assert_eq!(store.directory_count(), 0);
    }
}
