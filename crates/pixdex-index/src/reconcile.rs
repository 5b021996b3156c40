//! Per-level diff between a freshly scanned directory and the store.

use std::collections::HashMap;

use compact_str::CompactString;

use pixdex_core::{DirectoryId, DirectoryNode};

use crate::error::StoreError;
use crate::store::{DirectoryRecord, MediaStore, StoredMedia, WriteBatch};

/// Where the id of a scanned subdirectory comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRef {
    /// Already in the store.
    Existing(DirectoryId),
    /// Inserted by this level's batch; index into `insert_directories`.
    Inserted(usize),
}

/// Writes for one directory level plus the scanned subdirectories still to
/// visit.
#[derive(Debug, Default)]
pub struct LevelPlan {
    pub batch: WriteBatch,
    pub children: Vec<(DirectoryNode, ChildRef)>,
}

impl LevelPlan {
    /// Resolve child references against the ids returned by the commit.
    pub fn resolve_children(
        self,
        inserted: &[DirectoryId],
    ) -> impl Iterator<Item = (DirectoryNode, DirectoryId)> + '_ {
        self.children
            .into_iter()
            .filter_map(move |(node, child)| match child {
                ChildRef::Existing(id) => Some((node, id)),
                ChildRef::Inserted(index) => inserted.get(index).map(|id| (node, *id)),
            })
    }
}

/// Diff the scanned `node` (persisted as `id`) against the store.
///
/// Media are matched by name and rewritten only when their metadata
/// differs. Subdirectories missing from the store are inserted unscanned;
/// their own level marks them scanned. Persisted children absent from the
/// scan are deleted with their subtree. Subdirectories the scan did not
/// descend into are left as they are. `now` becomes the directory's
/// `last_scanned`, so the directory row itself is rewritten on every
/// pass even when nothing else changed; the medium staleness timeout
/// reads that timestamp.
pub fn plan_level(
    store: &dyn MediaStore,
    id: DirectoryId,
    node: &mut DirectoryNode,
    now: i64,
) -> Result<LevelPlan, StoreError> {
    let mut plan = LevelPlan::default();

    let mut record = DirectoryRecord::unscanned(&node.path, node.last_modified);
    record.last_scanned = Some(now);
    record.scanned = true;
    plan.batch.update_directories.push((id, record));

    let mut persisted_dirs: HashMap<CompactString, DirectoryId> = store
        .child_directories(&node.path)?
        .into_iter()
        .map(|dir| (dir.record.name, dir.id))
        .collect();

    for child in std::mem::take(&mut node.directories) {
        let existing = persisted_dirs.remove(&child.name);
        if !child.scanned {
            if existing.is_none() {
                plan.batch
                    .insert_directories
                    .push(DirectoryRecord::unscanned(&child.path, child.last_modified));
            }
            continue;
        }
        let child_ref = match existing {
            Some(child_id) => ChildRef::Existing(child_id),
            None => {
                plan.batch
                    .insert_directories
                    .push(DirectoryRecord::unscanned(&child.path, child.last_modified));
                ChildRef::Inserted(plan.batch.insert_directories.len() - 1)
            }
        };
        plan.children.push((child, child_ref));
    }
    plan.batch
        .delete_directories
        .extend(persisted_dirs.into_values());

    let mut persisted_media: HashMap<CompactString, StoredMedia> = store
        .media(id)?
        .into_iter()
        .map(|media| (media.name.clone(), media))
        .collect();

    for item in std::mem::take(&mut node.media) {
        match persisted_media.remove(&item.name) {
            Some(stored) if stored.metadata == item.metadata => {}
            Some(stored) => plan.batch.update_media.push((stored.id, item)),
            None => plan.batch.insert_media.push((id, item)),
        }
    }
    plan.batch
        .delete_media
        .extend(persisted_media.into_values().map(|media| media.id));

    Ok(plan)
}
