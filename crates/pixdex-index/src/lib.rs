//! Persistent media index for pixdex.
//!
//! The [`ReconciliationEngine`] keeps a [`MediaStore`] in step with the
//! filesystem. A listing request is answered from the store when the
//! [`StalenessPolicy`] allows it; otherwise the directory is rescanned and
//! the difference applied one directory level at a time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pixdex_core::IndexConfig;
//! use pixdex_index::{DirectoryListing, MemoryStore, ReconciliationEngine};
//! use pixdex_meta::Parsers;
//!
//! # async fn run() -> Result<(), pixdex_index::IndexError> {
//! let store = Arc::new(MemoryStore::new());
//! let engine = ReconciliationEngine::new(IndexConfig::default(), Parsers::new(), store)?;
//!
//! if let DirectoryListing::Directory { node, .. } = engine.list("/photos", None).await? {
//!     println!("{} media", node.media.len());
//! }
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod policy;
mod reconcile;
mod store;

pub use engine::{DirectoryListing, ListingSource, PassStats, ReconciliationEngine};
pub use error::{IndexError, StoreError};
pub use policy::{Decision, PersistedState, RescanReason, StalenessPolicy};
pub use reconcile::{ChildRef, LevelPlan, plan_level};
pub use store::{
    DirectoryRecord, MediaStore, MemoryStore, StoredDirectory, StoredMedia, WriteBatch, WriteStats,
};
