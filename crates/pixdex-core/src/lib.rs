//! Core types and configuration for pixdex.
//!
//! This crate provides the data model shared by the extractor, scanner and
//! reconciliation engine: normalized media records, directory nodes,
//! configuration and the orientation table.

mod config;
mod error;
mod media;
mod node;
mod orientation;
mod stats;

pub use config::{
    DEFAULT_CACHED_TIMEOUT_MS, DEFAULT_HEADER_READ_BYTES, DEFAULT_PREVIEW_SIZE, IndexConfig,
    IndexConfigBuilder, MetadataConfig, MetadataConfigBuilder, ScanConfig, ScanConfigBuilder,
    Sensitivity,
};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use media::{
    CameraData, FaceBox, FaceRegion, GpsData, Keywords, MAX_RATING, MediaItem, MediaKind,
    MediaMetadata, MediaSize, PhotoMetadata, PositionData, VideoMetadata, clamp_rating,
};
pub use node::{
    DirectoryId, DirectoryKey, DirectoryNode, MediaId, Signature, now_millis, system_time_millis,
};
pub use orientation::{Orientation, OrientationTransform};
pub use stats::{ScanReport, ScanStats};
