//! Configuration types for extraction, scanning and reconciliation.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::media::MediaKind;

/// Default number of header bytes read per photo.
pub const DEFAULT_HEADER_READ_BYTES: usize = 512 * 1024;

/// Default age after which a medium-sensitivity listing is revalidated.
pub const DEFAULT_CACHED_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Default number of media previewed per subdirectory.
pub const DEFAULT_PREVIEW_SIZE: usize = 5;

const DEFAULT_PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "png", "webp", "gif", "heic", "heif", "avif", "tif", "tiff", "bmp",
];

const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "webm", "mkv", "avi", "ogv", "3gp"];

/// Configuration for per-file metadata extraction.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(rename_all = "camelCase")]
pub struct MetadataConfig {
    /// Bytes read from the start of each photo for embedded metadata.
    #[builder(default = "DEFAULT_HEADER_READ_BYTES")]
    #[serde(default = "default_header_read_bytes")]
    pub header_read_bytes: usize,

    /// Extract named face regions.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub read_face_regions: bool,

    /// Drop keywords that duplicate a detected face's name.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub faces_replace_keywords: bool,
}

impl MetadataConfig {
    /// Create a new metadata config builder.
    pub fn builder() -> MetadataConfigBuilder {
        MetadataConfigBuilder::default()
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            header_read_bytes: DEFAULT_HEADER_READ_BYTES,
            read_face_regions: true,
            faces_replace_keywords: true,
        }
    }
}

/// Configuration for directory scanning.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// Include hidden entries (starting with `.`).
    #[builder(default = "false")]
    #[serde(default)]
    pub include_hidden: bool,

    /// Glob patterns matched against entry names; matches are skipped.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Levels below the requested directory to scan (None = unlimited).
    ///
    /// Directories past the limit are listed but left unscanned.
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Number of extraction threads (0 = rayon default pool).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Lower-case photo file extensions.
    #[builder(default = "default_photo_extensions()")]
    #[serde(default = "default_photo_extensions")]
    pub photo_extensions: Vec<String>,

    /// Lower-case video file extensions.
    #[builder(default = "default_video_extensions()")]
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,

    /// Per-file extraction settings.
    #[builder(default)]
    #[serde(default)]
    pub metadata: MetadataConfig,
}

fn default_true() -> bool {
    true
}

fn default_header_read_bytes() -> usize {
    DEFAULT_HEADER_READ_BYTES
}

fn default_photo_extensions() -> Vec<String> {
    DEFAULT_PHOTO_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_video_extensions() -> Vec<String> {
    DEFAULT_VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let photos = self.photo_extensions.as_ref().is_none_or(|e| !e.is_empty());
        let videos = self.video_extensions.as_ref().is_none_or(|e| !e.is_empty());
        if !photos && !videos {
            return Err("At least one photo or video extension is required".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Classify a file name by its extension.
    pub fn classify(&self, file_name: &str) -> Option<MediaKind> {
        let (_, ext) = file_name.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        if self.photo_extensions.iter().any(|e| *e == ext) {
            Some(MediaKind::Photo)
        } else if self.video_extensions.iter().any(|e| *e == ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Check if hidden entries should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_hidden: false,
            ignore_patterns: Vec::new(),
            max_depth: None,
            threads: 0,
            photo_extensions: default_photo_extensions(),
            video_extensions: default_video_extensions(),
            metadata: MetadataConfig::default(),
        }
    }
}

/// How aggressively a persisted directory is revalidated against disk.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Trust the persisted tree while the directory timestamp is unchanged.
    #[default]
    Low,
    /// Like `Low`, but rescan in the background once the tree is older than the timeout.
    Medium,
    /// Serve the persisted tree and always rescan in the background.
    High,
}

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    /// Scanner settings used for every rescan.
    #[builder(default)]
    #[serde(default)]
    pub scan: ScanConfig,

    /// Staleness sensitivity.
    #[builder(default)]
    #[serde(default)]
    pub sensitivity: Sensitivity,

    /// Age in ms after which a medium-sensitivity listing triggers a rescan.
    #[builder(default = "DEFAULT_CACHED_TIMEOUT_MS")]
    #[serde(default = "default_cached_timeout_ms")]
    pub cached_timeout_ms: u64,

    /// Media previewed per subdirectory in a listing.
    #[builder(default = "DEFAULT_PREVIEW_SIZE")]
    #[serde(default = "default_preview_size")]
    pub preview_size: usize,
}

fn default_cached_timeout_ms() -> u64 {
    DEFAULT_CACHED_TIMEOUT_MS
}

fn default_preview_size() -> usize {
    DEFAULT_PREVIEW_SIZE
}

impl IndexConfig {
    /// Create a new index config builder.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            sensitivity: Sensitivity::default(),
            cached_timeout_ms: DEFAULT_CACHED_TIMEOUT_MS,
            preview_size: DEFAULT_PREVIEW_SIZE,
        }
    }
}
