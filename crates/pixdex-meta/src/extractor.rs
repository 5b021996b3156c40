use std::path::Path;

use pixdex_core::{MediaKind, MediaMetadata, MetadataConfig};

use crate::parser::Parsers;
use crate::photo::PhotoExtractor;
use crate::video::VideoExtractor;

/// Dispatches a file to the photo or video extractor.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    photo: PhotoExtractor,
    video: VideoExtractor,
}

impl MetadataExtractor {
    pub fn new(config: MetadataConfig, parsers: Parsers) -> Self {
        Self {
            photo: PhotoExtractor::new(config, parsers.clone()),
            video: VideoExtractor::new(parsers),
        }
    }

    /// Extract metadata for a file already classified as `kind`.
    pub fn extract(&self, path: &Path, kind: MediaKind) -> MediaMetadata {
        match kind {
            MediaKind::Photo => MediaMetadata::Photo(self.photo.extract(path)),
            MediaKind::Video => MediaMetadata::Video(self.video.extract(path)),
        }
    }

    pub fn photo(&self) -> &PhotoExtractor {
        &self.photo
    }

    pub fn video(&self) -> &VideoExtractor {
        &self.video
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(MetadataConfig::default(), Parsers::default())
    }
}
