//! Parser strategy traits and the set resolved at startup.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::embedded::EmbeddedTagParser;
use crate::iptc::IimParser;
use crate::probe::{FfprobeProber, ImageDimensionProbe, ProbeReport};
use crate::sections::{IptcRecord, TagSections};
use crate::xmp::XmpParser;

/// Parses the combined EXIF/XMP section tree out of a file header.
pub trait TagParser: Send + Sync {
    fn parse(&self, header: &[u8]) -> Result<TagSections>;
}

/// Parses the IPTC record out of a file header.
pub trait IptcParser: Send + Sync {
    fn parse(&self, header: &[u8]) -> Result<IptcRecord>;
}

/// Parses the contents of an XMP sidecar file.
pub trait SidecarParser: Send + Sync {
    fn parse(&self, contents: &[u8]) -> Result<TagSections>;
}

/// Lists the streams and format of a video container.
pub trait VideoProber: Send + Sync {
    fn probe(&self, path: &Path) -> Result<ProbeReport>;
}

/// Determines pixel dimensions by reading the whole file.
pub trait DimensionProbe: Send + Sync {
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)>;
}

/// The parser implementations used by the extractors.
///
/// Built once with the defaults, optionally overriding individual parsers,
/// then shared by every extraction.
#[derive(Clone)]
pub struct Parsers {
    pub tags: Arc<dyn TagParser>,
    pub iptc: Arc<dyn IptcParser>,
    pub sidecar: Arc<dyn SidecarParser>,
    pub video: Arc<dyn VideoProber>,
    pub dimensions: Arc<dyn DimensionProbe>,
}

impl Parsers {
    /// Default parser set.
    pub fn new() -> Self {
        Self {
            tags: Arc::new(EmbeddedTagParser::new()),
            iptc: Arc::new(IimParser),
            sidecar: Arc::new(XmpParser),
            video: Arc::new(FfprobeProber::default()),
            dimensions: Arc::new(ImageDimensionProbe),
        }
    }

    /// Replace the EXIF/XMP parser.
    pub fn with_tag_parser(mut self, parser: impl TagParser + 'static) -> Self {
        self.tags = Arc::new(parser);
        self
    }

    /// Replace the IPTC parser.
    pub fn with_iptc_parser(mut self, parser: impl IptcParser + 'static) -> Self {
        self.iptc = Arc::new(parser);
        self
    }

    /// Replace the sidecar parser.
    pub fn with_sidecar_parser(mut self, parser: impl SidecarParser + 'static) -> Self {
        self.sidecar = Arc::new(parser);
        self
    }

    /// Replace the video prober.
    pub fn with_video_prober(mut self, prober: impl VideoProber + 'static) -> Self {
        self.video = Arc::new(prober);
        self
    }

    /// Replace the dimension probe.
    pub fn with_dimension_probe(mut self, probe: impl DimensionProbe + 'static) -> Self {
        self.dimensions = Arc::new(probe);
        self
    }
}

impl Default for Parsers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Parsers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parsers").finish_non_exhaustive()
    }
}
