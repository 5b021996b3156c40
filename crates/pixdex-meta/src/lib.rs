//! Metadata extraction for pixdex.
//!
//! Turns a photo's header bytes or a video's container report, plus any XMP
//! sidecar files, into one normalized record. Raw codecs sit behind the
//! strategy traits in [`parser`]; [`Parsers::new`] wires the default
//! backends (EXIF via `kamadak-exif`, XMP via `quick-xml`, IPTC IIM,
//! `ffprobe` and the `image` crate).
//!
//! Extraction never fails: parse errors are logged at `debug` and the
//! affected fields are left out.
//!
//! # Example
//!
//! ```no_run
//! use pixdex_core::{MediaKind, MetadataConfig};
//! use pixdex_meta::{MetadataExtractor, Parsers};
//!
//! let extractor = MetadataExtractor::new(MetadataConfig::default(), Parsers::new());
//! let metadata = extractor.extract("IMG_0001.jpg".as_ref(), MediaKind::Photo);
//! println!("{:?}", metadata.size());
//! ```

pub mod datetime;
mod error;
mod embedded;
mod extractor;
pub mod faces;
mod iptc;
pub mod parser;
mod photo;
mod probe;
pub mod sections;
pub mod sidecar;
mod video;
mod xmp;

pub use error::{MetadataError, Result};
pub use embedded::EmbeddedTagParser;
pub use extractor::MetadataExtractor;
pub use iptc::IimParser;
pub use parser::{DimensionProbe, IptcParser, Parsers, SidecarParser, TagParser, VideoProber};
pub use photo::PhotoExtractor;
pub use probe::{FfprobeProber, ImageDimensionProbe, ProbeFormat, ProbeReport, ProbeStream, SideData};
pub use sections::{IptcRecord, RegionArea, RegionEntry, RegionFields, TagMap, TagSections, TagValue};
pub use video::VideoExtractor;
pub use xmp::{XmpParser, find_xmp_packet};
