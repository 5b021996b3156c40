//! XMP sidecar discovery and merge.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use pixdex_core::{Keywords, clamp_rating};
use tracing::debug;

use crate::error::MetadataError;
use crate::parser::SidecarParser;
use crate::sections::tags;

/// Keywords and rating collected from sidecar files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidecarData {
    pub keywords: Keywords,
    pub rating: Option<u8>,
}

impl SidecarData {
    /// Fold into a record's keywords and rating; a declared rating wins.
    pub fn apply(self, keywords: &mut Keywords, rating: &mut Option<u8>) {
        keywords.extend(self.keywords);
        if self.rating.is_some() {
            *rating = self.rating;
        }
    }
}

/// Sidecar paths for a media file, in lookup order, without duplicates.
///
/// `IMG_1.jpg` yields `IMG_1.xmp`, `IMG_1.XMP`, `IMG_1.jpg.xmp`, `IMG_1.jpg.XMP`.
pub fn candidates(path: &Path) -> Vec<PathBuf> {
    let appended = |suffix: &str| {
        let mut name = OsString::from(path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    };
    [
        path.with_extension("xmp"),
        path.with_extension("XMP"),
        appended(".xmp"),
        appended(".XMP"),
    ]
    .into_iter()
    .filter(|candidate| candidate != path)
    .unique()
    .collect()
}

/// Read and parse every existing sidecar of `path`.
///
/// Each candidate is parsed on its own; failures are logged and skipped.
pub fn read_sidecars(path: &Path, parser: &dyn SidecarParser) -> SidecarData {
    let mut data = SidecarData::default();
    for candidate in candidates(path) {
        if !candidate.is_file() {
            continue;
        }
        let sections = std::fs::read(&candidate)
            .map_err(|e| MetadataError::io(&candidate, e))
            .and_then(|contents| parser.parse(&contents));
        match sections {
            Ok(sections) => {
                data.keywords.extend(sections.subjects);
                if let Some(rating) = sections.xmp.get(tags::XMP_RATING).and_then(|v| v.as_i64()) {
                    data.rating = Some(clamp_rating(rating));
                }
            }
            Err(e) => debug!(sidecar = %candidate.display(), error = %e, "Sidecar skipped"),
        }
    }
    data
}
