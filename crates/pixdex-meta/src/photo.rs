//! Photo metadata extraction.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use pixdex_core::{
    CameraData, GpsData, MediaSize, MetadataConfig, Orientation, PhotoMetadata, PositionData,
    clamp_rating,
};
use tracing::debug;

use crate::datetime::{ResolvedDate, resolve_creation_date, resolve_iptc_date};
use crate::error::{MetadataError, Result};
use crate::faces::{face_regions, remove_face_keywords};
use crate::parser::Parsers;
use crate::sections::{IptcRecord, TagMap, TagSections, tags};
use crate::sidecar::read_sidecars;

/// Extracts a normalized [`PhotoMetadata`] from one photo file.
#[derive(Debug, Clone)]
pub struct PhotoExtractor {
    config: MetadataConfig,
    parsers: Parsers,
}

impl PhotoExtractor {
    pub fn new(config: MetadataConfig, parsers: Parsers) -> Self {
        Self { config, parsers }
    }

    /// Extract the record for `path`. Never fails: unreadable files yield
    /// the sentinel record, unparsable sections are left out. Sidecars are
    /// merged in either case.
    pub fn extract(&self, path: &Path) -> PhotoMetadata {
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let header = match read_header(path, self.config.header_read_bytes) {
            Ok(header) => header,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Header unreadable, using sentinel");
                let mut sentinel = PhotoMetadata::sentinel(file_size);
                read_sidecars(path, self.parsers.sidecar.as_ref())
                    .apply(&mut sentinel.keywords, &mut sentinel.rating);
                return sentinel;
            }
        };

        let mut photo = PhotoMetadata {
            file_size,
            ..PhotoMetadata::default()
        };

        let iptc = self.parsers.iptc.parse(&header).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "IPTC section skipped");
            IptcRecord::default()
        });
        let sections = self.parsers.tags.parse(&header).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "EXIF/XMP sections skipped");
            TagSections::default()
        });

        let iptc_date = apply_iptc(&iptc, &mut photo);
        let orientation = orientation(&sections.ifd0);
        photo.size = self.resolve_size(path, &sections, orientation);
        photo.camera_data = Some(camera_data(&sections.ifd0, &sections.exif))
            .filter(|camera| !camera.is_empty());
        apply_xmp(&sections, &mut photo);

        let created = resolve_creation_date(&sections.ifd0, &sections.exif, &sections.gps).or(iptc_date);

        if self.config.read_face_regions && !sections.regions.is_empty() {
            photo.faces = face_regions(&sections.regions, photo.size, orientation);
            if self.config.faces_replace_keywords {
                remove_face_keywords(&mut photo.keywords, &photo.faces);
            }
        }

        read_sidecars(path, self.parsers.sidecar.as_ref())
            .apply(&mut photo.keywords, &mut photo.rating);

        if let Some(ResolvedDate { millis, offset }) = created.filter(|date| date.millis != 0) {
            photo.creation_date = millis;
            photo.creation_date_offset = offset;
        }
        photo
    }

    /// Declared dimensions, else the full-file probe, then oriented.
    fn resolve_size(&self, path: &Path, sections: &TagSections, orientation: Orientation) -> MediaSize {
        let declared = dimensions(&sections.ifd0, tags::IMAGE_WIDTH, tags::IMAGE_HEIGHT)
            .or_else(|| dimensions(&sections.exif, tags::EXIF_IMAGE_WIDTH, tags::EXIF_IMAGE_HEIGHT));
        let (width, height) = match declared {
            Some(size) => size,
            None => self.parsers.dimensions.dimensions(path).unwrap_or_else(|e| {
                debug!(path = %path.display(), error = %e, "Dimensions unknown");
                (1, 1)
            }),
        };
        let size = MediaSize::new(width, height);
        if orientation.swaps_axes() {
            size.swapped()
        } else {
            size
        }
    }
}

fn read_header(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| MetadataError::io(path, e))?;
    let mut header = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64)
        .read_to_end(&mut header)
        .map_err(|e| MetadataError::io(path, e))?;
    Ok(header)
}

/// Strip NUL padding and surrounding whitespace; blank becomes `None`.
pub(crate) fn clean_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn text(map: &TagMap, key: &str) -> Option<String> {
    map.get(key).and_then(|v| v.as_str()).and_then(clean_text)
}

fn dimensions(map: &TagMap, width: &str, height: &str) -> Option<(u32, u32)> {
    let side = |key: &str| {
        map.get(key)
            .and_then(|v| v.as_i64())
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
    };
    Some((side(width)?, side(height)?))
}

fn orientation(ifd0: &TagMap) -> Orientation {
    ifd0.get(tags::ORIENTATION)
        .and_then(|v| v.as_i64())
        .and_then(|code| u8::try_from(code).ok())
        .and_then(Orientation::from_code)
        .unwrap_or(Orientation::UPRIGHT)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Finite value representable as `f32`.
fn finite_f32(value: f64) -> Option<f32> {
    (value.is_finite() && value.abs() <= f64::from(f32::MAX)).then_some(value as f32)
}

fn camera_data(ifd0: &TagMap, exif: &TagMap) -> CameraData {
    let number = |key: &str| exif.get(key).and_then(|v| v.as_f64());
    CameraData {
        make: text(ifd0, tags::MAKE),
        model: text(ifd0, tags::MODEL),
        lens: text(exif, tags::LENS_MODEL),
        iso: exif
            .get(tags::ISO)
            .and_then(|v| v.as_i64())
            .and_then(|iso| u32::try_from(iso).ok()),
        focal_length: number(tags::FOCAL_LENGTH).and_then(finite_f32),
        exposure: number(tags::EXPOSURE_TIME)
            .map(|v| round_to(v, 6))
            .and_then(finite_f32),
        f_stop: number(tags::F_NUMBER)
            .map(|v| round_to(v, 2))
            .and_then(finite_f32),
    }
}

fn gps_data(gps: &TagMap) -> Option<GpsData> {
    let coordinate = |key: &str, limit: f64| {
        gps.get(key)
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite() && v.abs() <= limit)
            .map(|v| round_to(v, 6))
    };
    let data = GpsData {
        latitude: coordinate(tags::GPS_LATITUDE, 90.0),
        longitude: coordinate(tags::GPS_LONGITUDE, 180.0),
    };
    (!data.is_empty()).then_some(data)
}

/// Fill location, title, caption and keywords from IPTC; returns its date.
fn apply_iptc(iptc: &IptcRecord, photo: &mut PhotoMetadata) -> Option<ResolvedDate> {
    let clean = |value: &Option<String>| value.as_deref().and_then(clean_text);
    let position = PositionData {
        country: clean(&iptc.country),
        state: clean(&iptc.state),
        city: clean(&iptc.city),
        gps: None,
    };
    photo.position_data = Some(position).filter(|p| !p.is_empty());
    photo.title = clean(&iptc.title);
    photo.caption = clean(&iptc.caption);
    photo
        .keywords
        .extend(iptc.keywords.iter().filter_map(|k| clean_text(k)));

    let date = clean(&iptc.date_created)?;
    let time = clean(&iptc.time_created);
    resolve_iptc_date(&date, time.as_deref())
}

/// Keywords, rating, GPS and the XMP fallbacks for fields IPTC left empty.
fn apply_xmp(sections: &TagSections, photo: &mut PhotoMetadata) {
    photo
        .keywords
        .extend(sections.subjects.iter().filter_map(|s| clean_text(s)));

    if let Some(rating) = sections.xmp.get(tags::XMP_RATING).and_then(|v| v.as_i64()) {
        photo.rating = Some(clamp_rating(rating));
    }

    if photo.title.is_none() {
        photo.title = text(&sections.xmp, tags::DC_TITLE);
    }
    if photo.caption.is_none() {
        photo.caption = text(&sections.xmp, tags::DC_DESCRIPTION);
    }

    let mut position = photo.position_data.take().unwrap_or_default();
    position.country = position.country.or_else(|| text(&sections.xmp, tags::PS_COUNTRY));
    position.state = position.state.or_else(|| text(&sections.xmp, tags::PS_STATE));
    position.city = position.city.or_else(|| text(&sections.xmp, tags::PS_CITY));
    position.gps = gps_data(&sections.gps);
    photo.position_data = Some(position).filter(|p| !p.is_empty());
}
