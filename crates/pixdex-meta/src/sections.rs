//! Structured sections returned by the metadata parsers.
//!
//! Parsers translate raw encodings into these shapes; the extractors only
//! ever see sections, never bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical tag names used as section keys.
pub mod tags {
    // image-file-directory
    pub const MAKE: &str = "Make";
    pub const MODEL: &str = "Model";
    pub const ORIENTATION: &str = "Orientation";
    pub const IMAGE_WIDTH: &str = "ImageWidth";
    pub const IMAGE_HEIGHT: &str = "ImageHeight";
    pub const MODIFY_DATE: &str = "ModifyDate";

    // exif
    pub const DATE_TIME_ORIGINAL: &str = "DateTimeOriginal";
    pub const CREATE_DATE: &str = "CreateDate";
    pub const OFFSET_TIME: &str = "OffsetTime";
    pub const OFFSET_TIME_ORIGINAL: &str = "OffsetTimeOriginal";
    pub const OFFSET_TIME_DIGITIZED: &str = "OffsetTimeDigitized";
    pub const EXIF_IMAGE_WIDTH: &str = "ExifImageWidth";
    pub const EXIF_IMAGE_HEIGHT: &str = "ExifImageHeight";
    pub const ISO: &str = "ISO";
    pub const FOCAL_LENGTH: &str = "FocalLength";
    pub const EXPOSURE_TIME: &str = "ExposureTime";
    pub const F_NUMBER: &str = "FNumber";
    pub const LENS_MODEL: &str = "LensModel";

    // gps
    pub const GPS_LATITUDE: &str = "GPSLatitude";
    pub const GPS_LONGITUDE: &str = "GPSLongitude";
    /// UTC `YYYY:MM:DD HH:MM:SS` assembled from the GPS date and time stamps.
    pub const GPS_DATE_TIME: &str = "GPSDateTime";

    // xmp
    pub const XMP_RATING: &str = "xmp:Rating";
    pub const DC_TITLE: &str = "dc:title";
    pub const DC_DESCRIPTION: &str = "dc:description";
    pub const PS_COUNTRY: &str = "photoshop:Country";
    pub const PS_STATE: &str = "photoshop:State";
    pub const PS_CITY: &str = "photoshop:City";
}

/// A single tag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl TagValue {
    /// Text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value; text is parsed leniently.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Int(i) => Some(*i as f64),
            TagValue::Float(f) => Some(*f),
            TagValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Integral value; floats must have no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TagValue::Int(i) => Some(*i),
            TagValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            TagValue::Float(_) => None,
            TagValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Text(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Int(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::Float(value)
    }
}

/// Tags of one logical section, keyed by canonical name.
pub type TagMap = BTreeMap<String, TagValue>;

/// Ratio-based, center-anchored region rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionArea {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Name, type and area of a region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionFields {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub area: Option<RegionArea>,
}

/// One entry of a region list, in either of its two XMP shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegionEntry {
    /// The list item wraps a description element carrying the fields,
    /// with the area given as attributes.
    Nested { description: Option<RegionFields> },
    /// The list item carries name, type and area directly.
    Flat(RegionFields),
}

impl RegionEntry {
    /// Fields regardless of shape.
    pub fn fields(&self) -> Option<&RegionFields> {
        match self {
            RegionEntry::Nested { description } => description.as_ref(),
            RegionEntry::Flat(fields) => Some(fields),
        }
    }
}

/// Combined EXIF/XMP section tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSections {
    /// Image-file-directory (IFD0) tags.
    pub ifd0: TagMap,
    /// EXIF sub-IFD tags.
    pub exif: TagMap,
    /// GPS tags, coordinates already signed decimal degrees.
    pub gps: TagMap,
    /// XMP properties keyed by qualified name.
    pub xmp: TagMap,
    /// `dc:subject` values.
    pub subjects: Vec<String>,
    /// Region list entries.
    pub regions: Vec<RegionEntry>,
}

impl TagSections {
    /// Fold `other` in; tags already present win.
    pub fn merge(&mut self, other: TagSections) {
        fn fill(into: &mut TagMap, from: TagMap) {
            for (key, value) in from {
                into.entry(key).or_insert(value);
            }
        }
        fill(&mut self.ifd0, other.ifd0);
        fill(&mut self.exif, other.exif);
        fill(&mut self.gps, other.gps);
        fill(&mut self.xmp, other.xmp);
        self.subjects.extend(other.subjects);
        if self.regions.is_empty() {
            self.regions = other.regions;
        }
    }

    /// True when no section carries anything.
    pub fn is_empty(&self) -> bool {
        self.ifd0.is_empty()
            && self.exif.is_empty()
            && self.gps.is_empty()
            && self.xmp.is_empty()
            && self.subjects.is_empty()
            && self.regions.is_empty()
    }
}

/// Flat IPTC record. Strings are raw: NUL padding and whitespace intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IptcRecord {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub keywords: Vec<String>,
    /// `YYYYMMDD`.
    pub date_created: Option<String>,
    /// `HHMMSS±HHMM`.
    pub time_created: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_value_conversions() {
        assert_eq!(TagValue::from(" 200 ").as_i64(), Some(200));
        assert_eq!(TagValue::Float(2.0).as_i64(), Some(2));
        assert_eq!(TagValue::Float(2.5).as_i64(), None);
        assert_eq!(TagValue::Int(7).as_f64(), Some(7.0));
        assert_eq!(TagValue::Int(7).as_str(), None);
    }

    #[test]
    fn test_merge_keeps_existing_tags() {
        let mut first = TagSections::default();
        first.ifd0.insert(tags::MAKE.into(), "Canon".into());
        first.subjects.push("a".into());

        let mut second = TagSections::default();
        second.ifd0.insert(tags::MAKE.into(), "Nikon".into());
        second.ifd0.insert(tags::MODEL.into(), "Z6".into());
        second.subjects.push("b".into());

        first.merge(second);
        assert_eq!(first.ifd0[tags::MAKE], TagValue::from("Canon"));
        assert_eq!(first.ifd0[tags::MODEL], TagValue::from("Z6"));
        assert_eq!(first.subjects, ["a", "b"]);
    }

    #[test]
    fn test_region_entry_shapes_expose_fields() {
        let fields = RegionFields {
            name: Some("Ada".into()),
            kind: Some("Face".into()),
            area: None,
        };
        let nested = RegionEntry::Nested {
            description: Some(fields.clone()),
        };
        let flat = RegionEntry::Flat(fields.clone());
        assert_eq!(nested.fields(), Some(&fields));
        assert_eq!(flat.fields(), Some(&fields));
        assert_eq!(RegionEntry::Nested { description: None }.fields(), None);
    }
}
