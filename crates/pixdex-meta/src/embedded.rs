//! Default EXIF/XMP section parser backed by `kamadak-exif`.

use std::io::Cursor;

use exif::{Exif, In, Reader, Tag, Value};
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::parser::TagParser;
use crate::sections::{TagMap, TagSections, TagValue, tags};
use crate::xmp::{XmpParser, find_xmp_packet};

#[derive(Clone, Copy)]
enum Section {
    Ifd0,
    Exif,
}

const TAG_KEYS: &[(Tag, Section, &str)] = &[
    (Tag::Make, Section::Ifd0, tags::MAKE),
    (Tag::Model, Section::Ifd0, tags::MODEL),
    (Tag::Orientation, Section::Ifd0, tags::ORIENTATION),
    (Tag::ImageWidth, Section::Ifd0, tags::IMAGE_WIDTH),
    (Tag::ImageLength, Section::Ifd0, tags::IMAGE_HEIGHT),
    (Tag::DateTime, Section::Ifd0, tags::MODIFY_DATE),
    (Tag::DateTimeOriginal, Section::Exif, tags::DATE_TIME_ORIGINAL),
    (Tag::DateTimeDigitized, Section::Exif, tags::CREATE_DATE),
    (Tag::OffsetTime, Section::Exif, tags::OFFSET_TIME),
    (Tag::OffsetTimeOriginal, Section::Exif, tags::OFFSET_TIME_ORIGINAL),
    (Tag::OffsetTimeDigitized, Section::Exif, tags::OFFSET_TIME_DIGITIZED),
    (Tag::PixelXDimension, Section::Exif, tags::EXIF_IMAGE_WIDTH),
    (Tag::PixelYDimension, Section::Exif, tags::EXIF_IMAGE_HEIGHT),
    (Tag::PhotographicSensitivity, Section::Exif, tags::ISO),
    (Tag::FocalLength, Section::Exif, tags::FOCAL_LENGTH),
    (Tag::ExposureTime, Section::Exif, tags::EXPOSURE_TIME),
    (Tag::FNumber, Section::Exif, tags::F_NUMBER),
    (Tag::LensModel, Section::Exif, tags::LENS_MODEL),
];

/// Reads EXIF from the header's container and merges the embedded XMP packet.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedTagParser {
    xmp: XmpParser,
}

impl EmbeddedTagParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TagParser for EmbeddedTagParser {
    fn parse(&self, header: &[u8]) -> Result<TagSections> {
        let mut sections = TagSections::default();
        let mut first_error = None;

        match read_exif(header) {
            Ok(exif) => sections.merge(exif),
            Err(e) => first_error = Some(e),
        }

        if let Some(packet) = find_xmp_packet(header) {
            match self.xmp.parse_packet(packet) {
                Ok(xmp) => sections.merge(xmp),
                Err(e) => {
                    debug!(error = %e, "Embedded XMP packet skipped");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if sections.is_empty() => Err(e),
            _ => Ok(sections),
        }
    }
}

fn read_exif(header: &[u8]) -> Result<TagSections> {
    let mut reader = Reader::new();
    reader.continue_on_error(true);
    let exif = reader
        .read_from_container(&mut Cursor::new(header))
        .or_else(|err| {
            err.distill_partial_result(|errors| {
                for e in errors {
                    debug!(error = %e, "EXIF field skipped");
                }
            })
        })
        .map_err(|err| match err {
            exif::Error::NotFound(_) => MetadataError::Missing { section: "EXIF" },
            other => MetadataError::malformed("EXIF", other),
        })?;

    let mut sections = TagSections::default();
    for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
        let Some((_, section, key)) = TAG_KEYS.iter().find(|(tag, ..)| *tag == field.tag) else {
            continue;
        };
        let Some(value) = tag_value(&field.value) else {
            continue;
        };
        let map = match section {
            Section::Ifd0 => &mut sections.ifd0,
            Section::Exif => &mut sections.exif,
        };
        map.insert(key.to_string(), value);
    }
    read_gps(&exif, &mut sections.gps);
    Ok(sections)
}

fn tag_value(value: &Value) -> Option<TagValue> {
    match value {
        Value::Ascii(parts) => parts.first().map(|bytes| {
            TagValue::Text(
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .to_string(),
            )
        }),
        Value::Byte(v) => v.first().map(|&n| TagValue::Int(n.into())),
        Value::Short(v) => v.first().map(|&n| TagValue::Int(n.into())),
        Value::Long(v) => v.first().map(|&n| TagValue::Int(n.into())),
        Value::SShort(v) => v.first().map(|&n| TagValue::Int(n.into())),
        Value::SLong(v) => v.first().map(|&n| TagValue::Int(n.into())),
        Value::Rational(v) => v.first().map(|r| TagValue::Float(r.to_f64())),
        Value::SRational(v) => v.first().map(|r| TagValue::Float(r.to_f64())),
        Value::Float(v) => v.first().map(|&f| TagValue::Float(f.into())),
        Value::Double(v) => v.first().map(|&f| TagValue::Float(f)),
        _ => None,
    }
}

fn read_gps(exif: &Exif, gps: &mut TagMap) {
    if let Some(latitude) = coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S') {
        gps.insert(tags::GPS_LATITUDE.to_string(), TagValue::Float(latitude));
    }
    if let Some(longitude) = coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W') {
        gps.insert(tags::GPS_LONGITUDE.to_string(), TagValue::Float(longitude));
    }
    if let Some(stamp) = gps_date_time(exif) {
        gps.insert(tags::GPS_DATE_TIME.to_string(), TagValue::Text(stamp));
    }
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()),
        _ => None,
    }
}

fn rationals(exif: &Exif, tag: Tag) -> Option<[f64; 3]> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(parts) if parts.len() >= 3 => {
            Some([parts[0].to_f64(), parts[1].to_f64(), parts[2].to_f64()])
        }
        _ => None,
    }
}

/// Signed decimal degrees from a degrees/minutes/seconds triple.
fn coordinate(exif: &Exif, value: Tag, reference: Tag, negative: u8) -> Option<f64> {
    let [degrees, minutes, seconds] = rationals(exif, value)?;
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    let is_negative = ascii(exif, reference)
        .and_then(|r| r.bytes().next())
        .is_some_and(|b| b.eq_ignore_ascii_case(&negative));
    Some(if is_negative { -decimal } else { decimal })
}

fn gps_date_time(exif: &Exif) -> Option<String> {
    let date = ascii(exif, Tag::GPSDateStamp)?;
    let [hours, minutes, seconds] = rationals(exif, Tag::GPSTimeStamp)?;
    if !(hours.is_finite() && minutes.is_finite() && seconds.is_finite()) {
        return None;
    }
    Some(format!(
        "{} {:02}:{:02}:{:02}",
        date.trim(),
        hours as u32,
        minutes as u32,
        seconds as u32
    ))
}
