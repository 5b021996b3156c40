//! Creation-date parsing and UTC-offset resolution.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::sections::{TagMap, tags};

const LOCAL_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const ZONED_FORMATS: &[&str] = &["%Y:%m:%d %H:%M:%S%.f%:z", "%Y:%m:%d %H:%M:%S%.f%z"];

/// Offsets a GPS-derived value may take, in seconds.
const GPS_OFFSET_RANGE: std::ops::RangeInclusive<i32> = -12 * 3600..=14 * 3600;
const QUARTER_HOUR_SECS: f64 = 15.0 * 60.0;

/// The three date tags in precedence order, with their own offset tag.
const DATE_TAGS: [(DateSource, &str, &str); 3] = [
    (DateSource::Exif, tags::DATE_TIME_ORIGINAL, tags::OFFSET_TIME_ORIGINAL),
    (DateSource::Exif, tags::CREATE_DATE, tags::OFFSET_TIME_DIGITIZED),
    (DateSource::Ifd0, tags::MODIFY_DATE, tags::OFFSET_TIME),
];

/// Offset tags consulted as siblings, in order.
const OFFSET_TAGS: [&str; 3] = [
    tags::OFFSET_TIME,
    tags::OFFSET_TIME_ORIGINAL,
    tags::OFFSET_TIME_DIGITIZED,
];

#[derive(Clone, Copy)]
enum DateSource {
    Ifd0,
    Exif,
}

/// A date string split into local wall-clock time and an embedded offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub local: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

/// A creation date resolved to an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDate {
    /// Milliseconds since the Unix epoch.
    pub millis: i64,
    /// Offset used, `None` when the date was taken as UTC.
    pub offset: Option<String>,
}

impl ResolvedDate {
    /// Resolve a local time with an optional offset; no offset means UTC.
    pub fn new(local: NaiveDateTime, offset: Option<FixedOffset>) -> Option<Self> {
        match offset {
            Some(offset) => Some(Self {
                millis: offset.from_local_datetime(&local).single()?.timestamp_millis(),
                offset: Some(format_offset(offset)),
            }),
            None => Some(Self {
                millis: local.and_utc().timestamp_millis(),
                offset: None,
            }),
        }
    }
}

/// Parse an EXIF-style or ISO 8601 date, keeping any embedded offset.
///
/// Zeroed or blank dates (`0000:00:00 00:00:00`) yield `None`.
pub fn parse_date(raw: &str) -> Option<ParsedDate> {
    let raw = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if raw.is_empty() {
        return None;
    }

    if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
        return Some(ParsedDate {
            local: zoned.naive_local(),
            offset: Some(*zoned.offset()),
        });
    }
    for format in ZONED_FORMATS {
        if let Ok(zoned) = DateTime::parse_from_str(raw, format) {
            return Some(ParsedDate {
                local: zoned.naive_local(),
                offset: Some(*zoned.offset()),
            });
        }
    }
    LOCAL_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format)
            .ok()
            .map(|local| ParsedDate {
                local,
                offset: None,
            })
    })
}

/// Parse `+HH:MM`, `-HHMM`, `+HH` or `Z`.
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if raw.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Format an offset as `+HH:MM`.
pub fn format_offset(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("{sign}{:02}:{:02}", secs / 3600, (secs % 3600) / 60)
}

/// Offset implied by a local time and the GPS UTC stamp of the same moment.
///
/// Rounded to the nearest quarter hour; rejected outside −12h..+14h.
pub fn gps_offset(local: NaiveDateTime, gps_utc: NaiveDateTime) -> Option<FixedOffset> {
    let diff = (local - gps_utc).num_seconds() as f64;
    let rounded = (diff / QUARTER_HOUR_SECS).round() * QUARTER_HOUR_SECS;
    if !rounded.is_finite() {
        return None;
    }
    let secs = rounded as i32;
    if !GPS_OFFSET_RANGE.contains(&secs) {
        return None;
    }
    FixedOffset::east_opt(secs)
}

/// Resolve the creation date from the EXIF sections.
///
/// Tags are tried in order DateTimeOriginal, CreateDate, ModifyDate; the
/// first that parses wins. Its offset is the tag's own offset (or one
/// embedded in the value), else a sibling offset tag, else the GPS-derived
/// offset, else none.
pub fn resolve_creation_date(ifd0: &TagMap, exif: &TagMap, gps: &TagMap) -> Option<ResolvedDate> {
    let gps_utc = gps
        .get(tags::GPS_DATE_TIME)
        .and_then(|v| v.as_str())
        .and_then(parse_date)
        .map(|parsed| parsed.local);

    for (source, date_tag, own_offset_tag) in DATE_TAGS {
        let section = match source {
            DateSource::Ifd0 => ifd0,
            DateSource::Exif => exif,
        };
        let Some(parsed) = section
            .get(date_tag)
            .and_then(|v| v.as_str())
            .and_then(parse_date)
        else {
            continue;
        };

        let offset = offset_tag(exif, own_offset_tag)
            .or(parsed.offset)
            .or_else(|| {
                OFFSET_TAGS
                    .iter()
                    .filter(|tag| **tag != own_offset_tag)
                    .find_map(|tag| offset_tag(exif, tag))
            })
            .or_else(|| gps_utc.and_then(|utc| gps_offset(parsed.local, utc)));

        if let Some(resolved) = ResolvedDate::new(parsed.local, offset) {
            return Some(resolved);
        }
    }
    None
}

fn offset_tag(exif: &TagMap, tag: &str) -> Option<FixedOffset> {
    exif.get(tag).and_then(|v| v.as_str()).and_then(parse_offset)
}

/// Resolve IPTC `DateCreated` (`YYYYMMDD`) and `TimeCreated` (`HHMMSS±HHMM`).
pub fn resolve_iptc_date(date: &str, time: Option<&str>) -> Option<ResolvedDate> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y%m%d").ok()?;
    let (time, offset) = match time.map(str::trim).filter(|t| t.len() >= 6) {
        Some(time) => {
            let (clock, zone) = time.split_at(6);
            let clock = NaiveTime::parse_from_str(clock, "%H%M%S").ok()?;
            (clock, parse_offset(zone))
        }
        None => (NaiveTime::MIN, None),
    };
    ResolvedDate::new(date.and_time(time), offset)
}

/// Parse a container creation time; zone-less values are taken as UTC.
pub fn parse_instant(raw: &str) -> Option<i64> {
    let parsed = parse_date(raw)?;
    ResolvedDate::new(parsed.local, parsed.offset).map(|resolved| resolved.millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::TagValue;

    fn local(raw: &str) -> NaiveDateTime {
        parse_date(raw).unwrap().local
    }

    #[test]
    fn test_parse_date_formats() {
        let parsed = parse_date("2023:07:14 10:15:30").unwrap();
        assert_eq!(parsed.offset, None);
        assert_eq!(parsed.local.to_string(), "2023-07-14 10:15:30");

        let parsed = parse_date("2023-07-14T10:15:30.250+02:00").unwrap();
        assert_eq!(parsed.offset, FixedOffset::east_opt(7200));
        assert_eq!(parsed.local.and_utc().timestamp_subsec_millis(), 250);

        assert_eq!(parse_date("0000:00:00 00:00:00"), None);
        assert_eq!(parse_date("   "), None);
        assert!(parse_date("2023:07:14 10:15:30\0").is_some());
    }

    #[test]
    fn test_offset_round_trip() {
        for raw in ["+02:00", "-05:30", "+0545", "+09"] {
            let offset = parse_offset(raw).unwrap();
            assert_eq!(parse_offset(&format_offset(offset)), Some(offset));
        }
        assert_eq!(format_offset(parse_offset("-0330").unwrap()), "-03:30");
        assert_eq!(parse_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_offset("02:00"), None);
        assert_eq!(parse_offset("+02:75"), None);
    }

    #[test]
    fn test_gps_offset_rounding_and_range() {
        let utc = local("2023:07:14 08:00:00");
        // 2h07m ahead rounds to +02:00.
        let offset = gps_offset(local("2023:07:14 10:07:00"), utc).unwrap();
        assert_eq!(format_offset(offset), "+02:00");
        // 5h38m behind rounds to -05:45.
        let offset = gps_offset(local("2023:07:14 02:22:00"), utc).unwrap();
        assert_eq!(format_offset(offset), "-05:45");
        // Beyond +14h is rejected.
        assert_eq!(gps_offset(local("2023:07:14 23:00:00"), utc), None);
    }

    fn exif(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), TagValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_own_offset_beats_sibling() {
        let exif = exif(&[
            (tags::DATE_TIME_ORIGINAL, "2023:07:14 10:00:00"),
            (tags::OFFSET_TIME_ORIGINAL, "+02:00"),
            (tags::OFFSET_TIME, "-07:00"),
        ]);
        let resolved = resolve_creation_date(&TagMap::new(), &exif, &TagMap::new()).unwrap();
        assert_eq!(resolved.offset.as_deref(), Some("+02:00"));
        assert_eq!(
            resolved.millis,
            local("2023:07:14 08:00:00").and_utc().timestamp_millis()
        );
    }

    #[test]
    fn test_sibling_then_gps_then_utc() {
        let sibling = exif(&[
            (tags::DATE_TIME_ORIGINAL, "2023:07:14 10:00:00"),
            (tags::OFFSET_TIME, "-07:00"),
        ]);
        let resolved = resolve_creation_date(&TagMap::new(), &sibling, &TagMap::new()).unwrap();
        assert_eq!(resolved.offset.as_deref(), Some("-07:00"));

        let bare = exif(&[(tags::DATE_TIME_ORIGINAL, "2023:07:14 10:00:00")]);
        let gps = exif(&[(tags::GPS_DATE_TIME, "2023:07:14 08:59:58")]);
        let resolved = resolve_creation_date(&TagMap::new(), &bare, &gps).unwrap();
        assert_eq!(resolved.offset.as_deref(), Some("+01:00"));

        let resolved = resolve_creation_date(&TagMap::new(), &bare, &TagMap::new()).unwrap();
        assert_eq!(resolved.offset, None);
        assert_eq!(
            resolved.millis,
            local("2023:07:14 10:00:00").and_utc().timestamp_millis()
        );
    }

    #[test]
    fn test_date_tag_precedence() {
        let ifd0 = exif(&[(tags::MODIFY_DATE, "2024:01:01 00:00:00")]);
        let fallback = exif(&[
            (tags::DATE_TIME_ORIGINAL, "0000:00:00 00:00:00"),
            (tags::CREATE_DATE, "2022:05:05 12:00:00"),
        ]);
        let resolved = resolve_creation_date(&ifd0, &fallback, &TagMap::new()).unwrap();
        assert_eq!(
            resolved.millis,
            local("2022:05:05 12:00:00").and_utc().timestamp_millis()
        );

        let resolved = resolve_creation_date(&ifd0, &TagMap::new(), &TagMap::new()).unwrap();
        assert_eq!(
            resolved.millis,
            local("2024:01:01 00:00:00").and_utc().timestamp_millis()
        );
        assert_eq!(resolve_creation_date(&TagMap::new(), &TagMap::new(), &TagMap::new()), None);
    }

    #[test]
    fn test_iptc_date() {
        let resolved = resolve_iptc_date("20230714", Some("101530+0200")).unwrap();
        assert_eq!(resolved.offset.as_deref(), Some("+02:00"));
        assert_eq!(
            resolved.millis,
            local("2023:07:14 08:15:30").and_utc().timestamp_millis()
        );

        let resolved = resolve_iptc_date("20230714", None).unwrap();
        assert_eq!(resolved.offset, None);
        assert_eq!(resolve_iptc_date("2023", None), None);
    }

    #[test]
    fn test_parse_instant() {
        assert_eq!(parse_instant("1970-01-01T00:00:01.000000Z"), Some(1000));
        assert_eq!(parse_instant("1969-12-31 23:59:59"), Some(-1000));
        assert_eq!(parse_instant("garbage"), None);
    }
}
