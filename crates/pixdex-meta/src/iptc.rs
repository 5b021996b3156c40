//! Default IPTC parser: IIM datasets inside the Photoshop `8BIM` resource block.

use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::parser::IptcParser;
use crate::sections::IptcRecord;

const SECTION: &str = "IPTC";
const PHOTOSHOP_SIGNATURE: &[u8] = b"Photoshop 3.0\0";
const RESOURCE_SIGNATURE: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;
const DATASET_MARKER: u8 = 0x1c;
const APPLICATION_RECORD: u8 = 2;

mod dataset {
    pub const TITLE: u8 = 5;
    pub const KEYWORDS: u8 = 25;
    pub const DATE_CREATED: u8 = 55;
    pub const TIME_CREATED: u8 = 60;
    pub const CITY: u8 = 90;
    pub const STATE: u8 = 95;
    pub const COUNTRY: u8 = 101;
    pub const CAPTION: u8 = 120;
}

/// Reads the application record of the IPTC IIM block.
#[derive(Debug, Clone, Copy, Default)]
pub struct IimParser;

impl IptcParser for IimParser {
    fn parse(&self, header: &[u8]) -> Result<IptcRecord> {
        let start = find(header, PHOTOSHOP_SIGNATURE)
            .ok_or(MetadataError::Missing { section: SECTION })?;
        let resources = &header[start + PHOTOSHOP_SIGNATURE.len()..];
        let block = find_resource(resources, IPTC_RESOURCE_ID)?
            .ok_or(MetadataError::Missing { section: SECTION })?;
        parse_datasets(block)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

/// Walk the image resource blocks and return the data of `wanted`.
fn find_resource(bytes: &[u8], wanted: u16) -> Result<Option<&[u8]>> {
    let truncated = || MetadataError::malformed(SECTION, "truncated image resource block");
    let mut pos = 0;
    while pos + RESOURCE_SIGNATURE.len() <= bytes.len() {
        if &bytes[pos..pos + RESOURCE_SIGNATURE.len()] != RESOURCE_SIGNATURE {
            // Anything else ends the resource list (next JPEG segment).
            break;
        }
        pos += RESOURCE_SIGNATURE.len();
        let id = read_u16(bytes, pos).ok_or_else(truncated)?;
        pos += 2;

        // Pascal string name, padded to an even total length.
        let name_len = usize::from(*bytes.get(pos).ok_or_else(truncated)?);
        pos += (1 + name_len + 1) & !1;

        let size = read_u32(bytes, pos).ok_or_else(truncated)? as usize;
        pos += 4;
        let data = bytes.get(pos..pos + size).ok_or_else(truncated)?;
        if id == wanted {
            return Ok(Some(data));
        }
        pos += (size + 1) & !1;
    }
    Ok(None)
}

fn parse_datasets(block: &[u8]) -> Result<IptcRecord> {
    let mut record = IptcRecord::default();
    let mut pos = 0;
    while pos + 5 <= block.len() {
        if block[pos] != DATASET_MARKER {
            debug!(offset = pos, "IPTC dataset marker missing, stopping");
            break;
        }
        let number = block[pos + 1];
        let id = block[pos + 2];
        let len = usize::from(read_u16(block, pos + 3).unwrap_or_default());
        pos += 5;
        let data = block
            .get(pos..pos + len)
            .ok_or_else(|| MetadataError::malformed(SECTION, "dataset exceeds block"))?;
        pos += len;

        if number != APPLICATION_RECORD {
            continue;
        }
        let value = String::from_utf8_lossy(data).into_owned();
        match id {
            dataset::TITLE => record.title = Some(value),
            dataset::KEYWORDS => record.keywords.push(value),
            dataset::DATE_CREATED => record.date_created = Some(value),
            dataset::TIME_CREATED => record.time_created = Some(value),
            dataset::CITY => record.city = Some(value),
            dataset::STATE => record.state = Some(value),
            dataset::COUNTRY => record.country = Some(value),
            dataset::CAPTION => record.caption = Some(value),
            _ => {}
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(id: u8, value: &[u8]) -> Vec<u8> {
        let mut out = vec![DATASET_MARKER, APPLICATION_RECORD, id];
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value);
        out
    }

    fn resource(id: u16, data: &[u8]) -> Vec<u8> {
        let mut out = RESOURCE_SIGNATURE.to_vec();
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn header(resources: &[Vec<u8>]) -> Vec<u8> {
        let mut out = b"\xff\xd8\xff\xed\x00\x00".to_vec();
        out.extend_from_slice(PHOTOSHOP_SIGNATURE);
        for r in resources {
            out.extend_from_slice(r);
        }
        out.extend_from_slice(b"\xff\xdb");
        out
    }

    #[test]
    fn test_parse_application_record() {
        let mut block = dataset(dataset::CITY, b"Porto\0\0");
        block.extend(dataset(dataset::COUNTRY, b"Portugal"));
        block.extend(dataset(dataset::KEYWORDS, b"river"));
        block.extend(dataset(dataset::KEYWORDS, b" bridge "));
        block.extend(dataset(dataset::DATE_CREATED, b"20230714"));

        let bytes = header(&[resource(0x03ed, b"odd"), resource(IPTC_RESOURCE_ID, &block)]);
        let record = IimParser.parse(&bytes).unwrap();

        // Raw values: trimming is the extractor's job.
        assert_eq!(record.city.as_deref(), Some("Porto\0\0"));
        assert_eq!(record.country.as_deref(), Some("Portugal"));
        assert_eq!(record.keywords, ["river", " bridge "]);
        assert_eq!(record.date_created.as_deref(), Some("20230714"));
        assert!(record.title.is_none());
    }

    #[test]
    fn test_missing_block() {
        let err = IimParser.parse(b"no photoshop here").unwrap_err();
        assert!(matches!(err, MetadataError::Missing { .. }));

        let err = IimParser.parse(&header(&[resource(0x03ed, b"xy")])).unwrap_err();
        assert!(matches!(err, MetadataError::Missing { .. }));
    }

    #[test]
    fn test_truncated_dataset_is_malformed() {
        let mut block = dataset(dataset::CITY, b"Porto");
        block.truncate(block.len() - 2);
        let bytes = header(&[resource(IPTC_RESOURCE_ID, &block)]);
        assert!(matches!(
            IimParser.parse(&bytes).unwrap_err(),
            MetadataError::Malformed { .. }
        ));
    }
}
