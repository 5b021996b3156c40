//! XMP packet parser.
//!
//! Flattens an RDF/XML packet into [`TagSections`]: properties of
//! `rdf:Description` (attributes or simple child elements) land in `xmp`,
//! `dc:subject` bags in `subjects`, and `mwg-rs:RegionList` items in
//! `regions`. Prefixes are matched as written; the conventional ones are
//! assumed.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{MetadataError, Result};
use crate::parser::SidecarParser;
use crate::sections::{RegionArea, RegionEntry, RegionFields, TagSections, TagValue};

const SECTION: &str = "XMP";
const PACKET_START: &[u8] = b"<x:xmpmeta";
const PACKET_END: &[u8] = b"</x:xmpmeta>";
const DESCRIPTION: &str = "rdf:Description";
const LIST_ITEM: &str = "rdf:li";
const REGION_LIST: &str = "mwg-rs:RegionList";

/// Parses XMP packets and sidecar files.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmpParser;

impl XmpParser {
    /// Parse one XMP document.
    pub fn parse_packet(&self, packet: &[u8]) -> Result<TagSections> {
        let text = String::from_utf8_lossy(packet);
        let mut reader = Reader::from_str(&text);
        reader.config_mut().trim_text(true);

        let mut walker = XmpWalker::default();
        loop {
            match reader.read_event() {
                Ok(Event::Start(element)) => walker.open(&element, false)?,
                Ok(Event::Empty(element)) => walker.open(&element, true)?,
                Ok(Event::End(_)) => walker.close(),
                Ok(Event::Text(text)) => {
                    let text = text
                        .unescape()
                        .map_err(|e| MetadataError::malformed(SECTION, e))?;
                    walker.text(&text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(MetadataError::malformed(SECTION, e)),
            }
        }

        if !walker.saw_description {
            return Err(MetadataError::Missing { section: SECTION });
        }
        Ok(walker.sections)
    }
}

impl SidecarParser for XmpParser {
    fn parse(&self, contents: &[u8]) -> Result<TagSections> {
        self.parse_packet(contents)
    }
}

/// Locate the `x:xmpmeta` packet embedded in a file header.
pub fn find_xmp_packet(bytes: &[u8]) -> Option<&[u8]> {
    let start = find(bytes, PACKET_START)?;
    let end = start + find(&bytes[start..], PACKET_END)? + PACKET_END.len();
    Some(&bytes[start..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[derive(Default)]
struct XmpWalker {
    sections: TagSections,
    stack: Vec<String>,
    region: Option<RegionBuilder>,
    /// Stack index of the `rdf:li` holding the open region.
    region_depth: usize,
    saw_description: bool,
}

impl XmpWalker {
    fn open(&mut self, element: &BytesStart<'_>, empty: bool) -> Result<()> {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in element.attributes() {
            let attribute = attribute.map_err(|e| MetadataError::malformed(SECTION, e))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| MetadataError::malformed(SECTION, e))?
                .into_owned();
            attributes.push((key, value));
        }

        let depth = self.stack.len();
        if name == LIST_ITEM
            && self.region.is_none()
            && depth >= 2
            && self.stack[depth - 2] == REGION_LIST
        {
            self.region = Some(RegionBuilder::default());
            self.region_depth = depth;
        }

        if name == DESCRIPTION {
            self.saw_description = true;
        }

        if let Some(region) = self.region.as_mut() {
            if name == DESCRIPTION && depth == self.region_depth + 1 {
                region.nested = true;
            }
            for (key, value) in &attributes {
                region.set(key, value);
            }
        } else if name == DESCRIPTION {
            for (key, value) in attributes {
                if is_property(&key) {
                    self.sections
                        .xmp
                        .entry(key)
                        .or_insert(TagValue::Text(value));
                }
            }
        }

        self.stack.push(name);
        if empty {
            self.close();
        }
        Ok(())
    }

    fn close(&mut self) {
        self.stack.pop();
        if self.stack.len() <= self.region_depth {
            if let Some(region) = self.region.take() {
                self.sections.regions.push(region.finish());
            }
        }
    }

    fn text(&mut self, text: &str) {
        let depth = self.stack.len();
        let Some(current) = self.stack.last() else {
            return;
        };

        if let Some(region) = self.region.as_mut() {
            region.set(current, text);
            return;
        }

        if current == LIST_ITEM && depth >= 3 {
            let property = self.stack[depth - 3].as_str();
            match property {
                "dc:subject" => self.sections.subjects.push(text.to_string()),
                "dc:title" | "dc:description" => {
                    self.sections
                        .xmp
                        .entry(property.to_string())
                        .or_insert_with(|| TagValue::from(text));
                }
                _ => {}
            }
        } else if depth >= 2 && self.stack[depth - 2] == DESCRIPTION {
            self.sections
                .xmp
                .entry(current.clone())
                .or_insert_with(|| TagValue::from(text));
        }
    }
}

fn is_property(key: &str) -> bool {
    !(key.starts_with("xmlns") || key.starts_with("rdf:") || key.starts_with("xml:"))
}

#[derive(Default)]
struct RegionBuilder {
    nested: bool,
    name: Option<String>,
    kind: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    w: Option<f64>,
    h: Option<f64>,
}

impl RegionBuilder {
    fn set(&mut self, key: &str, value: &str) {
        let number = || value.trim().parse::<f64>().ok();
        match key {
            "mwg-rs:Name" => self.name = Some(value.to_string()),
            "mwg-rs:Type" => self.kind = Some(value.to_string()),
            "stArea:x" => self.x = number(),
            "stArea:y" => self.y = number(),
            "stArea:w" => self.w = number(),
            "stArea:h" => self.h = number(),
            _ => {}
        }
    }

    fn finish(self) -> RegionEntry {
        let area = match (self.x, self.y, self.w, self.h) {
            (Some(x), Some(y), Some(w), Some(h)) => Some(RegionArea { x, y, w, h }),
            _ => None,
        };
        let fields = RegionFields {
            name: self.name,
            kind: self.kind,
            area,
        };
        if self.nested {
            RegionEntry::Nested {
                description: Some(fields),
            }
        } else {
            RegionEntry::Flat(fields)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::tags;

    const SIDECAR: &str = r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:xmp="http://ns.adobe.com/xap/1.0/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:photoshop="http://ns.adobe.com/photoshop/1.0/"
    xmp:Rating="4"
    photoshop:City="Lisbon">
   <dc:subject>
    <rdf:Bag>
     <rdf:li>tram</rdf:li>
     <rdf:li>Lisbon &amp; more</rdf:li>
    </rdf:Bag>
   </dc:subject>
   <dc:title>
    <rdf:Alt>
     <rdf:li xml:lang="x-default">Yellow tram</rdf:li>
    </rdf:Alt>
   </dc:title>
   <photoshop:Country>Portugal</photoshop:Country>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#;

    const REGIONS: &str = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:mwg-rs="http://www.metadataworkinggroup.com/schemas/regions/"
    xmlns:stArea="http://ns.adobe.com/xmp/sType/Area#">
   <mwg-rs:Regions rdf:parseType="Resource">
    <mwg-rs:RegionList>
     <rdf:Bag>
      <rdf:li>
       <rdf:Description mwg-rs:Name="Ada" mwg-rs:Type="Face">
        <mwg-rs:Area stArea:x="0.5" stArea:y="0.5" stArea:w="0.2" stArea:h="0.1"/>
       </rdf:Description>
      </rdf:li>
      <rdf:li rdf:parseType="Resource">
       <mwg-rs:Name>Grace</mwg-rs:Name>
       <mwg-rs:Type>Face</mwg-rs:Type>
       <mwg-rs:Area stArea:x="0.25" stArea:y="0.25" stArea:w="0.1" stArea:h="0.1"/>
      </rdf:li>
     </rdf:Bag>
    </mwg-rs:RegionList>
   </mwg-rs:Regions>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>"#;

    #[test]
    fn test_parse_sidecar_properties() {
        let sections = XmpParser.parse_packet(SIDECAR.as_bytes()).unwrap();

        assert_eq!(sections.xmp[tags::XMP_RATING].as_i64(), Some(4));
        assert_eq!(sections.xmp[tags::PS_CITY].as_str(), Some("Lisbon"));
        assert_eq!(sections.xmp[tags::PS_COUNTRY].as_str(), Some("Portugal"));
        assert_eq!(sections.xmp[tags::DC_TITLE].as_str(), Some("Yellow tram"));
        assert_eq!(sections.subjects, ["tram", "Lisbon & more"]);
        assert!(!sections.xmp.contains_key("rdf:about"));
        assert!(sections.regions.is_empty());
    }

    #[test]
    fn test_parse_both_region_shapes() {
        let sections = XmpParser.parse_packet(REGIONS.as_bytes()).unwrap();
        assert_eq!(sections.regions.len(), 2);

        let RegionEntry::Nested {
            description: Some(nested),
        } = &sections.regions[0]
        else {
            panic!("expected nested region, got {:?}", sections.regions[0]);
        };
        assert_eq!(nested.name.as_deref(), Some("Ada"));
        assert_eq!(
            nested.area,
            Some(RegionArea {
                x: 0.5,
                y: 0.5,
                w: 0.2,
                h: 0.1
            })
        );

        let RegionEntry::Flat(flat) = &sections.regions[1] else {
            panic!("expected flat region, got {:?}", sections.regions[1]);
        };
        assert_eq!(flat.name.as_deref(), Some("Grace"));
        assert_eq!(flat.kind.as_deref(), Some("Face"));
        assert!(flat.area.is_some());
    }

    #[test]
    fn test_find_packet_in_header() {
        let mut header = b"\xff\xd8\xff\xe1garbage http://ns.adobe.com/xap/1.0/\0".to_vec();
        header.extend_from_slice(SIDECAR.as_bytes());
        header.extend_from_slice(b"\xff\xdb trailing");

        let packet = find_xmp_packet(&header).unwrap();
        assert!(packet.starts_with(b"<x:xmpmeta"));
        assert!(packet.ends_with(b"</x:xmpmeta>"));
    }

    #[test]
    fn test_truncated_packet_not_found() {
        assert!(find_xmp_packet(b"<x:xmpmeta xmlns:x='adobe:ns:meta/'><rdf:RDF>").is_none());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(XmpParser.parse_packet(b"not xml at all").is_err());
    }
}
