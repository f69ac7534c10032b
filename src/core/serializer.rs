//! XMP XML/RDF serializer
//!
//! This module provides functionality for serializing XMP metadata to XML/RDF format.

use crate::core::error::{XmpError, XmpResult};
use crate::core::metadata::XmpMeta;
use crate::core::namespace::{default_prefix, is_reserved_prefix, ns};
use crate::types::value::XmpValue;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

/// Whitespace reserved inside a packet so it can later be rewritten in place
pub const DEFAULT_PADDING: usize = 2048;

/// Packet header; the BOM in `begin` marks the packet as UTF-8
const PACKET_HEADER: &str = "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>";

/// Writable packet trailer
pub const PACKET_TRAILER: &str = "<?xpacket end=\"w\"?>";

/// Serializer for XMP Packets
pub struct XmpSerializer {
    padding: usize,
}

impl XmpSerializer {
    /// Create a new XMP serializer
    pub fn new() -> Self {
        Self {
            padding: DEFAULT_PADDING,
        }
    }

    /// Use `padding` bytes of whitespace before the packet trailer
    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Serialize metadata to RDF/XML wrapped in `x:xmpmeta`
    pub fn serialize_rdf(&self, meta: &XmpMeta) -> XmpResult<String> {
        let prefixes = Self::assign_prefixes(meta);
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 1);

        let mut xmpmeta = BytesStart::new("x:xmpmeta");
        xmpmeta.push_attribute(("xmlns:x", ns::X));
        writer.write_event(Event::Start(xmpmeta))?;

        let mut rdf = BytesStart::new("rdf:RDF");
        rdf.push_attribute(("xmlns:rdf", ns::RDF));
        writer.write_event(Event::Start(rdf))?;

        let mut description = BytesStart::new("rdf:Description");
        description.push_attribute(("rdf:about", meta.about_uri()));
        for (uri, prefix) in &prefixes {
            description.push_attribute((format!("xmlns:{}", prefix).as_str(), uri.as_str()));
        }
        writer.write_event(Event::Start(description))?;

        for (key, value) in meta.properties() {
            let prefix = prefixes.get(&key.namespace).ok_or_else(|| {
                XmpError::SerializationError(format!("No prefix for '{}'", key.namespace))
            })?;
            let qname = format!("{}:{}", prefix, key.name);
            Self::serialize_value(&mut writer, &qname, value)?;
        }

        writer.write_event(Event::End(BytesEnd::new("rdf:Description")))?;
        writer.write_event(Event::End(BytesEnd::new("rdf:RDF")))?;
        writer.write_event(Event::End(BytesEnd::new("x:xmpmeta")))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| XmpError::SerializationError(e.to_string()))
    }

    /// Serialize a property element
    fn serialize_value(
        writer: &mut Writer<Cursor<Vec<u8>>>,
        qname: &str,
        value: &XmpValue,
    ) -> XmpResult<()> {
        writer.write_event(Event::Start(BytesStart::new(qname)))?;
        match value {
            XmpValue::String(text) => {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            XmpValue::Array(kind, items) => {
                writer.write_event(Event::Start(BytesStart::new(kind.element_name())))?;
                for item in items {
                    let mut li = BytesStart::new("rdf:li");
                    if let Some(lang) = &item.lang {
                        li.push_attribute(("xml:lang", lang.as_str()));
                    }
                    writer.write_event(Event::Start(li))?;
                    writer.write_event(Event::Text(BytesText::new(&item.value)))?;
                    writer.write_event(Event::End(BytesEnd::new("rdf:li")))?;
                }
                writer.write_event(Event::End(BytesEnd::new(kind.element_name())))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new(qname)))?;
        Ok(())
    }

    /// Pick one unique prefix per namespace in use
    fn assign_prefixes(meta: &XmpMeta) -> BTreeMap<String, String> {
        let namespaces: BTreeSet<&str> = meta
            .properties()
            .map(|(key, _)| key.namespace.as_str())
            .collect();

        let mut assigned: BTreeMap<String, String> = BTreeMap::new();
        let mut taken: BTreeSet<String> = BTreeSet::new();
        let mut generated = 0usize;

        for uri in namespaces {
            let preferred = meta
                .prefix_for(uri)
                .or_else(|| default_prefix(uri))
                .filter(|p| !is_reserved_prefix(p) && !taken.contains(*p))
                .map(str::to_string);
            let prefix = preferred.unwrap_or_else(|| loop {
                generated += 1;
                let candidate = format!("ns{}", generated);
                if !taken.contains(&candidate) {
                    break candidate;
                }
            });
            taken.insert(prefix.clone());
            assigned.insert(uri.to_string(), prefix);
        }
        assigned
    }

    /// Serialize to XMP Packet format
    pub fn serialize_packet(&self, meta: &XmpMeta) -> XmpResult<String> {
        let rdf_content = self.serialize_rdf(meta)?;
        Ok(format!(
            "{}\n{}\n{}{}",
            PACKET_HEADER,
            rdf_content,
            padding(self.padding),
            PACKET_TRAILER
        ))
    }
}

impl Default for XmpSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whitespace padding in 100-column lines, exactly `len` bytes long
pub fn padding(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        if (out.len() + 1) % 100 == 0 || out.len() + 1 == len {
            out.push('\n');
        } else {
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_packet() {
        let mut meta = XmpMeta::new();
        meta.set_property(ns::XMP, "CreatorTool", "TestApp").unwrap();
        let packet = XmpSerializer::new().serialize_packet(&meta).unwrap();
        assert!(packet.starts_with("<?xpacket begin="));
        assert!(packet.ends_with(PACKET_TRAILER));
        assert!(packet.contains("<xmp:CreatorTool>TestApp</xmp:CreatorTool>"));
    }

    #[test]
    fn test_generated_prefixes_are_unique() {
        let mut meta = XmpMeta::new();
        meta.set_property("http://example.com/a/", "one", "1").unwrap();
        meta.set_property("http://example.com/b/", "two", "2").unwrap();
        let rdf = XmpSerializer::new().serialize_rdf(&meta).unwrap();
        assert!(rdf.contains("xmlns:ns1=\"http://example.com/a/\""));
        assert!(rdf.contains("xmlns:ns2=\"http://example.com/b/\""));
    }

    #[test]
    fn test_padding_length() {
        assert_eq!(padding(0), "");
        assert_eq!(padding(250).len(), 250);
        assert!(padding(250).ends_with('\n'));
    }
}
