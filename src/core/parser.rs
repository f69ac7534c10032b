//! XMP XML/RDF parser
//!
//! This module provides functionality for parsing XMP Packets from XML/RDF format.

use crate::core::error::{XmpError, XmpResult};
use crate::core::metadata::XmpMeta;
use crate::core::namespace::{default_prefix, is_reserved_prefix, ns};
use crate::types::value::{ArrayItem, ArrayKind, XmpValue};
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// Open element on the parser stack
enum Frame {
    /// Envelope or unsupported element; content is ignored
    Other,
    /// `rdf:Description` holding top-level properties
    Description,
    /// Property element of the current description
    Property {
        namespace: String,
        name: String,
        text: String,
        array: Option<(ArrayKind, Vec<ArrayItem>)>,
        /// Holds child elements, so its text is only layout whitespace
        nested: bool,
    },
    /// `rdf:Seq` / `rdf:Bag` / `rdf:Alt`
    Array,
    /// `rdf:li`
    Item { lang: Option<String>, text: String },
}

/// Shape of the innermost open element
#[derive(Clone, Copy)]
enum Parent {
    Root,
    Other,
    Description,
    Property,
    Array,
    Item,
}

impl Parent {
    fn of(frame: &Frame) -> Self {
        match frame {
            Frame::Other => Parent::Other,
            Frame::Description => Parent::Description,
            Frame::Property { .. } => Parent::Property,
            Frame::Array => Parent::Array,
            Frame::Item { .. } => Parent::Item,
        }
    }
}

/// Parser for XMP Packets
pub struct XmpParser {
    /// prefix -> namespace URI, as declared so far
    declared: HashMap<String, String>,
}

impl XmpParser {
    /// Create a new XMP parser
    pub fn new() -> Self {
        let mut declared = HashMap::new();
        declared.insert("xml".to_string(), ns::XML.to_string());
        Self { declared }
    }

    /// Parse an XMP Packet from a string
    ///
    /// This function extracts the XMP Packet from the `<?xpacket>` wrapper
    /// and parses the RDF/XML content.
    pub fn parse_packet(&mut self, xml: &str) -> XmpResult<XmpMeta> {
        let packet_content = Self::extract_packet_content(xml)?;
        self.parse_rdf(packet_content)
    }

    /// Extract the XMP Packet content from the `<?xpacket>` wrapper
    fn extract_packet_content(xml: &str) -> XmpResult<&str> {
        let content = match xml.find("<?xpacket") {
            Some(start_pos) => {
                let Some(end_pos) = xml[start_pos..].find("?>") else {
                    return Err(XmpError::ParseError(
                        "Unterminated xpacket header".to_string(),
                    ));
                };
                let pi_end = start_pos + end_pos + 2;
                match xml[pi_end..].find("<?xpacket end") {
                    Some(close_pos) => &xml[pi_end..pi_end + close_pos],
                    None => &xml[pi_end..],
                }
            }
            None => xml,
        };

        let trimmed = content.trim();
        if !trimmed.starts_with('<') {
            return Err(XmpError::ParseError("Invalid XML content".to_string()));
        }
        Ok(trimmed)
    }

    /// Parse RDF/XML content into metadata
    fn parse_rdf(&mut self, xml: &str) -> XmpResult<XmpMeta> {
        let mut reader = Reader::from_str(xml);
        // Entity references arrive as separate events; trimming each text
        // fragment would eat the spaces around them.
        reader.config_mut().trim_text(false);

        let mut meta = XmpMeta::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut saw_rdf = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let frame = self.open_element(&e, &mut stack, &mut meta, &mut saw_rdf)?;
                    stack.push(frame);
                }
                Ok(Event::Empty(e)) => {
                    let frame = self.open_element(&e, &mut stack, &mut meta, &mut saw_rdf)?;
                    self.close_element(frame, &mut stack, &mut meta)?;
                }
                Ok(Event::End(_)) => {
                    let Some(frame) = stack.pop() else {
                        return Err(XmpError::ParseError("Unbalanced end tag".to_string()));
                    };
                    self.close_element(frame, &mut stack, &mut meta)?;
                }
                Ok(Event::Text(e)) => {
                    Self::append_text(&mut stack, &String::from_utf8_lossy(e.as_ref()));
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    Self::append_text(&mut stack, &escape(&text));
                }
                Ok(Event::GeneralRef(e)) => {
                    let name = String::from_utf8_lossy(e.as_ref()).to_string();
                    Self::append_text(&mut stack, &format!("&{};", name));
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(XmpError::ParseError(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        if !stack.is_empty() {
            return Err(XmpError::ParseError("Unexpected end of packet".to_string()));
        }
        if !saw_rdf {
            return Err(XmpError::ParseError("Missing rdf:RDF element".to_string()));
        }
        Ok(meta)
    }

    /// Classify a start tag and apply its attributes
    fn open_element(
        &mut self,
        e: &BytesStart,
        stack: &mut [Frame],
        meta: &mut XmpMeta,
        saw_rdf: &mut bool,
    ) -> XmpResult<Frame> {
        let attrs = self.collect_attributes(e)?;
        let qname = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let (namespace, local) = self.resolve(&qname)?;
        let is_rdf = namespace == ns::RDF;

        if is_rdf && local == "RDF" {
            *saw_rdf = true;
            return Ok(Frame::Other);
        }

        let parent = stack.last().map(Parent::of).unwrap_or(Parent::Root);
        if let Some(Frame::Property { nested, .. }) = stack.last_mut() {
            *nested = true;
        }

        if is_rdf && local == "Description" {
            if !matches!(parent, Parent::Root | Parent::Other) {
                log::debug!("Skipping nested rdf:Description (structs are not modelled)");
                return Ok(Frame::Other);
            }
            for (key, value) in attrs {
                let (attr_ns, attr_local) = self.resolve(&key)?;
                if attr_ns == ns::RDF && attr_local == "about" {
                    meta.set_about_uri(value);
                } else if !self.is_envelope_namespace(&attr_ns) {
                    self.record_prefix(meta, &key, &attr_ns);
                    meta.set_property(&attr_ns, &attr_local, value)?;
                }
            }
            return Ok(Frame::Description);
        }

        match parent {
            Parent::Description if !self.is_envelope_namespace(&namespace) => {
                self.record_prefix(meta, &qname, &namespace);
                let resource = attrs
                    .iter()
                    .find(|(k, _)| k == "rdf:resource")
                    .map(|(_, v)| escape(v).to_string())
                    .unwrap_or_default();
                Ok(Frame::Property {
                    namespace,
                    name: local,
                    text: resource,
                    array: None,
                    nested: false,
                })
            }
            Parent::Property if is_rdf => match ArrayKind::from_local_name(&local) {
                Some(kind) => {
                    if let Some(Frame::Property { array, .. }) = stack.last_mut() {
                        *array = Some((kind, Vec::new()));
                    }
                    Ok(Frame::Array)
                }
                None => Ok(Frame::Other),
            },
            Parent::Array if is_rdf && local == "li" => {
                let lang = attrs
                    .into_iter()
                    .find(|(k, _)| k == "xml:lang")
                    .map(|(_, v)| v);
                Ok(Frame::Item {
                    lang,
                    text: String::new(),
                })
            }
            _ => Ok(Frame::Other),
        }
    }

    /// Finish an element, storing whatever value it produced
    fn close_element(
        &mut self,
        frame: Frame,
        stack: &mut [Frame],
        meta: &mut XmpMeta,
    ) -> XmpResult<()> {
        match frame {
            Frame::Property {
                namespace,
                name,
                text,
                array,
                nested,
            } => {
                let value = match array {
                    Some((kind, items)) => XmpValue::Array(kind, items),
                    None if nested => XmpValue::String(Self::finish_text(text.trim())?),
                    None => XmpValue::String(Self::finish_text(&text)?),
                };
                meta.set_property(&namespace, &name, value)
            }
            Frame::Item { lang, text } => {
                let value = Self::finish_text(&text)?;
                let owner = stack.iter_mut().rev().find_map(|f| match f {
                    Frame::Property {
                        array: Some((_, items)),
                        ..
                    } => Some(items),
                    _ => None,
                });
                if let Some(items) = owner {
                    items.push(ArrayItem { value, lang });
                }
                Ok(())
            }
            Frame::Other | Frame::Description | Frame::Array => Ok(()),
        }
    }

    fn append_text(stack: &mut [Frame], raw: &str) {
        match stack.last_mut() {
            Some(Frame::Property { text, array: None, .. }) | Some(Frame::Item { text, .. }) => {
                text.push_str(raw)
            }
            _ => {}
        }
    }

    /// Unescape element content; surrounding whitespace is part of the value
    fn finish_text(raw: &str) -> XmpResult<String> {
        unescape(raw)
            .map(|s| s.to_string())
            .map_err(|e| XmpError::ParseError(format!("Bad character reference: {}", e)))
    }

    /// Collect attributes, recording `xmlns` declarations as a side effect
    fn collect_attributes(&mut self, e: &BytesStart) -> XmpResult<Vec<(String, String)>> {
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| XmpError::ParseError(format!("Bad attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| XmpError::ParseError(format!("Bad attribute value: {}", e)))?
                .to_string();
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.declared.insert(prefix.to_string(), value);
            } else if key != "xmlns" {
                attrs.push((key, value));
            }
        }
        Ok(attrs)
    }

    /// Split a qualified name into (namespace URI, local name)
    fn resolve(&self, qname: &str) -> XmpResult<(String, String)> {
        let Some((prefix, local)) = qname.split_once(':') else {
            // Unprefixed names only occur in the envelope
            return Ok((String::new(), qname.to_string()));
        };
        let uri = self.declared.get(prefix).ok_or_else(|| {
            XmpError::ParseError(format!("Undeclared namespace prefix '{}'", prefix))
        })?;
        Ok((uri.clone(), local.to_string()))
    }

    fn is_envelope_namespace(&self, uri: &str) -> bool {
        uri.is_empty() || uri == ns::RDF || uri == ns::X || uri == ns::XML
    }

    /// Remember a non-default prefix so the packet serializes back the same way
    fn record_prefix(&self, meta: &mut XmpMeta, qname: &str, uri: &str) {
        let Some((prefix, _)) = qname.split_once(':') else {
            return;
        };
        if is_reserved_prefix(prefix) || default_prefix(uri) == Some(prefix) {
            return;
        }
        if meta.prefix_for(uri).is_none() {
            let _ = meta.register_prefix(uri, prefix);
        }
    }
}

impl Default for XmpParser {
    fn default() -> Self {
        Self::new()
    }
}
