//! XMP Metadata
//!
//! A deliberately small metadata model: simple and array properties keyed by
//! namespace URI and property name. It exists so that packets located in files
//! can be inspected and edited; the file layer only sees it through
//! [`XmpPacket`].

use crate::core::error::{XmpError, XmpResult};
use crate::core::packet::XmpPacket;
use crate::core::parser::XmpParser;
use crate::core::serializer::XmpSerializer;
use crate::types::value::{ArrayItem, ArrayKind, XmpValue};
use std::collections::BTreeMap;

/// Property address: namespace URI plus local name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey {
    /// Namespace URI
    pub namespace: String,
    /// Property name within the namespace
    pub name: String,
}

impl PropertyKey {
    fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

/// Main structure for working with XMP metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmpMeta {
    properties: BTreeMap<PropertyKey, XmpValue>,
    /// Prefixes declared by the parsed packet or registered by the caller
    prefixes: BTreeMap<String, String>,
    about_uri: String,
}

impl XmpMeta {
    /// Create a new empty XMP metadata object
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse XMP metadata from a string
    ///
    /// The string should contain a complete XMP Packet (with or without
    /// the `<?xpacket>` wrapper).
    pub fn parse(s: &str) -> XmpResult<Self> {
        XmpParser::new().parse_packet(s)
    }

    /// Parse XMP metadata from raw packet bytes (UTF-8, optional BOM)
    pub fn from_bytes(bytes: &[u8]) -> XmpResult<Self> {
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        let text = std::str::from_utf8(bytes)
            .map_err(|e| XmpError::ParseError(format!("Invalid UTF-8 in XMP: {}", e)))?;
        Self::parse(text)
    }

    /// Number of top-level properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the metadata carries no properties
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Check if a property exists
    pub fn has_property(&self, namespace: &str, name: &str) -> bool {
        self.properties
            .contains_key(&PropertyKey::new(namespace, name))
    }

    /// Get a property value
    pub fn get_property(&self, namespace: &str, name: &str) -> Option<&XmpValue> {
        self.properties.get(&PropertyKey::new(namespace, name))
    }

    /// Set a simple or array property, replacing any previous value
    ///
    /// # Errors
    ///
    /// [`XmpError::BadParam`] if the namespace is empty or the name is not a
    /// valid XML local name.
    pub fn set_property(
        &mut self,
        namespace: &str,
        name: &str,
        value: impl Into<XmpValue>,
    ) -> XmpResult<()> {
        validate_key(namespace, name)?;
        self.properties
            .insert(PropertyKey::new(namespace, name), value.into());
        Ok(())
    }

    /// Set an array property from plain items
    pub fn set_array<I, S>(
        &mut self,
        namespace: &str,
        name: &str,
        kind: ArrayKind,
        items: I,
    ) -> XmpResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = items.into_iter().map(ArrayItem::new).collect();
        self.set_property(namespace, name, XmpValue::Array(kind, items))
    }

    /// Set the `x-default` entry of a language alternative
    pub fn set_localized_text(
        &mut self,
        namespace: &str,
        name: &str,
        value: impl Into<String>,
    ) -> XmpResult<()> {
        let item = ArrayItem::with_lang(value, "x-default");
        self.set_property(namespace, name, XmpValue::Array(ArrayKind::Alt, vec![item]))
    }

    /// Delete a property, returning its previous value
    pub fn delete_property(&mut self, namespace: &str, name: &str) -> Option<XmpValue> {
        self.properties.remove(&PropertyKey::new(namespace, name))
    }

    /// Iterate over all properties in namespace/name order
    pub fn properties(&self) -> impl Iterator<Item = (&PropertyKey, &XmpValue)> {
        self.properties.iter()
    }

    /// Prefer `prefix` when serializing properties of `namespace`
    pub fn register_prefix(&mut self, namespace: &str, prefix: &str) -> XmpResult<()> {
        if namespace.is_empty() || !is_xml_name(prefix) || prefix.contains(':') {
            return Err(XmpError::BadParam(format!(
                "Invalid namespace prefix '{}' for '{}'",
                prefix, namespace
            )));
        }
        self.prefixes
            .insert(namespace.to_string(), prefix.to_string());
        Ok(())
    }

    /// Prefix registered for a namespace, if any
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.prefixes.get(namespace).map(String::as_str)
    }

    /// Get the about URI
    pub fn about_uri(&self) -> &str {
        &self.about_uri
    }

    /// Set the about URI
    pub fn set_about_uri(&mut self, uri: impl Into<String>) {
        self.about_uri = uri.into();
    }

    /// Serialize to RDF/XML string (no packet wrapper)
    pub fn serialize(&self) -> XmpResult<String> {
        XmpSerializer::new().serialize_rdf(self)
    }

    /// Serialize to XMP Packet format with the default padding
    pub fn serialize_packet(&self) -> XmpResult<String> {
        XmpSerializer::new().serialize_packet(self)
    }

    /// Serialize to XMP Packet format with `padding` bytes of whitespace
    pub fn serialize_packet_with_padding(&self, padding: usize) -> XmpResult<String> {
        XmpSerializer::new()
            .with_padding(padding)
            .serialize_packet(self)
    }
}

impl XmpPacket for XmpMeta {
    fn from_packet(packet: &[u8]) -> XmpResult<Self> {
        Self::from_bytes(packet)
    }

    fn to_packet(&self) -> XmpResult<Vec<u8>> {
        self.serialize_packet().map(String::into_bytes)
    }
}

fn validate_key(namespace: &str, name: &str) -> XmpResult<()> {
    if namespace.is_empty() {
        return Err(XmpError::BadParam("Empty namespace URI".to_string()));
    }
    if !is_xml_name(name) || name.contains(':') {
        return Err(XmpError::BadParam(format!(
            "Invalid property name '{}'",
            name
        )));
    }
    Ok(())
}

/// Loose XML Name check: letter or underscore first, then name characters
pub(crate) fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}
