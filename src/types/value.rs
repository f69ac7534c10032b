//! XMP value types
//!
//! This module defines the value types that can be stored in XMP properties.

use std::fmt;

/// RDF container kind of an array property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    /// Ordered array (`rdf:Seq`)
    Seq,
    /// Unordered array (`rdf:Bag`)
    Bag,
    /// Alternative array (`rdf:Alt`), typically language alternatives
    Alt,
}

impl ArrayKind {
    /// RDF element name of the container
    pub fn element_name(&self) -> &'static str {
        match self {
            ArrayKind::Seq => "rdf:Seq",
            ArrayKind::Bag => "rdf:Bag",
            ArrayKind::Alt => "rdf:Alt",
        }
    }

    /// Container kind for an RDF local name
    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "Seq" => Some(ArrayKind::Seq),
            "Bag" => Some(ArrayKind::Bag),
            "Alt" => Some(ArrayKind::Alt),
            _ => None,
        }
    }
}

/// One `rdf:li` entry of an array property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayItem {
    /// Item text
    pub value: String,
    /// `xml:lang` qualifier, if any
    pub lang: Option<String>,
}

impl ArrayItem {
    /// Item without a language qualifier
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            lang: None,
        }
    }

    /// Item with an `xml:lang` qualifier
    pub fn with_lang(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            lang: Some(lang.into()),
        }
    }
}

/// XMP property value types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmpValue {
    /// Simple text value
    String(String),
    /// Array of items
    Array(ArrayKind, Vec<ArrayItem>),
}

impl XmpValue {
    /// Get the value as a string.
    ///
    /// For arrays this is the `x-default` item if there is one, otherwise the
    /// first item.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            XmpValue::String(s) => Some(s),
            XmpValue::Array(_, items) => items
                .iter()
                .find(|item| item.lang.as_deref() == Some("x-default"))
                .or_else(|| items.first())
                .map(|item| item.value.as_str()),
        }
    }

    /// Array items, empty for simple values
    pub fn items(&self) -> &[ArrayItem] {
        match self {
            XmpValue::String(_) => &[],
            XmpValue::Array(_, items) => items,
        }
    }
}

impl fmt::Display for XmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmpValue::String(s) => write!(f, "{}", s),
            XmpValue::Array(_, items) => {
                let values: Vec<&str> = items.iter().map(|i| i.value.as_str()).collect();
                write!(f, "[{}]", values.join(", "))
            }
        }
    }
}

impl From<String> for XmpValue {
    fn from(s: String) -> Self {
        XmpValue::String(s)
    }
}

impl From<&str> for XmpValue {
    fn from(s: &str) -> Self {
        XmpValue::String(s.to_string())
    }
}
