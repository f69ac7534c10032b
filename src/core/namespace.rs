//! Well-known XMP namespaces
//!
//! Properties are addressed by namespace URI. When a packet is serialized each
//! URI needs a prefix; the ones below are the conventional choices, anything
//! else gets a generated `nsN` prefix unless the packet it came from declared one.

/// Built-in XMP namespaces
pub mod ns {
    /// XMP Basic namespace
    pub const XMP: &str = "http://ns.adobe.com/xap/1.0/";
    /// Dublin Core namespace
    pub const DC: &str = "http://purl.org/dc/elements/1.1/";
    /// EXIF namespace
    pub const EXIF: &str = "http://ns.adobe.com/exif/1.0/";
    /// Photoshop namespace
    pub const PHOTOSHOP: &str = "http://ns.adobe.com/photoshop/1.0/";
    /// XMP Rights namespace
    pub const XMP_RIGHTS: &str = "http://ns.adobe.com/xap/1.0/rights/";
    /// XMP Media Management namespace
    pub const XMP_MM: &str = "http://ns.adobe.com/xap/1.0/mm/";
    /// TIFF namespace
    pub const TIFF: &str = "http://ns.adobe.com/tiff/1.0/";
    /// PDF namespace
    pub const PDF: &str = "http://ns.adobe.com/pdf/1.3/";
    /// XMP Dynamic Media namespace
    pub const XMP_DM: &str = "http://ns.adobe.com/xmp/1.0/DynamicMedia/";
    /// RDF namespace
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    /// XML namespace (for xml:lang)
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    /// Adobe meta wrapper namespace (`x:xmpmeta`)
    pub const X: &str = "adobe:ns:meta/";
}

const DEFAULT_PREFIXES: &[(&str, &str)] = &[
    (ns::XMP, "xmp"),
    (ns::DC, "dc"),
    (ns::EXIF, "exif"),
    (ns::PHOTOSHOP, "photoshop"),
    (ns::XMP_RIGHTS, "xmpRights"),
    (ns::XMP_MM, "xmpMM"),
    (ns::TIFF, "tiff"),
    (ns::PDF, "pdf"),
    (ns::XMP_DM, "xmpDM"),
    (ns::RDF, "rdf"),
    (ns::XML, "xml"),
    (ns::X, "x"),
];

/// Conventional prefix for a well-known namespace URI
pub fn default_prefix(uri: &str) -> Option<&'static str> {
    DEFAULT_PREFIXES
        .iter()
        .find(|(u, _)| *u == uri)
        .map(|(_, p)| *p)
}

/// Whether `prefix` is reserved by the packet envelope (`rdf`, `x`, `xml`, `xmlns`)
pub fn is_reserved_prefix(prefix: &str) -> bool {
    matches!(prefix, "rdf" | "x" | "xml" | "xmlns")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix() {
        assert_eq!(default_prefix(ns::PHOTOSHOP), Some("photoshop"));
        assert_eq!(default_prefix("http://example.com/unknown/"), None);
    }

    #[test]
    fn test_reserved_prefixes() {
        assert!(is_reserved_prefix("rdf"));
        assert!(!is_reserved_prefix("dc"));
    }
}
