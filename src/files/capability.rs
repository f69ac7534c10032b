//! Per-format capabilities and handler selection
//!
//! Everything the session needs to know about a format before touching the
//! file lives in two static tables: [`capability`] and [`BAD_COMBINATIONS`].
//! Adding a format means one row in each plus a handler.

use crate::core::error::{XmpError, XmpResult};
use crate::files::format::FileFormat;
use crate::files::handler::XmpOptions;
use std::fmt;

/// Static facts about a container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCapability {
    /// A structure-aware handler is compiled in
    pub has_smart_handler: bool,
    /// The packet scanner may be used on this format
    ///
    /// False where incremental saves leave stale packets ahead of the live one.
    pub generic_scan_allowed: bool,
    /// A packet can be added to a file that has none
    pub can_inject_without_existing_packet: bool,
    /// The scanner may grow the packet by splicing the file
    pub generic_resize_allowed: bool,
    /// The whole file is the packet
    pub whole_file_packet: bool,
    /// Largest packet the native metadata slot can hold
    pub max_packet_len: Option<u64>,
}

/// Capability row for `format`
pub const fn capability(format: FileFormat) -> FormatCapability {
    let base = FormatCapability {
        has_smart_handler: false,
        generic_scan_allowed: true,
        can_inject_without_existing_packet: true,
        generic_resize_allowed: false,
        whole_file_packet: false,
        max_packet_len: None,
    };
    match format {
        FileFormat::Tiff => FormatCapability {
            has_smart_handler: cfg!(feature = "tiff"),
            ..base
        },
        FileFormat::Jpeg => FormatCapability {
            has_smart_handler: cfg!(feature = "jpeg"),
            max_packet_len: Some(65504),
            ..base
        },
        FileFormat::Png => FormatCapability {
            has_smart_handler: cfg!(feature = "png"),
            max_packet_len: Some(i32::MAX as u64 - 22),
            ..base
        },
        FileFormat::Pdf | FileFormat::Illustrator => FormatCapability {
            has_smart_handler: cfg!(feature = "pdf"),
            generic_scan_allowed: false,
            can_inject_without_existing_packet: false,
            ..base
        },
        FileFormat::Mov => FormatCapability {
            has_smart_handler: cfg!(feature = "mov"),
            max_packet_len: Some(u32::MAX as u64 - 24),
            ..base
        },
        FileFormat::Text => FormatCapability {
            generic_resize_allowed: true,
            whole_file_packet: true,
            ..base
        },
        FileFormat::Unknown => FormatCapability {
            can_inject_without_existing_packet: false,
            generic_resize_allowed: true,
            ..base
        },
    }
}

/// Open flags that take part in the bad-combination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlag {
    UseSmartHandler,
    LimitedScanning,
}

impl OpenFlag {
    fn is_set(self, options: &XmpOptions) -> bool {
        match self {
            OpenFlag::UseSmartHandler => options.use_smart_handler,
            OpenFlag::LimitedScanning => options.limited_scanning,
        }
    }
}

impl fmt::Display for OpenFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenFlag::UseSmartHandler => f.write_str("use_smart_handler"),
            OpenFlag::LimitedScanning => f.write_str("limited_scanning"),
        }
    }
}

/// `(flag, format)` pairs rejected at open time
pub const BAD_COMBINATIONS: &[(OpenFlag, FileFormat)] = &[
    (OpenFlag::UseSmartHandler, FileFormat::Text),
    (OpenFlag::UseSmartHandler, FileFormat::Pdf),
    (OpenFlag::UseSmartHandler, FileFormat::Illustrator),
    (OpenFlag::LimitedScanning, FileFormat::Text),
    (OpenFlag::LimitedScanning, FileFormat::Pdf),
];

/// Which handler serves a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerChoice {
    /// Byte-pattern packet scanner
    Generic,
    /// Structure-aware handler for the format
    Smart(FileFormat),
}

impl fmt::Display for HandlerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerChoice::Generic => f.write_str("packet scanner"),
            HandlerChoice::Smart(format) => write!(f, "{} smart handler", format),
        }
    }
}

/// Check `options` against `format` without selecting anything
pub fn validate_options(format: FileFormat, options: &XmpOptions) -> XmpResult<()> {
    if options.use_smart_handler && options.use_packet_scanning {
        return Err(XmpError::IllegalOptionCombination(
            "use_smart_handler and use_packet_scanning are mutually exclusive".to_string(),
        ));
    }

    if let Some((flag, _)) = BAD_COMBINATIONS
        .iter()
        .find(|(flag, bad)| *bad == format && flag.is_set(options))
    {
        return Err(XmpError::IllegalOptionCombination(format!(
            "{} is not allowed for {} files",
            flag, format
        )));
    }

    let caps = capability(format);
    if options.use_smart_handler && !caps.has_smart_handler {
        return Err(XmpError::IllegalOptionCombination(format!(
            "No smart handler available for {} files",
            format
        )));
    }
    if options.use_packet_scanning && !caps.generic_scan_allowed {
        return Err(XmpError::IllegalOptionCombination(format!(
            "Packet scanning is not allowed for {} files",
            format
        )));
    }
    Ok(())
}

/// Validate `options` and pick the handler for `format`
pub fn select_handler(format: FileFormat, options: &XmpOptions) -> XmpResult<HandlerChoice> {
    validate_options(format, options)?;
    let caps = capability(format);
    let choice = if !options.use_packet_scanning && caps.has_smart_handler {
        HandlerChoice::Smart(format)
    } else if caps.generic_scan_allowed {
        HandlerChoice::Generic
    } else {
        return Err(XmpError::IllegalOptionCombination(format!(
            "No handler available for {} files",
            format
        )));
    };
    log::debug!("Selected {} for {} file", choice, format);
    Ok(choice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn smart() -> XmpOptions {
        XmpOptions::default().use_smart_handler()
    }

    fn limited() -> XmpOptions {
        XmpOptions::default().limited_scanning()
    }

    fn rejected(format: FileFormat, options: XmpOptions) -> bool {
        matches!(
            select_handler(format, &options).map_err(|e| e.kind()),
            Err(ErrorKind::IllegalOptionCombination)
        )
    }

    #[test]
    fn test_bad_combinations_rejected() {
        assert!(rejected(FileFormat::Text, smart()));
        assert!(rejected(FileFormat::Pdf, smart()));
        assert!(rejected(FileFormat::Illustrator, smart()));
        assert!(rejected(FileFormat::Text, limited()));
        assert!(rejected(FileFormat::Pdf, limited()));
    }

    #[test]
    fn test_legal_combinations_accepted() {
        assert!(!rejected(FileFormat::Illustrator, limited()));
        assert!(!rejected(FileFormat::Tiff, limited()));
        for format in FileFormat::ALL {
            let caps = capability(format);
            if !caps.has_smart_handler && !caps.generic_scan_allowed {
                continue;
            }
            assert!(!rejected(format, XmpOptions::default()));
            assert!(!rejected(format, XmpOptions::default().for_update()));
        }
    }

    #[test]
    fn test_smart_and_scanning_conflict() {
        let opts = XmpOptions::default()
            .use_smart_handler()
            .use_packet_scanning();
        for format in FileFormat::ALL {
            assert!(rejected(format, opts));
        }
    }

    #[test]
    fn test_pdf_family_rejects_packet_scanning() {
        let scan = XmpOptions::default().use_packet_scanning();
        assert!(rejected(FileFormat::Pdf, scan));
        assert!(rejected(FileFormat::Illustrator, scan));
        assert!(!rejected(FileFormat::Tiff, scan));
        assert!(!rejected(FileFormat::Unknown, scan));
    }

    #[test]
    fn test_smart_handler_required_but_missing() {
        assert!(rejected(FileFormat::Unknown, smart()));
    }

    #[cfg(feature = "tiff")]
    #[test]
    fn test_smart_selection() {
        assert_eq!(
            select_handler(FileFormat::Tiff, &XmpOptions::default()).unwrap(),
            HandlerChoice::Smart(FileFormat::Tiff)
        );
        assert_eq!(
            select_handler(FileFormat::Tiff, &smart()).unwrap(),
            HandlerChoice::Smart(FileFormat::Tiff)
        );
        assert_eq!(
            select_handler(
                FileFormat::Tiff,
                &XmpOptions::default().use_packet_scanning()
            )
            .unwrap(),
            HandlerChoice::Generic
        );
    }

    #[test]
    fn test_text_and_unknown_are_generic() {
        for format in [FileFormat::Text, FileFormat::Unknown] {
            assert_eq!(
                select_handler(format, &XmpOptions::default()).unwrap(),
                HandlerChoice::Generic
            );
        }
    }

    #[test]
    fn test_barren_injection_capability() {
        assert!(!capability(FileFormat::Pdf).can_inject_without_existing_packet);
        assert!(!capability(FileFormat::Illustrator).can_inject_without_existing_packet);
        assert!(capability(FileFormat::Png).can_inject_without_existing_packet);
        assert!(capability(FileFormat::Tiff).max_packet_len.is_none());
        assert!(capability(FileFormat::Text).whole_file_packet);
    }
}
