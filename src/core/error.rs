//! Error types for XMP file operations
//!
//! This module defines the error taxonomy shared by the session, the packet
//! scanner and the format handlers.

use crate::files::format::FileFormat;
use thiserror::Error;

/// Error types for XMP file operations
#[derive(Debug, Error)]
pub enum XmpError {
    /// The path does not resolve to a readable regular file
    #[error("File not found: {0}")]
    NotFound(String),

    /// The file exists but the process may not open it with the requested access
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The session already holds an open handle
    #[error("Session already has an open file: {0}")]
    AlreadyOpen(String),

    /// An operation was attempted on a closed session
    #[error("Operation on a closed session")]
    UseAfterClose,

    /// The open flags are not legal for the classified format
    #[error("Illegal option combination: {0}")]
    IllegalOptionCombination(String),

    /// The file was read successfully but carries no XMP packet
    #[error("No XMP packet found")]
    NoPacketFound,

    /// Injection was attempted on a session not opened for update
    #[error("File is not opened for update")]
    ReadOnlyViolation,

    /// The format or the current file state does not allow injection
    #[error("Injection not supported: {0}")]
    InjectionUnsupported(String),

    /// A format handler failed to parse or rewrite the container
    #[error("{format} handler fault: {message}")]
    HandlerFault {
        /// Format of the container being processed
        format: FileFormat,
        /// Description of the structural failure
        message: String,
    },

    /// Parse error (XML/RDF parsing failed)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Bad parameter provided to a function
    #[error("Bad parameter: {0}")]
    BadParam(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Error category, for callers that only branch on the kind of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    AlreadyOpen,
    UseAfterClose,
    IllegalOptionCombination,
    NoPacketFound,
    ReadOnlyViolation,
    InjectionUnsupported,
    HandlerFault,
    ParseError,
    SerializationError,
    BadParam,
    Io,
}

impl XmpError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            XmpError::NotFound(_) => ErrorKind::NotFound,
            XmpError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            XmpError::AlreadyOpen(_) => ErrorKind::AlreadyOpen,
            XmpError::UseAfterClose => ErrorKind::UseAfterClose,
            XmpError::IllegalOptionCombination(_) => ErrorKind::IllegalOptionCombination,
            XmpError::NoPacketFound => ErrorKind::NoPacketFound,
            XmpError::ReadOnlyViolation => ErrorKind::ReadOnlyViolation,
            XmpError::InjectionUnsupported(_) => ErrorKind::InjectionUnsupported,
            XmpError::HandlerFault { .. } => ErrorKind::HandlerFault,
            XmpError::ParseError(_) => ErrorKind::ParseError,
            XmpError::SerializationError(_) => ErrorKind::SerializationError,
            XmpError::BadParam(_) => ErrorKind::BadParam,
            XmpError::IoError(_) => ErrorKind::Io,
        }
    }

    /// Build a handler fault for `format`
    pub fn fault(format: FileFormat, message: impl Into<String>) -> Self {
        XmpError::HandlerFault {
            format,
            message: message.into(),
        }
    }

    /// Re-home a low-level failure raised inside a format handler.
    ///
    /// I/O and parse failures that happen while walking a container mean the
    /// container is malformed, so they become [`XmpError::HandlerFault`].
    /// Contract errors (injection refusals and the like) pass through.
    pub(crate) fn in_handler(self, format: FileFormat) -> Self {
        match self {
            XmpError::IoError(e) => XmpError::fault(format, e.to_string()),
            XmpError::BadParam(msg) => XmpError::fault(format, msg),
            other => other,
        }
    }
}

/// Result type alias for XMP operations
pub type XmpResult<T> = Result<T, XmpError>;
