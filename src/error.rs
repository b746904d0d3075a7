//! Error kinds shared by the scanner, the codec layer, and the printer.
//!
//! The lexer never returns these as `Result`s on its hot path — per the
//! propagation policy it surfaces failures as the terminal `ErrorOccurred`
//! event instead (see [`crate::event::EventKind::ErrorOccurred`]) and this
//! type supplies that event's message. Construction-time failures
//! (unrecognized encoding, printer misuse) do return `Result<_, XmlError>`
//! directly since there is no event stream yet to carry them on.

use thiserror::Error;

/// One of the seven named error kinds from the error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlErrorKind {
    MalformedCharacter,
    UnexpectedCharacter,
    UnknownEntity,
    TagMismatch,
    UnclosedDocument,
    UnsupportedEncoding,
    PrinterStateViolation,
}

impl XmlErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            XmlErrorKind::MalformedCharacter => "MalformedCharacter",
            XmlErrorKind::UnexpectedCharacter => "UnexpectedCharacter",
            XmlErrorKind::UnknownEntity => "UnknownEntity",
            XmlErrorKind::TagMismatch => "TagMismatch",
            XmlErrorKind::UnclosedDocument => "UnclosedDocument",
            XmlErrorKind::UnsupportedEncoding => "UnsupportedEncoding",
            XmlErrorKind::PrinterStateViolation => "PrinterStateViolation",
        }
    }
}

/// A typed XML error carrying a human-readable message and an optional
/// byte offset into the source that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind_str}: {message}")]
pub struct XmlError {
    kind: XmlErrorKind,
    message: String,
    offset: Option<usize>,
    kind_str: &'static str,
}

impl XmlError {
    pub fn new(kind: XmlErrorKind, message: impl Into<String>) -> Self {
        XmlError {
            kind,
            message: message.into(),
            offset: None,
            kind_str: kind.as_str(),
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn kind(&self) -> XmlErrorKind {
        self.kind
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Render the same text the lexer places in an `ErrorOccurred` event's
    /// content buffer.
    pub fn render(&self) -> String {
        match self.offset {
            Some(off) => format!("{}: {} (at byte {})", self.kind.as_str(), self.message, off),
            None => format!("{}: {}", self.kind.as_str(), self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_offset_when_present() {
        let e = XmlError::new(XmlErrorKind::TagMismatch, "expected `a`, found `b`").with_offset(12);
        assert_eq!(e.render(), "TagMismatch: expected `a`, found `b` (at byte 12)");
    }

    #[test]
    fn render_without_offset() {
        let e = XmlError::new(XmlErrorKind::UnsupportedEncoding, "foo-16");
        assert_eq!(e.render(), "UnsupportedEncoding: foo-16");
    }
}
