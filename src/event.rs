//! The XML event data model (§3).

/// Tag of an [`XmlEvent`]. Mirrors the kind set from the error-handling and
/// data-model sections verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    None,
    ErrorOccurred,
    HeaderStart,
    HeaderAttribName,
    HeaderAttribValue,
    HeaderEnd,
    DocAttribValue,
    DocAttribEnd,
    TagAttribName,
    TagAttribValue,
    OpenTag,
    CloseTag,
    CloseTagIm,
    Content,
    Exit,
}

impl EventKind {
    /// Human-readable label, equal to what `XmlEvent::name` reports.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::None => "None",
            EventKind::ErrorOccurred => "ErrorOccurred",
            EventKind::HeaderStart => "HeaderStart",
            EventKind::HeaderAttribName => "HeaderAttribName",
            EventKind::HeaderAttribValue => "HeaderAttribValue",
            EventKind::HeaderEnd => "HeaderEnd",
            EventKind::DocAttribValue => "DocAttribValue",
            EventKind::DocAttribEnd => "DocAttribEnd",
            EventKind::TagAttribName => "TagAttribName",
            EventKind::TagAttribValue => "TagAttribValue",
            EventKind::OpenTag => "OpenTag",
            EventKind::CloseTag => "CloseTag",
            EventKind::CloseTagIm => "CloseTagIm",
            EventKind::Content => "Content",
            EventKind::Exit => "Exit",
        }
    }
}

/// One XML token. `content` borrows the scanner's internal rolling
/// buffer — valid only until the next call that advances the scanner, per
/// the buffer-borrowing contract in §3/§9. Callers that need to retain it
/// past that point must copy it out (`.content().to_vec()`).
#[derive(Debug, Clone, Copy)]
pub struct XmlEvent<'a> {
    kind: EventKind,
    content: &'a [u8],
}

impl<'a> XmlEvent<'a> {
    pub(crate) fn new(kind: EventKind, content: &'a [u8]) -> Self {
        XmlEvent { kind, content }
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[inline]
    pub fn content(&self) -> &'a [u8] {
        self.content
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind.label()
    }
}
