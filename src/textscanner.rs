//! TextScanner (C3): byte source + codec → classified Unicode scalars.
//!
//! Holds exactly the state §4.2 calls for: the codec's scratch buffer, the
//! fill position within it, and a reference to the byte source. `chr`
//! never consumes; `advance` consumes the character currently buffered
//! and refills for the next one.

use crate::bytesource::{Advance as SourceAdvance, ByteSource};
use crate::charset::{Encoding, MAX_CODEC_LEN};
use crate::error::XmlError;

/// Lexical class of a scanned character, keyed off its ASCII value (or a
/// small dedicated branch for non-ASCII scalars).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexicalClass {
    EndOfData,
    Whitespace,
    Lt,
    Gt,
    Slash,
    Eq,
    DQuote,
    SQuote,
    Question,
    Bang,
    Amp,
    Semi,
    NameStart,
    NameContinue,
    Other,
}

/// Static 128-entry table indexed by ASCII value. Built once as a const so
/// classification of ASCII input is a single array index, no branching.
const ASCII_CLASS: [LexicalClass; 128] = build_ascii_table();

const fn build_ascii_table() -> [LexicalClass; 128] {
    let mut table = [LexicalClass::Other; 128];
    let mut i = 0;
    while i < 128 {
        table[i] = match i as u8 {
            0 => LexicalClass::EndOfData,
            b' ' | b'\t' | b'\n' | b'\r' => LexicalClass::Whitespace,
            b'<' => LexicalClass::Lt,
            b'>' => LexicalClass::Gt,
            b'/' => LexicalClass::Slash,
            b'=' => LexicalClass::Eq,
            b'"' => LexicalClass::DQuote,
            b'\'' => LexicalClass::SQuote,
            b'?' => LexicalClass::Question,
            b'!' => LexicalClass::Bang,
            b'&' => LexicalClass::Amp,
            b';' => LexicalClass::Semi,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':' => LexicalClass::NameStart,
            b'0'..=b'9' | b'-' | b'.' => LexicalClass::NameContinue,
            _ => LexicalClass::Other,
        };
        i += 1;
    }
    table
}

/// Outcome of a [`TextScanner`] query: the source either produced a value,
/// asked the caller to suspend (chunked input ran dry), or the codec
/// failed to decode the buffered bytes.
#[derive(Debug)]
pub enum Scan<T> {
    Ready(T),
    Suspend,
    Error(XmlError),
}

impl<T> Scan<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Scan<U> {
        match self {
            Scan::Ready(v) => Scan::Ready(f(v)),
            Scan::Suspend => Scan::Suspend,
            Scan::Error(e) => Scan::Error(e),
        }
    }

    pub fn is_suspend(&self) -> bool {
        matches!(self, Scan::Suspend)
    }
}

/// Byte iterator + codec → classified Unicode scalar stream.
pub struct TextScanner<S> {
    source: S,
    encoding: Encoding,
    scratch: [u8; MAX_CODEC_LEN],
    fill: usize,
    /// Cached decode of `scratch[..fill]`, computed lazily and invalidated
    /// on `advance`.
    decoded: Option<Result<u32, XmlError>>,
    at_end: bool,
    /// True when the source still needs to be stepped past
    /// `scratch[fill - 1]` before the next byte can be fetched. Cleared
    /// by a prior suspend means the step already happened at the source
    /// level even though the byte it would have fetched never arrived —
    /// tracked explicitly so a resume doesn't re-advance and skip a byte.
    pending_advance: bool,
}

impl<S: ByteSource> TextScanner<S> {
    pub fn new(source: S, encoding: Encoding) -> Self {
        TextScanner {
            source,
            encoding,
            scratch: [0; MAX_CODEC_LEN],
            fill: 0,
            decoded: None,
            at_end: false,
            pending_advance: false,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Ensure `scratch[..fill]` holds a complete character (or that
    /// end-of-data has been reached). Re-entrant: if the underlying source
    /// suspends mid-fill, the partial fill is retained and a later call
    /// picks up exactly where it left off.
    fn ensure_filled(&mut self) -> Scan<()> {
        if self.at_end {
            return Scan::Ready(());
        }
        if self.fill > 0 && self.decoded.is_some() {
            return Scan::Ready(());
        }

        loop {
            if self.fill == 0 && self.source.is_exhausted() {
                self.at_end = true;
                return Scan::Ready(());
            }

            if self.fill == 0 {
                let b = self.source.peek();
                if b == 0 {
                    // Not exhausted (checked above): a chunked source ran
                    // dry before it could finish, not a real end-of-data.
                    return Scan::Suspend;
                }
                self.scratch[0] = b;
                self.fill = 1;
                self.pending_advance = true;
            }

            if let Some(need) = self.encoding.total_len(&self.scratch[..self.fill]) {
                if self.fill >= need {
                    return Scan::Ready(());
                }
            }

            if self.fill >= MAX_CODEC_LEN {
                // Codec's own invariant broke (total_len kept asking for
                // more than the max); treat as malformed rather than loop.
                return Scan::Ready(());
            }

            // Step past the byte already stored in `scratch[fill - 1]`
            // before fetching the next one — unless a prior suspend
            // already did so (`pending_advance` cleared below), in which
            // case the source is already sitting on the byte we need.
            if self.pending_advance {
                match self.source.advance() {
                    SourceAdvance::Suspend => {
                        self.pending_advance = false;
                        return Scan::Suspend;
                    }
                    SourceAdvance::EndOfData => {
                        // Ran out of bytes mid-character: per §4.2 this
                        // must not yield a malformed scalar, it yields
                        // end-of-text.
                        self.at_end = true;
                        self.fill = 0;
                        self.pending_advance = false;
                        return Scan::Ready(());
                    }
                    SourceAdvance::Ready => {
                        self.pending_advance = false;
                    }
                }
            }

            self.scratch[self.fill] = self.source.peek();
            self.fill += 1;
            self.pending_advance = true;
        }
    }

    fn decode(&mut self) -> Result<u32, XmlError> {
        if self.at_end || self.fill == 0 {
            return Ok(0);
        }
        if let Some(cached) = &self.decoded {
            return cached.clone();
        }
        let result = self.encoding.decode(&self.scratch[..self.fill]);
        self.decoded = Some(result.clone());
        result
    }

    /// Returns the Unicode scalar at the current position without
    /// consuming it. End-of-text is reported as `0`.
    pub fn chr(&mut self) -> Scan<u32> {
        match self.ensure_filled() {
            Scan::Suspend => return Scan::Suspend,
            Scan::Error(e) => return Scan::Error(e),
            Scan::Ready(()) => {}
        }
        if self.at_end {
            return Scan::Ready(0);
        }
        match self.decode() {
            Ok(v) => Scan::Ready(v),
            Err(e) => Scan::Error(e),
        }
    }

    /// Returns the lexical class of the current character.
    pub fn control(&mut self) -> Scan<LexicalClass> {
        match self.ensure_filled() {
            Scan::Suspend => return Scan::Suspend,
            Scan::Error(e) => return Scan::Error(e),
            Scan::Ready(()) => {}
        }
        if self.at_end {
            return Scan::Ready(LexicalClass::EndOfData);
        }
        let ascii = self.encoding.ascii_of(&self.scratch[..self.fill]);
        if ascii >= 0 {
            return Scan::Ready(ASCII_CLASS[ascii as usize]);
        }
        match self.decode() {
            Ok(scalar) => Scan::Ready(classify_non_ascii(scalar)),
            Err(e) => Scan::Error(e),
        }
    }

    /// Consumes the current character and positions at the next one.
    pub fn advance(&mut self) -> Scan<()> {
        match self.ensure_filled() {
            Scan::Suspend => return Scan::Suspend,
            Scan::Error(e) => return Scan::Error(e),
            Scan::Ready(()) => {}
        }
        if self.at_end {
            return Scan::Ready(());
        }
        // `ensure_filled` already stepped the source past every byte of
        // the current character except the last one (the source always
        // sits at the final buffered byte, unconsumed, once `fill` bytes
        // have been classified) — one more advance consumes it. The byte
        // is consumed either way; if the source has nothing buffered for
        // what comes next it reports `Suspend`, which must be propagated
        // rather than silently treated as if the next character were
        // already ready.
        let outcome = self.source.advance();
        self.fill = 0;
        self.pending_advance = false;
        self.decoded = None;
        match outcome {
            SourceAdvance::Suspend => Scan::Suspend,
            SourceAdvance::Ready | SourceAdvance::EndOfData => Scan::Ready(()),
        }
    }
}

fn classify_non_ascii(scalar: u32) -> LexicalClass {
    match char::from_u32(scalar) {
        Some(c) if c.is_alphanumeric() => LexicalClass::NameContinue,
        _ => LexicalClass::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytesource::SliceSource;

    fn scanner(input: &'static [u8]) -> TextScanner<SliceSource<'static>> {
        TextScanner::new(SliceSource::new(input), Encoding::Utf8)
    }

    #[test]
    fn scans_ascii_and_classifies() {
        let mut s = scanner(b"<a>");
        assert!(matches!(s.control(), Scan::Ready(LexicalClass::Lt)));
        assert!(matches!(s.chr(), Scan::Ready(60)));
        assert!(matches!(s.advance(), Scan::Ready(())));
        assert!(matches!(s.control(), Scan::Ready(LexicalClass::NameStart)));
    }

    #[test]
    fn end_of_data_is_zero() {
        let mut s = scanner(b"");
        assert!(matches!(s.chr(), Scan::Ready(0)));
        assert!(matches!(s.control(), Scan::Ready(LexicalClass::EndOfData)));
    }

    #[test]
    fn multibyte_utf8_decodes_as_one_character() {
        let mut s = scanner("€x".as_bytes());
        assert!(matches!(s.chr(), Scan::Ready(0x20AC)));
        assert!(matches!(s.advance(), Scan::Ready(())));
        assert!(matches!(s.chr(), Scan::Ready(b'x' as u32)));
    }

    #[test]
    fn chunked_source_suspends_on_empty_buffer_for_ascii() {
        use crate::bytesource::ChunkedSource;
        let mut s = TextScanner::new(ChunkedSource::new(), Encoding::Utf8);
        assert!(s.control().is_suspend());

        s.source_mut().feed(b"<");
        s.source_mut().finish();
        assert!(matches!(s.control(), Scan::Ready(LexicalClass::Lt)));
    }

    #[test]
    fn chunked_source_suspends_then_resumes_mid_character() {
        use crate::bytesource::ChunkedSource;
        let euro_bytes = "€".as_bytes().to_vec();
        let mut src = ChunkedSource::new();
        src.feed(&euro_bytes[..1]);
        let mut s = TextScanner::new(src, Encoding::Utf8);
        assert!(s.chr().is_suspend());

        s.source_mut().feed(&euro_bytes[1..]);
        s.source_mut().finish();
        assert!(matches!(s.chr(), Scan::Ready(0x20AC)));
    }
}
