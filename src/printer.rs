//! XML printer (C8): the serialization counterpart of the scanner,
//! sharing its character-set dispatch and escaping discipline (§4.7).

use log::debug;

use crate::charset::Encoding;
use crate::error::{XmlError, XmlErrorKind};
use crate::tagstack::TagStack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Content,
    TagAttribute,
    TagElement,
}

/// A companion state machine to [`crate::scanner::XmlScanner`]: where the
/// scanner turns bytes into events, this turns calls into bytes, sharing
/// the same codec and the same escaping tables.
pub struct XmlPrinter {
    state: State,
    encoding: Encoding,
    stack: TagStack,
    prolog_written: bool,
}

impl XmlPrinter {
    pub fn new(encoding: Encoding) -> Self {
        XmlPrinter {
            state: State::Init,
            encoding,
            stack: TagStack::new(),
            prolog_written: false,
        }
    }

    fn maybe_write_prolog(&mut self, out: &mut Vec<u8>) {
        if self.prolog_written {
            return;
        }
        self.prolog_written = true;
        debug!("XmlPrinter: emitting prolog for {}", self.encoding.declared_name());
        out.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"");
        out.extend_from_slice(self.encoding.declared_name().as_bytes());
        out.extend_from_slice(b"\" standalone=\"yes\"?>\n");
    }

    /// `<name`, pushed on the tag stack, entering `TagElement`. Valid in
    /// any state: a pending tag-open left in `TagElement` is closed with
    /// `>` first, so a child tag immediately nests inside it rather than
    /// before it (the caller is responsible for calling `printCloseTag`
    /// first if that's not intended).
    pub fn print_open_tag(&mut self, name: &[u8], out: &mut Vec<u8>) -> Result<(), XmlError> {
        self.maybe_write_prolog(out);
        if self.state == State::TagElement {
            out.push(b'>');
        }
        out.push(b'<');
        out.extend_from_slice(name);
        self.stack.push(name);
        self.state = State::TagElement;
        Ok(())
    }

    /// ` name=`, valid only in `TagElement`.
    pub fn print_attribute(&mut self, name: &[u8], out: &mut Vec<u8>) -> Result<(), XmlError> {
        if self.state != State::TagElement {
            return Err(XmlError::new(
                XmlErrorKind::PrinterStateViolation,
                "printAttribute called outside an open tag-element context",
            ));
        }
        out.push(b' ');
        out.extend_from_slice(name);
        out.push(b'=');
        self.state = State::TagAttribute;
        Ok(())
    }

    /// In `TagAttribute`: `"escaped-value"`, back to `TagElement`. In any
    /// other state: exits the tag-open context and emits escaped content.
    pub fn print_value(&mut self, value: &[u8], out: &mut Vec<u8>) -> Result<(), XmlError> {
        self.maybe_write_prolog(out);
        if self.state == State::TagAttribute {
            out.push(b'"');
            escape_attribute_value(value, out);
            out.push(b'"');
            self.state = State::TagElement;
            return Ok(());
        }
        if self.state == State::TagElement {
            out.push(b'>');
        }
        escape_content(value, out);
        self.state = State::Content;
        Ok(())
    }

    /// In `TagElement`: `/>` (self-closing). In `Content`: `</top>`. Pops
    /// the stack either way; empty stack fails.
    pub fn print_close_tag(&mut self, out: &mut Vec<u8>) -> Result<(), XmlError> {
        if self.stack.is_empty() {
            return Err(XmlError::new(
                XmlErrorKind::PrinterStateViolation,
                "printCloseTag called with no open element",
            ));
        }
        match self.state {
            State::TagElement => {
                out.extend_from_slice(b"/>");
            }
            _ => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(self.stack.top().unwrap());
                out.push(b'>');
            }
        }
        self.stack.pop();
        self.state = if self.stack.is_empty() { State::Init } else { State::Content };
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }
}

/// `{< > ' " & NUL BS TAB LF CR}`. NUL/BS use numeric character
/// references to keep the output byte-safe; the rest use the standard
/// named entities.
fn escape_attribute_value(value: &[u8], out: &mut Vec<u8>) {
    for &b in value {
        match b {
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'\'' => out.extend_from_slice(b"&apos;"),
            b'"' => out.extend_from_slice(b"&quot;"),
            b'&' => out.extend_from_slice(b"&amp;"),
            0x00 => out.extend_from_slice(b"&#0;"),
            0x08 => out.extend_from_slice(b"&#8;"),
            b'\t' => out.extend_from_slice(b"&#9;"),
            b'\n' => out.extend_from_slice(b"&#10;"),
            b'\r' => out.extend_from_slice(b"&#13;"),
            _ => out.push(b),
        }
    }
}

/// `{< > & NUL BS}`.
fn escape_content(value: &[u8], out: &mut Vec<u8>) {
    for &b in value {
        match b {
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'&' => out.extend_from_slice(b"&amp;"),
            0x00 => out.extend_from_slice(b"&#0;"),
            0x08 => out.extend_from_slice(b"&#8;"),
            _ => out.push(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_closing_element_with_attribute() {
        let mut p = XmlPrinter::new(Encoding::Utf8);
        let mut out = Vec::new();
        p.print_open_tag(b"a", &mut out).unwrap();
        p.print_attribute(b"k", &mut out).unwrap();
        p.print_value(b"v", &mut out).unwrap();
        p.print_close_tag(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("<a k=\"v\"/>"));
    }

    #[test]
    fn explicit_close_after_content() {
        let mut p = XmlPrinter::new(Encoding::Utf8);
        let mut out = Vec::new();
        p.print_open_tag(b"a", &mut out).unwrap();
        p.print_value(b"hi", &mut out).unwrap();
        p.print_close_tag(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("<a>hi</a>"));
    }

    #[test]
    fn attribute_value_escapes_quotes_and_controls() {
        let mut p = XmlPrinter::new(Encoding::Utf8);
        let mut out = Vec::new();
        p.print_open_tag(b"a", &mut out).unwrap();
        p.print_attribute(b"k", &mut out).unwrap();
        p.print_value(b"\"x\"\x00", &mut out).unwrap();
        p.print_close_tag(&mut out).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("&quot;x&quot;&#0;"));
    }

    #[test]
    fn attribute_outside_tag_element_fails() {
        let mut p = XmlPrinter::new(Encoding::Utf8);
        let mut out = Vec::new();
        assert!(p.print_attribute(b"k", &mut out).is_err());
    }

    #[test]
    fn close_with_empty_stack_fails() {
        let mut p = XmlPrinter::new(Encoding::Utf8);
        let mut out = Vec::new();
        assert!(p.print_close_tag(&mut out).is_err());
    }

    #[test]
    fn prolog_is_emitted_once_with_declared_encoding() {
        let mut p = XmlPrinter::new(Encoding::Utf8);
        let mut out = Vec::new();
        p.print_open_tag(b"a", &mut out).unwrap();
        p.print_close_tag(&mut out).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert_eq!(s.matches("<?xml").count(), 1);
        assert!(s.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\""));
    }

    #[test]
    fn nested_elements_round_trip() {
        let mut p = XmlPrinter::new(Encoding::Utf8);
        let mut out = Vec::new();
        p.print_open_tag(b"a", &mut out).unwrap();
        p.print_open_tag(b"b", &mut out).unwrap();
        p.print_close_tag(&mut out).unwrap(); // </b> self-closed since no value printed
        p.print_close_tag(&mut out).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.ends_with("<a><b/></a>"));
    }
}
