//! The XML scanner (C5): the state machine that turns a classified
//! character stream into [`XmlEvent`]s.
//!
//! All state lives in named fields on [`XmlScanner`] — there is no
//! recursion and no call-stack state that crosses an `advance` boundary,
//! so a caller can stop pulling events at any point (including mid-tag)
//! and resume later once more bytes are available. Errors never unwind:
//! they are reported as a terminal `ErrorOccurred` event and every call
//! after that re-reports the same event.

use log::{error, trace};

use crate::bytesource::ByteSource;
use crate::entities::{parse_numeric_reference, EntityMap};
use crate::error::{XmlError, XmlErrorKind};
use crate::event::{EventKind, XmlEvent};
use crate::charset::Encoding;
use crate::tagstack::TagStack;
use crate::textscanner::{LexicalClass, Scan as CharScan, TextScanner};

/// What [`XmlScanner::next_event`] returns: either an event, or a request
/// to suspend until more input arrives (chunked sources only).
#[derive(Debug)]
pub enum Scan<'a> {
    Event(XmlEvent<'a>),
    Suspend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrContext {
    Tag,
    Header,
}

/// Where to resume once an entity reference has been fully resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityReturn {
    Content,
    AttribValue(AttrContext, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    TagOpenFirst,
    OpenTagName,
    SelfClosingSlashSeen,
    ExpectSelfCloseAngle,
    AfterOpenName,
    AttribName(AttrContext),
    ExpectAttribEq(AttrContext),
    ExpectAttribValueOpen(AttrContext),
    AttribValue(AttrContext, u8),
    CloseTagName,
    ExpectCloseAngle,
    HeaderTargetName,
    AfterHeaderName,
    HeaderQuestionSeen,
    DocPiSkipSeparator,
    DocPiData,
    DocPiEndPending,
    BangDecide,
    EntityRef(EntityReturn),
    AwaitExit,
    Exit,
    Failed,
}

/// Streaming tokenizer over a [`TextScanner`]. Construct with an
/// [`EntityMap`] (shared, immutable, owned elsewhere or cloned in) and
/// pull events with [`XmlScanner::next_event`].
pub struct XmlScanner<S> {
    chr: TextScanner<S>,
    state: State,
    stack: TagStack,
    entities: EntityMap,
    output_encoding: Encoding,
    buffer: Vec<u8>,
    pi_target: Vec<u8>,
    decide_buf: Vec<u8>,
    entity_name: Vec<u8>,
    bang_depth: i32,
    do_tokenize: bool,
    exited_once: bool,
    sticky_error: Option<XmlError>,
}

/// Internal control-flow signal: either a suspension request or a fatal
/// parse error, both of which unwind the in-progress token via `?`.
enum Signal {
    Suspend,
    Error(XmlError),
}

fn lower<T>(scan: CharScan<T>) -> Result<T, Signal> {
    match scan {
        CharScan::Ready(v) => Ok(v),
        CharScan::Suspend => Err(Signal::Suspend),
        CharScan::Error(e) => Err(Signal::Error(e)),
    }
}

impl<S: ByteSource> XmlScanner<S> {
    pub fn new(source: S, encoding: Encoding, entities: EntityMap) -> Self {
        XmlScanner {
            chr: TextScanner::new(source, encoding),
            state: State::Start,
            stack: TagStack::new(),
            entities,
            output_encoding: Encoding::Utf8,
            buffer: Vec::with_capacity(64),
            pi_target: Vec::new(),
            decide_buf: Vec::new(),
            entity_name: Vec::new(),
            bang_depth: 0,
            do_tokenize: false,
            exited_once: false,
            sticky_error: None,
        }
    }

    /// Character set written into event content, independent of the
    /// input encoding. Defaults to UTF-8.
    pub fn set_output_encoding(&mut self, encoding: Encoding) {
        self.output_encoding = encoding;
    }

    /// When enabled, runs of whitespace inside `Content` collapse to a
    /// single space and leading/trailing whitespace is stripped.
    pub fn set_tokenize(&mut self, tokenize: bool) {
        self.do_tokenize = tokenize;
    }

    pub fn tag_depth(&self) -> usize {
        self.stack.depth()
    }

    /// The underlying byte source, for chunked callers that need to `feed`
    /// more bytes after a `Suspend`.
    pub fn source_mut(&mut self) -> &mut S {
        self.chr.source_mut()
    }

    /// Pull the next event. Borrows `self` for the lifetime of the
    /// returned event's content, per the rolling-buffer contract on
    /// [`XmlEvent`].
    pub fn next_event(&mut self) -> Scan<'_> {
        if let Some(err) = self.sticky_error.clone() {
            trace!("XmlScanner: re-emitting sticky ErrorOccurred");
            self.buffer.clear();
            self.buffer.extend_from_slice(err.render().as_bytes());
            return Scan::Event(XmlEvent::new(EventKind::ErrorOccurred, &self.buffer));
        }
        if self.state == State::Exit {
            self.buffer.clear();
            return Scan::Event(XmlEvent::new(EventKind::Exit, &self.buffer));
        }

        match self.drive() {
            Ok(kind) => Scan::Event(XmlEvent::new(kind, &self.buffer)),
            Err(Signal::Suspend) => Scan::Suspend,
            Err(Signal::Error(e)) => {
                error!("XmlScanner: {}", e.render());
                self.buffer.clear();
                self.buffer.extend_from_slice(e.render().as_bytes());
                self.sticky_error = Some(e);
                self.state = State::Failed;
                Scan::Event(XmlEvent::new(EventKind::ErrorOccurred, &self.buffer))
            }
        }
    }

    /// Runs the state machine until an event is ready to report. Returns
    /// the kind of that event; its bytes are left in `self.buffer`.
    fn drive(&mut self) -> Result<EventKind, Signal> {
        loop {
            match self.state {
                State::Start => {
                    if let Some(kind) = self.step_start()? {
                        return Ok(kind);
                    }
                }
                State::TagOpenFirst => {
                    if let Some(kind) = self.step_tag_open_first()? {
                        return Ok(kind);
                    }
                }
                State::OpenTagName => {
                    if let Some(kind) = self.step_open_tag_name()? {
                        return Ok(kind);
                    }
                }
                State::SelfClosingSlashSeen => {
                    lower(self.chr.advance())?; // consume '/'
                    self.stack.pop();
                    self.state = State::ExpectSelfCloseAngle;
                    self.buffer.clear();
                    return Ok(EventKind::CloseTagIm);
                }
                State::ExpectSelfCloseAngle => {
                    self.expect_char(LexicalClass::Gt, "expected '>' after '/'")?;
                    self.state = State::Start;
                }
                State::AfterOpenName => {
                    if let Some(kind) = self.step_after_attrib_context(AttrContext::Tag)? {
                        return Ok(kind);
                    }
                }
                State::AttribName(ctx) => {
                    if let Some(kind) = self.step_attrib_name(ctx)? {
                        return Ok(kind);
                    }
                }
                State::ExpectAttribEq(ctx) => {
                    self.skip_whitespace()?;
                    self.expect_char(LexicalClass::Eq, "expected '=' after attribute name")?;
                    self.state = State::ExpectAttribValueOpen(ctx);
                }
                State::ExpectAttribValueOpen(ctx) => {
                    self.skip_whitespace()?;
                    let quote = self.expect_quote()?;
                    self.buffer.clear();
                    self.state = State::AttribValue(ctx, quote);
                }
                State::AttribValue(ctx, quote) => {
                    if let Some(kind) = self.step_attrib_value(ctx, quote)? {
                        return Ok(kind);
                    }
                }
                State::CloseTagName => {
                    if let Some(kind) = self.step_close_tag_name()? {
                        return Ok(kind);
                    }
                }
                State::ExpectCloseAngle => {
                    self.skip_whitespace()?;
                    self.expect_char(LexicalClass::Gt, "expected '>' to close tag")?;
                    self.state = State::Start;
                }
                State::HeaderTargetName => {
                    if let Some(kind) = self.step_header_target_name()? {
                        return Ok(kind);
                    }
                }
                State::AfterHeaderName => {
                    if let Some(kind) = self.step_after_attrib_context(AttrContext::Header)? {
                        return Ok(kind);
                    }
                }
                State::HeaderQuestionSeen => {
                    lower(self.chr.advance())?; // consume '?'
                    self.expect_char(LexicalClass::Gt, "expected '>' after '?'")?;
                    self.state = State::Start;
                    self.buffer.clear();
                    return Ok(EventKind::HeaderEnd);
                }
                State::DocPiSkipSeparator => {
                    let class = lower(self.chr.control())?;
                    if class == LexicalClass::Whitespace {
                        lower(self.chr.advance())?;
                    }
                    self.buffer.clear();
                    self.state = State::DocPiData;
                }
                State::DocPiData => {
                    self.scan_raw_until_terminator(b'?', 1, b'>', true)?;
                    let mut content = Vec::with_capacity(self.pi_target.len() + 1 + self.buffer.len());
                    content.extend_from_slice(&self.pi_target);
                    if !self.buffer.is_empty() {
                        content.push(b' ');
                        content.extend_from_slice(&self.buffer);
                    }
                    self.buffer = content;
                    self.state = State::DocPiEndPending;
                    return Ok(EventKind::DocAttribValue);
                }
                State::DocPiEndPending => {
                    self.buffer.clear();
                    self.state = State::Start;
                    return Ok(EventKind::DocAttribEnd);
                }
                State::BangDecide => {
                    if let Some(kind) = self.step_bang_decide()? {
                        return Ok(kind);
                    }
                }
                State::EntityRef(ret) => {
                    if let Some(kind) = self.step_entity_ref(ret)? {
                        return Ok(kind);
                    }
                }
                State::AwaitExit => {
                    self.buffer.clear();
                    if self.stack.is_empty() {
                        self.state = State::Exit;
                    } else {
                        return Err(self.unclosed_document_error());
                    }
                }
                State::Exit => {
                    self.buffer.clear();
                    return Ok(EventKind::Exit);
                }
                State::Failed => {
                    // Unreachable: `next_event` intercepts `sticky_error`
                    // before ever calling `drive` again.
                    self.buffer.clear();
                    return Ok(EventKind::ErrorOccurred);
                }
            }
        }
    }

    // -- Start / content -------------------------------------------------

    fn step_start(&mut self) -> Result<Option<EventKind>, Signal> {
        loop {
            let class = lower(self.chr.control())?;
            match class {
                LexicalClass::EndOfData => {
                    if !self.buffer.is_empty() {
                        self.finish_content_buffer();
                        self.state = State::AwaitExit;
                        return Ok(Some(EventKind::Content));
                    }
                    if self.stack.is_empty() {
                        self.state = State::Exit;
                        return Ok(None);
                    }
                    return Err(self.unclosed_document_error());
                }
                LexicalClass::Lt => {
                    lower(self.chr.advance())?;
                    self.state = State::TagOpenFirst;
                    if !self.buffer.is_empty() {
                        self.finish_content_buffer();
                        return Ok(Some(EventKind::Content));
                    }
                    return Ok(None);
                }
                LexicalClass::Amp => {
                    lower(self.chr.advance())?; // consume '&'
                    self.entity_name.clear();
                    self.state = State::EntityRef(EntityReturn::Content);
                    return Ok(None);
                }
                _ => {
                    self.push_current_scalar_into_buffer()?;
                }
            }
        }
    }

    fn finish_content_buffer(&mut self) {
        if !self.do_tokenize {
            return;
        }
        let mut out: Vec<u8> = Vec::with_capacity(self.buffer.len());
        let mut last_was_space = true; // strips leading whitespace too
        for &b in &self.buffer {
            let is_space = matches!(b, b' ' | b'\t' | b'\n' | b'\r');
            if is_space {
                if !last_was_space {
                    out.push(b' ');
                }
                last_was_space = true;
            } else {
                out.push(b);
                last_was_space = false;
            }
        }
        if out.last() == Some(&b' ') {
            out.pop();
        }
        self.buffer = out;
    }

    // -- '<' dispatch -----------------------------------------------------

    fn step_tag_open_first(&mut self) -> Result<Option<EventKind>, Signal> {
        let class = lower(self.chr.control())?;
        match class {
            LexicalClass::Question => {
                lower(self.chr.advance())?;
                self.buffer.clear();
                self.state = State::HeaderTargetName;
                Ok(None)
            }
            LexicalClass::Bang => {
                lower(self.chr.advance())?;
                self.decide_buf.clear();
                self.bang_depth = 0;
                self.state = State::BangDecide;
                Ok(None)
            }
            LexicalClass::Slash => {
                lower(self.chr.advance())?;
                self.buffer.clear();
                self.state = State::CloseTagName;
                Ok(None)
            }
            LexicalClass::NameStart => {
                self.buffer.clear();
                self.state = State::OpenTagName;
                Ok(None)
            }
            _ => Err(Signal::Error(XmlError::new(
                XmlErrorKind::UnexpectedCharacter,
                "expected element name, '/', '?' or '!' after '<'",
            ))),
        }
    }

    // -- open tag name ------------------------------------------------------

    fn step_open_tag_name(&mut self) -> Result<Option<EventKind>, Signal> {
        loop {
            let class = lower(self.chr.control())?;
            match class {
                LexicalClass::NameStart | LexicalClass::NameContinue => {
                    self.push_current_scalar_into_buffer()?;
                }
                LexicalClass::Whitespace => {
                    lower(self.chr.advance())?;
                    self.stack.push(&self.buffer);
                    self.state = State::AfterOpenName;
                    return Ok(Some(EventKind::OpenTag));
                }
                LexicalClass::Gt => {
                    lower(self.chr.advance())?;
                    self.stack.push(&self.buffer);
                    self.state = State::Start;
                    return Ok(Some(EventKind::OpenTag));
                }
                LexicalClass::Slash => {
                    self.stack.push(&self.buffer);
                    self.state = State::SelfClosingSlashSeen;
                    return Ok(Some(EventKind::OpenTag));
                }
                _ => {
                    return Err(Signal::Error(XmlError::new(
                        XmlErrorKind::UnexpectedCharacter,
                        "unexpected character in element name",
                    )))
                }
            }
        }
    }

    /// Shared "between attributes" loop for both tag and header contexts:
    /// skip whitespace, then decide between another attribute, the
    /// closing delimiter, or self-close.
    fn step_after_attrib_context(&mut self, ctx: AttrContext) -> Result<Option<EventKind>, Signal> {
        loop {
            let class = lower(self.chr.control())?;
            match (ctx, class) {
                (_, LexicalClass::Whitespace) => {
                    lower(self.chr.advance())?;
                }
                (_, LexicalClass::NameStart) => {
                    self.buffer.clear();
                    self.state = State::AttribName(ctx);
                    return Ok(None);
                }
                (AttrContext::Tag, LexicalClass::Slash) => {
                    self.state = State::SelfClosingSlashSeen;
                    return Ok(None);
                }
                (AttrContext::Tag, LexicalClass::Gt) => {
                    lower(self.chr.advance())?;
                    self.state = State::Start;
                    return Ok(None);
                }
                (AttrContext::Header, LexicalClass::Question) => {
                    self.state = State::HeaderQuestionSeen;
                    return Ok(None);
                }
                _ => {
                    return Err(Signal::Error(XmlError::new(
                        XmlErrorKind::UnexpectedCharacter,
                        "unexpected character where an attribute or closing delimiter was expected",
                    )))
                }
            }
        }
    }

    fn step_attrib_name(&mut self, ctx: AttrContext) -> Result<Option<EventKind>, Signal> {
        loop {
            let class = lower(self.chr.control())?;
            match class {
                LexicalClass::NameStart | LexicalClass::NameContinue => {
                    self.push_current_scalar_into_buffer()?;
                }
                LexicalClass::Whitespace | LexicalClass::Eq => {
                    self.state = State::ExpectAttribEq(ctx);
                    let kind = match ctx {
                        AttrContext::Tag => EventKind::TagAttribName,
                        AttrContext::Header => EventKind::HeaderAttribName,
                    };
                    return Ok(Some(kind));
                }
                _ => {
                    return Err(Signal::Error(XmlError::new(
                        XmlErrorKind::UnexpectedCharacter,
                        "unexpected character in attribute name",
                    )))
                }
            }
        }
    }

    fn step_attrib_value(&mut self, ctx: AttrContext, quote: u8) -> Result<Option<EventKind>, Signal> {
        loop {
            let class = lower(self.chr.control())?;
            let is_closing_quote = match (class, quote) {
                (LexicalClass::DQuote, b'"') => true,
                (LexicalClass::SQuote, b'\'') => true,
                _ => false,
            };
            if is_closing_quote {
                lower(self.chr.advance())?;
                self.state = match ctx {
                    AttrContext::Tag => State::AfterOpenName,
                    AttrContext::Header => State::AfterHeaderName,
                };
                let kind = match ctx {
                    AttrContext::Tag => EventKind::TagAttribValue,
                    AttrContext::Header => EventKind::HeaderAttribValue,
                };
                return Ok(Some(kind));
            }
            if class == LexicalClass::EndOfData {
                return Err(Signal::Error(XmlError::new(
                    XmlErrorKind::UnclosedDocument,
                    "document ended inside an attribute value",
                )));
            }
            if class == LexicalClass::Amp {
                lower(self.chr.advance())?; // consume '&'
                self.entity_name.clear();
                self.state = State::EntityRef(EntityReturn::AttribValue(ctx, quote));
                return Ok(None);
            }
            self.push_current_scalar_into_buffer()?;
        }
    }

    // -- close tag ----------------------------------------------------------

    fn step_close_tag_name(&mut self) -> Result<Option<EventKind>, Signal> {
        loop {
            let class = lower(self.chr.control())?;
            match class {
                LexicalClass::NameStart | LexicalClass::NameContinue => {
                    self.push_current_scalar_into_buffer()?;
                }
                LexicalClass::Whitespace | LexicalClass::Gt => {
                    if self.stack.top() != Some(self.buffer.as_slice()) {
                        let expected = self
                            .stack
                            .top()
                            .map(|s| String::from_utf8_lossy(s).into_owned())
                            .unwrap_or_else(|| "<none>".to_string());
                        let got = String::from_utf8_lossy(&self.buffer).into_owned();
                        return Err(Signal::Error(XmlError::new(
                            XmlErrorKind::TagMismatch,
                            format!("closing tag </{}> does not match open tag <{}>", got, expected),
                        )));
                    }
                    self.stack.pop();
                    self.state = State::ExpectCloseAngle;
                    return Ok(Some(EventKind::CloseTag));
                }
                _ => {
                    return Err(Signal::Error(XmlError::new(
                        XmlErrorKind::UnexpectedCharacter,
                        "unexpected character in closing tag name",
                    )))
                }
            }
        }
    }

    // -- processing instructions / xml declaration ---------------------------

    fn step_header_target_name(&mut self) -> Result<Option<EventKind>, Signal> {
        loop {
            let class = lower(self.chr.control())?;
            match class {
                LexicalClass::NameStart | LexicalClass::NameContinue => {
                    self.push_current_scalar_into_buffer()?;
                }
                LexicalClass::Whitespace | LexicalClass::Question => {
                    if self.buffer == b"xml" {
                        if class == LexicalClass::Whitespace {
                            lower(self.chr.advance())?;
                        }
                        self.state = State::AfterHeaderName;
                        return Ok(Some(EventKind::HeaderStart));
                    }
                    self.pi_target = std::mem::take(&mut self.buffer);
                    self.state = State::DocPiSkipSeparator;
                    return Ok(None);
                }
                _ => {
                    return Err(Signal::Error(XmlError::new(
                        XmlErrorKind::UnexpectedCharacter,
                        "unexpected character in processing instruction target",
                    )))
                }
            }
        }
    }

    // -- comments / CDATA / DOCTYPE -------------------------------------------

    fn step_bang_decide(&mut self) -> Result<Option<EventKind>, Signal> {
        loop {
            if self.decide_buf.starts_with(b"--") {
                self.decide_buf.clear();
                self.buffer.clear();
                self.scan_raw_until_terminator(b'-', 2, b'>', false)?;
                self.state = State::Start;
                return Ok(None);
            }
            if self.decide_buf == b"[CDATA[" {
                self.decide_buf.clear();
                self.buffer.clear();
                self.scan_raw_until_terminator(b']', 2, b'>', true)?;
                self.state = State::Start;
                return Ok(Some(EventKind::Content));
            }
            if !b"--".starts_with(self.decide_buf.as_slice()) && !b"[CDATA[".starts_with(self.decide_buf.as_slice()) {
                for &b in &self.decide_buf {
                    if b == b'[' {
                        self.bang_depth += 1;
                    }
                    if b == b']' {
                        self.bang_depth -= 1;
                    }
                }
                self.decide_buf.clear();
                self.scan_skip_bracketed(self.bang_depth)?;
                self.state = State::Start;
                return Ok(None);
            }
            let scalar = lower(self.chr.chr())?;
            if scalar == 0 {
                return Err(Signal::Error(XmlError::new(
                    XmlErrorKind::UnclosedDocument,
                    "document ended inside a '<!' declaration",
                )));
            }
            self.decide_buf.push(scalar as u8);
            lower(self.chr.advance())?;
        }
    }

    /// Scans raw characters up to the first run of at least `min_repeat`
    /// copies of `marker` immediately followed by `close`. Excess copies
    /// of `marker` beyond `min_repeat` are literal. When `keep_content` is
    /// set, all non-terminator bytes (re-encoded in the output character
    /// set) are appended to `self.buffer`; the terminator itself is
    /// consumed but never appended.
    fn scan_raw_until_terminator(
        &mut self,
        marker: u8,
        min_repeat: usize,
        close: u8,
        keep_content: bool,
    ) -> Result<(), Signal> {
        let mut run = 0usize;
        loop {
            let scalar = lower(self.chr.chr())?;
            if scalar == marker as u32 {
                run += 1;
                lower(self.chr.advance())?;
                continue;
            }
            if scalar == close as u32 && run >= min_repeat {
                if keep_content {
                    for _ in 0..(run - min_repeat) {
                        self.buffer.push(marker);
                    }
                }
                lower(self.chr.advance())?;
                return Ok(());
            }
            if run > 0 {
                if keep_content {
                    for _ in 0..run {
                        self.buffer.push(marker);
                    }
                }
                run = 0;
            }
            if scalar == 0 {
                return Err(Signal::Error(XmlError::new(
                    XmlErrorKind::UnclosedDocument,
                    "document ended inside an unterminated markup section",
                )));
            }
            if keep_content {
                let enc = self.output_encoding;
                enc.print(scalar, &mut self.buffer);
            }
            lower(self.chr.advance())?;
        }
    }

    /// Skips to the first top-level `>`, treating `[`/`]` as nesting
    /// markers (DOCTYPE internal subsets).
    fn scan_skip_bracketed(&mut self, mut depth: i32) -> Result<(), Signal> {
        loop {
            let scalar = lower(self.chr.chr())?;
            if scalar == 0 {
                return Err(Signal::Error(XmlError::new(
                    XmlErrorKind::UnclosedDocument,
                    "document ended inside a DOCTYPE or markup declaration",
                )));
            }
            match scalar {
                0x5B => depth += 1,
                0x5D => depth -= 1,
                0x3E if depth <= 0 => {
                    lower(self.chr.advance())?;
                    return Ok(());
                }
                _ => {}
            }
            lower(self.chr.advance())?;
        }
    }

    // -- shared helpers -------------------------------------------------------

    fn skip_whitespace(&mut self) -> Result<(), Signal> {
        loop {
            let class = lower(self.chr.control())?;
            if class != LexicalClass::Whitespace {
                return Ok(());
            }
            lower(self.chr.advance())?;
        }
    }

    fn expect_char(&mut self, expected: LexicalClass, message: &'static str) -> Result<(), Signal> {
        let class = lower(self.chr.control())?;
        if class != expected {
            return Err(Signal::Error(XmlError::new(XmlErrorKind::UnexpectedCharacter, message)));
        }
        lower(self.chr.advance())?;
        Ok(())
    }

    fn expect_quote(&mut self) -> Result<u8, Signal> {
        let class = lower(self.chr.control())?;
        let quote = match class {
            LexicalClass::DQuote => b'"',
            LexicalClass::SQuote => b'\'',
            _ => {
                return Err(Signal::Error(XmlError::new(
                    XmlErrorKind::UnexpectedCharacter,
                    "expected an opening quote before an attribute value",
                )))
            }
        };
        lower(self.chr.advance())?;
        Ok(quote)
    }

    fn push_current_scalar_into_buffer(&mut self) -> Result<(), Signal> {
        let scalar = lower(self.chr.chr())?;
        let enc = self.output_encoding;
        enc.print(scalar, &mut self.buffer);
        lower(self.chr.advance())?;
        Ok(())
    }

    /// Consumes `&name;` or `&#...;`, named-field accumulated so a suspend
    /// mid-reference resumes here instead of losing the partial name on
    /// the call stack, then appends the resolved scalar to `self.buffer`
    /// in the output character set and returns to `ret`'s context.
    fn step_entity_ref(&mut self, ret: EntityReturn) -> Result<Option<EventKind>, Signal> {
        loop {
            let class = lower(self.chr.control())?;
            match class {
                LexicalClass::Semi => {
                    lower(self.chr.advance())?;
                    let resolved = if self.entity_name.first() == Some(&b'#') {
                        parse_numeric_reference(&self.entity_name[1..])
                    } else {
                        self.entities.lookup(&self.entity_name)
                    };
                    let scalar = match resolved {
                        Some(scalar) => scalar,
                        None => {
                            return Err(Signal::Error(XmlError::new(
                                XmlErrorKind::UnknownEntity,
                                format!("unknown entity '{}'", String::from_utf8_lossy(&self.entity_name)),
                            )))
                        }
                    };
                    let enc = self.output_encoding;
                    enc.print(scalar, &mut self.buffer);
                    self.entity_name.clear();
                    self.state = match ret {
                        EntityReturn::Content => State::Start,
                        EntityReturn::AttribValue(ctx, quote) => State::AttribValue(ctx, quote),
                    };
                    return Ok(None);
                }
                LexicalClass::EndOfData => {
                    return Err(Signal::Error(XmlError::new(
                        XmlErrorKind::UnclosedDocument,
                        "document ended inside an entity reference",
                    )))
                }
                _ => {
                    // '#' (numeric references) and hex digits fall outside
                    // NameStart/NameContinue, so any non-terminator
                    // character is accepted here and validated later by
                    // entity lookup / numeric parsing.
                    let scalar = lower(self.chr.chr())?;
                    if let Some(c) = char::from_u32(scalar) {
                        let mut tmp = [0u8; 4];
                        self.entity_name.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                    }
                    lower(self.chr.advance())?;
                }
            }
        }
    }

    fn unclosed_document_error(&self) -> Signal {
        Signal::Error(XmlError::new(
            XmlErrorKind::UnclosedDocument,
            format!("document ended with {} element(s) still open", self.stack.depth()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytesource::SliceSource;

    fn scanner(input: &'static [u8]) -> XmlScanner<SliceSource<'static>> {
        XmlScanner::new(SliceSource::new(input), Encoding::Utf8, EntityMap::new())
    }

    fn events(s: &mut XmlScanner<SliceSource<'static>>, n: usize) -> Vec<(EventKind, String)> {
        let mut out = Vec::new();
        for _ in 0..n {
            match s.next_event() {
                Scan::Event(ev) => out.push((ev.kind(), String::from_utf8_lossy(ev.content()).into_owned())),
                Scan::Suspend => panic!("unexpected suspend"),
            }
        }
        out
    }

    #[test]
    fn simple_element_with_content() {
        let mut s = scanner(b"<a>hello</a>");
        let got = events(&mut s, 4);
        assert_eq!(got[0], (EventKind::OpenTag, "a".to_string()));
        assert_eq!(got[1], (EventKind::Content, "hello".to_string()));
        assert_eq!(got[2], (EventKind::CloseTag, "a".to_string()));
        assert_eq!(got[3].0, EventKind::Exit);
    }

    #[test]
    fn self_closing_with_attribute() {
        let mut s = scanner(b"<a x=\"1\"/>");
        let got = events(&mut s, 5);
        assert_eq!(got[0], (EventKind::OpenTag, "a".to_string()));
        assert_eq!(got[1], (EventKind::TagAttribName, "x".to_string()));
        assert_eq!(got[2], (EventKind::TagAttribValue, "1".to_string()));
        assert_eq!(got[3], (EventKind::CloseTagIm, "".to_string()));
        assert_eq!(got[4].0, EventKind::Exit);
    }

    #[test]
    fn entity_expansion_in_content() {
        let mut s = scanner(b"<a>1 &lt; 2 &amp; &#65;</a>");
        let got = events(&mut s, 2);
        assert_eq!(got[1], (EventKind::Content, "1 < 2 & A".to_string()));
    }

    #[test]
    fn tag_mismatch_is_sticky() {
        let mut s = scanner(b"<a></b>");
        let _ = events(&mut s, 1);
        let first = events(&mut s, 1)[0].clone();
        assert_eq!(first.0, EventKind::ErrorOccurred);
        let second = events(&mut s, 1)[0].clone();
        assert_eq!(second, first);
    }

    #[test]
    fn xml_declaration() {
        let mut s = scanner(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><a/>");
        let got = events(&mut s, 6);
        assert_eq!(got[0], (EventKind::HeaderStart, "xml".to_string()));
        assert_eq!(got[1], (EventKind::HeaderAttribName, "version".to_string()));
        assert_eq!(got[2], (EventKind::HeaderAttribValue, "1.0".to_string()));
        assert_eq!(got[3], (EventKind::HeaderAttribName, "encoding".to_string()));
        assert_eq!(got[4], (EventKind::HeaderAttribValue, "UTF-8".to_string()));
        assert_eq!(got[5], (EventKind::HeaderEnd, "".to_string()));
    }

    #[test]
    fn comment_is_skipped_without_event() {
        let mut s = scanner(b"<a><!-- hi --></a>");
        let got = events(&mut s, 3);
        assert_eq!(got[0], (EventKind::OpenTag, "a".to_string()));
        assert_eq!(got[1], (EventKind::CloseTag, "a".to_string()));
        assert_eq!(got[2].0, EventKind::Exit);
    }

    #[test]
    fn cdata_emits_raw_content() {
        let mut s = scanner(b"<a><![CDATA[<not &a tag>]]></a>");
        let got = events(&mut s, 3);
        assert_eq!(got[0], (EventKind::OpenTag, "a".to_string()));
        assert_eq!(got[1], (EventKind::Content, "<not &a tag>".to_string()));
        assert_eq!(got[2], (EventKind::CloseTag, "a".to_string()));
    }

    #[test]
    fn doctype_is_skipped() {
        let mut s = scanner(b"<!DOCTYPE root [ <!ENTITY x \"y\"> ]><root/>");
        let got = events(&mut s, 2);
        assert_eq!(got[0], (EventKind::OpenTag, "root".to_string()));
        assert_eq!(got[1], (EventKind::CloseTagIm, "".to_string()));
    }

    #[test]
    fn generic_processing_instruction() {
        let mut s = scanner(b"<?target some data?><a/>");
        let got = events(&mut s, 4);
        assert_eq!(got[0].0, EventKind::DocAttribValue);
        assert_eq!(got[0].1, "target some data");
        assert_eq!(got[1], (EventKind::DocAttribEnd, "".to_string()));
        assert_eq!(got[2], (EventKind::OpenTag, "a".to_string()));
        assert_eq!(got[3], (EventKind::CloseTagIm, "".to_string()));
    }

    #[test]
    fn tokenize_collapses_whitespace() {
        let mut s = scanner(b"<a>  hi   there  </a>");
        s.set_tokenize(true);
        let got = events(&mut s, 2);
        assert_eq!(got[1], (EventKind::Content, "hi there".to_string()));
    }
}
