//! A streaming, low-memory XML scanner paired with a push-down path
//! selection automaton. The scanner pulls bytes through a character-set
//! codec one token at a time (never materializing a DOM); the path
//! runtime consumes its event stream and emits user-assigned type tags
//! wherever a compiled path expression matches. A companion printer
//! shares the scanner's codec and escaping discipline for serialization.

pub mod bytesource;
pub mod charset;
pub mod entities;
pub mod error;
pub mod event;
pub mod path;
pub mod printer;
pub mod scanner;
pub mod tagstack;
pub mod textscanner;

pub use bytesource::{Advance, ByteSource, ChunkedSource, SliceSource};
pub use charset::Encoding;
pub use entities::EntityMap;
pub use error::{XmlError, XmlErrorKind};
pub use event::{EventKind, XmlEvent};
pub use path::{AttrMatch, Match, PathAutomaton, PathSelect};
pub use printer::XmlPrinter;
pub use scanner::{Scan, XmlScanner};
