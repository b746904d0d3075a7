//! Character-set codec layer (C2).
//!
//! A codec is a tagged union rather than a trait object — the hot path
//! (single-character decode, invoked once per input character) must not
//! pay for virtual dispatch that a "method table with void pointer"
//! design would force on every call. Every variant implements the same
//! four operations the scan loop needs:
//! `total_len`/`decode` (together make up `value`), `ascii_of`, and
//! `print`. `skip` is just "fill, then discard" and lives on
//! [`crate::textscanner::TextScanner`], which owns the scratch buffer.

use crate::error::{XmlError, XmlErrorKind};

/// Maximum number of bytes any supported codec needs per scalar.
pub const MAX_CODEC_LEN: usize = 4;

/// A concrete character-set codec, selected once at construction time
/// from a caller-supplied encoding string (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Ucs2Le,
    Ucs2Be,
    Ucs4Le,
    Ucs4Be,
    /// ISO-8859-`n`, `n` in 1..=16. 1 is plain Latin-1 (identity mapping);
    /// higher codepages remap the 0xA0..=0xFF half per codepage.
    IsoLatin(u8),
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Utf8
    }
}

impl Encoding {
    /// Parse a caller-supplied encoding identifier. Case-, space- and
    /// hyphen-insensitive per §4.1/§6 ("UTF-8", "utf8", "UTF 8" all match).
    pub fn from_name(name: &str) -> Result<Self, XmlError> {
        let normalized: String = name
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "" | "utf8" => Ok(Encoding::Utf8),
            "utf16" | "utf16be" => Ok(Encoding::Utf16Be),
            "utf16le" => Ok(Encoding::Utf16Le),
            "ucs2" | "ucs2be" => Ok(Encoding::Ucs2Be),
            "ucs2le" => Ok(Encoding::Ucs2Le),
            "ucs4" | "ucs4be" => Ok(Encoding::Ucs4Be),
            "ucs4le" => Ok(Encoding::Ucs4Le),
            "isolatin" | "iso88591" | "latin1" => Ok(Encoding::IsoLatin(1)),
            _ => {
                if let Some(rest) = normalized.strip_prefix("iso8859") {
                    if let Ok(n) = rest.parse::<u8>() {
                        if (1..=16).contains(&n) {
                            return Ok(Encoding::IsoLatin(n));
                        }
                    }
                }
                Err(XmlError::new(
                    XmlErrorKind::UnsupportedEncoding,
                    format!("unrecognized encoding identifier `{}`", name),
                ))
            }
        }
    }

    /// How many leading bytes of `scratch` are needed before `total_len`
    /// can be recomputed; codecs with a larger fixed/variable unit report
    /// `None` until enough lookahead bytes have been buffered.
    #[inline]
    pub fn total_len(&self, scratch: &[u8]) -> Option<usize> {
        debug_assert!(!scratch.is_empty());
        match self {
            Encoding::Utf8 => Some(utf8_lead_len(scratch[0])),
            Encoding::Utf16Le | Encoding::Utf16Be => {
                if scratch.len() < 2 {
                    return None;
                }
                let unit = read_u16(scratch, matches!(self, Encoding::Utf16Be));
                if (0xD800..=0xDBFF).contains(&unit) {
                    Some(4)
                } else {
                    Some(2)
                }
            }
            Encoding::Ucs2Le | Encoding::Ucs2Be => Some(2),
            Encoding::Ucs4Le | Encoding::Ucs4Be => Some(4),
            Encoding::IsoLatin(_) => Some(1),
        }
    }

    /// Decode a complete scalar from exactly `total_len(bytes)` bytes.
    pub fn decode(&self, bytes: &[u8]) -> Result<u32, XmlError> {
        match self {
            Encoding::Utf8 => decode_utf8(bytes),
            Encoding::Utf16Le | Encoding::Utf16Be => decode_utf16(bytes, matches!(self, Encoding::Utf16Be)),
            Encoding::Ucs2Le | Encoding::Ucs2Be => {
                let unit = read_u16(bytes, matches!(self, Encoding::Ucs2Be)) as u32;
                if (0xD800..=0xDFFF).contains(&unit) {
                    Err(XmlError::new(XmlErrorKind::MalformedCharacter, "lone surrogate in UCS-2 input"))
                } else {
                    Ok(unit)
                }
            }
            Encoding::Ucs4Le | Encoding::Ucs4Be => {
                let be = matches!(self, Encoding::Ucs4Be);
                let v = if be {
                    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                } else {
                    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                };
                if v > 0x10FFFF || (0xD800..=0xDFFF).contains(&v) {
                    Err(XmlError::new(XmlErrorKind::MalformedCharacter, "scalar out of Unicode range"))
                } else {
                    Ok(v)
                }
            }
            Encoding::IsoLatin(codepage) => Ok(iso8859_to_scalar(*codepage, bytes[0])),
        }
    }

    /// ASCII value of the already-decoded lead bytes, or -1 if the
    /// character is non-ASCII. Never forces a full multi-unit decode.
    #[inline]
    pub fn ascii_of(&self, scratch: &[u8]) -> i16 {
        match self {
            Encoding::Utf8 | Encoding::IsoLatin(_) => {
                if scratch[0] < 0x80 {
                    scratch[0] as i16
                } else {
                    -1
                }
            }
            Encoding::Utf16Le | Encoding::Utf16Be | Encoding::Ucs2Le | Encoding::Ucs2Be => {
                let be = matches!(self, Encoding::Utf16Be | Encoding::Ucs2Be);
                let unit = read_u16(scratch, be);
                if unit < 0x80 {
                    unit as i16
                } else {
                    -1
                }
            }
            Encoding::Ucs4Le | Encoding::Ucs4Be => {
                let be = matches!(self, Encoding::Ucs4Be);
                let v = if be {
                    u32::from_be_bytes([scratch[0], scratch[1], scratch[2], scratch[3]])
                } else {
                    u32::from_le_bytes([scratch[0], scratch[1], scratch[2], scratch[3]])
                };
                if v < 0x80 {
                    v as i16
                } else {
                    -1
                }
            }
        }
    }

    /// Append the canonical encoding of `scalar` to `out`. Scalars the
    /// codec cannot represent fall back to `?` per §4.1.
    pub fn print(&self, scalar: u32, out: &mut Vec<u8>) {
        match self {
            Encoding::Utf8 => match char::from_u32(scalar) {
                Some(c) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
                None => out.push(b'?'),
            },
            Encoding::Utf16Le | Encoding::Utf16Be => {
                let be = matches!(self, Encoding::Utf16Be);
                match char::from_u32(scalar) {
                    Some(c) => {
                        let mut units = [0u16; 2];
                        for unit in c.encode_utf16(&mut units).iter() {
                            push_u16(out, *unit, be);
                        }
                    }
                    None => out.push(b'?'),
                }
            }
            Encoding::Ucs2Le | Encoding::Ucs2Be => {
                let be = matches!(self, Encoding::Ucs2Be);
                if scalar <= 0xFFFF && !(0xD800..=0xDFFF).contains(&scalar) {
                    push_u16(out, scalar as u16, be);
                } else {
                    out.push(b'?');
                }
            }
            Encoding::Ucs4Le | Encoding::Ucs4Be => {
                let be = matches!(self, Encoding::Ucs4Be);
                let bytes = if be { scalar.to_be_bytes() } else { scalar.to_le_bytes() };
                out.extend_from_slice(&bytes);
            }
            Encoding::IsoLatin(codepage) => match scalar_to_iso8859(*codepage, scalar) {
                Some(b) => out.push(b),
                None => out.push(b'?'),
            },
        }
    }

    /// The name reported in an XML declaration / printer prolog.
    pub fn declared_name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16",
            Encoding::Ucs2Le => "UCS-2LE",
            Encoding::Ucs2Be => "UCS-2",
            Encoding::Ucs4Le => "UCS-4LE",
            Encoding::Ucs4Be => "UCS-4",
            Encoding::IsoLatin(1) => "ISO-8859-1",
            Encoding::IsoLatin(n) => {
                // Small fixed set of static strings avoids a per-call allocation.
                const NAMES: [&str; 17] = [
                    "", "ISO-8859-1", "ISO-8859-2", "ISO-8859-3", "ISO-8859-4", "ISO-8859-5",
                    "ISO-8859-6", "ISO-8859-7", "ISO-8859-8", "ISO-8859-9", "ISO-8859-10",
                    "ISO-8859-11", "ISO-8859-12", "ISO-8859-13", "ISO-8859-14", "ISO-8859-15",
                    "ISO-8859-16",
                ];
                NAMES.get(*n as usize).copied().unwrap_or("ISO-8859-1")
            }
        }
    }
}

#[inline]
fn utf8_lead_len(b0: u8) -> usize {
    if b0 < 0x80 {
        1
    } else if b0 & 0xE0 == 0xC0 {
        2
    } else if b0 & 0xF0 == 0xE0 {
        3
    } else if b0 & 0xF8 == 0xF0 {
        4
    } else {
        // Invalid lead byte (stray continuation byte or 0xF8+): treat as a
        // single malformed unit so the fill loop makes progress and
        // `decode` reports MalformedCharacter.
        1
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<u32, XmlError> {
    let malformed = || XmlError::new(XmlErrorKind::MalformedCharacter, "invalid UTF-8 byte sequence");
    match bytes.len() {
        1 => {
            if bytes[0] < 0x80 {
                Ok(bytes[0] as u32)
            } else {
                Err(malformed())
            }
        }
        2 => {
            if bytes[0] & 0xE0 != 0xC0 || bytes[1] & 0xC0 != 0x80 {
                return Err(malformed());
            }
            let v = ((bytes[0] as u32 & 0x1F) << 6) | (bytes[1] as u32 & 0x3F);
            if v < 0x80 {
                Err(malformed())
            } else {
                Ok(v)
            }
        }
        3 => {
            if bytes[0] & 0xF0 != 0xE0 || bytes[1] & 0xC0 != 0x80 || bytes[2] & 0xC0 != 0x80 {
                return Err(malformed());
            }
            let v = ((bytes[0] as u32 & 0x0F) << 12) | ((bytes[1] as u32 & 0x3F) << 6) | (bytes[2] as u32 & 0x3F);
            if v < 0x800 || (0xD800..=0xDFFF).contains(&v) {
                Err(malformed())
            } else {
                Ok(v)
            }
        }
        4 => {
            if bytes[0] & 0xF8 != 0xF0 || bytes[1] & 0xC0 != 0x80 || bytes[2] & 0xC0 != 0x80 || bytes[3] & 0xC0 != 0x80 {
                return Err(malformed());
            }
            let v = ((bytes[0] as u32 & 0x07) << 18)
                | ((bytes[1] as u32 & 0x3F) << 12)
                | ((bytes[2] as u32 & 0x3F) << 6)
                | (bytes[3] as u32 & 0x3F);
            if !(0x10000..=0x10FFFF).contains(&v) {
                Err(malformed())
            } else {
                Ok(v)
            }
        }
        _ => Err(malformed()),
    }
}

fn decode_utf16(bytes: &[u8], be: bool) -> Result<u32, XmlError> {
    let high = read_u16(bytes, be);
    if bytes.len() == 2 {
        if (0xD800..=0xDFFF).contains(&high) {
            return Err(XmlError::new(XmlErrorKind::MalformedCharacter, "lone surrogate in UTF-16 input"));
        }
        Ok(high as u32)
    } else {
        let low = read_u16(&bytes[2..], be);
        if !(0xD800..=0xDBFF).contains(&high) || !(0xDC00..=0xDFFF).contains(&low) {
            return Err(XmlError::new(XmlErrorKind::MalformedCharacter, "invalid UTF-16 surrogate pair"));
        }
        let v = 0x10000 + ((high as u32 - 0xD800) << 10) + (low as u32 - 0xDC00);
        Ok(v)
    }
}

#[inline]
fn read_u16(bytes: &[u8], be: bool) -> u16 {
    if be {
        u16::from_be_bytes([bytes[0], bytes[1]])
    } else {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

#[inline]
fn push_u16(out: &mut Vec<u8>, unit: u16, be: bool) {
    if be {
        out.extend_from_slice(&unit.to_be_bytes());
    } else {
        out.extend_from_slice(&unit.to_le_bytes());
    }
}

/// ISO-8859-2 (Latin-2) upper half, 0xA0..=0xFF, as Unicode scalars.
const ISO_8859_2_HIGH: [u32; 96] = [
    0x00A0, 0x0104, 0x02D8, 0x0141, 0x00A4, 0x013D, 0x015A, 0x00A7, 0x00A8, 0x0160, 0x015E, 0x0164,
    0x0179, 0x00AD, 0x017D, 0x017B, 0x00B0, 0x0105, 0x02DB, 0x0142, 0x00B4, 0x013E, 0x015B, 0x02C7,
    0x00B8, 0x0161, 0x015F, 0x0165, 0x017A, 0x02DD, 0x017E, 0x017C, 0x0154, 0x00C1, 0x00C2, 0x0102,
    0x00C4, 0x0139, 0x0106, 0x00C7, 0x010C, 0x00C9, 0x0118, 0x00CB, 0x011A, 0x00CD, 0x00CE, 0x010E,
    0x0110, 0x0143, 0x0147, 0x00D3, 0x00D4, 0x0150, 0x00D6, 0x00D7, 0x0158, 0x016E, 0x00DA, 0x0170,
    0x00DC, 0x00DD, 0x0162, 0x00DF, 0x0155, 0x00E1, 0x00E2, 0x0103, 0x00E4, 0x013A, 0x0107, 0x00E7,
    0x010D, 0x00E9, 0x0119, 0x00EB, 0x011B, 0x00ED, 0x00EE, 0x010F, 0x0111, 0x0144, 0x0148, 0x00F3,
    0x00F4, 0x0151, 0x00F6, 0x00F7, 0x0159, 0x016F, 0x00FA, 0x0171, 0x00FC, 0x00FD, 0x0163, 0x02D9,
];

/// ISO-8859-15 (Latin-9) upper half — identical to Latin-1 except for
/// eight code points (notably 0xA4 becomes the euro sign).
const ISO_8859_15_HIGH: [(u8, u32); 8] = [
    (0xA4, 0x20AC),
    (0xA6, 0x0160),
    (0xA8, 0x0161),
    (0xB4, 0x017D),
    (0xB8, 0x017E),
    (0xBC, 0x0152),
    (0xBD, 0x0153),
    (0xBE, 0x0178),
];

fn iso8859_to_scalar(codepage: u8, byte: u8) -> u32 {
    if byte < 0xA0 {
        return byte as u32;
    }
    match codepage {
        2 => ISO_8859_2_HIGH[(byte - 0xA0) as usize],
        15 => ISO_8859_15_HIGH
            .iter()
            .find(|(b, _)| *b == byte)
            .map(|(_, s)| *s)
            .unwrap_or(byte as u32),
        // Remaining codepages are pluggable but not all tabulated here;
        // fall back to the Latin-1 identity mapping for the upper half.
        _ => byte as u32,
    }
}

fn scalar_to_iso8859(codepage: u8, scalar: u32) -> Option<u8> {
    if scalar < 0xA0 {
        return u8::try_from(scalar).ok();
    }
    match codepage {
        2 => ISO_8859_2_HIGH
            .iter()
            .position(|&s| s == scalar)
            .map(|i| 0xA0 + i as u8),
        15 => ISO_8859_15_HIGH
            .iter()
            .find(|(_, s)| *s == scalar)
            .map(|(b, _)| *b)
            .or_else(|| u8::try_from(scalar).ok()),
        _ => u8::try_from(scalar).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_is_case_and_separator_insensitive() {
        assert_eq!(Encoding::from_name("UTF-8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::from_name("utf8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::from_name("UTF 8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::from_name("ucs-2le").unwrap(), Encoding::Ucs2Le);
        assert_eq!(Encoding::from_name("iso-8859-2").unwrap(), Encoding::IsoLatin(2));
    }

    #[test]
    fn from_name_rejects_unknown() {
        assert!(Encoding::from_name("ebcdic").is_err());
    }

    #[test]
    fn utf8_ascii_fast_path() {
        let enc = Encoding::Utf8;
        assert_eq!(enc.total_len(b"A"), Some(1));
        assert_eq!(enc.ascii_of(b"A"), b'A' as i16);
        assert_eq!(enc.decode(b"A").unwrap(), b'A' as u32);
    }

    #[test]
    fn utf8_multibyte_decode() {
        let enc = Encoding::Utf8;
        let euro = "€".as_bytes(); // U+20AC, 3 bytes
        assert_eq!(enc.total_len(&euro[..1]), Some(3));
        assert_eq!(enc.decode(euro).unwrap(), 0x20AC);
        assert_eq!(enc.ascii_of(&euro[..1]), -1);
    }

    #[test]
    fn ucs2_falls_back_to_question_mark_above_bmp() {
        let enc = Encoding::Ucs2Be;
        let mut out = Vec::new();
        enc.print(0x1F600, &mut out); // outside the BMP
        assert_eq!(out, b"?");
    }

    #[test]
    fn utf16_surrogate_pair_roundtrip() {
        let enc = Encoding::Utf16Be;
        let mut out = Vec::new();
        enc.print(0x1F600, &mut out);
        assert_eq!(enc.total_len(&out[..2]), Some(4));
        assert_eq!(enc.decode(&out).unwrap(), 0x1F600);
    }

    #[test]
    fn iso_8859_2_roundtrips_named_char() {
        let enc = Encoding::IsoLatin(2);
        // 0xA3 is Ł in Latin-2.
        assert_eq!(iso8859_to_scalar(2, 0xA3), 0x0141);
        assert_eq!(scalar_to_iso8859(2, 0x0141), Some(0xA3));
    }
}
