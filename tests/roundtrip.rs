//! `parse -> print` identity (§8 Round-trips), driving an `XmlPrinter` from
//! a live `XmlScanner` event stream rather than hand-built calls.

use rustyxml::{EntityMap, Encoding, EventKind, Scan, SliceSource, XmlPrinter, XmlScanner};

fn reprint(input: &'static [u8]) -> String {
    let mut scanner = XmlScanner::new(SliceSource::new(input), Encoding::Utf8, EntityMap::new());
    let mut printer = XmlPrinter::new(Encoding::Utf8);
    let mut out = Vec::new();
    loop {
        match scanner.next_event() {
            Scan::Event(ev) => match ev.kind() {
                EventKind::OpenTag => printer.print_open_tag(ev.content(), &mut out).unwrap(),
                EventKind::TagAttribName => printer.print_attribute(ev.content(), &mut out).unwrap(),
                EventKind::TagAttribValue => printer.print_value(ev.content(), &mut out).unwrap(),
                EventKind::Content => printer.print_value(ev.content(), &mut out).unwrap(),
                EventKind::CloseTag | EventKind::CloseTagIm => printer.print_close_tag(&mut out).unwrap(),
                EventKind::Exit => break,
                _ => {}
            },
            Scan::Suspend => unreachable!(),
        }
    }
    String::from_utf8(out).unwrap()
}

#[test]
fn nested_elements_with_content_round_trip() {
    let s = reprint(b"<a><b>hi</b></a>");
    assert!(s.ends_with("<a><b>hi</b></a>"));
    assert_eq!(s.matches("<?xml").count(), 1);
}

#[test]
fn self_closing_element_stays_self_closing() {
    let s = reprint(b"<a><b/></a>");
    assert!(s.ends_with("<a><b/></a>"));
}

#[test]
fn attribute_value_round_trips_through_escaping() {
    let s = reprint(b"<a k=\"x &amp; y\">ok</a>");
    assert!(s.contains("k=\"x &amp; y\""));
    assert!(s.ends_with("ok</a>"));
}
