//! Whole-document scenarios that exercise the scanner and the path runtime
//! together, the way a caller actually wires them: drive a scanner to
//! completion, feed every event into a `PathSelect`, and check what comes
//! out the other end.

use rustyxml::{AttrMatch, EntityMap, Encoding, EventKind, Match, PathAutomaton, PathSelect, Scan, SliceSource, XmlScanner};

fn run(input: &'static [u8]) -> Vec<(EventKind, Vec<u8>)> {
    let _ = env_logger::try_init();
    let mut scanner = XmlScanner::new(SliceSource::new(input), Encoding::Utf8, EntityMap::new());
    let mut out = Vec::new();
    loop {
        match scanner.next_event() {
            Scan::Event(ev) => {
                let kind = ev.kind();
                out.push((kind, ev.content().to_vec()));
                if kind == EventKind::Exit || kind == EventKind::ErrorOccurred {
                    break;
                }
            }
            Scan::Suspend => panic!("unexpected suspend on a complete in-memory slice"),
        }
    }
    out
}

#[test]
fn scenario_1_simple_element_with_content() {
    let events = run(b"<a>x</a>");
    assert_eq!(events[0].0, EventKind::OpenTag);
    assert_eq!(events[1], (EventKind::Content, b"x".to_vec()));
    assert_eq!(events[2], (EventKind::CloseTag, b"a".to_vec()));
    assert_eq!(events[3].0, EventKind::Exit);
}

#[test]
fn scenario_2_self_closing_with_attribute() {
    let events = run(b"<a k=\"v\"/>");
    assert_eq!(
        events[..4],
        [
            (EventKind::OpenTag, b"a".to_vec()),
            (EventKind::TagAttribName, b"k".to_vec()),
            (EventKind::TagAttribValue, b"v".to_vec()),
            (EventKind::CloseTagIm, b"".to_vec()),
        ]
    );
}

#[test]
fn scenario_3_nested_path_match_emits_type_tag() {
    let mut automaton = PathAutomaton::new();
    automaton.root().select_tag("a").select_tag("b").assign_type(7);
    let mut select = PathSelect::new(&automaton);

    let mut all_matches: Vec<Match> = Vec::new();
    let mut scanner = XmlScanner::new(SliceSource::new(b"<a><b/></a>"), Encoding::Utf8, EntityMap::new());
    loop {
        match scanner.next_event() {
            Scan::Event(ev) => {
                let kind = ev.kind();
                select.push(&ev);
                all_matches.extend(select.drain_matches());
                if kind == EventKind::Exit {
                    break;
                }
            }
            Scan::Suspend => unreachable!(),
        }
    }
    assert_eq!(all_matches, vec![Match { type_tag: 7, content: b"b".to_vec() }]);
}

#[test]
fn scenario_4_sibling_from_bound_filters_first_match() {
    let mut automaton = PathAutomaton::new();
    automaton
        .root()
        .select_tag("r")
        .select_tag("i")
        .from(1)
        .select_attribute("id")
        .assign_type(9);
    let mut select = PathSelect::new(&automaton);

    let mut all_matches: Vec<Match> = Vec::new();
    let mut scanner = XmlScanner::new(
        SliceSource::new(b"<r><i id=\"1\"/><i id=\"2\"/></r>"),
        Encoding::Utf8,
        EntityMap::new(),
    );
    loop {
        match scanner.next_event() {
            Scan::Event(ev) => {
                let kind = ev.kind();
                select.push(&ev);
                all_matches.extend(select.drain_matches());
                if kind == EventKind::Exit {
                    break;
                }
            }
            Scan::Suspend => unreachable!(),
        }
    }
    assert_eq!(all_matches, vec![Match { type_tag: 9, content: b"2".to_vec() }]);
}

#[test]
fn scenario_5_entity_expansion_yields_decoded_bytes() {
    let events = run(b"<a>&amp;&lt;</a>");
    assert_eq!(events[1], (EventKind::Content, b"&<".to_vec()));
}

#[test]
fn scenario_6_tag_mismatch_is_sticky_on_repeated_advance() {
    let mut scanner = XmlScanner::new(SliceSource::new(b"<a><b></a>"), Encoding::Utf8, EntityMap::new());
    let mut events = Vec::new();
    for _ in 0..3 {
        match scanner.next_event() {
            Scan::Event(ev) => events.push((ev.kind(), ev.content().to_vec())),
            Scan::Suspend => unreachable!(),
        }
    }
    assert_eq!(events[0].0, EventKind::OpenTag); // a
    assert_eq!(events[1].0, EventKind::OpenTag); // b
    assert_eq!(events[2].0, EventKind::ErrorOccurred);

    let again = match scanner.next_event() {
        Scan::Event(ev) => (ev.kind(), ev.content().to_vec()),
        Scan::Suspend => unreachable!(),
    };
    assert_eq!(again, events[2]);
}

#[test]
fn if_attribute_gate_allows_content_only_when_matched() {
    let mut automaton = PathAutomaton::new();
    automaton
        .root()
        .select_tag("item")
        .if_attribute("kind", AttrMatch::Exact(b"keep".to_vec()))
        .select_content()
        .assign_type(3);
    let mut select = PathSelect::new(&automaton);

    let mut matches = Vec::new();
    let mut scanner = XmlScanner::new(
        SliceSource::new(b"<item kind=\"drop\">a</item><item kind=\"keep\">b</item>"),
        Encoding::Utf8,
        EntityMap::new(),
    );
    loop {
        match scanner.next_event() {
            Scan::Event(ev) => {
                let kind = ev.kind();
                select.push(&ev);
                matches.extend(select.drain_matches());
                if kind == EventKind::Exit {
                    break;
                }
            }
            Scan::Suspend => unreachable!(),
        }
    }
    assert_eq!(matches, vec![Match { type_tag: 3, content: b"b".to_vec() }]);
}
