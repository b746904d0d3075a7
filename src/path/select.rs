//! PathSelect runtime (C7): consumes [`XmlEvent`]s, advances automaton
//! positions, and yields assigned type tags (§4.6).

use std::collections::HashMap;

use crate::event::{EventKind, XmlEvent};
use crate::path::automaton::{Activation, AttrMatch, NodeId, PathAutomaton, TypeTag};

#[derive(Debug, Clone)]
struct ActivePosition {
    node: NodeId,
    /// Element-nesting depth this position is bound to; 0 is the
    /// document root. Retired in one shot when the element at this
    /// depth closes.
    xml_depth: u32,
}

enum PendingKind {
    Select(NodeId),
    Gate(NodeId),
}

struct PendingAttr {
    owner_xml_depth: u32,
    kind: PendingKind,
}

/// One drained match: the terminal's type tag plus the triggering
/// event's content, copied out since the event's borrow does not
/// outlive the `push` call that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub type_tag: TypeTag,
    pub content: Vec<u8>,
}

/// A read-only runtime instance over a shared, immutable [`PathAutomaton`].
/// Any number of instances may run concurrently over the same automaton
/// (§5 shared-resource policy).
pub struct PathSelect<'a> {
    automaton: &'a PathAutomaton,
    active: Vec<ActivePosition>,
    sibling_counts: HashMap<(NodeId, u32, Vec<u8>), u32>,
    pending: Vec<PendingAttr>,
    current_depth: u32,
    matches: Vec<Match>,
}

impl<'a> PathSelect<'a> {
    pub fn new(automaton: &'a PathAutomaton) -> Self {
        PathSelect {
            automaton,
            active: vec![ActivePosition {
                node: PathAutomaton::ROOT,
                xml_depth: 0,
            }],
            sibling_counts: HashMap::new(),
            pending: Vec::new(),
            current_depth: 0,
            matches: Vec::new(),
        }
    }

    /// Drains matches emitted while handling the most recent `push`.
    /// Non-destructive across pushes only within the call that produced
    /// them: the next `push` clears anything left undrained.
    pub fn drain_matches(&mut self) -> Vec<Match> {
        std::mem::take(&mut self.matches)
    }

    /// Advances the runtime by one scanner event.
    pub fn push(&mut self, event: &XmlEvent<'_>) {
        self.matches.clear();
        match event.kind() {
            EventKind::OpenTag => self.on_open_tag(event.content()),
            EventKind::TagAttribName => self.on_attrib_name(event.content()),
            EventKind::TagAttribValue => self.on_attrib_value(event.content()),
            EventKind::Content => self.on_content(event.content()),
            EventKind::CloseTag | EventKind::CloseTagIm => self.on_close(),
            _ => {}
        }
    }

    fn on_open_tag(&mut self, name: &[u8]) {
        let opening_depth = self.current_depth;
        let mut spawned = Vec::new();
        let mut emitted = Vec::new();

        for pos in &self.active {
            for &child_id in self.automaton.children(pos.node) {
                let child = self.automaton.node(child_id);
                if let Activation::Tag(n) = child.activation() {
                    if n.as_slice() != name {
                        continue;
                    }
                    let eligible = if child.follow() {
                        opening_depth >= pos.xml_depth
                    } else {
                        opening_depth == pos.xml_depth
                    };
                    if !eligible {
                        continue;
                    }
                    let key = (pos.node, opening_depth, name.to_vec());
                    let index = *self.sibling_counts.get(&key).unwrap_or(&0);
                    self.sibling_counts.insert(key, index + 1);
                    if !child.sibling_range_contains(index) {
                        continue;
                    }
                    spawned.push(ActivePosition {
                        node: child_id,
                        xml_depth: opening_depth + 1,
                    });
                    for &tag in child.type_tags() {
                        emitted.push(Match {
                            type_tag: tag,
                            content: name.to_vec(),
                        });
                    }
                }
            }
        }

        self.active.extend(spawned);
        self.matches.extend(emitted);
        self.current_depth += 1;
    }

    fn on_attrib_name(&mut self, name: &[u8]) {
        self.pending.clear();
        for pos in &self.active {
            if pos.xml_depth != self.current_depth {
                continue;
            }
            for &child_id in self.automaton.children(pos.node) {
                let child = self.automaton.node(child_id);
                match child.activation() {
                    Activation::AttributeSelect(n) if n.as_slice() == name => {
                        self.pending.push(PendingAttr {
                            owner_xml_depth: pos.xml_depth,
                            kind: PendingKind::Select(child_id),
                        });
                    }
                    Activation::AttributeGate { name: n, value } if n.as_slice() == name => match value {
                        AttrMatch::Any => {
                            if !self.active.iter().any(|p| p.node == child_id && p.xml_depth == pos.xml_depth) {
                                self.active_push_later(child_id, pos.xml_depth);
                            }
                        }
                        AttrMatch::Exact(_) => {
                            self.pending.push(PendingAttr {
                                owner_xml_depth: pos.xml_depth,
                                kind: PendingKind::Gate(child_id),
                            });
                        }
                    },
                    _ => {}
                }
            }
        }
    }

    fn on_attrib_value(&mut self, value: &[u8]) {
        let pending = std::mem::take(&mut self.pending);
        for p in pending {
            match p.kind {
                PendingKind::Select(node_id) => {
                    for &tag in self.automaton.node(node_id).type_tags() {
                        self.matches.push(Match {
                            type_tag: tag,
                            content: value.to_vec(),
                        });
                    }
                }
                PendingKind::Gate(node_id) => {
                    let matches_value = matches!(
                        self.automaton.node(node_id).activation(),
                        Activation::AttributeGate { value: AttrMatch::Exact(v), .. } if v.as_slice() == value
                    );
                    if matches_value && !self.active.iter().any(|a| a.node == node_id && a.xml_depth == p.owner_xml_depth) {
                        self.active.push(ActivePosition {
                            node: node_id,
                            xml_depth: p.owner_xml_depth,
                        });
                    }
                }
            }
        }
    }

    fn on_content(&mut self, text: &[u8]) {
        for pos in &self.active {
            if pos.xml_depth != self.current_depth {
                continue;
            }
            for &child_id in self.automaton.children(pos.node) {
                let child = self.automaton.node(child_id);
                if matches!(child.activation(), Activation::Content) {
                    for &tag in child.type_tags() {
                        self.matches.push(Match {
                            type_tag: tag,
                            content: text.to_vec(),
                        });
                    }
                }
            }
        }
    }

    fn on_close(&mut self) {
        let closing_depth = self.current_depth;
        let retired: Vec<ActivePosition> = {
            let mut kept = Vec::with_capacity(self.active.len());
            let mut retired = Vec::new();
            for pos in self.active.drain(..) {
                if pos.xml_depth == closing_depth {
                    retired.push(pos);
                } else {
                    kept.push(pos);
                }
            }
            self.active = kept;
            retired
        };
        for pos in &retired {
            self.sibling_counts.retain(|(node, depth, _), _| !(*node == pos.node && *depth == pos.xml_depth));
        }
        self.current_depth = closing_depth.saturating_sub(1);
    }

    fn active_push_later(&mut self, node: NodeId, xml_depth: u32) {
        self.active.push(ActivePosition { node, xml_depth });
    }
}
