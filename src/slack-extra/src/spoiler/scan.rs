//! Marker scanning and segmentation.
//!
//! An inline sequence is flattened into units (one per character of every text
//! element, one per non-text element). Pairs of adjacent `|` characters are
//! markers: they toggle spoiler state and are dropped from every rendering.

use super::document::Inline;

const MARKER: char = '|';

/// What a unit stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// One character of a text element.
    Char(char),
    /// A whole non-text element.
    Atom,
}

/// One atomic position of the flattened sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    /// Index of the originating element.
    pub source: usize,
    /// Character offset within the element (always 0 for atoms).
    pub offset: usize,
    pub kind: UnitKind,
    pub marker: bool,
    pub spoiler: bool,
}

/// A maximal run of non-marker units sharing one spoiler flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub id: usize,
    pub spoiler: bool,
    pub units: Vec<Unit>,
}

/// Flatten `elements` and mark spoiler membership.
pub fn scan(elements: &[Inline]) -> Vec<Unit> {
    let mut units = Vec::new();
    for (source, element) in elements.iter().enumerate() {
        match element {
            Inline::Text(text) => {
                units.extend(text.text.chars().enumerate().map(|(offset, ch)| Unit {
                    source,
                    offset,
                    kind: UnitKind::Char(ch),
                    marker: false,
                    spoiler: false,
                }))
            }
            Inline::Atom(_) => units.push(Unit {
                source,
                offset: 0,
                kind: UnitKind::Atom,
                marker: false,
                spoiler: false,
            }),
            Inline::Opaque(_) => {}
        }
    }

    mark_spoilers(&mut units);
    units
}

fn is_marker_char(unit: &Unit) -> bool {
    unit.kind == UnitKind::Char(MARKER)
}

fn mark_spoilers(units: &mut [Unit]) {
    let mut in_spoiler = false;
    let mut i = 0;
    while i < units.len() {
        if is_marker_char(&units[i]) && units.get(i + 1).is_some_and(is_marker_char) {
            units[i].marker = true;
            units[i + 1].marker = true;
            in_spoiler = !in_spoiler;
            i += 2;
        } else {
            units[i].spoiler = in_spoiler;
            i += 1;
        }
    }
}

/// Group the visible units into segments, ids assigned in scan order.
pub fn segment(units: &[Unit]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for unit in units.iter().filter(|unit| !unit.marker) {
        match segments.last_mut() {
            Some(current) if current.spoiler == unit.spoiler => current.units.push(*unit),
            _ => segments.push(Segment {
                id: segments.len(),
                spoiler: unit.spoiler,
                units: vec![*unit],
            }),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spoiler::document::TextElement;
    use serde_json::Map;

    fn text(s: &str) -> Inline {
        Inline::Text(TextElement::plain(s))
    }

    fn emoji() -> Inline {
        let mut map = Map::new();
        map.insert("type".into(), "emoji".into());
        map.insert("name".into(), "eyes".into());
        Inline::Atom(map)
    }

    fn visible(units: &[Unit]) -> String {
        units
            .iter()
            .filter(|u| !u.marker)
            .map(|u| match u.kind {
                UnitKind::Char(c) => c,
                UnitKind::Atom => '@',
            })
            .collect()
    }

    #[test]
    fn test_scan_marks_pairs() {
        let units = scan(&[text("a||b||c")]);
        assert_eq!(units.len(), 7);
        assert_eq!(visible(&units), "abc");
        let spoilers: Vec<bool> = units.iter().filter(|u| !u.marker).map(|u| u.spoiler).collect();
        assert_eq!(spoilers, vec![false, true, false]);
    }

    #[test]
    fn test_single_pipe_is_literal() {
        let units = scan(&[text("a|b")]);
        assert!(units.iter().all(|u| !u.marker && !u.spoiler));
    }

    #[test]
    fn test_triple_pipe_leaves_one_literal() {
        let units = scan(&[text("|||x")]);
        assert_eq!(visible(&units), "|x");
        assert!(units[2].spoiler);
        assert!(units[3].spoiler);
    }

    #[test]
    fn test_markers_pair_across_elements() {
        let units = scan(&[text("a|"), text("|b")]);
        assert_eq!(visible(&units), "ab");
        assert!(!units[0].spoiler);
        assert!(units[3].spoiler);
        assert_eq!(units[3].source, 1);
        assert_eq!(units[3].offset, 1);
    }

    #[test]
    fn test_atom_breaks_marker_pair() {
        let units = scan(&[text("|"), emoji(), text("|")]);
        assert!(units.iter().all(|u| !u.marker));
    }

    #[test]
    fn test_opaque_members_produce_no_units() {
        let units = scan(&[Inline::Opaque(serde_json::json!(7)), text("x")]);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source, 1);
    }

    #[test]
    fn test_segments_merge_across_elements() {
        let units = scan(&[text("a||b"), emoji(), text("c||d")]);
        let segments = segment(&units);
        assert_eq!(segments.len(), 3);
        assert_eq!(
            segments.iter().map(|s| (s.id, s.spoiler)).collect::<Vec<_>>(),
            vec![(0, false), (1, true), (2, false)]
        );
        assert_eq!(visible(&segments[1].units), "b@c");
    }

    #[test]
    fn test_marker_only_input_has_no_segments() {
        let units = scan(&[text("||||")]);
        assert_eq!(units.len(), 4);
        assert!(segment(&units).is_empty());
    }
}
