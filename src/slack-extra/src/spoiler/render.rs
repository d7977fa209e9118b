//! Per-element reassembly and the two renderings.

use std::collections::HashSet;

use super::document::{Inline, TextElement};
use super::scan::{Segment, UnitKind};

/// Text shown in place of a hidden spoiler run.
pub const PLACEHOLDER_TEXT: &str = "[spoiler hidden]";

/// The part of one source element that falls into one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub segment: usize,
    pub spoiler: bool,
    pub content: SliceContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceContent {
    Text(String),
    /// The whole non-text element.
    Atom,
}

/// An output element tagged with the index of the element it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced {
    pub source: usize,
    pub element: Inline,
    /// Set on redaction placeholders.
    pub placeholder: bool,
}

/// Both renderings of one inline sequence, in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub revealed: Vec<Sourced>,
    pub redacted: Vec<Sourced>,
}

/// The inline code element standing in for a spoiler run.
pub fn placeholder() -> Inline {
    let mut element = TextElement::plain(PLACEHOLDER_TEXT);
    element.set_style_flag("code");
    Inline::Text(element)
}

/// Distribute segment content back onto source elements.
///
/// The result has one (possibly empty) slice list per source element. Slices
/// of one element stay in left-to-right order.
pub fn reassemble(segments: &[Segment], element_count: usize) -> Vec<Vec<Slice>> {
    let mut slices: Vec<Vec<Slice>> = vec![Vec::new(); element_count];

    for segment in segments {
        let mut pending: Option<(usize, String)> = None;
        let flush = |pending: &mut Option<(usize, String)>, slices: &mut Vec<Vec<Slice>>| {
            if let Some((source, text)) = pending.take() {
                slices[source].push(Slice {
                    segment: segment.id,
                    spoiler: segment.spoiler,
                    content: SliceContent::Text(text),
                });
            }
        };

        for unit in &segment.units {
            match unit.kind {
                UnitKind::Atom => {
                    flush(&mut pending, &mut slices);
                    slices[unit.source].push(Slice {
                        segment: segment.id,
                        spoiler: segment.spoiler,
                        content: SliceContent::Atom,
                    });
                }
                UnitKind::Char(ch) => {
                    let continues = pending
                        .as_ref()
                        .is_some_and(|(source, _)| *source == unit.source);
                    if !continues {
                        flush(&mut pending, &mut slices);
                        pending = Some((unit.source, String::new()));
                    }
                    if let Some((_, text)) = pending.as_mut() {
                        text.push(ch);
                    }
                }
            }
        }
        flush(&mut pending, &mut slices);
    }

    slices
}

/// Build the revealed and redacted element lists from per-element slices.
pub fn render(elements: &[Inline], slices: &[Vec<Slice>]) -> Rendered {
    let mut rendered = Rendered::default();
    let mut hidden_segments = HashSet::new();

    for (source, (element, element_slices)) in elements.iter().zip(slices).enumerate() {
        for slice in element_slices {
            let visible = match (&slice.content, element) {
                (SliceContent::Text(text), Inline::Text(original)) => {
                    let mut copy = original.clone();
                    copy.text = text.clone();
                    copy.rest.remove("spoiler");
                    Inline::Text(copy)
                }
                _ => element.without_spoiler_flag(),
            };

            let revealed = match (&visible, slice.spoiler) {
                (Inline::Text(text), true) => {
                    let mut bold = text.clone();
                    bold.set_style_flag("bold");
                    Inline::Text(bold)
                }
                _ => visible.clone(),
            };
            rendered.revealed.push(Sourced {
                source,
                element: revealed,
                placeholder: false,
            });

            if !slice.spoiler {
                rendered.redacted.push(Sourced {
                    source,
                    element: visible,
                    placeholder: false,
                });
            } else if hidden_segments.insert(slice.segment) {
                rendered.redacted.push(Sourced {
                    source,
                    element: placeholder(),
                    placeholder: true,
                });
            }
        }
    }

    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spoiler::scan::{scan, segment};
    use serde_json::json;

    fn split(values: &[serde_json::Value]) -> (Vec<Inline>, Vec<Vec<Slice>>) {
        let elements: Vec<Inline> = values.iter().map(Inline::from_value).collect();
        let slices = reassemble(&segment(&scan(&elements)), elements.len());
        (elements, slices)
    }

    #[test]
    fn test_toggle_mid_element_gives_ordered_slices() {
        let (_, slices) = split(&[json!({"type": "text", "text": "a||b||c"})]);
        let texts: Vec<_> = slices[0]
            .iter()
            .map(|s| (s.segment, s.spoiler, s.content.clone()))
            .collect();
        assert_eq!(
            texts,
            vec![
                (0, false, SliceContent::Text("a".into())),
                (1, true, SliceContent::Text("b".into())),
                (2, false, SliceContent::Text("c".into())),
            ]
        );
    }

    #[test]
    fn test_marker_only_element_has_no_slices() {
        let (_, slices) = split(&[
            json!({"type": "text", "text": "x"}),
            json!({"type": "text", "text": "||"}),
            json!({"type": "text", "text": "y||"}),
        ]);
        assert_eq!(slices[0].len(), 1);
        assert!(slices[1].is_empty());
        assert_eq!(slices[2].len(), 1);
        assert!(slices[2][0].spoiler);
    }

    #[test]
    fn test_spoiler_across_elements_emits_one_placeholder() {
        let (elements, slices) = split(&[
            json!({"type": "text", "text": "see ||a"}),
            json!({"type": "emoji", "name": "eyes"}),
            json!({"type": "text", "text": "b|| end"}),
        ]);
        let rendered = render(&elements, &slices);

        assert_eq!(rendered.revealed.len(), 5);
        let placeholders: Vec<_> = rendered.redacted.iter().filter(|s| s.placeholder).collect();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].source, 0);
        assert_eq!(rendered.redacted.len(), 3);
        assert!(
            rendered
                .redacted
                .iter()
                .all(|s| !matches!(s.element, Inline::Atom(_)))
        );
    }

    #[test]
    fn test_atoms_are_never_bolded() {
        let (elements, slices) = split(&[
            json!({"type": "text", "text": "||"}),
            json!({"type": "emoji", "name": "eyes", "spoiler": true}),
        ]);
        let rendered = render(&elements, &slices);
        assert_eq!(rendered.revealed.len(), 1);
        assert_eq!(
            rendered.revealed[0].element.to_value(),
            json!({"type": "emoji", "name": "eyes"})
        );
    }
}
