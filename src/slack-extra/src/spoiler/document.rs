//! Typed view of a Slack rich-text document.
//!
//! Rich-text payloads arrive as loosely shaped JSON. This module lifts them
//! into a closed tree so the splitter can match on shapes instead of probing
//! maps. Anything that does not fit a recognized shape is kept as
//! [`Node::Opaque`] and copied through unchanged.

use serde_json::{Map, Value};

/// Block kind holding inline content.
pub const SECTION_KIND: &str = "rich_text_section";
/// Block kind holding verbatim (code) content.
pub const PREFORMATTED_KIND: &str = "rich_text_preformatted";

/// Kinds of block that a spoiler run may continue across.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// `rich_text_section`
    Section,
    /// `rich_text_preformatted`
    Preformatted,
}

impl BlockKind {
    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            SECTION_KIND => Some(Self::Section),
            PREFORMATTED_KIND => Some(Self::Preformatted),
            _ => None,
        }
    }
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A mergeable block with an inline `elements` sequence.
    Block(Block),
    /// A list recognized as an inline sequence.
    Inline(Vec<Inline>),
    /// Any other list.
    List(Vec<Node>),
    /// Any other mapping, in original key order.
    Map(Vec<(String, Node)>),
    /// Scalars and anything else copied verbatim.
    Opaque(Value),
}

/// A `rich_text_section` or `rich_text_preformatted` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    /// Every field of the original mapping. `elements` is rewritten on output.
    pub fields: Map<String, Value>,
    pub elements: Vec<Inline>,
}

impl Block {
    /// Copy of this block with its `elements` replaced.
    pub fn with_elements(&self, elements: Vec<Inline>) -> Block {
        Block {
            kind: self.kind,
            fields: self.fields.clone(),
            elements,
        }
    }
}

/// A leaf of an inline sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    /// A mapping with a string `text` field.
    Text(TextElement),
    /// A mapping without text: emoji, user, channel, link without label...
    Atom(Map<String, Value>),
    /// A non-mapping member. Contributes nothing to a scan.
    Opaque(Value),
}

/// A text run with its optional style flags.
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    pub text: String,
    /// `style` when it is a mapping.
    pub style: Option<Map<String, Value>>,
    /// All remaining fields, `type` included.
    pub rest: Map<String, Value>,
}

impl TextElement {
    /// A plain `{"type": "text", "text": ...}` element.
    pub fn plain(text: impl Into<String>) -> Self {
        let mut rest = Map::new();
        rest.insert("type".to_string(), Value::String("text".to_string()));
        Self {
            text: text.into(),
            style: None,
            rest,
        }
    }

    /// Set one style flag to `true`, keeping the others.
    pub fn set_style_flag(&mut self, flag: &str) {
        self.style
            .get_or_insert_with(Map::new)
            .insert(flag.to_string(), Value::Bool(true));
    }

    pub fn has_style_flag(&self, flag: &str) -> bool {
        self.style
            .as_ref()
            .and_then(|style| style.get(flag))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl Inline {
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Inline::Opaque(value.clone());
        };
        let Some(text) = map.get("text").and_then(Value::as_str) else {
            return Inline::Atom(map.clone());
        };

        let mut rest = map.clone();
        rest.remove("text");
        let style = match rest.get("style") {
            Some(Value::Object(style)) => {
                let style = style.clone();
                rest.remove("style");
                Some(style)
            }
            _ => None,
        };

        Inline::Text(TextElement {
            text: text.to_string(),
            style,
            rest,
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            Inline::Text(element) => {
                let mut map = element.rest.clone();
                map.insert("text".to_string(), Value::String(element.text.clone()));
                if let Some(style) = &element.style {
                    map.insert("style".to_string(), Value::Object(style.clone()));
                }
                Value::Object(map)
            }
            Inline::Atom(map) => Value::Object(map.clone()),
            Inline::Opaque(value) => value.clone(),
        }
    }

    /// Copy without the `spoiler` field some clients attach.
    pub fn without_spoiler_flag(&self) -> Inline {
        match self {
            Inline::Text(element) => {
                let mut element = element.clone();
                element.rest.remove("spoiler");
                Inline::Text(element)
            }
            Inline::Atom(map) => {
                let mut map = map.clone();
                map.remove("spoiler");
                Inline::Atom(map)
            }
            Inline::Opaque(value) => Inline::Opaque(value.clone()),
        }
    }
}

/// A list counts as an inline sequence when it is non-empty and at least one
/// member is a mapping with a string `text`.
pub fn is_inline_sequence(items: &[Value]) -> bool {
    items
        .iter()
        .any(|item| item.get("text").is_some_and(Value::is_string))
}

impl Node {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) if is_inline_sequence(items) => {
                Node::Inline(items.iter().map(Inline::from_value).collect())
            }
            Value::Array(items) => Node::List(items.iter().map(Node::from_value).collect()),
            Value::Object(map) => match block_from_map(map) {
                Some(block) => Node::Block(block),
                None => Node::Map(
                    map.iter()
                        .map(|(key, value)| (key.clone(), Node::from_value(value)))
                        .collect(),
                ),
            },
            other => Node::Opaque(other.clone()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Node::Block(block) => {
                let mut fields = block.fields.clone();
                fields.insert(
                    "elements".to_string(),
                    Value::Array(block.elements.iter().map(Inline::to_value).collect()),
                );
                Value::Object(fields)
            }
            Node::Inline(elements) => {
                Value::Array(elements.iter().map(Inline::to_value).collect())
            }
            Node::List(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            Node::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, node)| (key.clone(), node.to_value()))
                    .collect(),
            ),
            Node::Opaque(value) => value.clone(),
        }
    }
}

/// A mapping is a mergeable block only if its `type` is mergeable and its
/// `elements` field is a list. Anything else is walked as a plain mapping.
fn block_from_map(map: &Map<String, Value>) -> Option<Block> {
    let kind = BlockKind::from_type(map.get("type")?.as_str()?)?;
    let Value::Array(elements) = map.get("elements")? else {
        return None;
    };
    Some(Block {
        kind,
        fields: map.clone(),
        elements: elements.iter().map(Inline::from_value).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_element_round_trip_keeps_fields() {
        let value = json!({"type": "text", "text": "hi", "style": {"italic": true}, "extra": 1});
        let inline = Inline::from_value(&value);
        match &inline {
            Inline::Text(text) => {
                assert_eq!(text.text, "hi");
                assert!(text.has_style_flag("italic"));
                assert!(!text.has_style_flag("bold"));
            }
            other => panic!("expected text element, got {:?}", other),
        }
        assert_eq!(inline.to_value(), value);
    }

    #[test]
    fn test_non_string_text_is_atom() {
        let inline = Inline::from_value(&json!({"type": "weird", "text": 5}));
        assert!(matches!(inline, Inline::Atom(_)));
        assert!(matches!(Inline::from_value(&json!(3)), Inline::Opaque(_)));
    }

    #[test]
    fn test_block_requires_element_list() {
        let block = Node::from_value(&json!({"type": "rich_text_section", "elements": []}));
        assert!(matches!(block, Node::Block(_)));

        let missing = Node::from_value(&json!({"type": "rich_text_section"}));
        assert!(matches!(missing, Node::Map(_)));

        let other = Node::from_value(&json!({"type": "rich_text_list", "elements": []}));
        assert!(matches!(other, Node::Map(_)));
    }

    #[test]
    fn test_inline_sequence_heuristic() {
        assert!(!is_inline_sequence(&[]));
        assert!(!is_inline_sequence(&[json!({"type": "emoji", "name": "tada"})]));
        assert!(is_inline_sequence(&[
            json!({"type": "emoji", "name": "tada"}),
            json!({"type": "text", "text": "yay"}),
        ]));
    }

    #[test]
    fn test_set_style_flag_preserves_others() {
        let mut text = TextElement::plain("x");
        text.set_style_flag("italic");
        text.set_style_flag("bold");
        assert!(text.has_style_flag("italic"));
        assert!(text.has_style_flag("bold"));
    }
}
