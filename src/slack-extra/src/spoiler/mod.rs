//! Spoiler splitting for Slack rich text.
//!
//! A rich-text document may mark spoilers with `||` pairs. Splitting produces
//! two documents of the same shape:
//!
//! - **revealed**: markers removed, spoilered text forced bold;
//! - **redacted**: every spoiler run, however many elements or blocks it
//!   spans, replaced by one `[spoiler hidden]` inline code element.
//!
//! The split is a total function: input it does not understand is copied to
//! both outputs unchanged.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use slack_extra::spoiler::split_spoilers;
//!
//! let variants = split_spoilers(&json!([{"type": "text", "text": "a ||b||"}]));
//! assert_eq!(variants.redacted[1]["text"], "[spoiler hidden]");
//! assert_eq!(variants.revealed[1]["style"]["bold"], true);
//! ```

pub mod document;
pub mod plain;
pub mod render;
pub mod scan;
pub mod walk;


use serde_json::Value;

pub use document::{Block, BlockKind, Inline, Node, TextElement};
pub use plain::{PlainSpoiler, split_plain};
pub use render::PLACEHOLDER_TEXT;

/// The two renderings of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct SpoilerVariants {
    pub revealed: Value,
    pub redacted: Value,
}

/// Split a typed document into `(revealed, redacted)`.
pub fn split_document(document: &Node) -> (Node, Node) {
    walk::split_node(document)
}

/// Split a rich-text JSON document: one block, a list of blocks, or any
/// structure containing them.
pub fn split_spoilers(document: &Value) -> SpoilerVariants {
    let (revealed, redacted) = split_document(&Node::from_value(document));
    SpoilerVariants {
        revealed: revealed.to_value(),
        redacted: redacted.to_value(),
    }
}
