//! Tree walk over a whole document.
//!
//! Consecutive section/preformatted blocks are split as one merge-run so a
//! spoiler opened in one block can close in a later one. Everything else is
//! walked structurally.

use super::document::{Block, BlockKind, Inline, Node, TextElement};
use super::render::{Rendered, Sourced, placeholder, reassemble, render};
use super::scan::{scan, segment};

/// Split one inline sequence into its two renderings.
///
/// A sequence that yields no units at all is copied to both sides as is.
pub fn split_inline(elements: &[Inline]) -> Rendered {
    let units = scan(elements);
    if units.is_empty() {
        let copies: Vec<Sourced> = elements
            .iter()
            .enumerate()
            .map(|(source, element)| Sourced {
                source,
                element: element.clone(),
                placeholder: false,
            })
            .collect();
        return Rendered {
            revealed: copies.clone(),
            redacted: copies,
        };
    }

    let slices = reassemble(&segment(&units), elements.len());
    render(elements, &slices)
}

/// Split any node, returning `(revealed, redacted)`.
pub fn split_node(node: &Node) -> (Node, Node) {
    match node {
        Node::Inline(elements) => {
            let rendered = split_inline(elements);
            (
                Node::Inline(strip_sources(rendered.revealed)),
                Node::Inline(strip_sources(rendered.redacted)),
            )
        }
        Node::Block(block) => {
            let mut pairs = split_run(&[block]);
            let (revealed, redacted) = pairs.remove(0);
            (Node::Block(revealed), Node::Block(redacted))
        }
        Node::List(items) => {
            let (revealed, redacted) = split_list(items);
            (Node::List(revealed), Node::List(redacted))
        }
        Node::Map(entries) => {
            let mut revealed = Vec::with_capacity(entries.len());
            let mut redacted = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let (r, h) = split_node(value);
                revealed.push((key.clone(), r));
                redacted.push((key.clone(), h));
            }
            (Node::Map(revealed), Node::Map(redacted))
        }
        Node::Opaque(value) => (Node::Opaque(value.clone()), Node::Opaque(value.clone())),
    }
}

fn split_list(items: &[Node]) -> (Vec<Node>, Vec<Node>) {
    let mut revealed = Vec::with_capacity(items.len());
    let mut redacted = Vec::with_capacity(items.len());

    let mut i = 0;
    while i < items.len() {
        let mut run: Vec<&Block> = Vec::new();
        while let Some(Node::Block(block)) = items.get(i + run.len()) {
            run.push(block);
        }

        if run.is_empty() {
            let (r, h) = split_node(&items[i]);
            revealed.push(r);
            redacted.push(h);
            i += 1;
            continue;
        }

        i += run.len();
        for (r, h) in split_run(&run) {
            revealed.push(Node::Block(r));
            redacted.push(Node::Block(h));
        }
    }

    (revealed, redacted)
}

/// Split a run of adjacent mergeable blocks, one output pair per block.
fn split_run(run: &[&Block]) -> Vec<(Block, Block)> {
    if let [block] = run {
        let rendered = split_inline(&block.elements);
        let revealed = strip_sources(rendered.revealed);
        let redacted = collapse_preformatted(block.kind, rendered.redacted);
        return vec![(block.with_elements(revealed), block.with_elements(redacted))];
    }

    // Flatten the run; a synthetic newline sits between blocks and is owned by
    // the block before it.
    let mut combined = Vec::new();
    let mut owner = Vec::new();
    let mut synthetic = Vec::new();
    for (index, block) in run.iter().enumerate() {
        if index > 0 {
            combined.push(Inline::Text(TextElement::plain("\n")));
            owner.push(index - 1);
            synthetic.push(true);
        }
        for element in &block.elements {
            combined.push(element.clone());
            owner.push(index);
            synthetic.push(false);
        }
    }

    let rendered = split_inline(&combined);

    let mut revealed: Vec<Vec<Inline>> = vec![Vec::new(); run.len()];
    for item in rendered.revealed {
        if !synthetic[item.source] {
            revealed[owner[item.source]].push(item.element);
        }
    }

    let mut redacted: Vec<Vec<Sourced>> = vec![Vec::new(); run.len()];
    for item in rendered.redacted {
        if !synthetic[item.source] || item.placeholder {
            redacted[owner[item.source]].push(item);
        }
    }

    run.iter()
        .zip(revealed.into_iter().zip(redacted))
        .map(|(block, (revealed, redacted))| {
            let redacted = collapse_preformatted(block.kind, redacted);
            (block.with_elements(revealed), block.with_elements(redacted))
        })
        .collect()
}

/// A preformatted block containing any placeholder is hidden as a whole.
fn collapse_preformatted(kind: BlockKind, redacted: Vec<Sourced>) -> Vec<Inline> {
    if kind == BlockKind::Preformatted && redacted.iter().any(|item| item.placeholder) {
        return vec![placeholder()];
    }
    strip_sources(redacted)
}

fn strip_sources(items: Vec<Sourced>) -> Vec<Inline> {
    items.into_iter().map(|item| item.element).collect()
}
