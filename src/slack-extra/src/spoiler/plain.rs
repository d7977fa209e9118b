//! `||…||` handling for plain mrkdwn text, used by the slash-command path.

use std::sync::LazyLock;

use regex::{Captures, NoExpand, Regex};

use super::render::PLACEHOLDER_TEXT;

static SPOILER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\|(.*?)\|\|").expect("spoiler pattern is valid"));

/// A plain-text spoiler split into what is posted and what is revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainSpoiler {
    /// Posted text, every spoiler replaced by an inline code placeholder.
    pub visible: String,
    /// Text shown on reveal, markers removed.
    pub revealed: String,
    /// Number of hidden phrases.
    pub phrases: usize,
}

impl PlainSpoiler {
    pub fn button_label(&self) -> &'static str {
        if self.phrases == 1 {
            "View spoiler"
        } else {
            "View spoilers"
        }
    }
}

/// Split mrkdwn text on `||` pairs.
///
/// Text without any pair is hidden as a whole. Revealed phrases are wrapped in
/// `*bold*` unless the text already uses `*` formatting.
pub fn split_plain(text: &str) -> PlainSpoiler {
    let inline_placeholder = format!("`{}`", PLACEHOLDER_TEXT);
    let phrases = SPOILER_PATTERN.find_iter(text).count();

    if phrases == 0 {
        return PlainSpoiler {
            visible: inline_placeholder,
            revealed: text.replace("||", ""),
            phrases: 1,
        };
    }

    let visible = SPOILER_PATTERN
        .replace_all(text, NoExpand(&inline_placeholder))
        .into_owned();

    let revealed = if text.contains('*') {
        text.replace("||", "")
    } else {
        SPOILER_PATTERN
            .replace_all(text, |caps: &Captures| match &caps[1] {
                "" => String::new(),
                phrase => format!("*{}*", phrase),
            })
            .replace("||", "")
    };

    PlainSpoiler {
        visible,
        revealed,
        phrases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_phrase() {
        let spoiler = split_plain("orpheus loves ||heidi||!");
        assert_eq!(spoiler.visible, "orpheus loves `[spoiler hidden]`!");
        assert_eq!(spoiler.revealed, "orpheus loves *heidi*!");
        assert_eq!(spoiler.button_label(), "View spoiler");
    }

    #[test]
    fn test_multiple_phrases() {
        let spoiler = split_plain("||a|| and ||b||");
        assert_eq!(spoiler.visible, "`[spoiler hidden]` and `[spoiler hidden]`");
        assert_eq!(spoiler.revealed, "*a* and *b*");
        assert_eq!(spoiler.phrases, 2);
        assert_eq!(spoiler.button_label(), "View spoilers");
    }

    #[test]
    fn test_no_markers_hides_everything() {
        let spoiler = split_plain("the butler did it");
        assert_eq!(spoiler.visible, "`[spoiler hidden]`");
        assert_eq!(spoiler.revealed, "the butler did it");
        assert_eq!(spoiler.phrases, 1);
    }

    #[test]
    fn test_existing_bold_is_left_alone() {
        let spoiler = split_plain("*loud* ||quiet||");
        assert_eq!(spoiler.revealed, "*loud* quiet");
    }

    #[test]
    fn test_unpaired_marker_is_dropped_on_reveal() {
        let spoiler = split_plain("||a|| b ||c");
        assert_eq!(spoiler.visible, "`[spoiler hidden]` b ||c");
        assert_eq!(spoiler.revealed, "*a* b c");
    }
}
