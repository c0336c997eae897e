//! Markdown to display text.
//!
//! The product's rich-text renderer lives in the presentation layer; this
//! is the pure-function boundary the engine calls exactly once per
//! completed reply. It flattens markdown into plain display text: emphasis
//! markers are resolved, list items get a bullet, block structure becomes
//! blank lines, code is kept verbatim.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Render markdown to display text. Pure; plain text passes through
/// unchanged.
pub fn render_markdown(input: &str) -> String {
    let mut out = String::new();

    for event in Parser::new_ext(input, Options::empty()) {
        match event {
            Event::Text(text) => out.push_str(&text),
            Event::Code(code) => out.push_str(&code),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item) => out.push_str("\u{2022} "),
            Event::End(TagEnd::Item) => out.push('\n'),
            Event::End(TagEnd::Paragraph) => out.push_str("\n\n"),
            Event::End(TagEnd::Heading(_)) => out.push_str("\n\n"),
            Event::End(TagEnd::CodeBlock) => out.push('\n'),
            Event::End(TagEnd::BlockQuote(_)) => out.push('\n'),
            _ => {}
        }
    }

    while out.ends_with('\n') || out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render_markdown("ab"), "ab");
        assert_eq!(render_markdown("take a slow breath"), "take a slow breath");
    }

    #[test]
    fn test_emphasis_markers_are_resolved() {
        assert_eq!(render_markdown("**bold** and *italic*"), "bold and italic");
    }

    #[test]
    fn test_inline_code_kept_verbatim() {
        assert_eq!(render_markdown("try `4-7-8` breathing"), "try 4-7-8 breathing");
    }

    #[test]
    fn test_list_items_get_bullets() {
        let rendered = render_markdown("- rest\n- journal");
        assert_eq!(rendered, "\u{2022} rest\n\u{2022} journal");
    }

    #[test]
    fn test_paragraphs_separated_by_blank_line() {
        let rendered = render_markdown("first\n\nsecond");
        assert_eq!(rendered, "first\n\nsecond");
    }

    #[test]
    fn test_heading_flattened() {
        let rendered = render_markdown("# Grounding\n\nname five things you can see");
        assert_eq!(rendered, "Grounding\n\nname five things you can see");
    }

    #[test]
    fn test_soft_break_becomes_space() {
        assert_eq!(render_markdown("one\ntwo"), "one two");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(render_markdown(""), "");
    }
}
