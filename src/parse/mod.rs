//! Content preparation for the chunker
//!
//! Source records arrive as plain text, Markdown (manuals) or raw HTML
//! (crawled pages). This module normalizes each into clean text plus the
//! section headings that guide splitting.

mod html;
mod markdown;

pub use html::*;
pub use markdown::*;

use crate::error::Result;
use crate::models::ChunkKind;

/// Input formats the chunker understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Html,
    Markdown,
    PlainText,
}

impl ContentFormat {
    /// The format each record kind ships its text in
    pub fn for_kind(kind: ChunkKind) -> Self {
        match kind {
            ChunkKind::Page => ContentFormat::Html,
            ChunkKind::Manual => ContentFormat::Markdown,
            ChunkKind::Faq | ChunkKind::Product => ContentFormat::PlainText,
        }
    }
}

/// Cleaned record content ready for splitting
#[derive(Debug, Clone)]
pub struct PreparedContent {
    /// Title found in the content (falls back to the record's own title)
    pub title: Option<String>,

    /// Normalized text
    pub text: String,

    /// Section headings with their positions in `text`
    pub headings: Vec<Heading>,
}

impl PreparedContent {
    pub fn new(text: String) -> Self {
        Self {
            title: None,
            text,
            headings: Vec::new(),
        }
    }
}

/// A section heading in prepared text
#[derive(Debug, Clone)]
pub struct Heading {
    /// Heading level (1-6)
    pub level: u8,

    /// Heading text
    pub text: String,

    /// Byte position in the prepared text
    pub position: usize,
}

/// Prepare record content based on its format
pub fn prepare_content(content: &str, format: ContentFormat) -> Result<PreparedContent> {
    match format {
        ContentFormat::Html => prepare_html(content),
        ContentFormat::Markdown => prepare_markdown(content),
        ContentFormat::PlainText => Ok(PreparedContent::new(normalize_whitespace(content))),
    }
}

/// Normalize whitespace: collapse runs of spaces, keep paragraph breaks
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            last_was_whitespace = true;
        } else {
            if last_was_whitespace && !result.is_empty() {
                if newline_count >= 2 {
                    result.push_str("\n\n");
                } else if newline_count == 1 {
                    result.push('\n');
                } else {
                    result.push(' ');
                }
            }
            newline_count = 0;
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_kind() {
        assert_eq!(ContentFormat::for_kind(ChunkKind::Page), ContentFormat::Html);
        assert_eq!(ContentFormat::for_kind(ChunkKind::Manual), ContentFormat::Markdown);
        assert_eq!(ContentFormat::for_kind(ChunkKind::Faq), ContentFormat::PlainText);
        assert_eq!(ContentFormat::for_kind(ChunkKind::Product), ContentFormat::PlainText);
    }

    #[test]
    fn test_normalize_whitespace() {
        let input = "Hello   world\n\n\n\ntest";
        let result = normalize_whitespace(input);
        assert_eq!(result, "Hello world\n\ntest");
    }

    #[test]
    fn test_prepare_plain_text() {
        let prepared = prepare_content("  Some   answer text.  ", ContentFormat::PlainText).unwrap();
        assert_eq!(prepared.text, "Some answer text.");
        assert!(prepared.headings.is_empty());
        assert!(prepared.title.is_none());
    }
}
