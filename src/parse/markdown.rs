//! Markdown preparation: text extraction with heading positions

use super::{Heading, PreparedContent};
use crate::error::Result;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

/// Extract clean text and headings from Markdown content
pub fn prepare_markdown(content: &str) -> Result<PreparedContent> {
    let parser = Parser::new(content);
    let mut doc = PreparedContent::new(String::new());

    let mut text_parts: Vec<String> = Vec::new();
    let mut current_heading: Option<(u8, Vec<String>)> = None;
    let mut char_position = 0;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current_heading = Some((heading_level_to_u8(level), Vec::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, parts)) = current_heading.take() {
                    let heading_text = parts.join("").trim().to_string();
                    if !heading_text.is_empty() {
                        // First level-1 heading doubles as the title
                        if doc.title.is_none() && level == 1 {
                            doc.title = Some(heading_text.clone());
                        }

                        doc.headings.push(Heading {
                            level,
                            text: heading_text.clone(),
                            position: char_position,
                        });

                        text_parts.push(format!("\n{}\n", heading_text));
                        char_position += heading_text.len() + 2;
                    }
                }
            }
            Event::Text(text) => {
                let text_str = text.to_string();
                if let Some((_, ref mut parts)) = current_heading {
                    parts.push(text_str);
                } else {
                    char_position += text_str.len();
                    text_parts.push(text_str);
                }
            }
            Event::Code(code) => {
                if let Some((_, ref mut parts)) = current_heading {
                    parts.push(code.to_string());
                } else {
                    let code_str = code.to_string();
                    char_position += code_str.len();
                    text_parts.push(code_str);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                text_parts.push(" ".to_string());
                char_position += 1;
            }
            Event::End(TagEnd::Paragraph) => {
                text_parts.push("\n\n".to_string());
                char_position += 2;
            }
            Event::Start(Tag::Item) => {
                text_parts.push("• ".to_string());
                char_position += 2;
            }
            Event::End(TagEnd::Item) => {
                text_parts.push("\n".to_string());
                char_position += 1;
            }
            _ => {}
        }
    }

    doc.text = text_parts.join("").trim().to_string();
    Ok(doc)
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_markdown_basic() {
        let markdown = r#"
# Return Policy

Items can be returned within 14 days.

## Exceptions

Perishable goods are final sale.
"#;

        let doc = prepare_markdown(markdown).unwrap();

        assert_eq!(doc.title, Some("Return Policy".to_string()));
        assert!(doc.text.contains("14 days"));
        assert_eq!(doc.headings.len(), 2);
        assert_eq!(doc.headings[1].text, "Exceptions");
    }

    #[test]
    fn test_heading_hierarchy() {
        let markdown = "# H1\n## H2\n### H3\n## Another H2";
        let doc = prepare_markdown(markdown).unwrap();

        assert_eq!(doc.headings.len(), 4);
        assert_eq!(doc.headings[0].level, 1);
        assert_eq!(doc.headings[3].level, 2);
    }

    #[test]
    fn test_list_items_kept() {
        let markdown = "Sizes:\n\n- Small\n- Large";
        let doc = prepare_markdown(markdown).unwrap();
        assert!(doc.text.contains("Small"));
        assert!(doc.text.contains("Large"));
    }
}
