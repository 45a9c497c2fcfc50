//! HTML preparation: title and text extraction for crawled pages

use super::{normalize_whitespace, Heading, PreparedContent};
use crate::error::Result;
use scraper::{Html, Selector};

/// Extract clean text and headings from raw page HTML
pub fn prepare_html(content: &str) -> Result<PreparedContent> {
    let document = Html::parse_document(content);
    let mut doc = PreparedContent::new(String::new());

    if let Ok(selector) = Selector::parse("title") {
        if let Some(title_elem) = document.select(&selector).next() {
            let title = title_elem.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                doc.title = Some(title);
            }
        }
    }

    // Prefer the body subtree so head metadata doesn't leak into the text
    let body_selector = Selector::parse("body").ok();
    let root = body_selector
        .as_ref()
        .and_then(|s| document.select(s).next())
        .map(|e| e.html())
        .unwrap_or_else(|| content.to_string());

    let text = html2text::from_read(root.as_bytes(), 80).unwrap_or_else(|_| root.clone());
    doc.text = normalize_whitespace(&text);

    // Heading positions are approximated by locating the heading text in
    // the extracted body; good enough to guide the splitter.
    for level in 1..=6 {
        if let Ok(selector) = Selector::parse(&format!("h{}", level)) {
            for elem in document.select(&selector) {
                let heading_text = elem.text().collect::<String>().trim().to_string();
                if !heading_text.is_empty() {
                    let position = doc.text.find(&heading_text).unwrap_or(0);
                    doc.headings.push(Heading {
                        level,
                        text: heading_text,
                        position,
                    });
                }
            }
        }
    }

    doc.headings.sort_by_key(|h| h.position);

    Ok(doc)
}
