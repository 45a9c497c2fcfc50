//! Break point detection for section splitting

use crate::parse::Heading;
use blake3::Hasher;

/// Priority levels for break points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BreakPriority {
    /// Word boundary (lowest)
    Word = 1,
    /// Sentence boundary
    Sentence = 2,
    /// Paragraph boundary
    Paragraph = 3,
    /// Heading boundary (highest)
    Heading = 4,
}

/// A potential break point in text
#[derive(Debug, Clone)]
pub struct BreakPoint {
    /// Byte position
    pub position: usize,
    /// Priority of this break point
    pub priority: BreakPriority,
}

/// Find potential break points in prepared text
pub fn find_break_points(text: &str, headings: &[Heading]) -> Vec<BreakPoint> {
    let mut points = Vec::new();

    for heading in headings {
        if heading.position > 0
            && heading.position < text.len()
            && text.is_char_boundary(heading.position)
        {
            points.push(BreakPoint {
                position: heading.position,
                priority: BreakPriority::Heading,
            });
        }
    }

    // Paragraph breaks (double newlines)
    for (i, _) in text.match_indices("\n\n") {
        let pos = i + 2;
        if pos < text.len() {
            points.push(BreakPoint {
                position: pos,
                priority: BreakPriority::Paragraph,
            });
        }
    }

    // Sentence boundaries, Latin and Arabic-script punctuation alike
    for pat in [". ", ".\n", "? ", "! ", "؟ ", "۔ "] {
        for (i, m) in text.match_indices(pat) {
            let pos = i + m.len();
            if pos < text.len() && text.is_char_boundary(pos) {
                points.push(BreakPoint {
                    position: pos,
                    priority: BreakPriority::Sentence,
                });
            }
        }
    }

    points.sort_by_key(|p| p.position);
    points.dedup_by_key(|p| p.position);
    points
}

/// Pick the best break at or before `target`, preferring high-priority
/// breaks in the window above `min_pos`. Falls back to a space, then to
/// the nearest char boundary.
pub fn find_best_break(text: &str, min_pos: usize, target: usize, points: &[BreakPoint]) -> usize {
    let target = ensure_char_boundary(text, target.min(text.len()));
    if target >= text.len() {
        return text.len();
    }

    let candidates: Vec<&BreakPoint> = points
        .iter()
        .filter(|p| p.position > min_pos && p.position <= target)
        .collect();

    if let Some(best) = candidates.iter().max_by_key(|p| (p.priority, p.position)) {
        return best.position;
    }

    // Word boundary fallback
    if let Some(i) = text[..target].rfind(' ') {
        if i > min_pos {
            return i + 1;
        }
    }

    target
}

/// Ensure a position is on a valid UTF-8 character boundary
pub fn ensure_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut adjusted = pos;
    while adjusted > 0 && !text.is_char_boundary(adjusted) {
        adjusted -= 1;
    }
    adjusted
}

/// Compute a stable blake3 hash for record text
pub fn compute_text_hash(text: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_break_priority_ordering() {
        assert!(BreakPriority::Heading > BreakPriority::Paragraph);
        assert!(BreakPriority::Paragraph > BreakPriority::Sentence);
        assert!(BreakPriority::Sentence > BreakPriority::Word);
    }

    #[test]
    fn test_paragraph_breaks_found() {
        let text = "First paragraph.\n\nSecond paragraph here.";
        let points = find_break_points(text, &[]);
        assert!(points
            .iter()
            .any(|p| p.priority == BreakPriority::Paragraph));
    }

    #[test]
    fn test_heading_break_preferred() {
        let text = "Intro text.\n\nSection\nSection body goes on.";
        let headings = vec![Heading {
            level: 2,
            text: "Section".to_string(),
            position: 13,
        }];
        let points = find_break_points(text, &headings);
        let best = find_best_break(text, 0, 20, &points);
        assert_eq!(best, 13);
    }

    #[test]
    fn test_best_break_char_boundary() {
        let text = "سلام دنیا خوش آمدید";
        // Any target must come back on a char boundary
        for target in 0..text.len() {
            let pos = find_best_break(text, 0, target, &[]);
            assert!(text.is_char_boundary(pos));
        }
    }

    #[test]
    fn test_text_hash_stability() {
        assert_eq!(compute_text_hash("hello"), compute_text_hash("hello"));
        assert_ne!(compute_text_hash("hello"), compute_text_hash("world"));
    }
}
