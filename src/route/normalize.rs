//! Query and keyword text folding
//!
//! Matching is substring containment over a folded form, so the folding
//! has to erase the variation customers actually type: Arabic-vs-Persian
//! letter forms, optional diacritics, tatweel stretching and zero-width
//! joiner control characters.

/// Fold text into its matching form: lowercase, Persian/Arabic letter
/// unification, diacritic stripping, collapsed whitespace.
pub fn fold_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_space = true;

    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                result.push(' ');
                last_was_space = true;
            }
            continue;
        }

        let Some(folded) = fold_char(c) else {
            continue;
        };
        for lc in folded.to_lowercase() {
            result.push(lc);
        }
        last_was_space = false;
    }

    result.trim_end().to_string()
}

/// Fold a single character; None means drop it entirely
fn fold_char(c: char) -> Option<char> {
    match c {
        // Arabic forms folded to their Persian equivalents
        'ي' => Some('ی'),
        'ك' => Some('ک'),
        'أ' | 'إ' | 'آ' => Some('ا'),
        'ة' => Some('ه'),
        'ؤ' => Some('و'),
        // Harakat and the dagger alif carry no lexical information here
        '\u{064B}'..='\u{0652}' | '\u{0670}' => None,
        // Tatweel (kashida) and zero-width non-joiner/joiner
        '\u{0640}' | '\u{200C}' | '\u{200D}' => None,
        _ => Some(c),
    }
}
