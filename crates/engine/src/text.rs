//! Text normalization shared by the extractor and the safety detectors.

/// Lowercases and folds French accents so lexicon matching works on a
/// single canonical form. The mapping is one character to one character:
/// spans over the normalized text keep their meaning.
pub fn normalize_text(text: &str) -> String {
    text.chars().map(fold_char).collect()
}

fn fold_char(character: char) -> char {
    match character.to_lowercase().next().unwrap_or(character) {
        'à' | 'â' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' => 'i',
        'ô' | 'ö' => 'o',
        'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        lowered => lowered,
    }
}

/// Character index of every occurrence of `needle` in `haystack`.
///
/// Indices are character offsets, not byte offsets, so they line up with
/// [`nutricoach_core::Span`] over the normalized text.
pub fn char_match_indices(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }

    let haystack_chars = haystack.chars().collect::<Vec<_>>();
    let needle_chars = needle.chars().collect::<Vec<_>>();
    let mut matches = Vec::new();

    if haystack_chars.len() < needle_chars.len() {
        return matches;
    }

    for start in 0..=(haystack_chars.len() - needle_chars.len()) {
        if haystack_chars[start..start + needle_chars.len()] == needle_chars[..] {
            matches.push(start);
        }
    }

    matches
}
