use crate::dto::ShingleMode;
use rustc_hash::FxHashSet;

/// Number of tokens (or characters) in one shingle.
pub const SHINGLE_LEN: usize = 9;

/// Deduplicated 32-bit fingerprints of a document's shingles.
pub type FeatureSet = FxHashSet<u32>;

/// Word shingles: every window of `SHINGLE_LEN` whitespace-delimited tokens.
///
/// A text with fewer tokens than the window is a single shingle of all its tokens.
/// Blank text yields an empty set.
pub fn shingle(text: &str) -> FeatureSet {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return FeatureSet::default();
    }
    if tokens.len() < SHINGLE_LEN {
        return FeatureSet::from_iter([fingerprint(&tokens.join(" "))]);
    }
    tokens
        .windows(SHINGLE_LEN)
        .map(|window| fingerprint(&window.join(" ")))
        .collect()
}

/// Character shingles: every window of `SHINGLE_LEN` characters.
///
/// Short text is left-padded with spaces up to one full window.
pub fn shingle_chars(text: &str) -> FeatureSet {
    if text.is_empty() {
        return FeatureSet::default();
    }
    let mut chars: Vec<char> = text.chars().collect();
    if chars.len() < SHINGLE_LEN {
        let mut padded = vec![' '; SHINGLE_LEN - chars.len()];
        padded.extend(chars);
        chars = padded;
    }
    chars
        .windows(SHINGLE_LEN)
        .map(|window| fingerprint(&window.iter().collect::<String>()))
        .collect()
}

pub fn shingle_with(mode: ShingleMode, text: &str) -> FeatureSet {
    match mode {
        ShingleMode::Words => shingle(text),
        ShingleMode::Chars => shingle_chars(text),
    }
}

/// 32-bit FNV-1 over the shingle's UTF-8 bytes.
#[inline]
pub fn fingerprint(s: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    s.bytes().fold(OFFSET_BASIS, |hash, byte| {
        hash.wrapping_mul(PRIME) ^ u32::from(byte)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_has_no_shingles() {
        assert!(shingle("").is_empty());
        assert!(shingle("   ").is_empty());
        assert!(shingle("\t\n ").is_empty());
    }

    #[test]
    fn test_short_text_is_one_shingle() {
        let features = shingle("the quick brown fox");
        assert_eq!(features.len(), 1);
        assert!(features.contains(&fingerprint("the quick brown fox")));
    }

    #[test]
    fn test_short_text_ignores_extra_whitespace() {
        assert_eq!(shingle("  the  quick\tbrown fox "), shingle("the quick brown fox"));
    }

    #[test]
    fn test_window_count() {
        let text = (0..20).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        // 20 distinct tokens give 20 - 9 + 1 distinct windows
        assert_eq!(shingle(&text).len(), 12);
    }

    #[test]
    fn test_exactly_one_window() {
        let text = "a b c d e f g h i";
        let features = shingle(text);
        assert_eq!(features.len(), 1);
        assert!(features.contains(&fingerprint(text)));
    }

    #[test]
    fn test_repeated_windows_are_deduplicated() {
        let text = vec!["spam"; 30].join(" ");
        assert_eq!(shingle(&text).len(), 1);
    }

    #[test]
    fn test_order_independent_of_window_position() {
        let a = shingle("one two three four five six seven eight nine ten");
        let b = shingle("one two three four five six seven eight nine");
        assert!(b.is_subset(&a));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_fnv1_reference_values() {
        assert_eq!(fingerprint(""), 0x811c_9dc5);
        assert_eq!(fingerprint("a"), 0x050c_5d7e);
    }

    #[test]
    fn test_char_shingles() {
        assert!(shingle_chars("").is_empty());
        assert_eq!(shingle_chars("abc").len(), 1);
        assert!(shingle_chars("abc").contains(&fingerprint("      abc")));
        assert_eq!(shingle_chars("abcdefghijk").len(), 3);
    }

    #[test]
    fn test_shingle_with_mode() {
        let text = "lorem ipsum dolor";
        assert_eq!(shingle_with(ShingleMode::Words, text), shingle(text));
        assert_eq!(shingle_with(ShingleMode::Chars, text), shingle_chars(text));
    }
}
