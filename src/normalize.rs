use regex::Regex;

/// Compiled text-cleanup rules, built once and shared by every source.
#[derive(Clone, Debug)]
pub struct Normalizer {
    html: Regex,
    non_word: Regex,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Normalizer {
            html: Regex::new(r"<[^>]+?>").expect("valid html pattern"),
            non_word: Regex::new(r"[^\pL]+").expect("valid non-word pattern"),
        }
    }

    /// Lowercases, strips markup and collapses every run of non-letters to one space.
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.trim().to_lowercase();
        let stripped = self.html.replace_all(&lowered, " ");
        self.non_word.replace_all(&stripped, " ").into_owned()
    }
}

/// Replaces each whitespace character with a plain space so a title fits on one output line.
pub fn clean_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect()
}

/// The first `max_chars` characters of `text`.
pub fn title_prefix(text: &str, max_chars: usize) -> String {
    clean_title(&text.chars().take(max_chars).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_markup_and_punctuation() {
        let normalizer = Normalizer::new();
        assert_eq!(
            normalizer.normalize("  <p>Hello, World!</p> It's 2019.  "),
            " hello world it s "
        );
    }

    #[test]
    fn test_normalize_keeps_unicode_letters() {
        let normalizer = Normalizer::new();
        assert_eq!(normalizer.normalize("Ünïcödé Straße"), "ünïcödé straße");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(Normalizer::new().normalize(""), "");
        assert_eq!(Normalizer::new().normalize(" 123 "), " ");
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("a\tb\nc"), "a b c");
    }

    #[test]
    fn test_title_prefix_is_char_safe() {
        assert_eq!(title_prefix("héllo wörld", 4), "héll");
        assert_eq!(title_prefix("short", 50), "short");
    }
}
