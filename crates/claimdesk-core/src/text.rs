//! Character-based string helpers.
//!
//! Budgets are counted in Unicode scalar values so that Turkish and German
//! text is measured the same way as ASCII.

/// Length of `s` in characters.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Longest prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Lowercased alphanumeric words of `s`.
pub fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("şasi numarası", 4), "şasi");
        assert_eq!(truncate_chars("kısa", 10), "kısa");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_words_lowercases_and_splits() {
        let collected: Vec<String> = words("24 Monate / 200.000 KM").collect();
        assert_eq!(collected, vec!["24", "monate", "200", "000", "km"]);
    }
}
