//! Small text cleanup helpers used by extraction and parsing.

/// Strip control characters, zero-width spaces and one layer of wrapping
/// quotes from model output.
pub fn clean_str(input: &str) -> String {
    let mut cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !c.is_control() && *c != '\u{200B}')
        .collect();
    for quote in ['"', '\''] {
        if cleaned.len() >= 2 && cleaned.starts_with(quote) && cleaned.ends_with(quote) {
            cleaned = cleaned[1..cleaned.len() - 1].to_string();
        }
    }
    cleaned.trim().to_string()
}

/// Split `content` on any of `markers`, dropping empty pieces.
pub fn split_by_markers(content: &str, markers: &[&str]) -> Vec<String> {
    if markers.is_empty() {
        return vec![content.to_string()];
    }
    let mut pieces = vec![content.to_string()];
    for marker in markers {
        pieces = pieces
            .iter()
            .flat_map(|p| p.split(marker).map(|s| s.to_string()))
            .collect();
    }
    pieces
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Whether the trimmed string parses as a float literal.
pub fn is_float_str(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_quotes_and_controls() {
        assert_eq!(clean_str("\"ASPIRIN\""), "ASPIRIN");
        assert_eq!(clean_str("  plain  "), "plain");
        assert_eq!(clean_str("a\u{0007}b\u{200B}c"), "abc");
    }

    #[test]
    fn splits_on_multiple_markers() {
        let parts = split_by_markers("a##b<|COMPLETE|>c", &["##", "<|COMPLETE|>"]);
        assert_eq!(parts, vec!["a", "b", "c"]);
    }

    #[test]
    fn float_detection() {
        assert!(is_float_str("3.5"));
        assert!(is_float_str(" -2 "));
        assert!(!is_float_str("two"));
    }
}
