//! Approximate token counting and budget truncation.
//!
//! The engine never needs exact tokenizer output, only a consistent
//! estimate to decide how much context fits a prompt. CJK characters count
//! as one token each; other text counts roughly one token per four
//! characters of each word.

/// Approximate token length of a text.
pub fn token_len(text: &str) -> usize {
    let mut tokens = 0usize;
    let mut ascii_run = 0usize;
    for ch in text.chars() {
        if is_cjk(ch) {
            if ascii_run > 0 {
                tokens += ascii_run.div_ceil(4);
                ascii_run = 0;
            }
            tokens += 1;
        } else if ch.is_whitespace() {
            if ascii_run > 0 {
                tokens += ascii_run.div_ceil(4);
                ascii_run = 0;
            }
        } else {
            ascii_run += 1;
        }
    }
    if ascii_run > 0 {
        tokens += ascii_run.div_ceil(4);
    }
    tokens
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{3000}'..='\u{303F}'
        | '\u{FF00}'..='\u{FFEF}')
}

/// Keep the maximal prefix of `items` whose cumulative token length stays
/// within `budget`. Items are kept or dropped wholesale.
pub fn truncate_by_token_budget<T>(
    items: Vec<T>,
    key: impl Fn(&T) -> &str,
    budget: usize,
) -> Vec<T> {
    if budget == 0 {
        return Vec::new();
    }
    let mut used = 0usize;
    let mut keep = 0usize;
    for item in &items {
        used += token_len(key(item));
        if used > budget {
            break;
        }
        keep += 1;
    }
    let mut items = items;
    items.truncate(keep);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_and_cjk() {
        assert_eq!(token_len(""), 0);
        assert!(token_len("hello world") >= 2);
        // each CJK char is one token
        assert_eq!(token_len("水稻基因"), 4);
    }

    #[test]
    fn truncates_to_maximal_prefix() {
        let items = vec!["aaaa".to_string(), "bbbb".to_string(), "cccc".to_string()];
        // each item is 1 token; budget 2 keeps exactly the first two
        let kept = truncate_by_token_budget(items.clone(), |s| s.as_str(), 2);
        assert_eq!(kept, vec!["aaaa".to_string(), "bbbb".to_string()]);

        let all = truncate_by_token_budget(items.clone(), |s| s.as_str(), 100);
        assert_eq!(all.len(), 3);

        let none = truncate_by_token_budget(items, |s| s.as_str(), 0);
        assert!(none.is_empty());
    }

    #[test]
    fn prefix_is_maximal() {
        let items: Vec<String> = (0..10).map(|i| format!("item{}", i)).collect();
        let budget = 5;
        let kept = truncate_by_token_budget(items.clone(), |s| s.as_str(), budget);
        let used: usize = kept.iter().map(|s| token_len(s)).sum();
        assert!(used <= budget);
        if kept.len() < items.len() {
            // adding one more item must overflow
            assert!(used + token_len(&items[kept.len()]) > budget);
        }
    }
}
