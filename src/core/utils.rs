//! Utility functions
//!
//! Common helper functions used throughout the crate.

/// Truncate `text` to at most `max_len` bytes.
///
/// The cut happens at the last UTF-8 character boundary at or below
/// `max_len`, so the result is always valid and the truncation point is
/// deterministic for a given input.
pub fn truncate_to_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Generate a short unique identifier for file names
pub fn short_unique_id() -> String {
    let id = uuid::Uuid::now_v7().simple().to_string();
    // the tail of a v7 UUID is random, the head is the timestamp
    id[id.len() - 12..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_to_boundary("hello", 10), "hello");
        assert_eq!(truncate_to_boundary("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_boundary("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_backs_off_to_char_boundary() {
        // "é" is two bytes; cutting at 2 would split it
        assert_eq!(truncate_to_boundary("aéb", 2), "a");
        assert_eq!(truncate_to_boundary("aéb", 3), "aé");
    }

    #[test]
    fn test_short_unique_id() {
        let a = short_unique_id();
        let b = short_unique_id();
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn truncation_is_bounded_prefix(text in "\\PC{0,64}", max_len in 0usize..80) {
            let cut = truncate_to_boundary(&text, max_len);
            prop_assert!(cut.len() <= max_len);
            prop_assert!(text.starts_with(cut));
            // no room for another whole character
            if cut.len() < text.len() {
                let next = text[cut.len()..].chars().next().unwrap();
                prop_assert!(cut.len() + next.len_utf8() > max_len);
            }
        }
    }
}
