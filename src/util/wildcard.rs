//! Glob matching for wildcard queries.
//!
//! `?` matches exactly one byte and `*` matches any run of bytes, including an
//! empty one. Patterns with many stars can take exponential time.

pub const WILD_CHAR: u8 = b'?';
pub const WILD_STRING: u8 = b'*';

/// Check whether `text` matches the whole of `pattern`.
pub fn wc_match(pattern: &str, text: &str) -> bool {
    match_bytes(pattern.as_bytes(), text.as_bytes())
}

fn match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;

    while p < pattern.len() {
        match pattern[p] {
            WILD_STRING => {
                // Try every suffix of the remaining text.
                return (t..=text.len()).any(|s| match_bytes(&pattern[p + 1..], &text[s..]));
            }
            WILD_CHAR => {
                if t >= text.len() {
                    return false;
                }
            }
            c => {
                if t >= text.len() || text[t] != c {
                    return false;
                }
            }
        }
        p += 1;
        t += 1;
    }

    t == text.len()
}

/// Length of the literal prefix before the first wildcard character.
pub fn literal_prefix_len(pattern: &str) -> usize {
    pattern
        .bytes()
        .position(|b| b == WILD_CHAR || b == WILD_STRING)
        .unwrap_or(pattern.len())
}

pub fn has_wildcards(pattern: &str) -> bool {
    literal_prefix_len(pattern) < pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_patterns() {
        assert!(wc_match("a*c", "abc"));
        assert!(!wc_match("a*c", "ab"));
        assert!(wc_match("a?c", "abc"));
        assert!(!wc_match("a?c", "abbc"));
    }

    #[test]
    fn test_edge_cases() {
        assert!(wc_match("*", ""));
        assert!(wc_match("*", "anything"));
        assert!(wc_match("", ""));
        assert!(!wc_match("", "a"));
        assert!(!wc_match("?", ""));
        assert!(wc_match("a**c", "ac"));
        assert!(wc_match("*ing", "searching"));
        assert!(!wc_match("*ing", "searched"));
        assert!(wc_match("s?a*h*g", "searching"));
        assert!(wc_match("abc", "abc"));
        assert!(!wc_match("abc", "abcd"));
    }

    #[test]
    fn test_prefix_helpers() {
        assert_eq!(literal_prefix_len("sea*ch"), 3);
        assert_eq!(literal_prefix_len("?x"), 0);
        assert_eq!(literal_prefix_len("plain"), 5);
        assert!(has_wildcards("a?"));
        assert!(!has_wildcards("plain"));
    }
}
