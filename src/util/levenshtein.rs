//! Edit distance between character sequences.

use std::cmp::min;

/// Levenshtein distance between two strings, counted in characters.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    bounded_distance(&a, &b, usize::MAX).unwrap_or(usize::MAX)
}

/// Levenshtein distance between `a` and `b`, or `None` as soon as it is
/// known to exceed `max`.
///
/// Keeps two rows of the distance matrix and stops once every cell of a row
/// is over the threshold, since later rows can only grow.
pub fn bounded_distance(a: &[char], b: &[char], max: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > max {
        return None;
    }

    let mut prev_row: Vec<usize> = (0..=b.len()).collect();
    let mut curr_row = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr_row[0] = i + 1;
        let mut min_in_row = curr_row[0];

        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr_row[j + 1] = min(
                min(
                    prev_row[j + 1] + 1, // deletion
                    curr_row[j] + 1,     // insertion
                ),
                prev_row[j] + cost, // substitution
            );
            min_in_row = min(min_in_row, curr_row[j + 1]);
        }

        if min_in_row > max {
            return None;
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    let distance = prev_row[b.len()];
    (distance <= max).then_some(distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("flaw", "lawn"), 2);
        assert_eq!(levenshtein_distance("café", "cafe"), 1);
    }

    #[test]
    fn test_bounded_distance() {
        assert_eq!(bounded_distance(&chars("kitten"), &chars("sitting"), 3), Some(3));
        assert_eq!(bounded_distance(&chars("kitten"), &chars("sitting"), 2), None);
        assert_eq!(bounded_distance(&chars("a"), &chars("abcd"), 2), None);
        assert_eq!(bounded_distance(&chars("same"), &chars("same"), 0), Some(0));
    }
}
