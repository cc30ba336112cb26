//! The `(field, text)` term value type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An indexed token value within a field.
///
/// Terms order by field first and then by text, byte-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new<F, T>(field: F, text: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_and_display() {
        let a = Term::new("body", "apple");
        let b = Term::new("body", "banana");
        let c = Term::new("title", "apple");
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.to_string(), "body:apple");
        assert_eq!(a, Term::new("body".to_string(), "apple"));
    }
}
