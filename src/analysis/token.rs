//! Tokens and token streams.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single unit of analyzed text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The text content of the token
    pub text: String,

    /// Absolute token position (0-based)
    pub position: usize,

    /// Byte offset where the token starts in the original text
    pub start_offset: usize,

    /// Byte offset just past the end of the token in the original text
    pub end_offset: usize,

    /// Position increment from the previous token (default: 1)
    pub position_increment: usize,
}

impl Token {
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset: 0,
            end_offset: 0,
            position_increment: 1,
        }
    }

    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
            position_increment: 1,
        }
    }

    pub fn with_position_increment(mut self, increment: usize) -> Self {
        self.position_increment = increment;
        self
    }

    /// Same token with different text.
    pub fn with_text<S: Into<String>>(&self, text: S) -> Self {
        Token {
            text: text.into(),
            ..self.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}[{}..{}]",
            self.text, self.position, self.start_offset, self.end_offset
        )
    }
}

/// A stream of tokens; `None` marks the end of the stream.
pub type TokenStream = Box<dyn Iterator<Item = Token>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_display() {
        let token = Token::with_offsets("world", 1, 6, 11);
        assert_eq!(token.to_string(), "world:1[6..11]");
        assert_eq!(token.position_increment, 1);
        assert_eq!(token.len(), 5);

        let mapped = token.with_text("earth");
        assert_eq!(mapped.start_offset, 6);
        assert_eq!(mapped.text, "earth");
    }
}
