//! Tokenizers split text into tokens.

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// Converts text into a token stream.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    fn name(&self) -> &'static str;
}

/// Splits on whitespace, optionally lowercasing each token.
///
/// Offsets are byte offsets into the input and every token advances the
/// position by one.
#[derive(Clone, Debug)]
pub struct WhitespaceTokenizer {
    lowercase: bool,
}

impl WhitespaceTokenizer {
    pub fn new() -> Self {
        WhitespaceTokenizer { lowercase: true }
    }

    /// Keep the original case.
    pub fn preserving_case() -> Self {
        WhitespaceTokenizer { lowercase: false }
    }

    /// Tokenize into a vector.
    pub fn tokens(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut start = None;

        for (i, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
            match (start, c.is_whitespace()) {
                (None, false) => start = Some(i),
                (Some(s), true) => {
                    let word = &text[s..i];
                    let word = if self.lowercase {
                        word.to_lowercase()
                    } else {
                        word.to_string()
                    };
                    tokens.push(Token::with_offsets(word, tokens.len(), s, i));
                    start = None;
                }
                _ => {}
            }
        }

        tokens
    }
}

impl Default for WhitespaceTokenizer {
    fn default() -> Self {
        WhitespaceTokenizer::new()
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        Ok(Box::new(self.tokens(text).into_iter()))
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_tokenizer() {
        let tokenizer = WhitespaceTokenizer::new();
        let tokens: Vec<_> = tokenizer.tokenize("  The quick\tBrown fox ").unwrap().collect();

        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].text, "the");
        assert_eq!(tokens[0].start_offset, 2);
        assert_eq!(tokens[0].end_offset, 5);
        assert_eq!(tokens[2].text, "brown");
        assert_eq!(tokens[2].position, 2);
        assert_eq!(tokens[3].end_offset, 21);
    }

    #[test]
    fn test_preserving_case_and_unicode() {
        let tokenizer = WhitespaceTokenizer::preserving_case();
        let tokens = tokenizer.tokens("Ärger über");
        assert_eq!(tokens[0].text, "Ärger");
        assert_eq!(tokens[1].start_offset, "Ärger ".len());
        assert!(tokenizer.tokens("   ").is_empty());
    }
}
