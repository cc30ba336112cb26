//! Token filters transform token streams.

use std::sync::Arc;

use crate::analysis::token::TokenStream;
use crate::error::Result;
use crate::util::multimapper::MultiMapper;

/// Transforms a token stream into another one.
pub trait Filter: Send + Sync {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream>;

    fn name(&self) -> &'static str;
}

/// Lowercases token text.
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl Filter for LowercaseFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        Ok(Box::new(tokens.map(|token| {
            let lowered = token.text.to_lowercase();
            token.with_text(lowered)
        })))
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

/// Rewrites token text through a compiled [`MultiMapper`], e.g. to fold
/// accented characters.
#[derive(Clone, Debug)]
pub struct MappingFilter {
    mapper: Arc<MultiMapper>,
}

impl MappingFilter {
    pub fn new() -> Self {
        let mut mapper = MultiMapper::new();
        mapper.compile();
        MappingFilter {
            mapper: Arc::new(mapper),
        }
    }

    /// Build a filter from `(pattern, replacement)` pairs.
    pub fn from_mappings(mappings: &[(&str, &str)]) -> Result<Self> {
        let mut mapper = MultiMapper::new();
        for (pattern, replacement) in mappings {
            mapper.add_mapping(pattern, replacement)?;
        }
        mapper.compile();
        Ok(MappingFilter {
            mapper: Arc::new(mapper),
        })
    }

    /// Add one mapping and recompile.
    pub fn add_mapping(&mut self, pattern: &str, replacement: &str) -> Result<()> {
        let mapper = Arc::make_mut(&mut self.mapper);
        mapper.add_mapping(pattern, replacement)?;
        mapper.compile();
        Ok(())
    }

    pub fn mapper(&self) -> &MultiMapper {
        &self.mapper
    }
}

impl Default for MappingFilter {
    fn default() -> Self {
        MappingFilter::new()
    }
}

impl Filter for MappingFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let mapped = tokens
            .map(|token| {
                let text = self.mapper.map(&token.text)?;
                Ok(token.with_text(text))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(mapped.into_iter()))
    }

    fn name(&self) -> &'static str {
        "mapping"
    }
}
