//! Analyzers turn field text into token streams.

use std::fmt;
use std::sync::Arc;

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::analysis::tokenizer::{Tokenizer, WhitespaceTokenizer};
use crate::error::Result;

pub trait Analyzer: Send + Sync {
    /// Analyze `text` belonging to `field`.
    fn token_stream(&self, field: &str, text: &str) -> Result<TokenStream>;
}

/// A tokenizer followed by a chain of filters.
#[derive(Clone)]
pub struct PipelineAnalyzer {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn Filter>>,
}

impl PipelineAnalyzer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        PipelineAnalyzer {
            tokenizer,
            filters: Vec::new(),
        }
    }

    pub fn add_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }
}

impl Default for PipelineAnalyzer {
    fn default() -> Self {
        PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
    }
}

impl Analyzer for PipelineAnalyzer {
    fn token_stream(&self, _field: &str, text: &str) -> Result<TokenStream> {
        let mut tokens = self.tokenizer.tokenize(text)?;
        for filter in &self.filters {
            tokens = filter.filter(tokens)?;
        }
        Ok(tokens)
    }
}

impl fmt::Debug for PipelineAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineAnalyzer")
            .field("tokenizer", &self.tokenizer.name())
            .field(
                "filters",
                &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
