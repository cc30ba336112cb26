//! Searchers and everything they hand back.
//!
//! [`searcher::IndexSearcher`] runs queries against one [`IndexReader`];
//! [`multi_searcher::MultiSearcher`] fans a query out over several searchers
//! while scoring with statistics aggregated across all of them. Results come
//! back as [`top_docs::TopDocs`], ordered by relevance or by a
//! [`sort::Sort`], optionally restricted by a [`filter::Filter`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use glaive::lexical::memory::MemoryIndex;
//! use glaive::query::term::TermQuery;
//! use glaive::search::searcher::{IndexSearcher, SearchRequest, Searcher};
//!
//! # fn main() -> glaive::error::Result<()> {
//! let mut index = MemoryIndex::new();
//! index.add_document(&[("body", "the cat sat")])?;
//! index.add_document(&[("body", "the dog ran")])?;
//!
//! let searcher = IndexSearcher::new(Arc::new(index));
//! let top = searcher.search(&TermQuery::new("body", "cat").into(), &SearchRequest::new())?;
//! assert_eq!(top.total_hits, 1);
//! assert_eq!(top.hits[0].doc, 0);
//! # Ok(())
//! # }
//! ```
//!
//! [`IndexReader`]: crate::lexical::reader::IndexReader

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod explanation;
pub mod filter;
pub mod highlight;
pub mod multi_searcher;
pub mod searcher;
pub mod similarity;
pub mod sort;
pub mod top_docs;

/// Default bound on the number of terms a multi-term query keeps.
pub const DEFAULT_MAX_TERMS: usize = 256;

/// Default bound on the number of clauses in a boolean query.
pub const DEFAULT_MAX_CLAUSE_COUNT: usize = 1024;

/// Search-time configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Boolean queries with more clauses than this are rejected.
    pub max_clause_count: usize,

    /// Expansion queries matching more terms than this fall back to a
    /// constant-score filter.
    pub max_terms: usize,

    /// Number of hits returned when a request does not say.
    pub num_docs: usize,

    /// Target length of a highlighted excerpt in bytes.
    pub excerpt_length: usize,

    /// Number of excerpts a highlight returns.
    pub num_excerpts: usize,

    /// Inserted before each highlighted match.
    pub pre_tag: String,

    /// Inserted after each highlighted match.
    pub post_tag: String,

    /// Marks text cut from either side of an excerpt.
    pub ellipsis: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_clause_count: DEFAULT_MAX_CLAUSE_COUNT,
            max_terms: DEFAULT_MAX_TERMS,
            num_docs: 10,
            excerpt_length: 150,
            num_excerpts: 2,
            pre_tag: "<b>".to_string(),
            post_tag: "</b>".to_string(),
            ellipsis: "...".to_string(),
        }
    }
}

impl SearchConfig {
    /// Load a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
