//! # Glaive
//!
//! The search core of a full-text engine: composable queries compiled into
//! scorers over an inverted index, with relevance ranking, sorting, filtering,
//! explanation and highlighting.
//!
//! ## Features
//!
//! - Pluggable byte stores (file system, RAM, compound archives)
//! - Term, boolean, phrase, span, range, prefix, wildcard and fuzzy queries
//! - A query string parser driven by the field analyzer
//! - TF-IDF scoring through a replaceable [`search::similarity::Similarity`]
//! - Searching several indexes as one with global statistics
//! - Sorting by field values, cached filters and excerpt highlighting

pub mod analysis;
pub mod error;
pub mod lexical;
pub mod query;
pub mod search;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::error::{GlaiveError, Result};
    pub use crate::lexical::memory::MemoryIndex;
    pub use crate::lexical::reader::IndexReader;
    pub use crate::lexical::term::Term;
    pub use crate::query::Query;
    pub use crate::query::parser::QueryParser;
    pub use crate::search::SearchConfig;
    pub use crate::search::multi_searcher::MultiSearcher;
    pub use crate::search::searcher::{IndexSearcher, SearchRequest, Searcher};
    pub use crate::search::top_docs::{Hit, TopDocs};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
