//! Text analysis collaborators.
//!
//! The search core consumes token streams but does not own tokenization. This
//! module carries the small pipeline the in-memory index and phrase-query
//! construction rely on: a whitespace tokenizer, token filters (including a
//! [`token_filter::MappingFilter`] backed by a compiled
//! [`crate::util::multimapper::MultiMapper`]) and analyzers chaining them.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
