//! Terms, postings and the readers scorers consume.
//!
//! The search core only reads indexes. It talks to them through the
//! [`reader::IndexReader`] trait, which exposes sorted term enumeration, postings
//! cursors with positions, per-field norms, term vectors and stored field text.
//! Two implementations ship with the crate: [`memory::MemoryIndex`], built
//! directly from documents, and [`segment::SegmentReader`], which reads a
//! segment file written by [`memory::MemoryIndex::write_segment`] through any
//! [`crate::storage::Store`].

pub mod memory;
pub mod reader;
pub mod segment;
pub mod term;
pub mod term_vector;

/// A document number, dense within one reader: `0 <= doc < max_doc`.
pub type DocId = u64;
