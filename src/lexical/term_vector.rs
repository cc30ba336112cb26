//! Per-document term vectors.
//!
//! A term vector lists the terms of one field of one document with their
//! positions, plus the byte offsets of every token position. Highlighting and
//! match-vector extraction work from term vectors; [`TermVectorReader`] exposes
//! one as a single-document [`IndexReader`] so positional scorers can run over
//! it unchanged.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lexical::DocId;
use crate::lexical::reader::{
    IndexReader, Posting, PostingsCursor, TermDocEnum, TermEnum, next_reader_id,
};
use crate::lexical::term::Term;

/// One term of a term vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TVTerm {
    pub text: String,
    pub positions: Vec<u32>,
}

impl TVTerm {
    pub fn freq(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Byte range of one token in the stored text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TVOffset {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermVector {
    pub field: String,
    /// Terms sorted by text.
    pub terms: Vec<TVTerm>,
    /// Offsets indexed by token position.
    pub offsets: Vec<TVOffset>,
}

impl TermVector {
    /// Index of `text` in [`TermVector::terms`].
    pub fn find_term(&self, text: &str) -> Option<usize> {
        self.terms
            .binary_search_by(|t| t.text.as_str().cmp(text))
            .ok()
    }

    pub fn get_term(&self, text: &str) -> Option<&TVTerm> {
        self.find_term(text).map(|i| &self.terms[i])
    }

    /// Number of token positions covered.
    pub fn num_positions(&self) -> usize {
        self.offsets.len()
    }
}

/// A one-document index view over a [`TermVector`].
///
/// The document is numbered 0. Norms are absent, so scorers treat every
/// document as unnormalized.
#[derive(Debug)]
pub struct TermVectorReader {
    id: u64,
    field: String,
    postings: AHashMap<String, Arc<Vec<Posting>>>,
    sorted: Vec<String>,
}

impl TermVectorReader {
    pub fn new(tv: &TermVector) -> Self {
        let mut postings = AHashMap::with_capacity(tv.terms.len());
        let mut sorted = Vec::with_capacity(tv.terms.len());
        for term in &tv.terms {
            postings.insert(
                term.text.clone(),
                Arc::new(vec![Posting {
                    doc: 0,
                    positions: term.positions.clone(),
                }]),
            );
            sorted.push(term.text.clone());
        }
        sorted.sort();

        TermVectorReader {
            id: next_reader_id(),
            field: tv.field.clone(),
            postings,
            sorted,
        }
    }

    fn cursor(&self, term: &Term) -> PostingsCursor {
        if term.field != self.field {
            return PostingsCursor::empty();
        }
        match self.postings.get(&term.text) {
            Some(postings) => PostingsCursor::new(Arc::clone(postings), None),
            None => PostingsCursor::empty(),
        }
    }
}

struct SortedTerms<'a> {
    terms: &'a [String],
    idx: Option<usize>,
    start: usize,
}

impl TermEnum for SortedTerms<'_> {
    fn next(&mut self) -> Result<bool> {
        let next = self.idx.map_or(self.start, |i| i + 1);
        self.idx = Some(next);
        Ok(next < self.terms.len())
    }

    fn term(&self) -> &str {
        self.idx
            .and_then(|i| self.terms.get(i))
            .map_or("", String::as_str)
    }

    fn doc_freq(&self) -> u64 {
        match self.idx {
            Some(i) if i < self.terms.len() => 1,
            _ => 0,
        }
    }
}

impl IndexReader for TermVectorReader {
    fn reader_id(&self) -> u64 {
        self.id
    }

    fn max_doc(&self) -> DocId {
        1
    }

    fn is_deleted(&self, _doc: DocId) -> bool {
        false
    }

    fn has_deletions(&self) -> bool {
        false
    }

    fn has_field(&self, field: &str) -> bool {
        field == self.field
    }

    fn doc_freq(&self, term: &Term) -> u64 {
        u64::from(term.field == self.field && self.postings.contains_key(&term.text))
    }

    fn terms_from(&self, field: &str, from: &str) -> Result<Box<dyn TermEnum + '_>> {
        let terms: &[String] = if field == self.field {
            &self.sorted
        } else {
            &[]
        };
        let start = terms.partition_point(|t| t.as_str() < from);
        Ok(Box::new(SortedTerms {
            terms,
            idx: None,
            start,
        }))
    }

    fn term_docs_for(&self, term: &Term) -> Result<Box<dyn TermDocEnum>> {
        Ok(Box::new(self.cursor(term)))
    }

    fn term_positions_for(&self, term: &Term) -> Result<Box<dyn TermDocEnum>> {
        Ok(Box::new(self.cursor(term)))
    }

    fn norms(&self, _field: &str) -> Option<Arc<Vec<u8>>> {
        None
    }

    fn term_vector(&self, _doc: DocId, _field: &str) -> Result<Option<TermVector>> {
        Ok(None)
    }

    fn field_text(&self, _doc: DocId, _field: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv() -> TermVector {
        TermVector {
            field: "body".to_string(),
            terms: vec![
                TVTerm {
                    text: "brown".to_string(),
                    positions: vec![1],
                },
                TVTerm {
                    text: "quick".to_string(),
                    positions: vec![0, 2],
                },
            ],
            offsets: vec![
                TVOffset { start: 0, end: 5 },
                TVOffset { start: 6, end: 11 },
                TVOffset { start: 12, end: 17 },
            ],
        }
    }

    #[test]
    fn test_find_term() {
        let tv = tv();
        assert_eq!(tv.find_term("quick"), Some(1));
        assert_eq!(tv.get_term("brown").unwrap().freq(), 1);
        assert!(tv.find_term("fox").is_none());
        assert_eq!(tv.num_positions(), 3);
    }

    #[test]
    fn test_reader_view() {
        let reader = TermVectorReader::new(&tv());
        assert_eq!(reader.max_doc(), 1);
        assert_eq!(reader.doc_freq(&Term::new("body", "quick")), 1);
        assert_eq!(reader.doc_freq(&Term::new("title", "quick")), 0);

        let mut tde = reader
            .term_positions_for(&Term::new("body", "quick"))
            .unwrap();
        assert!(tde.next().unwrap());
        assert_eq!(tde.doc(), 0);
        assert_eq!(tde.next_position().unwrap(), Some(0));
        assert_eq!(tde.next_position().unwrap(), Some(2));

        let mut terms = reader.terms_from("body", "c").unwrap();
        assert!(terms.next().unwrap());
        assert_eq!(terms.term(), "quick");
        assert!(!terms.next().unwrap());
    }
}
