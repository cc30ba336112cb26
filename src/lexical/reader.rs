//! Reader traits consumed by queries, weights and scorers.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lexical::DocId;
use crate::lexical::term::Term;
use crate::lexical::term_vector::TermVector;
use crate::util::bit_vector::BitVector;

static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique reader identity.
///
/// Readers take a fresh identity whenever their content changes, so caches
/// keyed by identity never serve stale data.
pub fn next_reader_id() -> u64 {
    NEXT_READER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Read access to an index segment.
pub trait IndexReader: Send + Sync + Debug {
    /// Identity used to key per-reader caches.
    fn reader_id(&self) -> u64;

    /// One greater than the largest document number.
    fn max_doc(&self) -> DocId;

    fn is_deleted(&self, doc: DocId) -> bool;

    fn has_deletions(&self) -> bool;

    fn has_field(&self, field: &str) -> bool;

    /// Number of documents containing `term`, deleted ones included.
    fn doc_freq(&self, term: &Term) -> u64;

    /// Enumerate the terms of `field` starting at the first term `>= from`.
    fn terms_from(&self, field: &str, from: &str) -> Result<Box<dyn TermEnum + '_>>;

    /// Postings of `term`, without the need to read positions.
    fn term_docs_for(&self, term: &Term) -> Result<Box<dyn TermDocEnum>>;

    /// Postings of `term` with positions.
    fn term_positions_for(&self, term: &Term) -> Result<Box<dyn TermDocEnum>>;

    /// One encoded norm byte per document, if the field has norms.
    fn norms(&self, field: &str) -> Option<Arc<Vec<u8>>>;

    fn term_vector(&self, doc: DocId, field: &str) -> Result<Option<TermVector>>;

    /// Stored text of `field` in `doc`.
    fn field_text(&self, doc: DocId, field: &str) -> Result<Option<String>>;

    /// Number of live documents.
    fn num_docs(&self) -> u64 {
        (0..self.max_doc()).filter(|&d| !self.is_deleted(d)).count() as u64
    }

    /// Enumerate every term of `field`.
    fn terms(&self, field: &str) -> Result<Box<dyn TermEnum + '_>> {
        self.terms_from(field, "")
    }
}

/// A cursor over the sorted terms of one field.
///
/// The enumerator starts before its first term; call [`TermEnum::next`] to
/// position it.
pub trait TermEnum {
    fn next(&mut self) -> Result<bool>;

    /// Text of the current term.
    fn term(&self) -> &str;

    /// Document frequency of the current term.
    fn doc_freq(&self) -> u64;
}

/// A document-ordered postings cursor.
pub trait TermDocEnum: Send + Debug {
    /// Advance to the next live document.
    fn next(&mut self) -> Result<bool>;

    fn doc(&self) -> DocId;

    /// Number of occurrences in the current document.
    fn freq(&self) -> u32;

    /// Next position within the current document, if any remain.
    fn next_position(&mut self) -> Result<Option<u32>>;

    /// Advance to the first document `>= target`. Always moves forward.
    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        loop {
            if !self.next()? {
                return Ok(false);
            }
            if self.doc() >= target {
                return Ok(true);
            }
        }
    }

    /// Read a batch of documents and frequencies, returning how many were read.
    fn read(&mut self, docs: &mut [DocId], freqs: &mut [u32]) -> Result<usize> {
        let mut n = 0;
        while n < docs.len().min(freqs.len()) && self.next()? {
            docs[n] = self.doc();
            freqs[n] = self.freq();
            n += 1;
        }
        Ok(n)
    }
}

/// One document of a postings list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: DocId,
    /// Ascending token positions.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn freq(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// A [`TermDocEnum`] over postings held in memory.
#[derive(Debug, Clone)]
pub struct PostingsCursor {
    postings: Arc<Vec<Posting>>,
    deleted: Option<Arc<BitVector>>,
    next_idx: usize,
    current: Option<usize>,
    pos_idx: usize,
}

impl PostingsCursor {
    pub fn new(postings: Arc<Vec<Posting>>, deleted: Option<Arc<BitVector>>) -> Self {
        PostingsCursor {
            postings,
            deleted,
            next_idx: 0,
            current: None,
            pos_idx: 0,
        }
    }

    pub fn empty() -> Self {
        PostingsCursor::new(Arc::new(Vec::new()), None)
    }

    fn is_deleted(&self, idx: usize) -> bool {
        self.deleted
            .as_ref()
            .is_some_and(|d| d.get(self.postings[idx].doc as usize))
    }

    fn settle(&mut self) -> bool {
        while self.next_idx < self.postings.len() && self.is_deleted(self.next_idx) {
            self.next_idx += 1;
        }
        if self.next_idx < self.postings.len() {
            self.current = Some(self.next_idx);
            self.next_idx += 1;
            self.pos_idx = 0;
            true
        } else {
            self.current = None;
            false
        }
    }
}

impl TermDocEnum for PostingsCursor {
    fn next(&mut self) -> Result<bool> {
        Ok(self.settle())
    }

    fn doc(&self) -> DocId {
        self.current.map_or(DocId::MAX, |i| self.postings[i].doc)
    }

    fn freq(&self) -> u32 {
        self.current.map_or(0, |i| self.postings[i].freq())
    }

    fn next_position(&mut self) -> Result<Option<u32>> {
        let Some(i) = self.current else {
            return Ok(None);
        };
        let position = self.postings[i].positions.get(self.pos_idx).copied();
        if position.is_some() {
            self.pos_idx += 1;
        }
        Ok(position)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        let rest = &self.postings[self.next_idx..];
        self.next_idx += rest.partition_point(|p| p.doc < target);
        Ok(self.settle())
    }
}
