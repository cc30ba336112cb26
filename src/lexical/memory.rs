//! An index held entirely in memory.
//!
//! Documents are added as `(field, text)` pairs and analyzed on the way in.
//! Every field gets positional postings, one norm byte per document, a term
//! vector with offsets and its stored text, which is everything the query
//! engine and the highlighter read.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::Bound;
use std::sync::Arc;

use ahash::AHashMap;
use log::debug;

use crate::analysis::analyzer::{Analyzer, PipelineAnalyzer};
use crate::error::{GlaiveError, Result};
use crate::lexical::DocId;
use crate::lexical::reader::{
    IndexReader, Posting, PostingsCursor, TermDocEnum, TermEnum, next_reader_id,
};
use crate::lexical::term::Term;
use crate::lexical::term_vector::{TVOffset, TVTerm, TermVector};
use crate::search::similarity::{DefaultSimilarity, Similarity};
use crate::util::bit_vector::BitVector;

#[derive(Debug, Clone, Default)]
pub(crate) struct FieldIndex {
    pub(crate) terms: BTreeMap<String, Arc<Vec<Posting>>>,
    pub(crate) norms: Arc<Vec<u8>>,
}

/// Stored content of one document.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoredDoc {
    pub(crate) texts: AHashMap<String, String>,
    pub(crate) term_vectors: AHashMap<String, TermVector>,
}

pub struct MemoryIndex {
    id: u64,
    pub(crate) fields: BTreeMap<String, FieldIndex>,
    pub(crate) docs: Vec<StoredDoc>,
    pub(crate) deleted: Arc<BitVector>,
    analyzer: Arc<dyn Analyzer>,
    similarity: Arc<dyn Similarity>,
}

impl std::fmt::Debug for MemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndex")
            .field("id", &self.id)
            .field("max_doc", &self.docs.len())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        MemoryIndex::new()
    }
}

impl MemoryIndex {
    /// An empty index using the whitespace analyzer and default similarity.
    pub fn new() -> Self {
        MemoryIndex::with_analyzer(Arc::new(PipelineAnalyzer::default()))
    }

    pub fn with_analyzer(analyzer: Arc<dyn Analyzer>) -> Self {
        MemoryIndex {
            id: next_reader_id(),
            fields: BTreeMap::new(),
            docs: Vec::new(),
            deleted: Arc::new(BitVector::new(0)),
            analyzer,
            similarity: Arc::new(DefaultSimilarity),
        }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Assemble an index from already decoded parts.
    pub(crate) fn from_parts(
        fields: BTreeMap<String, FieldIndex>,
        docs: Vec<StoredDoc>,
        deleted: BitVector,
    ) -> Self {
        MemoryIndex {
            id: next_reader_id(),
            fields,
            docs,
            deleted: Arc::new(deleted),
            analyzer: Arc::new(PipelineAnalyzer::default()),
            similarity: Arc::new(DefaultSimilarity),
        }
    }

    /// Analyze and add a document, returning its number.
    ///
    /// Repeated fields are concatenated with a single space.
    pub fn add_document(&mut self, fields: &[(&str, &str)]) -> Result<DocId> {
        let doc = self.docs.len() as DocId;

        let mut grouped: Vec<(String, String)> = Vec::new();
        for (field, text) in fields {
            if field.is_empty() {
                return Err(GlaiveError::invalid_argument("field name must not be empty"));
            }
            match grouped.iter_mut().find(|(f, _)| f == field) {
                Some((_, existing)) => {
                    existing.push(' ');
                    existing.push_str(text);
                }
                None => grouped.push((field.to_string(), text.to_string())),
            }
        }

        let mut stored = StoredDoc::default();
        for (field, text) in grouped {
            let tokens: Vec<_> = self.analyzer.token_stream(&field, &text)?.collect();

            let mut by_term: BTreeMap<String, Vec<u32>> = BTreeMap::new();
            let mut offsets = Vec::with_capacity(tokens.len());
            let mut position: i64 = -1;
            for token in &tokens {
                position += token.position_increment as i64;
                let pos = position.max(0) as u32;
                by_term.entry(token.text.clone()).or_default().push(pos);
                if offsets.len() <= pos as usize {
                    offsets.resize(
                        pos as usize + 1,
                        TVOffset {
                            start: token.start_offset,
                            end: token.end_offset,
                        },
                    );
                }
                offsets[pos as usize] = TVOffset {
                    start: token.start_offset,
                    end: token.end_offset,
                };
            }

            let norm = self
                .similarity
                .encode_norm(self.similarity.length_norm(&field, tokens.len() as u32));
            let index = self.fields.entry(field.clone()).or_default();
            let norms = Arc::make_mut(&mut index.norms);
            norms.resize(doc as usize, 0);
            norms.push(norm);

            for (text, positions) in &by_term {
                let postings = index.terms.entry(text.clone()).or_default();
                Arc::make_mut(postings).push(Posting {
                    doc,
                    positions: positions.clone(),
                });
            }

            stored.term_vectors.insert(
                field.clone(),
                TermVector {
                    field: field.clone(),
                    terms: by_term
                        .into_iter()
                        .map(|(text, positions)| TVTerm { text, positions })
                        .collect(),
                    offsets,
                },
            );
            stored.texts.insert(field, text);
        }

        self.docs.push(stored);
        self.id = next_reader_id();
        debug!("added document {} to memory index", doc);
        Ok(doc)
    }

    /// Mark `doc` deleted.
    pub fn delete(&mut self, doc: DocId) -> Result<()> {
        if doc >= self.docs.len() as DocId {
            return Err(GlaiveError::invalid_argument(format!(
                "document {doc} is out of range (max_doc {})",
                self.docs.len()
            )));
        }
        Arc::make_mut(&mut self.deleted).set(doc as usize);
        self.id = next_reader_id();
        Ok(())
    }

    pub fn similarity(&self) -> Arc<dyn Similarity> {
        Arc::clone(&self.similarity)
    }

    fn postings(&self, term: &Term) -> Option<&Arc<Vec<Posting>>> {
        self.fields.get(&term.field)?.terms.get(&term.text)
    }

    fn cursor(&self, term: &Term) -> PostingsCursor {
        match self.postings(term) {
            Some(postings) => {
                let deleted = (self.deleted.count() > 0).then(|| Arc::clone(&self.deleted));
                PostingsCursor::new(Arc::clone(postings), deleted)
            }
            None => PostingsCursor::empty(),
        }
    }
}

struct MemoryTermEnum<'a> {
    range: btree_map::Range<'a, String, Arc<Vec<Posting>>>,
    current: Option<(&'a String, &'a Arc<Vec<Posting>>)>,
}

impl TermEnum for MemoryTermEnum<'_> {
    fn next(&mut self) -> Result<bool> {
        self.current = self.range.next();
        Ok(self.current.is_some())
    }

    fn term(&self) -> &str {
        self.current.map_or("", |(text, _)| text.as_str())
    }

    fn doc_freq(&self) -> u64 {
        self.current.map_or(0, |(_, postings)| postings.len() as u64)
    }
}

pub(crate) struct EmptyTermEnum;

impl TermEnum for EmptyTermEnum {
    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn term(&self) -> &str {
        ""
    }

    fn doc_freq(&self) -> u64 {
        0
    }
}

impl IndexReader for MemoryIndex {
    fn reader_id(&self) -> u64 {
        self.id
    }

    fn max_doc(&self) -> DocId {
        self.docs.len() as DocId
    }

    fn is_deleted(&self, doc: DocId) -> bool {
        self.deleted.get(doc as usize)
    }

    fn has_deletions(&self) -> bool {
        self.deleted.count() > 0
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn doc_freq(&self, term: &Term) -> u64 {
        self.postings(term).map_or(0, |p| p.len() as u64)
    }

    fn terms_from(&self, field: &str, from: &str) -> Result<Box<dyn TermEnum + '_>> {
        match self.fields.get(field) {
            Some(index) => Ok(Box::new(MemoryTermEnum {
                range: index
                    .terms
                    .range::<str, _>((Bound::Included(from), Bound::Unbounded)),
                current: None,
            })),
            None => Ok(Box::new(EmptyTermEnum)),
        }
    }

    fn term_docs_for(&self, term: &Term) -> Result<Box<dyn TermDocEnum>> {
        Ok(Box::new(self.cursor(term)))
    }

    fn term_positions_for(&self, term: &Term) -> Result<Box<dyn TermDocEnum>> {
        Ok(Box::new(self.cursor(term)))
    }

    fn norms(&self, field: &str) -> Option<Arc<Vec<u8>>> {
        let index = self.fields.get(field)?;
        if index.norms.len() == self.docs.len() {
            return Some(Arc::clone(&index.norms));
        }
        // Pad norms for trailing documents that lack the field.
        let mut norms = index.norms.as_ref().clone();
        norms.resize(self.docs.len(), 0);
        Some(Arc::new(norms))
    }

    fn term_vector(&self, doc: DocId, field: &str) -> Result<Option<TermVector>> {
        Ok(self
            .docs
            .get(doc as usize)
            .and_then(|d| d.term_vectors.get(field))
            .cloned())
    }

    fn field_text(&self, doc: DocId, field: &str) -> Result<Option<String>> {
        Ok(self
            .docs
            .get(doc as usize)
            .and_then(|d| d.texts.get(field))
            .cloned())
    }
}
