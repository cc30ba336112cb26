//! Document filters.
//!
//! A filter turns a reader into a [`BitVector`] of the documents it lets
//! through. Computing the bits can be expensive, so every filter keeps a cache
//! keyed by reader identity. The cache may be populated concurrently by
//! several threads sharing a reader; if two threads compute the same entry,
//! the first one stored wins and both use it.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use log::trace;
use parking_lot::Mutex;

use crate::error::Result;
use crate::lexical::reader::IndexReader;
use crate::query::Query;
use crate::query::range::{Bound, TermRange};
use crate::search::SearchConfig;
use crate::search::searcher::{LeafSearcher, Searcher};
use crate::util::bit_vector::BitVector;
use crate::util::wildcard::wc_match;

pub trait Filter: Send + Sync + fmt::Debug {
    /// Compute the bits for `reader` without consulting the cache.
    fn compute_bits(&self, reader: &dyn IndexReader) -> Result<BitVector>;

    /// A structural description, used for display and query equality.
    fn description(&self) -> String;

    fn cache(&self) -> &FilterCache;

    /// The bits for `reader`, cached per reader.
    fn bits(&self, reader: &dyn IndexReader) -> Result<Arc<BitVector>> {
        self.cache()
            .get_or_compute(reader.reader_id(), || self.compute_bits(reader))
    }
}

/// Per-reader cache of computed filter bits.
#[derive(Default)]
pub struct FilterCache {
    entries: Mutex<AHashMap<u64, Arc<BitVector>>>,
}

impl FilterCache {
    pub fn new() -> Self {
        FilterCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn get_or_compute<F>(&self, reader_id: u64, compute: F) -> Result<Arc<BitVector>>
    where
        F: FnOnce() -> Result<BitVector>,
    {
        if let Some(bits) = self.entries.lock().get(&reader_id) {
            trace!("filter cache hit for reader {reader_id}");
            return Ok(Arc::clone(bits));
        }
        trace!("filter cache miss for reader {reader_id}");

        // Computed outside the lock; a concurrent computation may win.
        let bits = Arc::new(compute()?);
        let mut entries = self.entries.lock();
        Ok(Arc::clone(entries.entry(reader_id).or_insert(bits)))
    }
}

impl fmt::Debug for FilterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Lets through documents with a term of a field inside a range.
#[derive(Debug)]
pub struct RangeFilter {
    range: TermRange,
    cache: FilterCache,
}

impl RangeFilter {
    pub fn new<F: Into<String>>(field: F, lower: Bound<String>, upper: Bound<String>) -> Result<Self> {
        Ok(RangeFilter::from_range(TermRange::new(field, lower, upper)?))
    }

    pub fn from_range(range: TermRange) -> Self {
        RangeFilter {
            range,
            cache: FilterCache::new(),
        }
    }

    pub fn range(&self) -> &TermRange {
        &self.range
    }
}

fn set_term_docs(
    reader: &dyn IndexReader,
    field: &str,
    text: &str,
    bits: &mut BitVector,
) -> Result<()> {
    let term = crate::lexical::term::Term::new(field, text);
    let mut postings = reader.term_docs_for(&term)?;
    while postings.next()? {
        bits.set(postings.doc() as usize);
    }
    Ok(())
}

impl Filter for RangeFilter {
    fn compute_bits(&self, reader: &dyn IndexReader) -> Result<BitVector> {
        let mut bits = BitVector::new(reader.max_doc() as usize);
        let mut texts = Vec::new();
        self.range.for_each_term(reader, |text, _| {
            texts.push(text.to_string());
            true
        })?;
        for text in &texts {
            set_term_docs(reader, self.range.field(), text, &mut bits)?;
        }
        Ok(bits)
    }

    fn description(&self) -> String {
        format!("RangeFilter< {} >", self.range)
    }

    fn cache(&self) -> &FilterCache {
        &self.cache
    }
}

/// The term pattern a [`TermPatternFilter`] accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermPattern {
    Prefix(String),
    Wildcard(String),
}

/// Lets through documents with a term matching a prefix or wildcard pattern.
#[derive(Debug)]
pub struct TermPatternFilter {
    field: String,
    pattern: TermPattern,
    cache: FilterCache,
}

impl TermPatternFilter {
    pub fn prefix<F: Into<String>, P: Into<String>>(field: F, prefix: P) -> Self {
        TermPatternFilter {
            field: field.into(),
            pattern: TermPattern::Prefix(prefix.into()),
            cache: FilterCache::new(),
        }
    }

    pub fn wildcard<F: Into<String>, P: Into<String>>(field: F, pattern: P) -> Self {
        TermPatternFilter {
            field: field.into(),
            pattern: TermPattern::Wildcard(pattern.into()),
            cache: FilterCache::new(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn pattern(&self) -> &TermPattern {
        &self.pattern
    }
}

/// The literal prefix of a wildcard pattern, before its first wildcard.
pub(crate) fn literal_prefix(pattern: &str) -> &str {
    let end = pattern.find(['*', '?']).unwrap_or(pattern.len());
    &pattern[..end]
}

/// Visit the terms of `field` matching `pattern`, in order, with their
/// document frequency. Stops early when `visit` returns `false`.
pub(crate) fn for_each_pattern_term<F>(
    reader: &dyn IndexReader,
    field: &str,
    pattern: &TermPattern,
    mut visit: F,
) -> Result<()>
where
    F: FnMut(&str, u64) -> bool,
{
    let prefix = match pattern {
        TermPattern::Prefix(p) => p.as_str(),
        TermPattern::Wildcard(p) => literal_prefix(p),
    };
    let mut terms = reader.terms_from(field, prefix)?;
    while terms.next()? {
        let text = terms.term();
        if !text.starts_with(prefix) {
            break;
        }
        let matched = match pattern {
            TermPattern::Prefix(_) => true,
            TermPattern::Wildcard(p) => wc_match(p, text),
        };
        if matched && !visit(text, terms.doc_freq()) {
            break;
        }
    }
    Ok(())
}

impl Filter for TermPatternFilter {
    fn compute_bits(&self, reader: &dyn IndexReader) -> Result<BitVector> {
        let mut bits = BitVector::new(reader.max_doc() as usize);
        let mut texts = Vec::new();
        for_each_pattern_term(reader, &self.field, &self.pattern, |text, _| {
            texts.push(text.to_string());
            true
        })?;
        for text in &texts {
            set_term_docs(reader, &self.field, text, &mut bits)?;
        }
        Ok(bits)
    }

    fn description(&self) -> String {
        match &self.pattern {
            TermPattern::Prefix(p) => format!("PrefixFilter< {}:{p}* >", self.field),
            TermPattern::Wildcard(p) => format!("WildcardFilter< {}:{p} >", self.field),
        }
    }

    fn cache(&self) -> &FilterCache {
        &self.cache
    }
}

/// Lets through every document a query matches.
#[derive(Debug)]
pub struct QueryFilter {
    query: Query,
    config: SearchConfig,
    cache: FilterCache,
}

impl QueryFilter {
    pub fn new<Q: Into<Query>>(query: Q) -> Self {
        QueryFilter {
            query: query.into(),
            config: SearchConfig::default(),
            cache: FilterCache::new(),
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

impl Filter for QueryFilter {
    fn compute_bits(&self, reader: &dyn IndexReader) -> Result<BitVector> {
        let mut bits = BitVector::new(reader.max_doc() as usize);
        let searcher = LeafSearcher::new(reader, &self.config);
        let weight = searcher.create_weight(&self.query)?;
        if let Some(mut scorer) = weight.scorer(reader)? {
            while scorer.next()? {
                bits.set(scorer.doc() as usize);
            }
        }
        Ok(bits)
    }

    fn description(&self) -> String {
        format!("QueryFilter< {} >", self.query)
    }

    fn cache(&self) -> &FilterCache {
        &self.cache
    }
}
