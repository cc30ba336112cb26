//! Queries over a bounded set of weighted terms in one field.
//!
//! Prefix, wildcard and range queries rewrite into a [`MultiTermQuery`]. The
//! query keeps at most `max_terms` terms; when more are offered, the ones
//! with the lowest boost are dropped (on equal boosts the lexicographically
//! larger term survives).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{GlaiveError, Result};
use crate::lexical::DocId;
use crate::lexical::reader::{IndexReader, TermDocEnum};
use crate::lexical::term::Term;
use crate::query::scorer::{DocCursor, Scorer, ScorerKind};
use crate::query::term::TermQuery;
use crate::query::weight::{Weight, WeightCore};
use crate::query::{Query, boost_suffix};
use crate::search::DEFAULT_MAX_TERMS;
use crate::search::explanation::Explanation;
use crate::search::searcher::Searcher;
use crate::search::similarity::Similarity;
use crate::util::priority_queue::PriorityQueue;

#[derive(Debug, Clone, PartialEq)]
pub struct MultiTermQuery {
    field: String,
    terms: BTreeMap<String, f32>,
    min_boost: f32,
    max_terms: usize,
    boost: f32,
}

impl MultiTermQuery {
    pub fn new<F: Into<String>>(field: F) -> Self {
        MultiTermQuery {
            field: field.into(),
            terms: BTreeMap::new(),
            min_boost: 0.0,
            max_terms: DEFAULT_MAX_TERMS,
            boost: 1.0,
        }
    }

    /// A query keeping at most `max_terms` terms.
    pub fn with_max_terms<F: Into<String>>(field: F, max_terms: usize) -> Result<Self> {
        if max_terms == 0 {
            return Err(GlaiveError::invalid_argument(
                "max_terms must be greater than 0",
            ));
        }
        let mut query = MultiTermQuery::new(field);
        query.max_terms = max_terms;
        Ok(query)
    }

    /// Terms with a boost at or below `min_boost` are ignored.
    pub fn with_min_boost(mut self, min_boost: f32) -> Self {
        self.min_boost = min_boost;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn max_terms(&self) -> usize {
        self.max_terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms and their boosts, sorted by term.
    pub fn terms(&self) -> impl Iterator<Item = (&str, f32)> {
        self.terms.iter().map(|(t, &b)| (t.as_str(), b))
    }

    pub(crate) fn term_texts(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    pub fn add_term<T: Into<String>>(&mut self, text: T) {
        self.add_term_boost(text, 1.0);
    }

    pub fn add_term_boost<T: Into<String>>(&mut self, text: T, boost: f32) {
        let text = text.into();
        if text.is_empty() || boost <= self.min_boost {
            return;
        }
        if let Some(existing) = self.terms.get_mut(&text) {
            *existing = existing.max(boost);
            return;
        }
        if self.terms.len() < self.max_terms {
            self.terms.insert(text, boost);
            return;
        }

        // Evict the weakest term: lowest boost, smaller text on ties.
        let weakest = self
            .terms
            .iter()
            .min_by(|(ta, ba), (tb, bb)| ba.total_cmp(bb).then_with(|| ta.cmp(tb)))
            .map(|(t, &b)| (t.clone(), b));
        if let Some((weak_text, weak_boost)) = weakest {
            if boost > weak_boost || (boost == weak_boost && text > weak_text) {
                self.terms.remove(&weak_text);
                self.terms.insert(text, boost);
            }
        }
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    pub fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub(crate) fn rewrite(&self) -> Result<Query> {
        if self.terms.len() == 1 {
            if let Some((text, &term_boost)) = self.terms.iter().next() {
                if term_boost == 1.0 {
                    return Ok(TermQuery::new(self.field.clone(), text.clone())
                        .with_boost(self.boost)
                        .into());
                }
            }
        }
        Ok(Query::MultiTerm(self.clone()))
    }

    pub(crate) fn extract_terms(&self, terms: &mut BTreeSet<Term>) {
        for text in self.terms.keys() {
            terms.insert(Term::new(self.field.clone(), text.clone()));
        }
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &dyn Searcher,
    ) -> Result<Box<dyn Weight>> {
        let similarity = searcher.similarity();
        let doc_freq: u64 = self
            .terms
            .keys()
            .map(|t| searcher.doc_freq(&Term::new(self.field.clone(), t.clone())))
            .sum();
        let idf = similarity.idf(doc_freq, searcher.max_doc());
        Ok(Box::new(MultiTermWeight {
            query: query.clone(),
            field: self.field.clone(),
            terms: self.terms.iter().map(|(t, &b)| (t.clone(), b)).collect(),
            core: WeightCore::new(similarity, self.boost, idf),
        }))
    }
}

impl fmt::Display for MultiTermQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .terms
            .iter()
            .map(|(t, &b)| format!("{t}{}", boost_suffix(b)))
            .collect();
        write!(
            f,
            "{}:\"{}\"{}",
            self.field,
            terms.join("|"),
            boost_suffix(self.boost)
        )
    }
}

#[derive(Debug)]
struct MultiTermWeight {
    query: Query,
    field: String,
    terms: Vec<(String, f32)>,
    core: WeightCore,
}

impl MultiTermWeight {
    fn term_scorer(&self, reader: &dyn IndexReader) -> Result<Option<MultiTermScorer>> {
        let mut enums = Vec::new();
        for (text, boost) in &self.terms {
            let term = Term::new(self.field.clone(), text.clone());
            if reader.doc_freq(&term) > 0 {
                enums.push(BoostedPostings {
                    postings: reader.term_docs_for(&term)?,
                    text: text.clone(),
                    boost: *boost,
                    doc: 0,
                    freq: 0,
                });
            }
        }
        if enums.is_empty() {
            return Ok(None);
        }
        Ok(Some(MultiTermScorer::new(
            enums,
            Arc::clone(&self.core.similarity),
            reader.norms(&self.field),
            self.core.value,
        )))
    }
}

impl Weight for MultiTermWeight {
    fn query(&self) -> &Query {
        &self.query
    }

    fn value(&self) -> f32 {
        self.core.value
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        self.core.sum_of_squared_weights()
    }

    fn normalize(&mut self, norm: f32) {
        self.core.normalize(norm);
    }

    fn scorer(&self, reader: &dyn IndexReader) -> Result<Option<Scorer>> {
        Ok(self
            .term_scorer(reader)?
            .map(|s| Scorer::new(ScorerKind::MultiTerm(s))))
    }

    fn explain(&self, reader: &dyn IndexReader, doc: DocId) -> Result<Explanation> {
        let mut tf = Explanation::new(0.0, format!("tf({})", self.query));
        if let Some(inner) = self.term_scorer(reader)? {
            let mut scorer = Scorer::new(ScorerKind::MultiTerm(inner));
            if scorer.skip_to(doc)? && scorer.doc() == doc {
                if let ScorerKind::MultiTerm(inner) = &scorer.kind {
                    for (text, freq, boost) in inner.matching_terms() {
                        let value = self.core.similarity.tf(freq as f32) * boost;
                        tf.value += value;
                        tf.add_detail(Explanation::new(
                            value,
                            format!("tf(term_freq({}:{text})={freq})^{boost}", self.field),
                        ));
                    }
                }
            }
        }
        let df: u64 = self
            .terms
            .iter()
            .map(|(t, _)| reader.doc_freq(&Term::new(self.field.clone(), t.clone())))
            .sum();
        let idf = format!("idf(doc_freq={df}, max_docs={})", reader.max_doc());
        Ok(self
            .core
            .explain_product(reader, &self.query, &self.field, idf, tf, doc))
    }
}

#[derive(Debug)]
pub(crate) struct BoostedPostings {
    postings: Box<dyn TermDocEnum>,
    text: String,
    boost: f32,
    doc: DocId,
    freq: u32,
}

impl BoostedPostings {
    fn next(&mut self) -> Result<bool> {
        if self.postings.next()? {
            self.doc = self.postings.doc();
            self.freq = self.postings.freq();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.postings.skip_to(target)? {
            self.doc = self.postings.doc();
            self.freq = self.postings.freq();
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

fn boosted_lt(a: &BoostedPostings, b: &BoostedPostings) -> bool {
    a.doc < b.doc
}

/// Merges the postings of several terms with a doc-ordered heap.
#[derive(Debug)]
pub(crate) struct MultiTermScorer {
    pending: Vec<BoostedPostings>,
    queue: PriorityQueue<BoostedPostings>,
    similarity: Arc<dyn Similarity>,
    norms: Option<Arc<Vec<u8>>>,
    weight_value: f32,
    started: bool,
    doc: Option<DocId>,
}

impl MultiTermScorer {
    fn new(
        enums: Vec<BoostedPostings>,
        similarity: Arc<dyn Similarity>,
        norms: Option<Arc<Vec<u8>>>,
        weight_value: f32,
    ) -> Self {
        let capacity = enums.len();
        MultiTermScorer {
            pending: enums,
            queue: PriorityQueue::new(capacity, boosted_lt),
            similarity,
            norms,
            weight_value,
            started: false,
            doc: None,
        }
    }

    fn matching_terms(&self) -> Vec<(String, u32, f32)> {
        let Some(doc) = self.doc else {
            return Vec::new();
        };
        self.queue
            .iter()
            .filter(|p| p.doc == doc)
            .map(|p| (p.text.clone(), p.freq, p.boost))
            .collect()
    }

    /// Move every enum sitting on the current document past it.
    fn advance_current(&mut self) -> Result<()> {
        let Some(doc) = self.doc else {
            return Ok(());
        };
        while let Some(top) = self.queue.top_mut() {
            if top.doc != doc {
                break;
            }
            if top.next()? {
                self.queue.down();
            } else {
                self.queue.pop();
            }
        }
        Ok(())
    }
}

impl DocCursor for MultiTermScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        if !self.started {
            self.started = true;
            for mut p in std::mem::take(&mut self.pending) {
                if p.next()? {
                    self.queue.push(p);
                }
            }
        } else {
            self.advance_current()?;
        }
        self.doc = self.queue.top().map(|p| p.doc);
        Ok(self.doc)
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        if !self.started {
            self.started = true;
            for mut p in std::mem::take(&mut self.pending) {
                if p.skip_to(target)? {
                    self.queue.push(p);
                }
            }
        }
        while let Some(top) = self.queue.top_mut() {
            if top.doc >= target {
                break;
            }
            if top.skip_to(target)? {
                self.queue.down();
            } else {
                self.queue.pop();
            }
        }
        self.doc = self.queue.top().map(|p| p.doc);
        Ok(self.doc)
    }

    fn score(&mut self, doc: DocId) -> Result<f32> {
        let total: f32 = self
            .queue
            .iter()
            .filter(|p| p.doc == doc)
            .map(|p| self.similarity.tf(p.freq as f32) * p.boost)
            .sum();
        let norm = match self.norms.as_ref().and_then(|n| n.get(doc as usize)) {
            Some(&b) => self.similarity.decode_norm(b),
            None => 1.0,
        };
        Ok(total * self.weight_value * norm)
    }
}

/// Postings of several terms merged into one positional enum.
///
/// Used where a phrase position accepts any of several terms: a document
/// matches when any of the terms occurs in it, and its positions are the
/// union of theirs.
#[derive(Debug)]
pub(crate) struct MultiTermDocEnum {
    subs: Vec<Box<dyn TermDocEnum>>,
    live: Vec<bool>,
    started: bool,
    doc: DocId,
    positions: Vec<u32>,
    pos_idx: usize,
}

impl MultiTermDocEnum {
    pub(crate) fn new(subs: Vec<Box<dyn TermDocEnum>>) -> Self {
        let live = vec![true; subs.len()];
        MultiTermDocEnum {
            subs,
            live,
            started: false,
            doc: DocId::MAX,
            positions: Vec::new(),
            pos_idx: 0,
        }
    }

    fn start(&mut self) -> Result<()> {
        if !self.started {
            self.started = true;
            for (sub, live) in self.subs.iter_mut().zip(self.live.iter_mut()) {
                *live = sub.next()?;
            }
        }
        Ok(())
    }

    /// Gather the document with the smallest number and advance past it.
    fn gather(&mut self) -> Result<bool> {
        let min = self
            .subs
            .iter()
            .zip(&self.live)
            .filter(|(_, live)| **live)
            .map(|(sub, _)| sub.doc())
            .min();
        let Some(doc) = min else {
            self.doc = DocId::MAX;
            return Ok(false);
        };

        self.doc = doc;
        self.positions.clear();
        self.pos_idx = 0;
        for (sub, live) in self.subs.iter_mut().zip(self.live.iter_mut()) {
            if *live && sub.doc() == doc {
                while let Some(pos) = sub.next_position()? {
                    self.positions.push(pos);
                }
                *live = sub.next()?;
            }
        }
        self.positions.sort_unstable();
        self.positions.dedup();
        Ok(true)
    }
}

impl TermDocEnum for MultiTermDocEnum {
    fn next(&mut self) -> Result<bool> {
        self.start()?;
        self.gather()
    }

    fn doc(&self) -> DocId {
        self.doc
    }

    fn freq(&self) -> u32 {
        self.positions.len() as u32
    }

    fn next_position(&mut self) -> Result<Option<u32>> {
        let pos = self.positions.get(self.pos_idx).copied();
        if pos.is_some() {
            self.pos_idx += 1;
        }
        Ok(pos)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.start()?;
        for (sub, live) in self.subs.iter_mut().zip(self.live.iter_mut()) {
            if *live && sub.doc() < target {
                *live = sub.skip_to(target)?;
            }
        }
        self.gather()
    }
}
