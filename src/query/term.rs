//! Single-term queries.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::lexical::DocId;
use crate::lexical::reader::{IndexReader, TermDocEnum};
use crate::lexical::term::Term;
use crate::query::scorer::{DocCursor, Scorer, ScorerKind};
use crate::query::weight::{Weight, WeightCore};
use crate::query::{Query, boost_suffix};
use crate::search::explanation::Explanation;
use crate::search::searcher::Searcher;
use crate::search::similarity::Similarity;

const SCORE_CACHE_SIZE: usize = 32;
const BATCH_SIZE: usize = 32;

/// A query that matches documents containing a specific term.
///
/// Term queries do not analyze their text; it must already be in indexed
/// form.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    term: Term,
    boost: f32,
}

impl TermQuery {
    pub fn new<F, T>(field: F, text: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        TermQuery {
            term: Term::new(field, text),
            boost: 1.0,
        }
    }

    pub fn from_term(term: Term) -> Self {
        TermQuery { term, boost: 1.0 }
    }

    pub fn term(&self) -> &Term {
        &self.term
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

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &dyn Searcher,
    ) -> Result<Box<dyn Weight>> {
        let similarity = searcher.similarity();
        let idf = similarity.idf_term(&self.term, searcher);
        Ok(Box::new(TermWeight {
            query: query.clone(),
            term: self.term.clone(),
            core: WeightCore::new(similarity, self.boost, idf),
        }))
    }
}

impl fmt::Display for TermQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.term, boost_suffix(self.boost))
    }
}

#[derive(Debug)]
struct TermWeight {
    query: Query,
    term: Term,
    core: WeightCore,
}

impl Weight for TermWeight {
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
        if reader.doc_freq(&self.term) == 0 {
            return Ok(None);
        }
        let postings = reader.term_docs_for(&self.term)?;
        let scorer = TermScorer::new(
            postings,
            Arc::clone(&self.core.similarity),
            reader.norms(&self.term.field),
            self.core.value,
        );
        Ok(Some(Scorer::new(ScorerKind::Term(scorer))))
    }

    fn explain(&self, reader: &dyn IndexReader, doc: DocId) -> Result<Explanation> {
        let mut freq = 0;
        if reader.doc_freq(&self.term) > 0 {
            let mut postings = reader.term_docs_for(&self.term)?;
            if postings.skip_to(doc)? && postings.doc() == doc {
                freq = postings.freq();
            }
        }
        let tf = Explanation::new(
            self.core.similarity.tf(freq as f32),
            format!("tf(term_freq({})={freq})", self.term),
        );
        let idf = format!(
            "idf(doc_freq={}, max_docs={})",
            reader.doc_freq(&self.term),
            reader.max_doc()
        );
        Ok(self
            .core
            .explain_product(reader, &self.query, &self.term.field, idf, tf, doc))
    }
}

/// Scores the postings of one term, reading them in batches.
#[derive(Debug)]
pub(crate) struct TermScorer {
    postings: Box<dyn TermDocEnum>,
    similarity: Arc<dyn Similarity>,
    norms: Option<Arc<Vec<u8>>>,
    weight_value: f32,
    docs: [DocId; BATCH_SIZE],
    freqs: [u32; BATCH_SIZE],
    pointer: usize,
    pointer_max: usize,
    score_cache: [f32; SCORE_CACHE_SIZE],
}

impl TermScorer {
    pub(crate) fn new(
        postings: Box<dyn TermDocEnum>,
        similarity: Arc<dyn Similarity>,
        norms: Option<Arc<Vec<u8>>>,
        weight_value: f32,
    ) -> Self {
        let mut score_cache = [0.0; SCORE_CACHE_SIZE];
        for (freq, slot) in score_cache.iter_mut().enumerate() {
            *slot = similarity.tf(freq as f32) * weight_value;
        }
        TermScorer {
            postings,
            similarity,
            norms,
            weight_value,
            docs: [0; BATCH_SIZE],
            freqs: [0; BATCH_SIZE],
            pointer: 0,
            pointer_max: 0,
            score_cache,
        }
    }
}

impl DocCursor for TermScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        self.pointer += 1;
        if self.pointer >= self.pointer_max {
            self.pointer_max = self.postings.read(&mut self.docs, &mut self.freqs)?;
            if self.pointer_max == 0 {
                return Ok(None);
            }
            self.pointer = 0;
        }
        Ok(Some(self.docs[self.pointer]))
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        self.pointer += 1;
        while self.pointer < self.pointer_max {
            if self.docs[self.pointer] >= target {
                return Ok(Some(self.docs[self.pointer]));
            }
            self.pointer += 1;
        }

        if !self.postings.skip_to(target)? {
            self.pointer_max = 0;
            return Ok(None);
        }
        self.docs[0] = self.postings.doc();
        self.freqs[0] = self.postings.freq();
        self.pointer = 0;
        self.pointer_max = 1;
        Ok(Some(self.docs[0]))
    }

    fn score(&mut self, doc: DocId) -> Result<f32> {
        let freq = self.freqs[self.pointer] as usize;
        let raw = if freq < SCORE_CACHE_SIZE {
            self.score_cache[freq]
        } else {
            self.similarity.tf(freq as f32) * self.weight_value
        };
        let norm = match self.norms.as_ref().and_then(|n| n.get(doc as usize)) {
            Some(&b) => self.similarity.decode_norm(b),
            None => 1.0,
        };
        Ok(raw * norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::memory::MemoryIndex;
    use crate::search::searcher::IndexSearcher;

    fn index() -> Arc<MemoryIndex> {
        let mut index = MemoryIndex::new();
        for i in 0..100 {
            let text = if i % 3 == 0 { "cat cat dog" } else { "dog" };
            index.add_document(&[("body", text)]).unwrap();
        }
        Arc::new(index)
    }

    #[test]
    fn test_term_scorer_batches_and_skips() {
        let searcher = IndexSearcher::new(index());
        let query: Query = TermQuery::new("body", "cat").into();
        let weight = searcher.create_weight(&query).unwrap();
        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();

        assert!(scorer.next().unwrap());
        assert_eq!(scorer.doc(), 0);
        assert!(scorer.skip_to(40).unwrap());
        assert_eq!(scorer.doc(), 42);
        assert!(scorer.skip_to(96).unwrap());
        assert_eq!(scorer.doc(), 96);
        assert!(scorer.next().unwrap());
        assert_eq!(scorer.doc(), 99);
        assert!(!scorer.next().unwrap());
    }

    #[test]
    fn test_term_score_formula() {
        let reader = index();
        let searcher = IndexSearcher::new(reader.clone());
        let query: Query = TermQuery::new("body", "cat").into();
        let weight = searcher.create_weight(&query).unwrap();
        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();
        assert!(scorer.next().unwrap());

        let sim = searcher.similarity();
        let norm = sim.decode_norm(reader.norms("body").unwrap()[0]);
        let expected = sim.tf(2.0) * weight.value() * norm;
        assert!((scorer.score().unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_missing_term_has_no_scorer() {
        let searcher = IndexSearcher::new(index());
        let query: Query = TermQuery::new("body", "zebra").into();
        let weight = searcher.create_weight(&query).unwrap();
        assert!(weight.scorer(searcher.reader()).unwrap().is_none());
    }

    #[test]
    fn test_explain_matches_score() {
        let searcher = IndexSearcher::new(index());
        let query: Query = TermQuery::new("body", "cat").with_boost(2.0).into();
        let weight = searcher.create_weight(&query).unwrap();
        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();
        assert!(scorer.skip_to(3).unwrap());
        let score = scorer.score().unwrap();

        let explanation = searcher.explain(&query, 3).unwrap();
        assert!((explanation.value - score).abs() < 1e-5);
        assert!(explanation.to_string().contains("tf(term_freq(body:cat)=2)"));
        assert_eq!(searcher.explain(&query, 1).unwrap().value, 0.0);
    }
}
