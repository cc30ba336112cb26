//! The query matching every live document.

use std::fmt;

use crate::error::Result;
use crate::lexical::DocId;
use crate::lexical::reader::IndexReader;
use crate::query::scorer::{DocCursor, Scorer, ScorerKind};
use crate::query::weight::{Weight, WeightCore};
use crate::query::{Query, boost_suffix};
use crate::search::explanation::Explanation;
use crate::search::searcher::Searcher;
use crate::util::bit_vector::BitVector;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchAllQuery {
    boost: f32,
}

impl MatchAllQuery {
    pub fn new() -> Self {
        MatchAllQuery { boost: 1.0 }
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
        Ok(Box::new(MatchAllWeight {
            query: query.clone(),
            core: WeightCore::new(searcher.similarity(), self.boost, 1.0),
        }))
    }
}

impl Default for MatchAllQuery {
    fn default() -> Self {
        MatchAllQuery::new()
    }
}

impl fmt::Display for MatchAllQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*{}", boost_suffix(self.boost))
    }
}

#[derive(Debug)]
struct MatchAllWeight {
    query: Query,
    core: WeightCore,
}

impl Weight for MatchAllWeight {
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
        Ok(Some(Scorer::new(ScorerKind::MatchAll(MatchAllScorer::new(
            reader,
            self.core.value,
        )))))
    }

    fn explain(&self, reader: &dyn IndexReader, doc: DocId) -> Result<Explanation> {
        if doc >= reader.max_doc() || reader.is_deleted(doc) {
            return Ok(Explanation::new(0.0, format!("deleted document {doc}")));
        }
        Ok(
            Explanation::new(self.core.value, "MatchAllQuery: product of:")
                .with_detail(Explanation::new(self.core.boost, "boost"))
                .with_detail(Explanation::new(self.core.qnorm, "query_norm")),
        )
    }
}

/// Walks every document of a reader, skipping the deleted ones.
#[derive(Debug)]
pub(crate) struct MatchAllScorer {
    max_doc: DocId,
    deleted: Option<BitVector>,
    next: DocId,
    score: f32,
}

impl MatchAllScorer {
    pub(crate) fn new(reader: &dyn IndexReader, score: f32) -> Self {
        let max_doc = reader.max_doc();
        let deleted = reader.has_deletions().then(|| {
            let mut bits = BitVector::new(max_doc as usize);
            for doc in (0..max_doc).filter(|&d| reader.is_deleted(d)) {
                bits.set(doc as usize);
            }
            bits
        });
        MatchAllScorer {
            max_doc,
            deleted,
            next: 0,
            score,
        }
    }
}

impl DocCursor for MatchAllScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        while self.next < self.max_doc {
            let doc = self.next;
            self.next += 1;
            if !self.deleted.as_ref().is_some_and(|d| d.get(doc as usize)) {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        self.next = self.next.max(target);
        self.next_doc()
    }

    fn score(&mut self, _doc: DocId) -> Result<f32> {
        Ok(self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::lexical::memory::MemoryIndex;
    use crate::search::searcher::IndexSearcher;

    #[test]
    fn test_skips_deleted_documents() {
        let mut index = MemoryIndex::new();
        for text in ["a", "b", "c", "d"] {
            index.add_document(&[("body", text)]).unwrap();
        }
        index.delete(1).unwrap();
        let searcher = IndexSearcher::new(Arc::new(index));
        let query: Query = MatchAllQuery::new().into();
        assert_eq!(query.to_string(), "*");

        let weight = searcher.create_weight(&query).unwrap();
        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();
        assert_eq!(scorer.collect_docs().unwrap(), vec![0, 2, 3]);

        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();
        assert!(scorer.skip_to(1).unwrap());
        assert_eq!(scorer.doc(), 2);
        assert!((scorer.score().unwrap() - 1.0).abs() < 1e-6);

        assert_eq!(searcher.explain(&query, 1).unwrap().value, 0.0);
        assert!(searcher.explain(&query, 3).unwrap().is_match());
    }
}
