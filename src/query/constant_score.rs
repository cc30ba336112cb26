//! Queries scoring every filtered document alike.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::lexical::DocId;
use crate::lexical::reader::IndexReader;
use crate::query::scorer::{DocCursor, Scorer, ScorerKind};
use crate::query::weight::{Weight, WeightCore};
use crate::query::{Query, boost_suffix};
use crate::search::explanation::Explanation;
use crate::search::filter::Filter;
use crate::search::searcher::Searcher;
use crate::util::bit_vector::BitVector;

/// Matches the documents a filter lets through, all with the same score.
#[derive(Debug, Clone)]
pub struct ConstantScoreQuery {
    filter: Arc<dyn Filter>,
    boost: f32,
}

impl ConstantScoreQuery {
    pub fn new<F: Filter + 'static>(filter: F) -> Self {
        ConstantScoreQuery::from_arc(Arc::new(filter))
    }

    pub fn from_arc(filter: Arc<dyn Filter>) -> Self {
        ConstantScoreQuery { filter, boost: 1.0 }
    }

    pub fn filter(&self) -> &Arc<dyn Filter> {
        &self.filter
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
        Ok(Box::new(ConstantScoreWeight {
            query: query.clone(),
            filter: Arc::clone(&self.filter),
            core: WeightCore::new(searcher.similarity(), self.boost, 1.0),
        }))
    }
}

impl PartialEq for ConstantScoreQuery {
    fn eq(&self, other: &Self) -> bool {
        self.boost == other.boost && self.filter.description() == other.filter.description()
    }
}

impl fmt::Display for ConstantScoreQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConstantScore({}){}",
            self.filter.description(),
            boost_suffix(self.boost)
        )
    }
}

#[derive(Debug)]
struct ConstantScoreWeight {
    query: Query,
    filter: Arc<dyn Filter>,
    core: WeightCore,
}

impl Weight for ConstantScoreWeight {
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
        let bits = self.filter.bits(reader)?;
        Ok(Some(Scorer::new(ScorerKind::ConstantScore(
            ConstantScoreScorer::new(bits, self.core.value),
        ))))
    }

    fn explain(&self, reader: &dyn IndexReader, doc: DocId) -> Result<Explanation> {
        let description = self.filter.description();
        if self.filter.bits(reader)?.get(doc as usize) {
            Ok(Explanation::new(
                self.core.value,
                format!("ConstantScoreQuery({description}), product of:"),
            )
            .with_detail(Explanation::new(self.core.boost, "boost"))
            .with_detail(Explanation::new(self.core.qnorm, "query_norm")))
        } else {
            Ok(Explanation::new(
                0.0,
                format!("ConstantScoreQuery({description}), does not match id {doc}"),
            ))
        }
    }
}

/// Walks the set bits of a document bitmap with a fixed score.
#[derive(Debug)]
pub(crate) struct ConstantScoreScorer {
    bits: Arc<BitVector>,
    next_from: usize,
    score: f32,
}

impl ConstantScoreScorer {
    pub(crate) fn new(bits: Arc<BitVector>, score: f32) -> Self {
        ConstantScoreScorer {
            bits,
            next_from: 0,
            score,
        }
    }
}

impl DocCursor for ConstantScoreScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        let found = self.bits.next_set(self.next_from);
        if let Some(doc) = found {
            self.next_from = doc + 1;
        }
        Ok(found.map(|d| d as DocId))
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        self.next_from = self.next_from.max(target as usize);
        self.next_doc()
    }

    fn score(&mut self, _doc: DocId) -> Result<f32> {
        Ok(self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::memory::MemoryIndex;
    use crate::query::range::Bound;
    use crate::search::filter::RangeFilter;
    use crate::search::searcher::IndexSearcher;

    fn filter() -> RangeFilter {
        RangeFilter::new("body", Bound::Included("b".to_string()), Bound::Unbounded).unwrap()
    }

    #[test]
    fn test_constant_scores() {
        let mut index = MemoryIndex::new();
        for text in ["apple", "banana", "cherry cherry cherry", "apple"] {
            index.add_document(&[("body", text)]).unwrap();
        }
        let searcher = IndexSearcher::new(Arc::new(index));
        let query: Query = ConstantScoreQuery::new(filter()).with_boost(2.0).into();
        let weight = searcher.create_weight(&query).unwrap();
        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();

        let mut hits = Vec::new();
        while scorer.next().unwrap() {
            hits.push((scorer.doc(), scorer.score().unwrap()));
        }
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
        // A lone constant-score query normalizes to 1.
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(hits[0].1, hits[1].1);

        let explanation = searcher.explain(&query, 0).unwrap();
        assert_eq!(explanation.value, 0.0);
        assert!(searcher.explain(&query, 2).unwrap().is_match());
    }

    #[test]
    fn test_equality_by_filter_description() {
        let a: Query = ConstantScoreQuery::new(filter()).into();
        let b: Query = ConstantScoreQuery::new(filter()).into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "ConstantScore(RangeFilter< body:[b > >)");
    }
}
