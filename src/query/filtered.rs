//! Queries restricted by a filter.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::lexical::DocId;
use crate::lexical::reader::IndexReader;
use crate::query::scorer::{DocCursor, Scorer, ScorerKind};
use crate::query::weight::Weight;
use crate::query::{Query, boost_suffix};
use crate::search::SearchConfig;
use crate::search::explanation::Explanation;
use crate::search::filter::Filter;
use crate::search::searcher::Searcher;
use crate::util::bit_vector::BitVector;

/// Scores documents with the wrapped query, keeping only those the filter
/// lets through.
#[derive(Debug, Clone)]
pub struct FilteredQuery {
    query: Box<Query>,
    filter: Arc<dyn Filter>,
    boost: f32,
}

impl FilteredQuery {
    pub fn new<Q: Into<Query>, F: Filter + 'static>(query: Q, filter: F) -> Self {
        FilteredQuery::from_arc(query, Arc::new(filter))
    }

    pub fn from_arc<Q: Into<Query>>(query: Q, filter: Arc<dyn Filter>) -> Self {
        FilteredQuery {
            query: Box::new(query.into()),
            filter,
            boost: 1.0,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
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

    pub(crate) fn rewrite(&self, reader: &dyn IndexReader, config: &SearchConfig) -> Result<Query> {
        let rewritten = self.query.rewrite(reader, config)?;
        Ok(Query::Filtered(FilteredQuery {
            query: Box::new(rewritten),
            filter: Arc::clone(&self.filter),
            boost: self.boost,
        }))
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &dyn Searcher,
    ) -> Result<Box<dyn Weight>> {
        Ok(Box::new(FilteredWeight {
            query: query.clone(),
            sub: self.query.create_weight(searcher)?,
            filter: Arc::clone(&self.filter),
            boost: self.boost,
        }))
    }
}

impl PartialEq for FilteredQuery {
    fn eq(&self, other: &Self) -> bool {
        self.boost == other.boost
            && self.query == other.query
            && self.filter.description() == other.filter.description()
    }
}

impl fmt::Display for FilteredQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FilteredQuery(query: {}, filter: {}){}",
            self.query,
            self.filter.description(),
            boost_suffix(self.boost)
        )
    }
}

#[derive(Debug)]
struct FilteredWeight {
    query: Query,
    sub: Box<dyn Weight>,
    filter: Arc<dyn Filter>,
    boost: f32,
}

impl Weight for FilteredWeight {
    fn query(&self) -> &Query {
        &self.query
    }

    fn value(&self) -> f32 {
        self.sub.value()
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        self.sub.sum_of_squared_weights() * self.boost * self.boost
    }

    fn normalize(&mut self, norm: f32) {
        self.sub.normalize(norm * self.boost);
    }

    fn scorer(&self, reader: &dyn IndexReader) -> Result<Option<Scorer>> {
        let Some(sub) = self.sub.scorer(reader)? else {
            return Ok(None);
        };
        let bits = self.filter.bits(reader)?;
        Ok(Some(Scorer::new(ScorerKind::Filtered(FilteredScorer {
            sub: Box::new(sub),
            bits,
        }))))
    }

    fn explain(&self, reader: &dyn IndexReader, doc: DocId) -> Result<Explanation> {
        if self.filter.bits(reader)?.get(doc as usize) {
            self.sub.explain(reader, doc)
        } else {
            Ok(Explanation::new(
                0.0,
                format!("failure to match filter: {}", self.filter.description()),
            ))
        }
    }
}

#[derive(Debug)]
pub(crate) struct FilteredScorer {
    sub: Box<Scorer>,
    bits: Arc<BitVector>,
}

impl FilteredScorer {
    fn settle(&mut self, mut found: bool) -> Result<Option<DocId>> {
        while found {
            let doc = self.sub.doc();
            if self.bits.get(doc as usize) {
                return Ok(Some(doc));
            }
            found = self.sub.next()?;
        }
        Ok(None)
    }
}

impl DocCursor for FilteredScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        let found = self.sub.next()?;
        self.settle(found)
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        let found = self.sub.skip_to(target)?;
        self.settle(found)
    }

    fn score(&mut self, _doc: DocId) -> Result<f32> {
        self.sub.score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::memory::MemoryIndex;
    use crate::query::range::Bound;
    use crate::query::term::TermQuery;
    use crate::search::filter::RangeFilter;
    use crate::search::searcher::IndexSearcher;

    #[test]
    fn test_filter_restricts_matches() {
        let mut index = MemoryIndex::new();
        for (body, date) in [("cat", "2005"), ("cat", "2006"), ("dog", "2006"), ("cat", "2007")] {
            index.add_document(&[("body", body), ("date", date)]).unwrap();
        }
        let searcher = IndexSearcher::new(Arc::new(index));
        let filter = RangeFilter::new(
            "date",
            Bound::Included("2006".to_string()),
            Bound::Unbounded,
        )
        .unwrap();
        let query: Query = FilteredQuery::new(TermQuery::new("body", "cat"), filter).into();
        assert_eq!(
            query.to_string(),
            "FilteredQuery(query: body:cat, filter: RangeFilter< date:[2006 > >)"
        );

        let weight = searcher.create_weight(&query).unwrap();
        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();
        assert_eq!(scorer.collect_docs().unwrap(), vec![1, 3]);

        let explanation = searcher.explain(&query, 0).unwrap();
        assert_eq!(explanation.value, 0.0);
        assert!(explanation.description.starts_with("failure to match filter"));
        assert!(searcher.explain(&query, 1).unwrap().is_match());
    }
}
