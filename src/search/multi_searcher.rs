//! Searching several searchers as one.
//!
//! Each sub-searcher owns a contiguous range of the combined document
//! numbers, starting where the previous one ends. Weights are built once
//! against document frequencies summed over every sub-searcher, so a hit
//! scores the same as it would in a single index holding all the documents.

use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, trace};

use crate::error::{GlaiveError, Result};
use crate::lexical::DocId;
use crate::lexical::term::Term;
use crate::lexical::term_vector::TermVector;
use crate::query::weight::{Weight, build_weight};
use crate::query::{Query, combine};
use crate::search::SearchConfig;
use crate::search::explanation::Explanation;
use crate::search::filter::Filter;
use crate::search::searcher::{
    CachedDfSearcher, FilterFn, SearchRequest, Searcher, drain_page, hit_queue,
};
use crate::search::similarity::{DefaultSimilarity, Similarity};
use crate::search::sort::Sort;
use crate::search::top_docs::TopDocs;

#[derive(Debug)]
pub struct MultiSearcher {
    searchers: Vec<Arc<dyn Searcher>>,
    /// `starts[i]` is the first combined document number of searcher `i`;
    /// the last entry is the total.
    starts: Vec<u64>,
    config: SearchConfig,
    similarity: Arc<dyn Similarity>,
}

impl MultiSearcher {
    pub fn new(searchers: Vec<Arc<dyn Searcher>>) -> Self {
        let mut starts = Vec::with_capacity(searchers.len() + 1);
        let mut max_doc = 0;
        for searcher in &searchers {
            starts.push(max_doc);
            max_doc += searcher.max_doc();
        }
        starts.push(max_doc);

        let config = searchers
            .first()
            .map(|s| s.config().clone())
            .unwrap_or_default();
        debug!(
            "multi searcher over {} searchers, {} documents",
            searchers.len(),
            max_doc
        );
        MultiSearcher {
            searchers,
            starts,
            config,
            similarity: Arc::new(DefaultSimilarity),
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn searchers(&self) -> &[Arc<dyn Searcher>] {
        &self.searchers
    }

    pub fn starts(&self) -> &[u64] {
        &self.starts
    }

    /// The searcher holding combined document `doc`, and the number `doc`
    /// has there.
    pub fn sub_searcher(&self, doc: DocId) -> Result<(usize, DocId)> {
        if doc >= self.max_doc() {
            return Err(GlaiveError::invalid_argument(format!(
                "document {doc} is out of range, max_doc is {}",
                self.max_doc()
            )));
        }
        // Empty searchers share their start with the next one; the last
        // matching start is the one that owns the document.
        let n = self.searchers.len();
        let i = self.starts[..n].partition_point(|&start| start <= doc) - 1;
        Ok((i, doc - self.starts[i]))
    }

    fn route(&self, doc: DocId) -> Result<(&dyn Searcher, DocId)> {
        let (i, local) = self.sub_searcher(doc)?;
        Ok((self.searchers[i].as_ref(), local))
    }
}

impl Searcher for MultiSearcher {
    fn doc_freq(&self, term: &Term) -> u64 {
        self.searchers.iter().map(|s| s.doc_freq(term)).sum()
    }

    fn max_doc(&self) -> u64 {
        self.starts.last().copied().unwrap_or(0)
    }

    fn similarity(&self) -> Arc<dyn Similarity> {
        Arc::clone(&self.similarity)
    }

    fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn rewrite(&self, query: &Query) -> Result<Query> {
        let rewritten = self
            .searchers
            .iter()
            .map(|s| s.rewrite(query))
            .collect::<Result<Vec<_>>>()?;
        Ok(combine(&rewritten))
    }

    fn create_weight(&self, query: &Query) -> Result<Box<dyn Weight>> {
        let rewritten = self.rewrite(query)?;
        let doc_freqs: AHashMap<Term, u64> = rewritten
            .terms()
            .into_iter()
            .map(|term| {
                let df = self.doc_freq(&term);
                (term, df)
            })
            .collect();
        trace!("aggregated document frequencies for {} terms", doc_freqs.len());
        let cached = CachedDfSearcher::new(
            doc_freqs,
            self.max_doc(),
            self.similarity(),
            self.config.clone(),
        );
        build_weight(&rewritten, &cached)
    }

    fn search_w(&self, weight: &dyn Weight, request: &SearchRequest) -> Result<TopDocs> {
        let num_docs = request.resolved_num_docs(&self.config)?;
        let max_size = request.get_first_doc().saturating_add(num_docs);
        let sub_request = request.unpaged(max_size);

        let relevance = Sort::default();
        let fields = request.get_sort().map_or(relevance.fields(), |s| s.fields());
        let mut queue = hit_queue(max_size, fields);
        let mut total_hits = 0;
        let mut max_score = 0.0f32;

        for (i, searcher) in self.searchers.iter().enumerate() {
            let top = searcher.search_w(weight, &sub_request)?;
            debug!(
                "searcher {i} matched {} documents, kept {}",
                top.total_hits,
                top.len()
            );
            total_hits += top.total_hits;
            max_score = max_score.max(top.max_score);
            let start = self.starts[i];
            for mut hit in top.hits {
                hit.doc += start;
                queue.insert(hit);
            }
        }

        Ok(TopDocs {
            total_hits,
            hits: drain_page(queue, request.get_first_doc(), num_docs),
            max_score,
        })
    }

    fn search_each_w(
        &self,
        weight: &dyn Weight,
        filter: Option<&dyn Filter>,
        filter_fn: Option<&FilterFn>,
        visitor: &mut dyn FnMut(DocId, f32),
    ) -> Result<()> {
        for (searcher, &start) in self.searchers.iter().zip(&self.starts) {
            searcher.search_each_w(weight, filter, filter_fn, &mut |doc, score| {
                visitor(doc + start, score)
            })?;
        }
        Ok(())
    }

    fn explain_w(&self, weight: &dyn Weight, doc: DocId) -> Result<Explanation> {
        let (searcher, local) = self.route(doc)?;
        searcher.explain_w(weight, local)
    }

    fn term_vector(&self, doc: DocId, field: &str) -> Result<Option<TermVector>> {
        let (searcher, local) = self.route(doc)?;
        searcher.term_vector(local, field)
    }

    fn field_text(&self, doc: DocId, field: &str) -> Result<Option<String>> {
        let (searcher, local) = self.route(doc)?;
        searcher.field_text(local, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::memory::MemoryIndex;
    use crate::query::boolean::BooleanQuery;
    use crate::query::term::TermQuery;
    use crate::search::filter::QueryFilter;
    use crate::search::highlight::HighlightOptions;
    use crate::search::searcher::IndexSearcher;
    use crate::search::sort::{SortField, SortType};

    const DOCS: [(&str, &str); 5] = [
        ("cat", "3"),
        ("bird", "9"),
        ("cat dog", "1"),
        ("dog", "4"),
        ("cat", "2"),
    ];

    fn index(docs: &[(&str, &str)]) -> Arc<dyn Searcher> {
        let mut index = MemoryIndex::new();
        for &(body, rank) in docs {
            index.add_document(&[("body", body), ("rank", rank)]).unwrap();
        }
        Arc::new(IndexSearcher::new(Arc::new(index)))
    }

    /// The same documents split over two searchers with an empty one between.
    fn split() -> MultiSearcher {
        MultiSearcher::new(vec![index(&DOCS[..2]), index(&[]), index(&DOCS[2..])])
    }

    fn single() -> Arc<dyn Searcher> {
        index(&DOCS)
    }

    #[test]
    fn test_routing() {
        let multi = split();
        assert_eq!(multi.starts(), &[0, 2, 2, 5]);
        assert_eq!(multi.max_doc(), 5);
        assert_eq!(multi.sub_searcher(0).unwrap(), (0, 0));
        assert_eq!(multi.sub_searcher(1).unwrap(), (0, 1));
        assert_eq!(multi.sub_searcher(2).unwrap(), (2, 0));
        assert_eq!(multi.sub_searcher(4).unwrap(), (2, 2));
        assert!(matches!(
            multi.sub_searcher(5),
            Err(GlaiveError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_global_doc_freq() {
        let multi = split();
        assert_eq!(multi.doc_freq(&Term::new("body", "cat")), 3);
        assert_eq!(multi.doc_freq(&Term::new("body", "dog")), 2);
        assert_eq!(multi.doc_freq(&Term::new("body", "eel")), 0);
    }

    #[test]
    fn test_scores_match_single_index() {
        let multi = split();
        let single = single();
        let queries: Vec<Query> = vec![
            TermQuery::new("body", "cat").into(),
            BooleanQuery::new()
                .should(TermQuery::new("body", "cat"))
                .should(TermQuery::new("body", "dog"))
                .into(),
            BooleanQuery::new()
                .must(TermQuery::new("body", "cat"))
                .must_not(TermQuery::new("body", "dog"))
                .into(),
        ];
        for q in &queries {
            let expected = single.search(q, &SearchRequest::new()).unwrap();
            let actual = multi.search(q, &SearchRequest::new()).unwrap();
            assert_eq!(actual.total_hits, expected.total_hits, "{q}");
            assert_eq!(actual.docs(), expected.docs(), "{q}");
            for (a, e) in actual.hits.iter().zip(&expected.hits) {
                assert!((a.score - e.score).abs() < 1e-6, "{q}");
            }
            assert!((actual.max_score - expected.max_score).abs() < 1e-6);
        }
    }

    #[test]
    fn test_paging_sorting_and_filters() {
        let multi = split();
        let cat: Query = TermQuery::new("body", "cat").into();

        let page = multi
            .search(&cat, &SearchRequest::new().first_doc(1).num_docs(1))
            .unwrap();
        assert_eq!(page.total_hits, 3);
        assert_eq!(page.docs(), vec![4]);

        let by_rank = Sort::new(vec![SortField::new("rank", SortType::Integer)]);
        let sorted = multi
            .search(&cat, &SearchRequest::new().sort(by_rank))
            .unwrap();
        assert_eq!(sorted.docs(), vec![2, 4, 0]);

        let filtered = multi
            .search(
                &cat,
                &SearchRequest::new().filter(QueryFilter::new(TermQuery::new("body", "dog"))),
            )
            .unwrap();
        assert_eq!(filtered.docs(), vec![2]);

        assert!(multi.search(&cat, &SearchRequest::new().num_docs(0)).is_err());
    }

    #[test]
    fn test_search_each_and_explain() {
        let multi = split();
        let cat: Query = TermQuery::new("body", "cat").into();
        let mut docs = Vec::new();
        multi
            .search_each(&cat, None, None, &mut |doc, _| docs.push(doc))
            .unwrap();
        assert_eq!(docs, vec![0, 2, 4]);

        let top = multi.search(&cat, &SearchRequest::new()).unwrap();
        for hit in &top.hits {
            let explanation = multi.explain(&cat, hit.doc).unwrap();
            assert!((explanation.value - hit.score).abs() < 1e-5);
        }
        assert!(multi.explain(&cat, 9).is_err());
    }

    #[test]
    fn test_highlight_routes_to_owner() {
        let multi = split();
        let dog: Query = TermQuery::new("body", "dog").into();
        assert_eq!(
            multi.field_text(2, "body").unwrap().as_deref(),
            Some("cat dog")
        );
        assert_eq!(
            multi.highlight(&dog, 2, "body", &HighlightOptions::default()).unwrap(),
            Some(vec!["cat <b>dog</b>".to_string()])
        );
    }
}
