//! Searchers: executing queries against readers.
//!
//! The [`Searcher`] trait is what queries and weights see while they are being
//! bound: document frequencies, the document count and the similarity. The
//! same trait also carries the search entry points, so an [`IndexSearcher`]
//! over one reader and a [`MultiSearcher`] over several can be used
//! interchangeably.
//!
//! [`MultiSearcher`]: crate::search::multi_searcher::MultiSearcher

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{GlaiveError, Result};
use crate::lexical::DocId;
use crate::lexical::reader::IndexReader;
use crate::lexical::term::Term;
use crate::lexical::term_vector::TermVector;
use crate::query::weight::{Weight, build_weight};
use crate::query::{Query, rewrite_fully};
use crate::search::SearchConfig;
use crate::search::explanation::Explanation;
use crate::search::filter::Filter;
use crate::search::highlight::{self, HighlightOptions, MatchVector};
use crate::search::similarity::{DefaultSimilarity, Similarity};
use crate::search::sort::{FieldCache, Sort, SortField, Sorter, compare_hits};
use crate::search::top_docs::{Hit, TopDocs};
use crate::util::priority_queue::PriorityQueue;

/// A per-hit predicate over `(doc, score)`. Documents it rejects are neither
/// counted nor returned.
pub type FilterFn = dyn Fn(DocId, f32) -> bool + Send + Sync;

/// Which slice of the results to return, and how to order and restrict them.
#[derive(Clone, Default)]
pub struct SearchRequest {
    first_doc: usize,
    num_docs: Option<usize>,
    filter: Option<Arc<dyn Filter>>,
    sort: Option<Sort>,
    filter_fn: Option<Arc<FilterFn>>,
}

impl fmt::Debug for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchRequest")
            .field("first_doc", &self.first_doc)
            .field("num_docs", &self.num_docs)
            .field("filter", &self.filter.as_ref().map(|f| f.description()))
            .field("sort", &self.sort)
            .field("filter_fn", &self.filter_fn.is_some())
            .finish()
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        SearchRequest::default()
    }

    /// Skip this many of the best hits.
    pub fn first_doc(mut self, first_doc: usize) -> Self {
        self.first_doc = first_doc;
        self
    }

    /// Return at most this many hits. Defaults to
    /// [`SearchConfig::num_docs`].
    pub fn num_docs(mut self, num_docs: usize) -> Self {
        self.num_docs = Some(num_docs);
        self
    }

    pub fn filter<F: Filter + 'static>(self, filter: F) -> Self {
        self.filter_arc(Arc::new(filter))
    }

    pub fn filter_arc(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn filter_fn<F>(mut self, filter_fn: F) -> Self
    where
        F: Fn(DocId, f32) -> bool + Send + Sync + 'static,
    {
        self.filter_fn = Some(Arc::new(filter_fn));
        self
    }

    pub fn get_first_doc(&self) -> usize {
        self.first_doc
    }

    pub fn get_filter(&self) -> Option<&dyn Filter> {
        self.filter.as_deref()
    }

    pub fn get_sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn get_filter_fn(&self) -> Option<&FilterFn> {
        self.filter_fn.as_deref()
    }

    /// The number of hits to return, validated.
    pub(crate) fn resolved_num_docs(&self, config: &SearchConfig) -> Result<usize> {
        let num_docs = self.num_docs.unwrap_or(config.num_docs);
        if num_docs == 0 {
            return Err(GlaiveError::invalid_argument(
                "num_docs was set to 0 but should be greater than 0",
            ));
        }
        Ok(num_docs)
    }

    /// The same request without paging, asking for `num_docs` hits.
    pub(crate) fn unpaged(&self, num_docs: usize) -> SearchRequest {
        SearchRequest {
            first_doc: 0,
            num_docs: Some(num_docs),
            ..self.clone()
        }
    }
}

pub trait Searcher: Send + Sync + fmt::Debug {
    /// Number of documents containing `term`.
    fn doc_freq(&self, term: &Term) -> u64;

    fn max_doc(&self) -> u64;

    fn similarity(&self) -> Arc<dyn Similarity>;

    fn config(&self) -> &SearchConfig;

    /// Rewrite `query` until it stops changing.
    fn rewrite(&self, query: &Query) -> Result<Query>;

    /// Rewrite `query` and bind it to this searcher's statistics.
    fn create_weight(&self, query: &Query) -> Result<Box<dyn Weight>>;

    /// Search with a weight built by [`Searcher::create_weight`].
    fn search_w(&self, weight: &dyn Weight, request: &SearchRequest) -> Result<TopDocs>;

    fn search(&self, query: &Query, request: &SearchRequest) -> Result<TopDocs> {
        let weight = self.create_weight(query)?;
        self.search_w(weight.as_ref(), request)
    }

    /// Visit every match in document order.
    fn search_each_w(
        &self,
        weight: &dyn Weight,
        filter: Option<&dyn Filter>,
        filter_fn: Option<&FilterFn>,
        visitor: &mut dyn FnMut(DocId, f32),
    ) -> Result<()>;

    fn search_each(
        &self,
        query: &Query,
        filter: Option<&dyn Filter>,
        filter_fn: Option<&FilterFn>,
        visitor: &mut dyn FnMut(DocId, f32),
    ) -> Result<()> {
        let weight = self.create_weight(query)?;
        self.search_each_w(weight.as_ref(), filter, filter_fn, visitor)
    }

    fn explain_w(&self, weight: &dyn Weight, doc: DocId) -> Result<Explanation>;

    fn explain(&self, query: &Query, doc: DocId) -> Result<Explanation> {
        let weight = self.create_weight(query)?;
        self.explain_w(weight.as_ref(), doc)
    }

    fn term_vector(&self, doc: DocId, field: &str) -> Result<Option<TermVector>>;

    fn field_text(&self, doc: DocId, field: &str) -> Result<Option<String>>;

    /// The token-position ranges `query` matches in `field` of `doc`.
    fn match_vector(&self, query: &Query, doc: DocId, field: &str) -> Result<MatchVector> {
        let mut mv = MatchVector::new();
        let Some(tv) = self.term_vector(doc, field)? else {
            return Ok(mv);
        };
        if tv.terms.first().is_none_or(|t| t.positions.is_empty()) {
            return Ok(mv);
        }
        self.rewrite(query)?.match_vector(&tv, &mut mv)?;
        Ok(mv)
    }

    /// Excerpts of `field` of `doc` with the matches of `query` marked.
    ///
    /// `None` when the field has no term vector with positions and offsets or
    /// no stored text.
    fn highlight(
        &self,
        query: &Query,
        doc: DocId,
        field: &str,
        options: &HighlightOptions,
    ) -> Result<Option<Vec<String>>> {
        let Some(tv) = self.term_vector(doc, field)? else {
            return Ok(None);
        };
        let Some(text) = self.field_text(doc, field)? else {
            return Ok(None);
        };
        if tv.offsets.is_empty() || tv.terms.first().is_none_or(|t| t.positions.is_empty()) {
            return Ok(None);
        }
        let mut mv = MatchVector::new();
        self.rewrite(query)?.match_vector(&tv, &mut mv)?;
        Ok(Some(highlight::highlight(mv, &tv, &text, options)))
    }
}

/// Keeps the best `capacity` hits under `fields`.
pub(crate) fn hit_queue(
    capacity: usize,
    fields: &[SortField],
) -> PriorityQueue<Hit, impl Fn(&Hit, &Hit) -> bool + '_> {
    PriorityQueue::new(capacity, move |a: &Hit, b: &Hit| {
        compare_hits(fields, a, b) == Ordering::Greater
    })
}

/// Take the requested page out of a hit queue.
pub(crate) fn drain_page<F>(queue: PriorityQueue<Hit, F>, first_doc: usize, num_docs: usize) -> Vec<Hit>
where
    F: Fn(&Hit, &Hit) -> bool,
{
    queue
        .into_sorted_desc()
        .into_iter()
        .skip(first_doc)
        .take(num_docs)
        .collect()
}

fn search_reader(
    reader: &dyn IndexReader,
    config: &SearchConfig,
    cache: &FieldCache,
    weight: &dyn Weight,
    request: &SearchRequest,
) -> Result<TopDocs> {
    let num_docs = request.resolved_num_docs(config)?;
    let Some(mut scorer) = weight.scorer(reader)? else {
        return Ok(TopDocs::empty());
    };
    if reader.num_docs() == 0 {
        return Ok(TopDocs::empty());
    }

    let bits = request.filter.as_ref().map(|f| f.bits(reader)).transpose()?;
    let sorter = request
        .sort
        .as_ref()
        .map(|sort| Sorter::new(sort, reader, cache))
        .transpose()?;
    let relevance = Sort::default();
    let fields = sorter.as_ref().map_or(relevance.fields(), |s| s.fields());
    let mut queue = hit_queue(request.first_doc.saturating_add(num_docs), fields);

    let mut total_hits = 0;
    let mut max_score = 0.0f32;
    while scorer.next()? {
        let doc = scorer.doc();
        if bits.as_ref().is_some_and(|bits| !bits.get(doc as usize)) {
            continue;
        }
        let score = scorer.score()?;
        if request.filter_fn.as_ref().is_some_and(|f| !f(doc, score)) {
            continue;
        }
        total_hits += 1;
        max_score = max_score.max(score);
        let mut hit = Hit::new(doc, score);
        if let Some(sorter) = &sorter {
            sorter.fill(&mut hit);
        }
        queue.insert(hit);
    }

    Ok(TopDocs {
        total_hits,
        hits: drain_page(queue, request.first_doc, num_docs),
        max_score,
    })
}

fn search_each_reader(
    reader: &dyn IndexReader,
    weight: &dyn Weight,
    filter: Option<&dyn Filter>,
    filter_fn: Option<&FilterFn>,
    visitor: &mut dyn FnMut(DocId, f32),
) -> Result<()> {
    let Some(mut scorer) = weight.scorer(reader)? else {
        return Ok(());
    };
    let bits = filter.map(|f| f.bits(reader)).transpose()?;
    while scorer.next()? {
        let doc = scorer.doc();
        if bits.as_ref().is_some_and(|bits| !bits.get(doc as usize)) {
            continue;
        }
        let score = scorer.score()?;
        if filter_fn.is_some_and(|f| !f(doc, score)) {
            continue;
        }
        visitor(doc, score);
    }
    Ok(())
}

/// Searches one index reader.
#[derive(Debug)]
pub struct IndexSearcher {
    reader: Arc<dyn IndexReader>,
    config: SearchConfig,
    similarity: Arc<dyn Similarity>,
    field_cache: FieldCache,
}

impl IndexSearcher {
    pub fn new(reader: Arc<dyn IndexReader>) -> Self {
        IndexSearcher {
            reader,
            config: SearchConfig::default(),
            similarity: Arc::new(DefaultSimilarity),
            field_cache: FieldCache::new(),
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

    pub fn reader(&self) -> &dyn IndexReader {
        self.reader.as_ref()
    }

    pub fn reader_arc(&self) -> &Arc<dyn IndexReader> {
        &self.reader
    }

    pub fn field_cache(&self) -> &FieldCache {
        &self.field_cache
    }
}

impl Searcher for IndexSearcher {
    fn doc_freq(&self, term: &Term) -> u64 {
        self.reader.doc_freq(term)
    }

    fn max_doc(&self) -> u64 {
        self.reader.max_doc()
    }

    fn similarity(&self) -> Arc<dyn Similarity> {
        Arc::clone(&self.similarity)
    }

    fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn rewrite(&self, query: &Query) -> Result<Query> {
        rewrite_fully(query, self.reader(), &self.config)
    }

    fn create_weight(&self, query: &Query) -> Result<Box<dyn Weight>> {
        build_weight(query, self)
    }

    fn search_w(&self, weight: &dyn Weight, request: &SearchRequest) -> Result<TopDocs> {
        search_reader(self.reader(), &self.config, &self.field_cache, weight, request)
    }

    fn search_each_w(
        &self,
        weight: &dyn Weight,
        filter: Option<&dyn Filter>,
        filter_fn: Option<&FilterFn>,
        visitor: &mut dyn FnMut(DocId, f32),
    ) -> Result<()> {
        search_each_reader(self.reader(), weight, filter, filter_fn, visitor)
    }

    fn explain_w(&self, weight: &dyn Weight, doc: DocId) -> Result<Explanation> {
        weight.explain(self.reader(), doc)
    }

    fn term_vector(&self, doc: DocId, field: &str) -> Result<Option<TermVector>> {
        self.reader.term_vector(doc, field)
    }

    fn field_text(&self, doc: DocId, field: &str) -> Result<Option<String>> {
        self.reader.field_text(doc, field)
    }
}

/// A searcher over a borrowed reader, used while computing filters and other
/// per-reader state.
#[derive(Debug)]
pub struct LeafSearcher<'a> {
    reader: &'a dyn IndexReader,
    config: &'a SearchConfig,
    similarity: Arc<dyn Similarity>,
    field_cache: FieldCache,
}

impl<'a> LeafSearcher<'a> {
    pub fn new(reader: &'a dyn IndexReader, config: &'a SearchConfig) -> Self {
        LeafSearcher {
            reader,
            config,
            similarity: Arc::new(DefaultSimilarity),
            field_cache: FieldCache::new(),
        }
    }
}

impl Searcher for LeafSearcher<'_> {
    fn doc_freq(&self, term: &Term) -> u64 {
        self.reader.doc_freq(term)
    }

    fn max_doc(&self) -> u64 {
        self.reader.max_doc()
    }

    fn similarity(&self) -> Arc<dyn Similarity> {
        Arc::clone(&self.similarity)
    }

    fn config(&self) -> &SearchConfig {
        self.config
    }

    fn rewrite(&self, query: &Query) -> Result<Query> {
        rewrite_fully(query, self.reader, self.config)
    }

    fn create_weight(&self, query: &Query) -> Result<Box<dyn Weight>> {
        build_weight(query, self)
    }

    fn search_w(&self, weight: &dyn Weight, request: &SearchRequest) -> Result<TopDocs> {
        search_reader(self.reader, self.config, &self.field_cache, weight, request)
    }

    fn search_each_w(
        &self,
        weight: &dyn Weight,
        filter: Option<&dyn Filter>,
        filter_fn: Option<&FilterFn>,
        visitor: &mut dyn FnMut(DocId, f32),
    ) -> Result<()> {
        search_each_reader(self.reader, weight, filter, filter_fn, visitor)
    }

    fn explain_w(&self, weight: &dyn Weight, doc: DocId) -> Result<Explanation> {
        weight.explain(self.reader, doc)
    }

    fn term_vector(&self, doc: DocId, field: &str) -> Result<Option<TermVector>> {
        self.reader.term_vector(doc, field)
    }

    fn field_text(&self, doc: DocId, field: &str) -> Result<Option<String>> {
        self.reader.field_text(doc, field)
    }
}

/// Serves precomputed document frequencies while a weight is normalized
/// across several searchers. Nothing else is available.
#[derive(Debug)]
pub(crate) struct CachedDfSearcher {
    doc_freqs: AHashMap<Term, u64>,
    max_doc: u64,
    similarity: Arc<dyn Similarity>,
    config: SearchConfig,
}

impl CachedDfSearcher {
    pub fn new(
        doc_freqs: AHashMap<Term, u64>,
        max_doc: u64,
        similarity: Arc<dyn Similarity>,
        config: SearchConfig,
    ) -> Self {
        CachedDfSearcher {
            doc_freqs,
            max_doc,
            similarity,
            config,
        }
    }
}

fn cached_df_unsupported<T>(operation: &str) -> Result<T> {
    Err(GlaiveError::unsupported(format!(
        "{operation} is not available on a cached document frequency searcher"
    )))
}

impl Searcher for CachedDfSearcher {
    fn doc_freq(&self, term: &Term) -> u64 {
        self.doc_freqs.get(term).copied().unwrap_or(0)
    }

    fn max_doc(&self) -> u64 {
        self.max_doc
    }

    fn similarity(&self) -> Arc<dyn Similarity> {
        Arc::clone(&self.similarity)
    }

    fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Queries reach this searcher already rewritten.
    fn rewrite(&self, query: &Query) -> Result<Query> {
        Ok(query.clone())
    }

    fn create_weight(&self, _query: &Query) -> Result<Box<dyn Weight>> {
        cached_df_unsupported("create_weight")
    }

    fn search_w(&self, _weight: &dyn Weight, _request: &SearchRequest) -> Result<TopDocs> {
        cached_df_unsupported("search")
    }

    fn search(&self, _query: &Query, _request: &SearchRequest) -> Result<TopDocs> {
        cached_df_unsupported("search")
    }

    fn search_each_w(
        &self,
        _weight: &dyn Weight,
        _filter: Option<&dyn Filter>,
        _filter_fn: Option<&FilterFn>,
        _visitor: &mut dyn FnMut(DocId, f32),
    ) -> Result<()> {
        cached_df_unsupported("search_each")
    }

    fn explain_w(&self, _weight: &dyn Weight, _doc: DocId) -> Result<Explanation> {
        cached_df_unsupported("explain")
    }

    fn term_vector(&self, _doc: DocId, _field: &str) -> Result<Option<TermVector>> {
        cached_df_unsupported("term_vector")
    }

    fn field_text(&self, _doc: DocId, _field: &str) -> Result<Option<String>> {
        cached_df_unsupported("field_text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::memory::MemoryIndex;
    use crate::query::boolean::BooleanQuery;
    use crate::query::phrase::PhraseQuery;
    use crate::query::term::TermQuery;
    use crate::search::filter::QueryFilter;
    use crate::search::sort::{SortType, SortValue};

    fn searcher() -> IndexSearcher {
        let mut index = MemoryIndex::new();
        for (body, rank) in [
            ("cat", "3"),
            ("bird", "9"),
            ("cat dog", "1"),
            ("dog", "4"),
            ("cat", "2"),
        ] {
            index.add_document(&[("body", body), ("rank", rank)]).unwrap();
        }
        IndexSearcher::new(Arc::new(index))
    }

    fn cat() -> Query {
        TermQuery::new("body", "cat").into()
    }

    #[test]
    fn test_relevance_order_and_paging() {
        let s = searcher();
        let top = s.search(&cat(), &SearchRequest::new()).unwrap();
        assert_eq!(top.total_hits, 3);
        assert_eq!(top.docs(), vec![0, 4, 2]);
        assert_eq!(top.max_score, top.hits[0].score);
        assert!(top.hits[0].sort_values.is_empty());

        let page = s
            .search(&cat(), &SearchRequest::new().first_doc(1).num_docs(1))
            .unwrap();
        assert_eq!(page.total_hits, 3);
        assert_eq!(page.docs(), vec![4]);

        let past_end = s
            .search(&cat(), &SearchRequest::new().first_doc(5))
            .unwrap();
        assert_eq!(past_end.total_hits, 3);
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_invalid_num_docs() {
        let s = searcher();
        let err = s
            .search(&cat(), &SearchRequest::new().num_docs(0))
            .unwrap_err();
        assert!(matches!(err, GlaiveError::InvalidArgument(_)));
    }

    #[test]
    fn test_no_matches_is_not_an_error() {
        let s = searcher();
        let q: Query = TermQuery::new("body", "zebra").into();
        let top = s.search(&q, &SearchRequest::new()).unwrap();
        assert_eq!(top.total_hits, 0);
        assert!(top.is_empty());
    }

    #[test]
    fn test_filters() {
        let s = searcher();
        let request = SearchRequest::new().filter(QueryFilter::new(TermQuery::new("body", "dog")));
        let top = s.search(&cat(), &request).unwrap();
        assert_eq!(top.docs(), vec![2]);
        assert_eq!(top.total_hits, 1);

        let request = SearchRequest::new().filter_fn(|doc, _score| doc != 0);
        let top = s.search(&cat(), &request).unwrap();
        assert_eq!(top.docs(), vec![4, 2]);
        assert_eq!(top.total_hits, 2);
    }

    #[test]
    fn test_sorted_search() {
        let s = searcher();
        let by_rank = Sort::new(vec![SortField::new("rank", SortType::Integer)]);
        let top = s
            .search(&cat(), &SearchRequest::new().sort(by_rank))
            .unwrap();
        assert_eq!(top.docs(), vec![2, 4, 0]);
        assert_eq!(top.hits[0].sort_values, vec![SortValue::Int(1)]);

        let reversed = Sort::new(vec![SortField::new("rank", SortType::Integer).reversed()]);
        let top = s.search(&cat(), &SearchRequest::new().sort(reversed)).unwrap();
        assert_eq!(top.docs(), vec![0, 4, 2]);

        let missing = Sort::new(vec![SortField::new("colour", SortType::String)]);
        assert!(s.search(&cat(), &SearchRequest::new().sort(missing)).is_err());
    }

    #[test]
    fn test_search_each_visits_in_doc_order() {
        let s = searcher();
        let q: Query = BooleanQuery::new()
            .should(TermQuery::new("body", "cat"))
            .should(TermQuery::new("body", "dog"))
            .into();
        let mut seen = Vec::new();
        s.search_each(&q, None, None, &mut |doc, score| seen.push((doc, score)))
            .unwrap();
        let docs: Vec<DocId> = seen.iter().map(|&(doc, _)| doc).collect();
        assert_eq!(docs, vec![0, 2, 3, 4]);
        assert!(seen.iter().all(|&(_, score)| score > 0.0));
    }

    #[test]
    fn test_explain_matches_score() {
        let s = searcher();
        let top = s.search(&cat(), &SearchRequest::new()).unwrap();
        for hit in &top.hits {
            let explanation = s.explain(&cat(), hit.doc).unwrap();
            assert!((explanation.value - hit.score).abs() < 1e-5);
        }
        assert!(!s.explain(&cat(), 1).unwrap().is_match());
    }

    #[test]
    fn test_highlight_and_match_vector() {
        let mut index = MemoryIndex::new();
        index
            .add_document(&[("body", "The quick brown fox")])
            .unwrap();
        let s = IndexSearcher::new(Arc::new(index));

        let q: Query = TermQuery::new("body", "quick").into();
        assert_eq!(
            s.highlight(&q, 0, "body", &HighlightOptions::default()).unwrap(),
            Some(vec!["The <b>quick</b> brown fox".to_string()])
        );
        assert_eq!(
            s.highlight(&q, 0, "title", &HighlightOptions::default()).unwrap(),
            None
        );

        let phrase: Query = PhraseQuery::new("body").term("quick", 1).term("brown", 1).into();
        let mv = s.match_vector(&phrase, 0, "body").unwrap();
        let ranges: Vec<(usize, usize)> = mv.ranges().iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(ranges, vec![(1, 2)]);
        let options = HighlightOptions::new().tags("[", "]");
        assert_eq!(
            s.highlight(&phrase, 0, "body", &options).unwrap(),
            Some(vec!["The [quick brown] fox".to_string()])
        );
    }

    #[test]
    fn test_cached_df_searcher_only_serves_statistics() {
        let mut doc_freqs = AHashMap::new();
        doc_freqs.insert(Term::new("body", "cat"), 7);
        let cdf = CachedDfSearcher::new(
            doc_freqs,
            20,
            Arc::new(DefaultSimilarity),
            SearchConfig::default(),
        );
        assert_eq!(cdf.doc_freq(&Term::new("body", "cat")), 7);
        assert_eq!(cdf.doc_freq(&Term::new("body", "dog")), 0);
        assert_eq!(cdf.max_doc(), 20);
        assert_eq!(cdf.rewrite(&cat()).unwrap(), cat());

        let unsupported = |r: Result<()>| matches!(r, Err(GlaiveError::UnsupportedOperation(_)));
        assert!(unsupported(cdf.create_weight(&cat()).map(|_| ())));
        assert!(unsupported(cdf.search(&cat(), &SearchRequest::new()).map(|_| ())));
        assert!(unsupported(cdf.explain(&cat(), 0).map(|_| ())));
        assert!(unsupported(cdf.term_vector(0, "body").map(|_| ())));
        assert!(unsupported(
            cdf.search_each(&cat(), None, None, &mut |_, _| {})
        ));

        // a weight built against the cached statistics scores with them
        let weight = build_weight(&cat(), &cdf).unwrap();
        assert!(weight.value() > 0.0);
    }
}
