//! Span queries.
//!
//! Span queries match position ranges rather than whole documents. Every
//! span query produces a [`SpanEnum`], a cursor over `(doc, start, end)`
//! triples ordered by document and then start position, with `end`
//! exclusive. Composite span queries combine the cursors of their clauses,
//! and all clauses of a composite must share one field.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{GlaiveError, Result};
use crate::lexical::DocId;
use crate::lexical::reader::{IndexReader, TermDocEnum};
use crate::lexical::term::Term;
use crate::lexical::term_vector::{TermVector, TermVectorReader};
use crate::query::multi_term::MultiTermDocEnum;
use crate::query::scorer::{DocCursor, NO_MORE_DOCS, Scorer, ScorerKind};
use crate::query::weight::{Weight, WeightCore};
use crate::query::{Query, boost_suffix};
use crate::search::explanation::Explanation;
use crate::search::highlight::MatchVector;
use crate::search::searcher::Searcher;
use crate::search::similarity::Similarity;
use crate::search::{DEFAULT_MAX_TERMS, SearchConfig};
use crate::util::priority_queue::PriorityQueue;

fn check_field(expected: &str, clause: &SpanQuery, owner: &str) -> Result<()> {
    if clause.field() != expected {
        return Err(GlaiveError::invalid_argument(format!(
            "all clauses in a span query must have the same field: tried to add a clause \
             on field \"{}\" to a {owner} on field \"{expected}\"",
            clause.field()
        )));
    }
    Ok(())
}

/// Matches every position of a single term.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanTermQuery {
    term: Term,
    boost: f32,
}

impl SpanTermQuery {
    pub fn new<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        SpanTermQuery {
            term: Term::new(field, text),
            boost: 1.0,
        }
    }

    pub fn term(&self) -> &Term {
        &self.term
    }
}

/// Matches every position of any of a bounded set of terms.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanMultiTermQuery {
    field: String,
    terms: Vec<String>,
    max_terms: usize,
    boost: f32,
}

impl SpanMultiTermQuery {
    pub fn new<F: Into<String>>(field: F) -> Self {
        SpanMultiTermQuery {
            field: field.into(),
            terms: Vec::new(),
            max_terms: DEFAULT_MAX_TERMS,
            boost: 1.0,
        }
    }

    pub fn with_max_terms<F: Into<String>>(field: F, max_terms: usize) -> Result<Self> {
        if max_terms == 0 {
            return Err(GlaiveError::invalid_argument("max_terms must be at least 1"));
        }
        let mut query = SpanMultiTermQuery::new(field);
        query.max_terms = max_terms;
        Ok(query)
    }

    /// Add a term. Terms past `max_terms` are ignored.
    pub fn add_term<T: Into<String>>(&mut self, text: T) {
        if self.terms.len() < self.max_terms {
            self.terms.push(text.into());
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

/// Matches every position of any term starting with a prefix. Rewrites to a
/// [`SpanMultiTermQuery`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpanPrefixQuery {
    field: String,
    prefix: String,
    max_terms: usize,
    boost: f32,
}

impl SpanPrefixQuery {
    pub fn new<F: Into<String>, P: Into<String>>(field: F, prefix: P) -> Self {
        SpanPrefixQuery {
            field: field.into(),
            prefix: prefix.into(),
            max_terms: DEFAULT_MAX_TERMS,
            boost: 1.0,
        }
    }

    pub fn with_max_terms(mut self, max_terms: usize) -> Result<Self> {
        if max_terms == 0 {
            return Err(GlaiveError::invalid_argument("max_terms must be at least 1"));
        }
        self.max_terms = max_terms;
        Ok(self)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn rewrite(&self, reader: &dyn IndexReader) -> Result<SpanMultiTermQuery> {
        let mut multi = SpanMultiTermQuery::with_max_terms(self.field.clone(), self.max_terms)?;
        multi.boost = self.boost;
        if reader.has_field(&self.field) {
            let mut terms = reader.terms_from(&self.field, &self.prefix)?;
            while terms.next()? {
                if !terms.term().starts_with(self.prefix.as_str()) {
                    break;
                }
                multi.add_term(terms.term());
            }
        }
        Ok(multi)
    }
}

/// Matches spans of `inner` ending at or before position `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanFirstQuery {
    inner: Box<SpanQuery>,
    end: u32,
    boost: f32,
}

impl SpanFirstQuery {
    pub fn new<Q: Into<SpanQuery>>(inner: Q, end: u32) -> Self {
        SpanFirstQuery {
            inner: Box::new(inner.into()),
            end,
            boost: 1.0,
        }
    }

    pub fn inner(&self) -> &SpanQuery {
        &self.inner
    }

    pub fn end(&self) -> u32 {
        self.end
    }
}

/// Matches the union of its clauses' spans.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanOrQuery {
    clauses: Vec<SpanQuery>,
    boost: f32,
}

impl SpanOrQuery {
    pub fn new() -> Self {
        SpanOrQuery {
            clauses: Vec::new(),
            boost: 1.0,
        }
    }

    pub fn add_clause<Q: Into<SpanQuery>>(&mut self, clause: Q) -> Result<()> {
        let clause = clause.into();
        if let Some(first) = self.clauses.first() {
            check_field(first.field(), &clause, "SpanOrQuery")?;
        }
        self.clauses.push(clause);
        Ok(())
    }

    pub fn clause<Q: Into<SpanQuery>>(mut self, clause: Q) -> Result<Self> {
        self.add_clause(clause)?;
        Ok(self)
    }

    pub fn clauses(&self) -> &[SpanQuery] {
        &self.clauses
    }
}

impl Default for SpanOrQuery {
    fn default() -> Self {
        SpanOrQuery::new()
    }
}

/// Matches spans where every clause matches within `slop` positions of the
/// others, optionally in clause order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanNearQuery {
    clauses: Vec<SpanQuery>,
    slop: u32,
    in_order: bool,
    boost: f32,
}

impl SpanNearQuery {
    pub fn new(slop: u32, in_order: bool) -> Self {
        SpanNearQuery {
            clauses: Vec::new(),
            slop,
            in_order,
            boost: 1.0,
        }
    }

    pub fn add_clause<Q: Into<SpanQuery>>(&mut self, clause: Q) -> Result<()> {
        let clause = clause.into();
        if let Some(first) = self.clauses.first() {
            check_field(first.field(), &clause, "SpanNearQuery")?;
        }
        self.clauses.push(clause);
        Ok(())
    }

    pub fn clause<Q: Into<SpanQuery>>(mut self, clause: Q) -> Result<Self> {
        self.add_clause(clause)?;
        Ok(self)
    }

    pub fn clauses(&self) -> &[SpanQuery] {
        &self.clauses
    }

    pub fn slop(&self) -> u32 {
        self.slop
    }

    pub fn in_order(&self) -> bool {
        self.in_order
    }
}

/// Matches spans of `inc` that do not overlap any span of `exc`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanNotQuery {
    inc: Box<SpanQuery>,
    exc: Box<SpanQuery>,
    boost: f32,
}

impl SpanNotQuery {
    pub fn new<I: Into<SpanQuery>, E: Into<SpanQuery>>(inc: I, exc: E) -> Result<Self> {
        let inc = inc.into();
        let exc = exc.into();
        check_field(inc.field(), &exc, "SpanNotQuery")?;
        Ok(SpanNotQuery {
            inc: Box::new(inc),
            exc: Box::new(exc),
            boost: 1.0,
        })
    }

    pub fn include(&self) -> &SpanQuery {
        &self.inc
    }

    pub fn exclude(&self) -> &SpanQuery {
        &self.exc
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpanQuery {
    Term(SpanTermQuery),
    MultiTerm(SpanMultiTermQuery),
    Prefix(SpanPrefixQuery),
    First(SpanFirstQuery),
    Or(SpanOrQuery),
    Near(SpanNearQuery),
    Not(SpanNotQuery),
}

macro_rules! span_boost {
    ($self:expr, $q:ident => $body:expr) => {
        match $self {
            SpanQuery::Term($q) => $body,
            SpanQuery::MultiTerm($q) => $body,
            SpanQuery::Prefix($q) => $body,
            SpanQuery::First($q) => $body,
            SpanQuery::Or($q) => $body,
            SpanQuery::Near($q) => $body,
            SpanQuery::Not($q) => $body,
        }
    };
}

impl SpanQuery {
    /// The field every clause of this query searches. Empty for a composite
    /// without clauses.
    pub fn field(&self) -> &str {
        match self {
            SpanQuery::Term(q) => &q.term.field,
            SpanQuery::MultiTerm(q) => &q.field,
            SpanQuery::Prefix(q) => &q.field,
            SpanQuery::First(q) => q.inner.field(),
            SpanQuery::Or(q) => q.clauses.first().map_or("", |c| c.field()),
            SpanQuery::Near(q) => q.clauses.first().map_or("", |c| c.field()),
            SpanQuery::Not(q) => q.inc.field(),
        }
    }

    pub fn boost(&self) -> f32 {
        span_boost!(self, q => q.boost)
    }

    pub fn set_boost(&mut self, boost: f32) {
        span_boost!(self, q => q.boost = boost)
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.set_boost(boost);
        self
    }

    pub(crate) fn rewrite(
        &self,
        reader: &dyn IndexReader,
        config: &SearchConfig,
    ) -> Result<SpanQuery> {
        let rewrite_all = |clauses: &[SpanQuery]| -> Result<Vec<SpanQuery>> {
            clauses.iter().map(|c| c.rewrite(reader, config)).collect()
        };
        Ok(match self {
            SpanQuery::Term(_) | SpanQuery::MultiTerm(_) => self.clone(),
            SpanQuery::Prefix(q) => SpanQuery::MultiTerm(q.rewrite(reader)?),
            SpanQuery::First(q) => SpanQuery::First(SpanFirstQuery {
                inner: Box::new(q.inner.rewrite(reader, config)?),
                ..q.clone()
            }),
            SpanQuery::Or(q) => SpanQuery::Or(SpanOrQuery {
                clauses: rewrite_all(&q.clauses)?,
                boost: q.boost,
            }),
            SpanQuery::Near(q) => SpanQuery::Near(SpanNearQuery {
                clauses: rewrite_all(&q.clauses)?,
                ..q.clone()
            }),
            SpanQuery::Not(q) => SpanQuery::Not(SpanNotQuery {
                inc: Box::new(q.inc.rewrite(reader, config)?),
                exc: Box::new(q.exc.rewrite(reader, config)?),
                boost: q.boost,
            }),
        })
    }

    /// Terms whose positions make up the matched spans. Exclusions do not
    /// contribute.
    pub(crate) fn extract_terms(&self, terms: &mut BTreeSet<Term>) {
        match self {
            SpanQuery::Term(q) => {
                terms.insert(q.term.clone());
            }
            SpanQuery::MultiTerm(q) => {
                for text in &q.terms {
                    terms.insert(Term::new(q.field.clone(), text.clone()));
                }
            }
            SpanQuery::Prefix(_) => {}
            SpanQuery::First(q) => q.inner.extract_terms(terms),
            SpanQuery::Or(q) => q.clauses.iter().for_each(|c| c.extract_terms(terms)),
            SpanQuery::Near(q) => q.clauses.iter().for_each(|c| c.extract_terms(terms)),
            SpanQuery::Not(q) => q.inc.extract_terms(terms),
        }
    }

    /// The span cursor of this query over `reader`.
    pub(crate) fn spans(&self, reader: &dyn IndexReader) -> Result<Box<dyn SpanEnum>> {
        let spans: Box<dyn SpanEnum> = match self {
            SpanQuery::Term(q) => {
                Box::new(SpanTermEnum::new(reader.term_positions_for(&q.term)?))
            }
            SpanQuery::MultiTerm(q) => {
                let mut subs = Vec::with_capacity(q.terms.len());
                for text in &q.terms {
                    subs.push(reader.term_positions_for(&Term::new(q.field.clone(), text.clone()))?);
                }
                Box::new(SpanTermEnum::new(Box::new(MultiTermDocEnum::new(subs))))
            }
            SpanQuery::Prefix(_) => {
                return Err(GlaiveError::unsupported(format!(
                    "{self} must be rewritten before it can produce spans"
                )));
            }
            SpanQuery::First(q) => Box::new(SpanFirstEnum {
                inner: q.inner.spans(reader)?,
                end: q.end,
            }),
            SpanQuery::Or(q) => {
                let mut enums = Vec::with_capacity(q.clauses.len());
                for clause in &q.clauses {
                    enums.push(clause.spans(reader)?);
                }
                Box::new(SpanOrEnum::new(enums))
            }
            SpanQuery::Near(q) => {
                let mut enums = Vec::with_capacity(q.clauses.len());
                for clause in &q.clauses {
                    enums.push(clause.spans(reader)?);
                }
                if enums.is_empty() {
                    return Ok(Box::new(SpanOrEnum::new(enums)));
                }
                Box::new(SpanNearEnum::new(enums, q.slop, q.in_order))
            }
            SpanQuery::Not(q) => Box::new(SpanNotEnum {
                inc: q.inc.spans(reader)?,
                exc: q.exc.spans(reader)?,
                more_inc: true,
                more_exc: true,
            }),
        };
        Ok(spans)
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &dyn Searcher,
    ) -> Result<Box<dyn Weight>> {
        let mut terms = BTreeSet::new();
        self.extract_terms(&mut terms);
        let terms: Vec<Term> = terms.into_iter().collect();
        let similarity = searcher.similarity();
        let idf = similarity.idf_phrase(&terms, searcher);
        Ok(Box::new(SpanWeight {
            query: query.clone(),
            span: self.clone(),
            terms,
            core: WeightCore::new(similarity, self.boost(), idf),
        }))
    }

    /// Add the positions of this query's terms that fall inside a matched
    /// span of `tv`.
    pub(crate) fn match_vector(&self, tv: &TermVector, mv: &mut MatchVector) -> Result<()> {
        if self.field() != tv.field {
            return Ok(());
        }
        let reader = TermVectorReader::new(tv);
        let mut spans = self.spans(&reader)?;
        let mut full = MatchVector::new();
        while spans.next()? {
            let start = spans.start() as usize;
            full.add(start, (spans.end() as usize).saturating_sub(1).max(start));
        }
        full.compact();

        let mut terms = BTreeSet::new();
        self.extract_terms(&mut terms);
        for term in terms {
            let Some(tv_term) = tv.get_term(&term.text) else {
                continue;
            };
            for &pos in &tv_term.positions {
                let pos = pos as usize;
                if full.ranges().iter().any(|r| r.start <= pos && pos <= r.end) {
                    mv.add(pos, pos);
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SpanQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |clauses: &[SpanQuery]| {
            clauses
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            SpanQuery::Term(q) => write!(f, "span_terms({})", q.term)?,
            SpanQuery::MultiTerm(q) => {
                write!(f, "span_terms({}:[{}])", q.field, q.terms.join(","))?
            }
            SpanQuery::Prefix(q) => write!(f, "span_prefix({}:{}*)", q.field, q.prefix)?,
            SpanQuery::First(q) => write!(f, "span_first({}, {})", q.inner, q.end)?,
            SpanQuery::Or(q) => write!(f, "span_or[ {} ]", join(&q.clauses))?,
            SpanQuery::Near(q) => write!(f, "span_near[ {} ]", join(&q.clauses))?,
            SpanQuery::Not(q) => write!(f, "span_not(inc:<{}>, exc:<{}>)", q.inc, q.exc)?,
        }
        f.write_str(&boost_suffix(self.boost()))
    }
}

macro_rules! impl_from_span {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for SpanQuery {
                fn from(q: $ty) -> Self {
                    SpanQuery::$variant(q)
                }
            }

            impl From<$ty> for Query {
                fn from(q: $ty) -> Self {
                    Query::Span(SpanQuery::$variant(q))
                }
            }
        )*
    };
}

impl_from_span! {
    Term => SpanTermQuery,
    MultiTerm => SpanMultiTermQuery,
    Prefix => SpanPrefixQuery,
    First => SpanFirstQuery,
    Or => SpanOrQuery,
    Near => SpanNearQuery,
    Not => SpanNotQuery,
}

#[derive(Debug)]
struct SpanWeight {
    query: Query,
    span: SpanQuery,
    terms: Vec<Term>,
    core: WeightCore,
}

impl SpanWeight {
    fn span_scorer(&self, reader: &dyn IndexReader) -> Result<Option<SpanScorer>> {
        let field = self.span.field();
        if !reader.has_field(field) {
            return Ok(None);
        }
        Ok(Some(SpanScorer {
            spans: self.span.spans(reader)?,
            similarity: Arc::clone(&self.core.similarity),
            norms: reader.norms(field),
            value: self.core.value,
            first_time: true,
            more: true,
            freq: 0.0,
        }))
    }
}

impl Weight for SpanWeight {
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
            .span_scorer(reader)?
            .map(|s| Scorer::new(ScorerKind::Span(s))))
    }

    fn explain(&self, reader: &dyn IndexReader, doc: DocId) -> Result<Explanation> {
        let field = self.span.field();
        let Some(mut scorer) = self.span_scorer(reader)? else {
            return Ok(Explanation::new(
                0.0,
                format!("field \"{field}\" does not exist in the index"),
            ));
        };
        let doc_freqs: Vec<String> = self
            .terms
            .iter()
            .map(|t| format!("{}={}", t.text, reader.doc_freq(t)))
            .collect();
        let idf = format!("idf({field}: {})", doc_freqs.join(", "));

        let freq = if scorer.skip_to_doc(doc)? == Some(doc) {
            scorer.freq
        } else {
            0.0
        };
        let tf = Explanation::new(
            self.core.similarity.tf(freq),
            format!("tf(phrase_freq={freq})"),
        );
        Ok(self
            .core
            .explain_product(reader, &self.query, field, idf, tf, doc))
    }
}

/// Scores a document by the lengths of the spans matched in it.
#[derive(Debug)]
pub(crate) struct SpanScorer {
    spans: Box<dyn SpanEnum>,
    similarity: Arc<dyn Similarity>,
    norms: Option<Arc<Vec<u8>>>,
    value: f32,
    first_time: bool,
    more: bool,
    freq: f32,
}

impl SpanScorer {
    /// Sum the spans of the current document and move past them.
    fn gather(&mut self) -> Result<Option<DocId>> {
        if !self.more {
            return Ok(None);
        }
        let doc = self.spans.doc();
        self.freq = 0.0;
        while self.more && self.spans.doc() == doc {
            let length = self.spans.end().saturating_sub(self.spans.start());
            self.freq += self.similarity.sloppy_freq(length);
            self.more = self.spans.next()?;
        }
        Ok(Some(doc))
    }
}

impl DocCursor for SpanScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        if self.first_time {
            self.first_time = false;
            self.more = self.spans.next()?;
        }
        self.gather()
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        self.first_time = false;
        if self.more {
            self.more = self.spans.skip_to(target)?;
        }
        self.gather()
    }

    fn score(&mut self, doc: DocId) -> Result<f32> {
        let norm = match self.norms.as_ref().and_then(|n| n.get(doc as usize)) {
            Some(&b) => self.similarity.decode_norm(b),
            None => 1.0,
        };
        Ok(self.similarity.tf(self.freq) * self.value * norm)
    }
}

/// A cursor over `(doc, start, end)` spans.
///
/// `doc`, `start` and `end` are only meaningful after `next` or `skip_to`
/// returned true.
pub(crate) trait SpanEnum: Send + fmt::Debug {
    fn next(&mut self) -> Result<bool>;

    /// Move to the first span whose document is `>= target`. A cursor already
    /// positioned on such a span stays where it is.
    fn skip_to(&mut self, target: DocId) -> Result<bool>;

    fn doc(&self) -> DocId;

    fn start(&self) -> u32;

    fn end(&self) -> u32;
}

fn span_lt(a: &Box<dyn SpanEnum>, b: &Box<dyn SpanEnum>) -> bool {
    (a.doc(), a.start(), a.end()) < (b.doc(), b.start(), b.end())
}

/// One-position spans read from a positions cursor.
#[derive(Debug)]
struct SpanTermEnum {
    postings: Box<dyn TermDocEnum>,
    started: bool,
    doc: DocId,
    position: u32,
    count: u32,
    freq: u32,
}

impl SpanTermEnum {
    fn new(postings: Box<dyn TermDocEnum>) -> Self {
        SpanTermEnum {
            postings,
            started: false,
            doc: 0,
            position: 0,
            count: 0,
            freq: 0,
        }
    }

    fn read_position(&mut self) -> Result<bool> {
        let Some(position) = self.postings.next_position()? else {
            return Err(GlaiveError::state(format!(
                "postings of document {} ran out of positions",
                self.doc
            )));
        };
        self.position = position;
        self.count += 1;
        Ok(true)
    }

    fn enter_doc(&mut self, found: bool) -> Result<bool> {
        self.started = true;
        if !found {
            self.doc = NO_MORE_DOCS;
            return Ok(false);
        }
        self.doc = self.postings.doc();
        self.freq = self.postings.freq();
        self.count = 0;
        self.read_position()
    }
}

impl SpanEnum for SpanTermEnum {
    fn next(&mut self) -> Result<bool> {
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        if !self.started || self.count == self.freq {
            let found = self.postings.next()?;
            return self.enter_doc(found);
        }
        self.read_position()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.started && self.doc >= target {
            return Ok(self.doc != NO_MORE_DOCS);
        }
        let found = self.postings.skip_to(target)?;
        self.enter_doc(found)
    }

    fn doc(&self) -> DocId {
        self.doc
    }

    fn start(&self) -> u32 {
        self.position
    }

    fn end(&self) -> u32 {
        self.position + 1
    }
}

#[derive(Debug)]
struct SpanFirstEnum {
    inner: Box<dyn SpanEnum>,
    end: u32,
}

impl SpanEnum for SpanFirstEnum {
    fn next(&mut self) -> Result<bool> {
        while self.inner.next()? {
            if self.inner.end() <= self.end {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if !self.inner.skip_to(target)? {
            return Ok(false);
        }
        if self.inner.end() <= self.end {
            return Ok(true);
        }
        self.next()
    }

    fn doc(&self) -> DocId {
        self.inner.doc()
    }

    fn start(&self) -> u32 {
        self.inner.start()
    }

    fn end(&self) -> u32 {
        self.inner.end()
    }
}

/// K-way merge of clause spans by `(doc, start, end)`.
#[derive(Debug)]
struct SpanOrEnum {
    pending: Vec<Box<dyn SpanEnum>>,
    queue: PriorityQueue<Box<dyn SpanEnum>>,
    first_time: bool,
}

impl SpanOrEnum {
    fn new(enums: Vec<Box<dyn SpanEnum>>) -> Self {
        let lt: fn(&Box<dyn SpanEnum>, &Box<dyn SpanEnum>) -> bool = span_lt;
        SpanOrEnum {
            queue: PriorityQueue::new(enums.len(), lt),
            pending: enums,
            first_time: true,
        }
    }
}

impl SpanEnum for SpanOrEnum {
    fn next(&mut self) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            for mut span in std::mem::take(&mut self.pending) {
                if span.next()? {
                    self.queue.push(span);
                }
            }
            return Ok(!self.queue.is_empty());
        }

        let advanced = match self.queue.top_mut() {
            Some(top) => top.next()?,
            None => return Ok(false),
        };
        if advanced {
            self.queue.down();
        } else {
            self.queue.pop();
        }
        Ok(!self.queue.is_empty())
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.first_time {
            self.first_time = false;
            for mut span in std::mem::take(&mut self.pending) {
                if span.skip_to(target)? {
                    self.queue.push(span);
                }
            }
            return Ok(!self.queue.is_empty());
        }

        loop {
            let skipped = match self.queue.top_mut() {
                Some(top) if top.doc() < target => top.skip_to(target)?,
                _ => break,
            };
            if skipped {
                self.queue.down();
            } else {
                self.queue.pop();
            }
        }
        Ok(!self.queue.is_empty())
    }

    fn doc(&self) -> DocId {
        self.queue.top().map_or(NO_MORE_DOCS, |s| s.doc())
    }

    fn start(&self) -> u32 {
        self.queue.top().map_or(0, |s| s.start())
    }

    fn end(&self) -> u32 {
        self.queue.top().map_or(0, |s| s.end())
    }
}

/// Spans where all clauses match close together.
#[derive(Debug)]
struct SpanNearEnum {
    enums: Vec<Box<dyn SpanEnum>>,
    slop: i64,
    in_order: bool,
    first_time: bool,
    /// The clause to advance for the next match.
    current: usize,
    doc: DocId,
    start: u32,
    end: u32,
}

impl SpanNearEnum {
    fn new(enums: Vec<Box<dyn SpanEnum>>, slop: u32, in_order: bool) -> Self {
        SpanNearEnum {
            enums,
            slop: slop as i64,
            in_order,
            first_time: true,
            current: 0,
            doc: 0,
            start: 0,
            end: 0,
        }
    }

    fn exhaust(&mut self) -> Result<bool> {
        self.doc = NO_MORE_DOCS;
        Ok(false)
    }

    /// Skip the clauses forward until they all sit on one document.
    fn align_docs(&mut self) -> Result<bool> {
        loop {
            let max_doc = self.enums.iter().map(|e| e.doc()).max().unwrap_or(NO_MORE_DOCS);
            let mut aligned = true;
            for span in &mut self.enums {
                if span.doc() < max_doc {
                    aligned = false;
                    if !span.skip_to(max_doc)? {
                        return Ok(false);
                    }
                }
            }
            if aligned {
                return Ok(true);
            }
        }
    }

    fn next_match(&mut self) -> Result<bool> {
        let found = if self.in_order {
            self.next_ordered_match()?
        } else {
            self.next_unordered_match()?
        };
        if found { Ok(true) } else { self.exhaust() }
    }

    fn next_unordered_match(&mut self) -> Result<bool> {
        loop {
            if !self.align_docs()? {
                return Ok(false);
            }
            let mut max_end = 0;
            let mut min_start = u32::MAX;
            let mut lengths = 0i64;
            for (i, span) in self.enums.iter().enumerate() {
                max_end = max_end.max(span.end());
                if span.start() < min_start {
                    min_start = span.start();
                    self.current = i;
                }
                lengths += span.end() as i64 - span.start() as i64;
            }

            if max_end as i64 - min_start as i64 - lengths <= self.slop {
                self.doc = self.enums[self.current].doc();
                self.start = min_start;
                self.end = max_end;
                return Ok(true);
            }
            if !self.enums[self.current].next()? {
                return Ok(false);
            }
        }
    }

    fn next_ordered_match(&mut self) -> Result<bool> {
        'outer: loop {
            if !self.align_docs()? {
                return Ok(false);
            }
            let doc = self.enums[0].doc();
            let start = self.enums[0].start();
            let (mut prev_start, mut prev_end) = (start, self.enums[0].end());
            let mut lengths = prev_end as i64 - prev_start as i64;

            for span in self.enums.iter_mut().skip(1) {
                while span.doc() == doc
                    && (span.start() < prev_start
                        || (span.start() == prev_start && span.end() < prev_end))
                {
                    if !span.next()? {
                        return Ok(false);
                    }
                }
                if span.doc() != doc {
                    continue 'outer;
                }
                lengths += span.end() as i64 - span.start() as i64;
                prev_start = span.start();
                prev_end = span.end();
            }

            if prev_end as i64 - start as i64 - lengths <= self.slop {
                self.doc = doc;
                self.start = start;
                self.end = prev_end;
                self.current = 0;
                return Ok(true);
            }
            if !self.enums[0].next()? {
                return Ok(false);
            }
        }
    }
}

impl SpanEnum for SpanNearEnum {
    fn next(&mut self) -> Result<bool> {
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        if self.first_time {
            self.first_time = false;
            for span in &mut self.enums {
                if !span.next()? {
                    return self.exhaust();
                }
            }
        } else if !self.enums[self.current].next()? {
            return self.exhaust();
        }
        self.next_match()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if !self.first_time && self.doc >= target {
            return Ok(self.doc != NO_MORE_DOCS);
        }
        self.first_time = false;
        for span in &mut self.enums {
            if !span.skip_to(target)? {
                return self.exhaust();
            }
        }
        self.next_match()
    }

    fn doc(&self) -> DocId {
        self.doc
    }

    fn start(&self) -> u32 {
        self.start
    }

    fn end(&self) -> u32 {
        self.end
    }
}

/// Spans of `inc` not overlapping any span of `exc`.
#[derive(Debug)]
struct SpanNotEnum {
    inc: Box<dyn SpanEnum>,
    exc: Box<dyn SpanEnum>,
    more_inc: bool,
    more_exc: bool,
}

impl SpanNotEnum {
    /// Whether the current inclusion span survives, moving the exclusion
    /// cursor up to it.
    fn settle(&mut self) -> Result<bool> {
        if self.more_exc {
            self.more_exc = self.exc.skip_to(self.inc.doc())?;
        }
        while self.more_exc
            && self.inc.doc() == self.exc.doc()
            && self.exc.end() <= self.inc.start()
        {
            self.more_exc = self.exc.next()?;
        }
        Ok(!self.more_exc
            || self.inc.doc() != self.exc.doc()
            || self.inc.end() <= self.exc.start())
    }

    fn scan(&mut self) -> Result<bool> {
        while self.more_inc {
            if self.settle()? {
                return Ok(true);
            }
            self.more_inc = self.inc.next()?;
        }
        Ok(false)
    }
}

impl SpanEnum for SpanNotEnum {
    fn next(&mut self) -> Result<bool> {
        if self.more_inc {
            self.more_inc = self.inc.next()?;
        }
        self.scan()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.more_inc {
            self.more_inc = self.inc.skip_to(target)?;
        }
        self.scan()
    }

    fn doc(&self) -> DocId {
        self.inc.doc()
    }

    fn start(&self) -> u32 {
        self.inc.start()
    }

    fn end(&self) -> u32 {
        self.inc.end()
    }
}
