//! Phrase queries.
//!
//! A phrase is a list of positions, each holding one or more alternative
//! terms. Exact phrases (slop 0) require every position to line up with its
//! relative offset. Sloppy phrases accept matches whose terms are displaced
//! by at most `slop` positions in total, each contributing
//! `sloppy_freq(distance)` to the phrase frequency instead of a flat count.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::analysis::token::Token;
use crate::error::Result;
use crate::lexical::DocId;
use crate::lexical::reader::{IndexReader, TermDocEnum};
use crate::lexical::term::Term;
use crate::lexical::term_vector::TermVector;
use crate::query::multi_term::{MultiTermDocEnum, MultiTermQuery};
use crate::query::scorer::{DocCursor, NO_MORE_DOCS, Scorer, ScorerKind};
use crate::query::term::TermQuery;
use crate::query::weight::{Weight, WeightCore};
use crate::query::{Query, boost_suffix};
use crate::search::explanation::Explanation;
use crate::search::highlight::MatchVector;
use crate::search::searcher::Searcher;
use crate::search::similarity::Similarity;
use crate::util::priority_queue::PriorityQueue;

/// One position of a phrase and the terms accepted there.
#[derive(Debug, Clone, PartialEq)]
pub struct PhrasePosition {
    pub pos: u32,
    pub terms: Vec<String>,
}

/// Matches documents containing a sequence of terms.
///
/// ```
/// use glaive::query::phrase::PhraseQuery;
///
/// let mut query = PhraseQuery::new("body").term("quick", 1).term("fox", 2);
/// query.append_multi_term("wolf");
/// assert_eq!(query.to_string(), "body:\"quick <> fox|wolf\"");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseQuery {
    field: String,
    positions: Vec<PhrasePosition>,
    slop: u32,
    boost: f32,
}

impl PhraseQuery {
    pub fn new<F: Into<String>>(field: F) -> Self {
        PhraseQuery {
            field: field.into(),
            positions: Vec::new(),
            slop: 0,
            boost: 1.0,
        }
    }

    /// Build a phrase from analyzed tokens, honouring their position
    /// increments.
    pub fn from_tokens<F, I>(field: F, tokens: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = Token>,
    {
        let mut query = PhraseQuery::new(field);
        for token in tokens {
            query.add_term(token.text, token.position_increment as u32);
        }
        query
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn positions(&self) -> &[PhrasePosition] {
        &self.positions
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Chained form of [`PhraseQuery::add_term`].
    pub fn term<T: Into<String>>(mut self, text: T, pos_inc: u32) -> Self {
        self.add_term(text, pos_inc);
        self
    }

    /// Add a term `pos_inc` positions after the last one. The first term
    /// always lands on position 0.
    pub fn add_term<T: Into<String>>(&mut self, text: T, pos_inc: u32) {
        let pos = match self.positions.last() {
            Some(last) => last.pos + pos_inc,
            None => 0,
        };
        self.add_term_abs(text, pos);
    }

    pub fn add_term_abs<T: Into<String>>(&mut self, text: T, pos: u32) {
        self.positions.push(PhrasePosition {
            pos,
            terms: vec![text.into()],
        });
    }

    /// Add an alternative to the most recently added position.
    pub fn append_multi_term<T: Into<String>>(&mut self, text: T) {
        match self.positions.last_mut() {
            Some(last) => last.terms.push(text.into()),
            None => self.add_term(text, 0),
        }
    }

    pub fn slop(&self) -> u32 {
        self.slop
    }

    pub fn set_slop(&mut self, slop: u32) {
        self.slop = slop;
    }

    pub fn with_slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
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

    fn sorted_positions(&self) -> Vec<&PhrasePosition> {
        let mut sorted: Vec<&PhrasePosition> = self.positions.iter().collect();
        sorted.sort_by_key(|p| p.pos);
        sorted
    }

    fn all_terms(&self) -> Vec<Term> {
        self.positions
            .iter()
            .flat_map(|p| p.terms.iter())
            .map(|text| Term::new(self.field.clone(), text.clone()))
            .collect()
    }

    pub(crate) fn rewrite(&self) -> Result<Query> {
        if let [only] = self.positions.as_slice() {
            if let [text] = only.terms.as_slice() {
                return Ok(TermQuery::new(self.field.clone(), text.clone())
                    .with_boost(self.boost)
                    .into());
            }
            let mut multi = MultiTermQuery::new(self.field.clone()).with_boost(self.boost);
            for text in &only.terms {
                multi.add_term(text.clone());
            }
            return Ok(Query::MultiTerm(multi));
        }
        Ok(Query::Phrase(self.clone()))
    }

    pub(crate) fn extract_terms(&self, terms: &mut BTreeSet<Term>) {
        terms.extend(self.all_terms());
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &dyn Searcher,
    ) -> Result<Box<dyn Weight>> {
        let similarity = searcher.similarity();
        let idf = similarity.idf_phrase(&self.all_terms(), searcher);
        Ok(Box::new(PhraseWeight {
            query: query.clone(),
            phrase: self.clone(),
            core: WeightCore::new(similarity, self.boost, idf),
        }))
    }

    pub(crate) fn match_vector(&self, tv: &TermVector, mv: &mut MatchVector) {
        if tv.field != self.field || self.positions.is_empty() {
            return;
        }
        let mut enums = Vec::with_capacity(self.positions.len());
        for position in self.sorted_positions() {
            match TvPositions::new(tv, &position.terms, position.pos) {
                Some(e) => enums.push(e),
                None => return,
            }
        }
        if self.slop > 0 && enums.len() > 1 {
            sloppy_match_vector(enums, self.slop, mv);
        } else {
            exact_match_vector(enums, mv);
        }
    }
}

impl fmt::Display for PhraseQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = format!("{}:\"", self.field);
        let sorted = self.sorted_positions();
        if let Some(first) = sorted.first() {
            let mut last_pos = first.pos as i64 - 1;
            for position in sorted {
                let pos = position.pos as i64;
                if pos == last_pos {
                    buf.pop();
                    buf.push('&');
                } else {
                    for _ in last_pos..pos - 1 {
                        buf.push_str("<> ");
                    }
                }
                last_pos = pos;
                buf.push_str(&position.terms.join("|"));
                buf.push(' ');
            }
            buf.pop();
        }
        buf.push('"');
        if self.slop != 0 {
            buf.push_str(&format!("~{}", self.slop));
        }
        write!(f, "{buf}{}", boost_suffix(self.boost))
    }
}

#[derive(Debug)]
struct PhraseWeight {
    query: Query,
    phrase: PhraseQuery,
    core: WeightCore,
}

impl PhraseWeight {
    fn phrase_scorer(&self, reader: &dyn IndexReader) -> Result<Option<PhraseScorer>> {
        if self.phrase.positions.is_empty() {
            return Ok(None);
        }
        let mut pps = Vec::with_capacity(self.phrase.positions.len());
        for position in &self.phrase.positions {
            let Some(postings) = position_postings(reader, &self.phrase.field, &position.terms)?
            else {
                return Ok(None);
            };
            pps.push(PhrasePositions::new(postings, position.pos));
        }
        Ok(Some(PhraseScorer::new(
            pps,
            self.phrase.slop,
            Arc::clone(&self.core.similarity),
            reader.norms(&self.phrase.field),
            self.core.value,
        )))
    }
}

/// Positions cursor for one phrase position, merging alternatives.
fn position_postings(
    reader: &dyn IndexReader,
    field: &str,
    texts: &[String],
) -> Result<Option<Box<dyn TermDocEnum>>> {
    let mut subs = Vec::new();
    for text in texts {
        let term = Term::new(field, text.clone());
        if reader.doc_freq(&term) > 0 {
            subs.push(reader.term_positions_for(&term)?);
        }
    }
    if subs.len() > 1 {
        return Ok(Some(Box::new(MultiTermDocEnum::new(subs))));
    }
    Ok(subs.pop())
}

impl Weight for PhraseWeight {
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
            .phrase_scorer(reader)?
            .map(|s| Scorer::new(ScorerKind::Phrase(s))))
    }

    fn explain(&self, reader: &dyn IndexReader, doc: DocId) -> Result<Explanation> {
        let field = &self.phrase.field;
        let doc_freqs: Vec<String> = self
            .phrase
            .sorted_positions()
            .iter()
            .flat_map(|p| p.terms.iter())
            .map(|text| format!("{text}={}", reader.doc_freq(&Term::new(field.clone(), text.clone()))))
            .collect();
        let idf = format!("idf({field}:<{}>)", doc_freqs.join(", "));

        let mut freq = 0.0;
        if let Some(mut scorer) = self.phrase_scorer(reader)? {
            if scorer.skip_to_doc(doc)? == Some(doc) {
                freq = scorer.freq;
            }
        }
        let tf = Explanation::new(
            self.core.similarity.tf(freq),
            format!("tf(phrase_freq={freq})"),
        );
        Ok(self
            .core
            .explain_product(reader, &self.query, field, idf, tf, doc))
    }
}

/// Postings and in-document position state of one phrase position.
#[derive(Debug)]
struct PhrasePositions {
    postings: Box<dyn TermDocEnum>,
    offset: i64,
    doc: DocId,
    remaining: u32,
    position: i64,
}

impl PhrasePositions {
    fn new(postings: Box<dyn TermDocEnum>, offset: u32) -> Self {
        PhrasePositions {
            postings,
            offset: offset as i64,
            doc: 0,
            remaining: 0,
            position: 0,
        }
    }

    fn settle(&mut self, found: bool) -> bool {
        self.doc = if found { self.postings.doc() } else { NO_MORE_DOCS };
        self.position = 0;
        found
    }

    fn next(&mut self) -> Result<bool> {
        let found = self.postings.next()?;
        Ok(self.settle(found))
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        let found = self.postings.skip_to(target)?;
        Ok(self.settle(found))
    }

    fn first_position(&mut self) -> Result<bool> {
        self.remaining = self.postings.freq();
        self.next_position()
    }

    /// Move to the next occurrence in the current document. The stored
    /// position is relative to the phrase start.
    fn next_position(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.remaining -= 1;
        match self.postings.next_position()? {
            Some(pos) => {
                self.position = pos as i64 - self.offset;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn positions_lt(a: &PhrasePositions, b: &PhrasePositions) -> bool {
    if a.position == b.position {
        a.offset < b.offset
    } else {
        a.position < b.position
    }
}

/// Matches documents where all phrase positions line up.
///
/// The cursors form a ring ordered by document: the first cursor is skipped
/// to the last cursor's document until they all agree, then the phrase
/// frequency of that document decides whether it matches.
#[derive(Debug)]
pub(crate) struct PhraseScorer {
    pps: Vec<PhrasePositions>,
    first: usize,
    slop: u32,
    similarity: Arc<dyn Similarity>,
    norms: Option<Arc<Vec<u8>>>,
    value: f32,
    first_time: bool,
    more: bool,
    freq: f32,
}

impl PhraseScorer {
    fn new(
        pps: Vec<PhrasePositions>,
        slop: u32,
        similarity: Arc<dyn Similarity>,
        norms: Option<Arc<Vec<u8>>>,
        value: f32,
    ) -> Self {
        PhraseScorer {
            pps,
            first: 0,
            slop,
            similarity,
            norms,
            value,
            first_time: true,
            more: true,
            freq: 0.0,
        }
    }

    fn last(&self) -> usize {
        (self.first + self.pps.len() - 1) % self.pps.len()
    }

    fn sort_by_doc(&mut self) {
        self.pps.sort_by_key(|pp| pp.doc);
        self.first = 0;
    }

    fn do_next(&mut self) -> Result<Option<DocId>> {
        while self.more {
            loop {
                let last_doc = self.pps[self.last()].doc;
                if self.pps[self.first].doc >= last_doc {
                    break;
                }
                self.more = self.pps[self.first].skip_to(last_doc)?;
                self.first = (self.first + 1) % self.pps.len();
                if !self.more {
                    return Ok(None);
                }
            }

            self.freq = self.phrase_freq()?;
            if self.freq == 0.0 {
                let last = self.last();
                self.more = self.pps[last].next()?;
            } else {
                return Ok(Some(self.pps[self.first].doc));
            }
        }
        Ok(None)
    }

    fn phrase_freq(&mut self) -> Result<f32> {
        if self.slop == 0 || self.pps.len() == 1 {
            self.exact_phrase_freq()
        } else {
            self.sloppy_phrase_freq()
        }
    }

    fn exact_phrase_freq(&mut self) -> Result<f32> {
        for pp in &mut self.pps {
            pp.first_position()?;
        }
        self.pps
            .sort_by(|a, b| a.position.cmp(&b.position).then(a.offset.cmp(&b.offset)));
        let n = self.pps.len();
        self.first = 0;
        let mut last = n - 1;
        let mut freq = 0.0;
        loop {
            while self.pps[self.first].position < self.pps[last].position {
                let target = self.pps[last].position;
                loop {
                    if !self.pps[self.first].next_position()? {
                        return Ok(freq);
                    }
                    if self.pps[self.first].position >= target {
                        break;
                    }
                }
                last = self.first;
                self.first = (self.first + 1) % n;
            }
            freq += 1.0;
            if !self.pps[last].next_position()? {
                return Ok(freq);
            }
        }
    }

    fn sloppy_phrase_freq(&mut self) -> Result<f32> {
        let lt: fn(&PhrasePositions, &PhrasePositions) -> bool = positions_lt;
        let mut queue = PriorityQueue::unbounded(lt);
        let mut last_pos = i64::MIN;
        for mut pp in std::mem::take(&mut self.pps) {
            pp.first_position()?;
            last_pos = last_pos.max(pp.position);
            queue.push(pp);
        }

        let slop = self.slop as i64;
        let mut freq = 0.0;
        let mut done = false;
        while !done {
            let Some(mut pp) = queue.pop() else { break };
            let next_pos = queue.top().map_or(i64::MAX, |top| top.position);
            let mut pos = pp.position;
            let mut start = pos;
            while pos <= next_pos {
                start = pos;
                if !pp.next_position()? {
                    done = true;
                    break;
                }
                pos = pp.position;
            }

            let match_length = last_pos - start;
            if match_length <= slop {
                freq += self.similarity.sloppy_freq(match_length as u32);
            }
            last_pos = last_pos.max(pp.position);
            queue.push(pp);
        }

        while let Some(pp) = queue.pop() {
            self.pps.push(pp);
        }
        self.first = 0;
        Ok(freq)
    }
}

impl DocCursor for PhraseScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        if self.first_time {
            self.first_time = false;
            for pp in &mut self.pps {
                self.more = pp.next()?;
                if !self.more {
                    break;
                }
            }
            if self.more {
                self.sort_by_doc();
            }
        } else if self.more {
            let last = self.last();
            self.more = self.pps[last].next()?;
        }
        self.do_next()
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        self.first_time = false;
        for pp in &mut self.pps {
            self.more = pp.skip_to(target)?;
            if !self.more {
                break;
            }
        }
        if self.more {
            self.sort_by_doc();
        }
        self.do_next()
    }

    fn score(&mut self, doc: DocId) -> Result<f32> {
        let norm = match self.norms.as_ref().and_then(|n| n.get(doc as usize)) {
            Some(&b) => self.similarity.decode_norm(b),
            None => 1.0,
        };
        Ok(self.similarity.tf(self.freq) * self.value * norm)
    }
}

/// Walks the positions of one phrase position in a term vector.
#[derive(Debug)]
struct TvPositions {
    positions: Vec<u32>,
    offset: i64,
    next: usize,
    pos: i64,
}

impl TvPositions {
    fn new(tv: &TermVector, texts: &[String], offset: u32) -> Option<Self> {
        let mut positions: Vec<u32> = texts
            .iter()
            .filter_map(|text| tv.get_term(text))
            .flat_map(|term| term.positions.iter().copied())
            .collect();
        if positions.is_empty() {
            return None;
        }
        positions.sort_unstable();
        positions.dedup();
        Some(TvPositions {
            positions,
            offset: offset as i64,
            next: 0,
            pos: -1,
        })
    }

    fn next(&mut self) -> bool {
        match self.positions.get(self.next) {
            Some(&p) => {
                self.next += 1;
                self.pos = p as i64 - self.offset;
                true
            }
            None => false,
        }
    }

    /// Advance to the first position after the current one whose relative
    /// position is at least `position`.
    fn skip_to(&mut self, position: i64) -> bool {
        let wanted = position + self.offset;
        while let Some(&p) = self.positions.get(self.next) {
            self.next += 1;
            if p as i64 >= wanted {
                self.pos = p as i64 - self.offset;
                return true;
            }
        }
        false
    }

    fn actual(&self) -> usize {
        (self.pos + self.offset) as usize
    }
}

fn exact_match_vector(mut enums: Vec<TvPositions>, mv: &mut MatchVector) {
    let n = enums.len();
    for i in 0..n {
        let ok = if i == 0 {
            enums[0].next()
        } else {
            let prev = enums[i - 1].pos;
            enums[i].skip_to(prev)
        };
        if !ok {
            return;
        }
    }

    let mut first = 0;
    let mut last = n - 1;
    loop {
        while enums[first].pos < enums[last].pos {
            let target = enums[last].pos;
            if !enums[first].skip_to(target) {
                return;
            }
            last = first;
            first = (first + 1) % n;
        }
        mv.add(enums[0].actual(), enums[n - 1].actual());
        if !enums[last].next() {
            return;
        }
    }
}

fn sloppy_match_vector(enums: Vec<TvPositions>, slop: u32, mv: &mut MatchVector) {
    let lt: fn(&TvPositions, &TvPositions) -> bool = |a, b| a.pos < b.pos;
    let mut queue = PriorityQueue::unbounded(lt);
    let mut last_pos = i64::MIN;
    for mut e in enums {
        if !e.next() {
            return;
        }
        last_pos = last_pos.max(e.pos);
        queue.push(e);
    }

    let mut done = false;
    while !done {
        let Some(mut e) = queue.pop() else { return };
        let next_pos = queue.top().map_or(i64::MAX, |top| top.pos);
        let mut pos = e.pos;
        let mut start = pos;
        while pos <= next_pos {
            start = pos;
            if !e.next() {
                done = true;
                break;
            }
            pos = e.pos;
        }

        if last_pos - start <= slop as i64 {
            let first = (start + e.offset) as usize;
            let (min, max) = queue.iter().fold((first, first), |(min, max), t| {
                let p = t.actual();
                (min.min(p), max.max(p))
            });
            mv.add(min, max);
        }
        last_pos = last_pos.max(e.pos);
        queue.push(e);
    }
}
