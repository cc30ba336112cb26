//! Scorers combining required, optional and prohibited clauses.

use crate::error::Result;
use crate::lexical::DocId;
use crate::query::conjunction::ConjunctionScorer;
use crate::query::disjunction::DisjunctionScorer;
use crate::query::scorer::{DocCursor, Scorer, ScorerKind, ScorerState};

/// Scores a boolean query.
///
/// The clause scorers are assembled into a tree of conjunction, disjunction,
/// exclusion and optional-addition scorers. That tree reports the summed
/// clause scores together with the number of clauses that matched, which
/// picks the coordination factor.
#[derive(Debug)]
pub(crate) struct BooleanScorer {
    counting: Box<Scorer>,
    coord_factors: Vec<f32>,
}

impl BooleanScorer {
    pub(crate) fn new(
        required: Vec<Scorer>,
        optional: Vec<Scorer>,
        prohibited: Vec<Scorer>,
        min_should_match: usize,
        coord_factors: Vec<f32>,
    ) -> Result<Self> {
        let counting = counting_scorer(required, optional, prohibited, min_should_match)?;
        Ok(BooleanScorer {
            counting: Box::new(counting),
            coord_factors,
        })
    }
}

fn single_or<F>(mut scorers: Vec<Scorer>, combine: F) -> Result<Scorer>
where
    F: FnOnce(Vec<Scorer>) -> Result<Scorer>,
{
    if scorers.len() == 1 {
        if let Some(scorer) = scorers.pop() {
            return Ok(scorer);
        }
    }
    combine(scorers)
}

fn conjunction(scorers: Vec<Scorer>) -> Result<Scorer> {
    single_or(scorers, |s| {
        Ok(Scorer::new(ScorerKind::Conjunction(ConjunctionScorer::new(s))))
    })
}

fn disjunction(scorers: Vec<Scorer>, min_matches: usize) -> Result<Scorer> {
    if min_matches > 1 {
        return Ok(Scorer::new(ScorerKind::Disjunction(DisjunctionScorer::new(
            scorers,
            min_matches,
        )?)));
    }
    single_or(scorers, |s| {
        Ok(Scorer::new(ScorerKind::Disjunction(DisjunctionScorer::new(
            s, 1,
        )?)))
    })
}

fn counting_scorer(
    required: Vec<Scorer>,
    optional: Vec<Scorer>,
    prohibited: Vec<Scorer>,
    min_should_match: usize,
) -> Result<Scorer> {
    let base = if required.is_empty() {
        if optional.is_empty() {
            return Ok(Scorer::empty());
        }
        let need = min_should_match.max(1);
        if need > optional.len() {
            return Ok(Scorer::empty());
        }
        disjunction(optional, need)?
    } else {
        let req = conjunction(required)?;
        if min_should_match > 0 {
            if min_should_match > optional.len() {
                return Ok(Scorer::empty());
            }
            let opt = disjunction(optional, min_should_match)?;
            conjunction(vec![req, opt])?
        } else if optional.is_empty() {
            req
        } else {
            let opt = disjunction(optional, 1)?;
            Scorer::new(ScorerKind::ReqOpt(ReqOptScorer::new(req, opt)))
        }
    };

    if prohibited.is_empty() {
        return Ok(base);
    }
    let excl = disjunction(prohibited, 1)?;
    Ok(Scorer::new(ScorerKind::ReqExcl(ReqExclScorer::new(base, excl))))
}

impl DocCursor for BooleanScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        Ok(self.counting.next()?.then(|| self.counting.doc()))
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        Ok(self.counting.skip_to(target)?.then(|| self.counting.doc()))
    }

    fn score(&mut self, _doc: DocId) -> Result<f32> {
        let (sum, matched) = self.counting.score_counted()?;
        let coord = self
            .coord_factors
            .get(matched)
            .or_else(|| self.coord_factors.last())
            .copied()
            .unwrap_or(1.0);
        Ok(sum * coord)
    }
}

/// Required matches minus excluded ones.
#[derive(Debug)]
pub(crate) struct ReqExclScorer {
    req: Box<Scorer>,
    excl: Option<Box<Scorer>>,
    first_time: bool,
}

impl ReqExclScorer {
    pub(crate) fn new(req: Scorer, excl: Scorer) -> Self {
        ReqExclScorer {
            req: Box::new(req),
            excl: Some(Box::new(excl)),
            first_time: true,
        }
    }

    /// Advance the required scorer from its current document to the first
    /// one the excluded scorer does not sit on.
    fn to_non_excluded(&mut self) -> Result<Option<DocId>> {
        let mut req_doc = self.req.doc();
        loop {
            let Some(excl) = self.excl.as_mut() else {
                return Ok(Some(req_doc));
            };
            let mut excl_doc = excl.doc();
            if req_doc < excl_doc {
                return Ok(Some(req_doc));
            }
            if req_doc > excl_doc {
                if !excl.skip_to(req_doc)? {
                    self.excl = None;
                    return Ok(Some(req_doc));
                }
                excl_doc = excl.doc();
                if excl_doc > req_doc {
                    return Ok(Some(req_doc));
                }
            }
            if !self.req.next()? {
                return Ok(None);
            }
            req_doc = self.req.doc();
        }
    }

    fn init(&mut self, target: Option<DocId>) -> Result<()> {
        self.first_time = false;
        if let Some(excl) = self.excl.as_mut() {
            let found = match target {
                Some(target) => excl.skip_to(target)?,
                None => excl.next()?,
            };
            if !found {
                self.excl = None;
            }
        }
        Ok(())
    }
}

impl DocCursor for ReqExclScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        if self.first_time {
            self.init(None)?;
        }
        if !self.req.next()? {
            return Ok(None);
        }
        self.to_non_excluded()
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.first_time {
            self.init(Some(target))?;
        }
        if !self.req.skip_to(target)? {
            return Ok(None);
        }
        self.to_non_excluded()
    }

    fn score(&mut self, _doc: DocId) -> Result<f32> {
        self.req.score()
    }

    fn score_counted(&mut self, _doc: DocId) -> Result<(f32, usize)> {
        self.req.score_counted()
    }
}

/// Required matches, with the optional scorer's score added where it also
/// matches.
#[derive(Debug)]
pub(crate) struct ReqOptScorer {
    req: Box<Scorer>,
    opt: Option<Box<Scorer>>,
}

impl ReqOptScorer {
    pub(crate) fn new(req: Scorer, opt: Scorer) -> Self {
        ReqOptScorer {
            req: Box::new(req),
            opt: Some(Box::new(opt)),
        }
    }
}

impl DocCursor for ReqOptScorer {
    fn next_doc(&mut self) -> Result<Option<DocId>> {
        Ok(self.req.next()?.then(|| self.req.doc()))
    }

    fn skip_to_doc(&mut self, target: DocId) -> Result<Option<DocId>> {
        Ok(self.req.skip_to(target)?.then(|| self.req.doc()))
    }

    fn score(&mut self, doc: DocId) -> Result<f32> {
        Ok(self.score_counted(doc)?.0)
    }

    fn score_counted(&mut self, doc: DocId) -> Result<(f32, usize)> {
        let (req_score, req_count) = self.req.score_counted()?;
        let Some(opt) = self.opt.as_mut() else {
            return Ok((req_score, req_count));
        };
        let behind = opt.state() == ScorerState::BeforeFirst || opt.doc() < doc;
        if behind && !opt.skip_to(doc)? {
            self.opt = None;
            return Ok((req_score, req_count));
        }
        if opt.doc() == doc {
            let (opt_score, opt_count) = opt.score_counted()?;
            Ok((req_score + opt_score, req_count + opt_count))
        } else {
            Ok((req_score, req_count))
        }
    }
}
