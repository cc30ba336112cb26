//! Match vectors and excerpt highlighting.
//!
//! A query turns a document's term vector into a [`MatchVector`]: the
//! token-position ranges it matches. Highlighting compacts those ranges, maps
//! them to byte offsets through the term vector and then picks the best
//! excerpt windows of the stored text.

use serde::{Deserialize, Serialize};

use crate::lexical::term_vector::{TVOffset, TermVector};
use crate::search::SearchConfig;
use crate::util::priority_queue::PriorityQueue;

/// One matched range of token positions, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchRange {
    pub start: usize,
    pub end: usize,
    /// Byte offsets, filled in by [`MatchVector::set_offsets`].
    pub start_offset: usize,
    pub end_offset: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchVector {
    matches: Vec<MatchRange>,
}

impl MatchVector {
    pub fn new() -> Self {
        MatchVector::default()
    }

    pub fn add(&mut self, start: usize, end: usize) {
        self.matches.push(MatchRange {
            start,
            end,
            start_offset: 0,
            end_offset: 0,
            score: 1.0,
        });
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn ranges(&self) -> &[MatchRange] {
        &self.matches
    }

    /// Order by start position, longer ranges first.
    pub fn sort(&mut self) {
        self.matches
            .sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    }

    /// Merge overlapping and adjacent ranges, so `3..5` and `6..8` become
    /// `3..8`. Scores of ranges swallowed whole are added to the survivor.
    pub fn compact(&mut self) {
        self.compact_by(1, false);
    }

    /// Merge overlapping ranges but keep adjacent ones apart.
    pub fn compact_with_breaks(&mut self) {
        self.compact_by(0, true);
    }

    fn compact_by(&mut self, gap: usize, score_extensions: bool) {
        if self.matches.is_empty() {
            return;
        }
        self.sort();
        let mut left = 0;
        for right in 1..self.matches.len() {
            let current = self.matches[right];
            let survivor = &mut self.matches[left];
            if current.start > survivor.end + gap {
                left += 1;
                self.matches[left] = current;
            } else if current.end > survivor.end {
                survivor.end = current.end;
                if score_extensions {
                    survivor.score += current.score;
                }
            } else {
                survivor.score += current.score;
            }
        }
        self.matches.truncate(left + 1);
    }

    /// Fill in byte offsets from the per-position offsets of a term vector.
    pub fn set_offsets(&mut self, offsets: &[TVOffset]) {
        for m in &mut self.matches {
            m.start_offset = offset_at(offsets, m.start).start;
            m.end_offset = offset_at(offsets, m.end).end;
        }
    }
}

fn offset_at(offsets: &[TVOffset], pos: usize) -> TVOffset {
    offsets
        .get(pos)
        .or_else(|| offsets.last())
        .copied()
        .unwrap_or(TVOffset { start: 0, end: 0 })
}

/// How highlighted excerpts are cut and decorated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightOptions {
    /// Target excerpt length in bytes.
    pub excerpt_length: usize,
    pub num_excerpts: usize,
    pub pre_tag: String,
    pub post_tag: String,
    pub ellipsis: String,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        HighlightOptions::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for HighlightOptions {
    fn from(config: &SearchConfig) -> Self {
        HighlightOptions {
            excerpt_length: config.excerpt_length,
            num_excerpts: config.num_excerpts,
            pre_tag: config.pre_tag.clone(),
            post_tag: config.post_tag.clone(),
            ellipsis: config.ellipsis.clone(),
        }
    }
}

impl HighlightOptions {
    pub fn new() -> Self {
        HighlightOptions::default()
    }

    pub fn excerpt_length(mut self, excerpt_length: usize) -> Self {
        self.excerpt_length = excerpt_length;
        self
    }

    pub fn num_excerpts(mut self, num_excerpts: usize) -> Self {
        self.num_excerpts = num_excerpts;
        self
    }

    pub fn tags<P: Into<String>, Q: Into<String>>(mut self, pre_tag: P, post_tag: Q) -> Self {
        self.pre_tag = pre_tag.into();
        self.post_tag = post_tag.into();
        self
    }

    pub fn ellipsis<E: Into<String>>(mut self, ellipsis: E) -> Self {
        self.ellipsis = ellipsis.into();
        self
    }
}

/// Highlight `text` with the matches in `mv`.
///
/// Text shorter than `excerpt_length * num_excerpts` comes back whole as a
/// single excerpt. Otherwise the best scoring excerpt windows are returned in
/// text order, or nothing when there are no matches.
pub(crate) fn highlight(
    mut mv: MatchVector,
    tv: &TermVector,
    text: &str,
    opts: &HighlightOptions,
) -> Vec<String> {
    let budget = opts.excerpt_length.saturating_mul(opts.num_excerpts);
    if text.len() < budget {
        return vec![highlight_whole(mv, tv, text, opts)];
    }
    if mv.is_empty() || opts.num_excerpts == 0 {
        return Vec::new();
    }
    mv.compact_with_breaks();
    mv.set_offsets(&tv.offsets);

    let mut excerpts = select_excerpts(&mut mv, tv, opts);
    let offsets = filled_offsets(&tv.offsets);
    let mut out = Vec::new();
    let mut i = 0;
    while i < excerpts.len() {
        let mut merged = 1;
        for j in i + 1..excerpts.len() {
            let (head, tail) = excerpts.split_at_mut(j);
            let (ei, ej) = (&mut head[i], &tail[0]);
            if ej.end_offset.saturating_sub(ei.start_offset) < (j - i + 1) * opts.excerpt_length {
                ei.end = ej.end;
                ei.end_pos = ej.end_pos;
                ei.end_offset = ej.end_offset;
                merged = j - i + 1;
            }
        }
        let excerpt = &mut excerpts[i];
        excerpt.expand(merged * opts.excerpt_length, &offsets);
        out.push(excerpt.render(&mv, text, opts));
        i += merged;
    }
    out
}

fn highlight_whole(mut mv: MatchVector, tv: &TermVector, text: &str, opts: &HighlightOptions) -> String {
    if mv.is_empty() {
        return text.to_string();
    }
    mv.compact_with_breaks();
    mv.set_offsets(&tv.offsets);
    let mut out = Vec::with_capacity(text.len() + mv.len() * (opts.pre_tag.len() + opts.post_tag.len()));
    let mut last = 0;
    for m in mv.ranges() {
        push_tagged(&mut out, text, last, m, opts);
        last = m.end_offset.max(last);
    }
    out.extend_from_slice(slice(text, last, text.len()));
    into_string(out)
}

/// A candidate excerpt covering `matches[start..end]`.
#[derive(Debug, Clone, Default)]
struct Excerpt {
    id: usize,
    start: usize,
    end: usize,
    start_pos: usize,
    end_pos: usize,
    start_offset: usize,
    end_offset: usize,
    score: f64,
}

fn excerpt_lt(a: &Excerpt, b: &Excerpt) -> bool {
    a.score > b.score
}

fn select_excerpts(mv: &mut MatchVector, tv: &TermVector, opts: &HighlightOptions) -> Vec<Excerpt> {
    let n = mv.len();
    let mut queue = PriorityQueue::unbounded(excerpt_lt as fn(&Excerpt, &Excerpt) -> bool);
    let mut running = 0.0;
    let mut e_end = 0;
    for e_start in 0..n {
        let window_end = mv.matches[e_start].start_offset + opts.excerpt_length;
        while e_end < n && (e_end <= e_start || mv.matches[e_end].end_offset <= window_end) {
            running += mv.matches[e_end].score;
            e_end += 1;
        }
        queue.push(Excerpt {
            id: e_start,
            start: e_start,
            end: e_end,
            score: running,
            ..Excerpt::default()
        });
        running -= mv.matches[e_start].score;
    }

    let mut chosen = Vec::with_capacity(opts.num_excerpts);
    while chosen.len() < opts.num_excerpts {
        let Some(excerpt) = queue.pop() else {
            break;
        };
        if chosen.len() + 1 < opts.num_excerpts {
            for m in &mut mv.matches[excerpt.start..excerpt.end] {
                m.score = 0.0;
            }
            // rescore until the top stops changing
            loop {
                let Some(top) = queue.top_mut() else {
                    break;
                };
                let id = top.id;
                top.score = mv.matches[top.start..top.end].iter().map(|m| m.score).sum();
                queue.down();
                if queue.top().is_some_and(|t| t.id == id) {
                    break;
                }
            }
        }
        chosen.push(excerpt);
    }

    chosen.sort_by(|a, b| a.start.cmp(&b.start));
    for e in &mut chosen {
        e.start_pos = mv.matches[e.start].start;
        e.end_pos = mv.matches[e.end - 1].end;
        e.start_offset = offset_at(&tv.offsets, e.start_pos).start;
        e.end_offset = offset_at(&tv.offsets, e.end_pos).end;
    }

    // Missing excerpts become empty ones at the front; they grow into one long
    // excerpt from the start of the text.
    let missing = opts.num_excerpts - chosen.len();
    let mut excerpts = vec![Excerpt::default(); missing];
    excerpts.extend(chosen);
    excerpts
}

/// Offsets with positions that produced no token filled from the previous
/// position.
fn filled_offsets(offsets: &[TVOffset]) -> Vec<TVOffset> {
    let mut filled = offsets.to_vec();
    for i in 1..filled.len() {
        if filled[i].start == 0 {
            filled[i].start = filled[i - 1].start;
        }
        if filled[i].end == 0 {
            filled[i].end = filled[i - 1].end;
        }
    }
    filled
}

impl Excerpt {
    /// Grow to the largest span of whole tokens shorter than `len` bytes.
    fn expand(&mut self, len: usize, offsets: &[TVOffset]) {
        let mut expanded = true;
        while expanded {
            expanded = false;
            if let Some(prev) = self.start_pos.checked_sub(1).and_then(|p| offsets.get(p))
                && self.end_offset.saturating_sub(prev.start) < len
            {
                self.start_pos -= 1;
                self.start_offset = prev.start;
                expanded = true;
            }
            if let Some(next) = offsets.get(self.end_pos + 1)
                && next.end.saturating_sub(self.start_offset) < len
            {
                self.end_pos += 1;
                self.end_offset = next.end;
                expanded = true;
            }
        }
    }

    fn render(&mut self, mv: &MatchVector, text: &str, opts: &HighlightOptions) -> String {
        let mut out = Vec::with_capacity(
            self.end_offset.saturating_sub(self.start_offset) + 2 * opts.ellipsis.len(),
        );
        if self.start_offset > 0 {
            out.extend_from_slice(opts.ellipsis.as_bytes());
        }
        let mut last = self.start_offset;
        for m in &mv.matches[self.start..self.end] {
            push_tagged(&mut out, text, last, m, opts);
            last = m.end_offset.max(last);
        }
        // an ellipsis longer than the rest of the text is pointless
        if text.len().saturating_sub(self.end_offset) <= opts.ellipsis.len() {
            self.end_offset = text.len();
        }
        out.extend_from_slice(slice(text, last, self.end_offset));
        if self.end_offset < text.len() {
            out.extend_from_slice(opts.ellipsis.as_bytes());
        }
        into_string(out)
    }
}

fn push_tagged(out: &mut Vec<u8>, text: &str, last: usize, m: &MatchRange, opts: &HighlightOptions) {
    let start = m.start_offset.max(last);
    out.extend_from_slice(slice(text, last, start));
    out.extend_from_slice(opts.pre_tag.as_bytes());
    out.extend_from_slice(slice(text, start, m.end_offset));
    out.extend_from_slice(opts.post_tag.as_bytes());
}

fn slice(text: &str, from: usize, to: usize) -> &[u8] {
    let bytes = text.as_bytes();
    let to = to.min(bytes.len());
    let from = from.min(to);
    &bytes[from..to]
}

fn into_string(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::term_vector::TVTerm;

    fn spans(mv: &MatchVector) -> Vec<(usize, usize, f64)> {
        mv.ranges().iter().map(|m| (m.start, m.end, m.score)).collect()
    }

    /// Tokens separated by single spaces.
    fn letters(text: &str, matched: &[&str]) -> TermVector {
        let mut terms: Vec<TVTerm> = Vec::new();
        let mut offsets = Vec::new();
        let mut cursor = 0;
        for (pos, token) in text.split(' ').enumerate() {
            offsets.push(TVOffset {
                start: cursor,
                end: cursor + token.len(),
            });
            cursor += token.len() + 1;
            if !matched.contains(&token) {
                continue;
            }
            match terms.iter_mut().find(|t| t.text == token) {
                Some(t) => t.positions.push(pos as u32),
                None => terms.push(TVTerm {
                    text: token.to_string(),
                    positions: vec![pos as u32],
                }),
            }
        }
        terms.sort_by(|a, b| a.text.cmp(&b.text));
        TermVector {
            field: "body".to_string(),
            terms,
            offsets,
        }
    }

    fn match_terms(tv: &TermVector) -> MatchVector {
        let mut mv = MatchVector::new();
        for term in &tv.terms {
            for &pos in &term.positions {
                mv.add(pos as usize, pos as usize);
            }
        }
        mv
    }

    #[test]
    fn test_compact() {
        let mut mv = MatchVector::new();
        mv.add(6, 8);
        mv.add(3, 5);
        mv.add(4, 4);
        mv.add(10, 10);
        mv.compact();
        assert_eq!(spans(&mv), vec![(3, 8, 2.0), (10, 10, 1.0)]);

        let mut mv = MatchVector::new();
        mv.add(6, 8);
        mv.add(3, 5);
        mv.add(4, 4);
        mv.compact_with_breaks();
        assert_eq!(spans(&mv), vec![(3, 5, 2.0), (6, 8, 1.0)]);

        let mut empty = MatchVector::new();
        empty.compact();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_sort_prefers_longer_ranges() {
        let mut mv = MatchVector::new();
        mv.add(2, 2);
        mv.add(1, 1);
        mv.add(1, 3);
        mv.sort();
        let ranges: Vec<(usize, usize)> = mv.ranges().iter().map(|m| (m.start, m.end)).collect();
        assert_eq!(ranges, vec![(1, 3), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_set_offsets() {
        let tv = letters("a bb c", &[]);
        let mut mv = MatchVector::new();
        mv.add(1, 2);
        mv.set_offsets(&tv.offsets);
        assert_eq!(mv.ranges()[0].start_offset, 2);
        assert_eq!(mv.ranges()[0].end_offset, 6);
    }

    #[test]
    fn test_short_text_is_highlighted_whole() {
        let text = "a b c d";
        let tv = letters(text, &["b", "c"]);
        let opts = HighlightOptions::default();
        assert_eq!(
            highlight(match_terms(&tv), &tv, text, &opts),
            vec!["a <b>b</b> <b>c</b> d"]
        );
        assert_eq!(highlight(MatchVector::new(), &tv, text, &opts), vec![text]);
    }

    #[test]
    fn test_single_excerpt() {
        let text = "a b c d e f g h i j";
        let tv = letters(text, &["e"]);
        let opts = HighlightOptions::new().excerpt_length(5).num_excerpts(1);
        assert_eq!(
            highlight(match_terms(&tv), &tv, text, &opts),
            vec!["...d <b>e</b>..."]
        );
        assert!(highlight(MatchVector::new(), &tv, text, &opts).is_empty());
    }

    #[test]
    fn test_separate_excerpts() {
        let text = "a b c d e f g h i j";
        let tv = letters(text, &["b", "i"]);
        let opts = HighlightOptions::new().excerpt_length(5).num_excerpts(2);
        assert_eq!(
            highlight(match_terms(&tv), &tv, text, &opts),
            vec!["a <b>b</b>...", "...h <b>i</b> j"]
        );
    }

    #[test]
    fn test_missing_excerpts_grow_from_start() {
        let text = "a b c d e f g h i j";
        let tv = letters(text, &["e"]);
        let opts = HighlightOptions::new()
            .excerpt_length(5)
            .num_excerpts(2)
            .tags("[", "]");
        assert_eq!(
            highlight(match_terms(&tv), &tv, text, &opts),
            vec!["a b c d [e]..."]
        );
    }
}
