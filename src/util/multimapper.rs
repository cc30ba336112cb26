//! Multi-pattern string substitution through a compiled DFA.
//!
//! Patterns are registered with [`MultiMapper::add_mapping`] and compiled into a
//! deterministic automaton by subset construction over a non-deterministic
//! automaton with one chain of states per pattern. [`MultiMapper::map`] then
//! scans its input once, left to right, replacing the longest pattern starting
//! at the leftmost possible position. When two patterns are equal the first
//! registered one wins.
//!
//! A mapper is either compiled or not. Adding a mapping discards the compiled
//! automaton and mapping before compiling is an error, so stale automata are
//! never used.

use std::collections::VecDeque;

use ahash::AHashMap;
use bit_vec::BitVec;
use log::debug;

use crate::error::{GlaiveError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Mapping {
    pattern: Vec<u8>,
    replacement: Vec<u8>,
}

/// One NFA state: `depth` bytes of `pattern` consumed.
#[derive(Debug, Clone, Copy)]
struct NfaNode {
    pattern: usize,
    depth: usize,
}

const START: u32 = 0;

#[derive(Debug, Clone)]
struct DfaState {
    next: [u32; 256],
    /// `(depth, mapping)` for each pattern completed here, one per depth.
    accept: Vec<(usize, usize)>,
    /// Depth of the deepest prefix that can still grow into a match.
    live_depth: usize,
    /// `restrict[k]` is this state with only the prefixes at most `k` bytes
    /// deep, which is where a scan restarted `k` bytes back would be.
    restrict: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct MultiMapper {
    mappings: Vec<Mapping>,
    dfa: Option<Vec<DfaState>>,
}

impl MultiMapper {
    pub fn new() -> Self {
        MultiMapper::default()
    }

    /// Register `pattern -> replacement`. Invalidates a previous compilation.
    pub fn add_mapping(&mut self, pattern: &str, replacement: &str) -> Result<()> {
        if pattern.is_empty() {
            return Err(GlaiveError::invalid_argument(
                "cannot add an empty pattern to a MultiMapper",
            ));
        }
        self.mappings.push(Mapping {
            pattern: pattern.as_bytes().to_vec(),
            replacement: replacement.as_bytes().to_vec(),
        });
        self.dfa = None;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn is_compiled(&self) -> bool {
        self.dfa.is_some()
    }

    /// Number of DFA states. Zero before compiling.
    pub fn num_states(&self) -> usize {
        self.dfa.as_ref().map_or(0, |dfa| dfa.len())
    }

    /// Build the automaton for the registered patterns.
    ///
    /// The start node stays active in every state, so a pattern may begin at
    /// any input position without restarting the automaton.
    pub fn compile(&mut self) {
        let mut nodes = vec![NfaNode {
            pattern: usize::MAX,
            depth: 0,
        }];
        // node id of each pattern's first byte
        let mut first_node = Vec::with_capacity(self.mappings.len());
        for (i, mapping) in self.mappings.iter().enumerate() {
            first_node.push(nodes.len());
            for depth in 1..=mapping.pattern.len() {
                nodes.push(NfaNode { pattern: i, depth });
            }
        }

        let mut ids: AHashMap<BitVec, u32> = AHashMap::new();
        let mut sets: Vec<BitVec> = Vec::new();
        let mut start = BitVec::from_elem(nodes.len(), false);
        start.set(0, true);
        intern(start, &mut ids, &mut sets);

        let mut states = Vec::new();
        while states.len() < sets.len() {
            let set = sets[states.len()].clone();

            let mut next = [START; 256];
            for byte in 0..=255u8 {
                let mut target = BitVec::from_elem(nodes.len(), false);
                target.set(0, true);
                for (i, mapping) in self.mappings.iter().enumerate() {
                    if mapping.pattern[0] == byte {
                        target.set(first_node[i], true);
                    }
                }
                for (node_id, active) in set.iter().enumerate().skip(1) {
                    let node = nodes[node_id];
                    let pattern = &self.mappings[node.pattern].pattern;
                    if active && node.depth < pattern.len() && pattern[node.depth] == byte {
                        target.set(node_id + 1, true);
                    }
                }
                next[byte as usize] = intern(target, &mut ids, &mut sets);
            }

            let max_depth = active_nodes(&nodes, &set).map(|n| n.depth).max().unwrap_or(0);
            let restrict = (0..max_depth)
                .map(|k| {
                    let mut shallower = set.clone();
                    for (node_id, node) in nodes.iter().enumerate() {
                        if node.depth > k {
                            shallower.set(node_id, false);
                        }
                    }
                    intern(shallower, &mut ids, &mut sets)
                })
                .collect();

            states.push(DfaState {
                next,
                accept: self.accepted(&nodes, &set),
                live_depth: active_nodes(&nodes, &set)
                    .filter(|n| n.depth < self.mappings[n.pattern].pattern.len())
                    .map(|n| n.depth)
                    .max()
                    .unwrap_or(0),
                restrict,
            });
        }

        debug!(
            "compiled MultiMapper with {} patterns into {} states",
            self.mappings.len(),
            states.len()
        );
        self.dfa = Some(states);
    }

    fn accepted(&self, nodes: &[NfaNode], set: &BitVec) -> Vec<(usize, usize)> {
        let mut accept: Vec<(usize, usize)> = Vec::new();
        for node in active_nodes(nodes, set) {
            if node.depth != self.mappings[node.pattern].pattern.len() {
                continue;
            }
            match accept.iter_mut().find(|(depth, _)| *depth == node.depth) {
                Some(entry) => entry.1 = entry.1.min(node.pattern),
                None => accept.push((node.depth, node.pattern)),
            }
        }
        accept
    }

    /// Apply the mappings to `input`.
    pub fn map(&self, input: &str) -> Result<String> {
        let mapped = self.map_bytes(input.as_bytes())?;
        String::from_utf8(mapped).map_err(|e| GlaiveError::invalid_argument(e.to_string()))
    }

    /// Apply the mappings to raw bytes in a single left-to-right pass.
    ///
    /// Output is committed for every position before the earliest prefix that
    /// may still grow; after a replacement the automaton drops the prefixes it
    /// overlapped and carries on from the current byte.
    pub fn map_bytes(&self, input: &[u8]) -> Result<Vec<u8>> {
        let dfa = self
            .dfa
            .as_deref()
            .ok_or_else(|| GlaiveError::state("MultiMapper must be compiled before use"))?;

        let mut scan = Scan {
            dfa,
            mappings: &self.mappings,
            input,
            out: Vec::with_capacity(input.len()),
            found: VecDeque::new(),
            pos: 0,
            state: START,
        };
        for i in 1..=input.len() {
            scan.state = dfa[scan.state as usize].next[input[i - 1] as usize];
            scan.record(i);
            let frontier = i - dfa[scan.state as usize].live_depth;
            scan.settle(i, frontier);
        }
        scan.settle(input.len(), input.len());
        Ok(scan.out)
    }
}

/// Cursor state of one [`MultiMapper::map_bytes`] call.
struct Scan<'a> {
    dfa: &'a [DfaState],
    mappings: &'a [Mapping],
    input: &'a [u8],
    out: Vec<u8>,
    /// Longest match seen so far for each start from `pos` on.
    found: VecDeque<Option<(usize, usize)>>,
    pos: usize,
    state: u32,
}

impl Scan<'_> {
    /// Note the matches completed after consuming `i` bytes.
    fn record(&mut self, i: usize) {
        for &(depth, mapping) in &self.dfa[self.state as usize].accept {
            let Some(slot) = (i - depth).checked_sub(self.pos) else {
                continue;
            };
            if self.found.len() <= slot {
                self.found.resize(slot + 1, None);
            }
            self.found[slot] = Some((mapping, i));
        }
    }

    /// Emit output for every position before `frontier`, `i` bytes in.
    fn settle(&mut self, i: usize, mut frontier: usize) {
        while self.pos < frontier {
            match self.found.pop_front().flatten() {
                Some((mapping, end)) => {
                    self.out.extend_from_slice(&self.mappings[mapping].replacement);
                    let overlapped = (end - self.pos - 1).min(self.found.len());
                    self.found.drain(..overlapped);
                    self.pos = end;
                    let state = &self.dfa[self.state as usize];
                    if let Some(&shallower) = state.restrict.get(i - end) {
                        self.state = shallower;
                        if frontier < i {
                            frontier = i - self.dfa[shallower as usize].live_depth;
                        }
                    }
                }
                None => {
                    self.out.push(self.input[self.pos]);
                    self.pos += 1;
                }
            }
        }
    }
}

fn intern(set: BitVec, ids: &mut AHashMap<BitVec, u32>, sets: &mut Vec<BitVec>) -> u32 {
    if let Some(&id) = ids.get(&set) {
        return id;
    }
    let id = sets.len() as u32;
    ids.insert(set.clone(), id);
    sets.push(set);
    id
}

fn active_nodes<'a>(nodes: &'a [NfaNode], set: &'a BitVec) -> impl Iterator<Item = NfaNode> + 'a {
    set.iter()
        .enumerate()
        .skip(1)
        .filter(|&(_, active)| active)
        .map(move |(id, _)| nodes[id])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(pairs: &[(&str, &str)]) -> MultiMapper {
        let mut mm = MultiMapper::new();
        for (pattern, replacement) in pairs {
            mm.add_mapping(pattern, replacement).unwrap();
        }
        mm.compile();
        mm
    }

    #[test]
    fn test_longest_match_wins() {
        let mm = mapper(&[("ab", "X"), ("a", "Y")]);
        assert_eq!(mm.map("ab").unwrap(), "X");
        assert_eq!(mm.map("ac").unwrap(), "Yc");
        assert_eq!(mm.map("aab").unwrap(), "YX");
    }

    #[test]
    fn test_first_registered_wins_ties() {
        let mm = mapper(&[("x", "1"), ("x", "2")]);
        assert_eq!(mm.map("xx").unwrap(), "11");
    }

    #[test]
    fn test_accent_folding() {
        let mm = mapper(&[("à", "a"), ("é", "e"), ("æ", "ae"), ("ß", "ss")]);
        assert_eq!(mm.map("àéæß plain").unwrap(), "aeaess plain");
    }

    #[test]
    fn test_partial_prefix_falls_back() {
        let mm = mapper(&[("abcd", "Z"), ("bc", "Q")]);
        assert_eq!(mm.map("abce").unwrap(), "aQe");
        assert_eq!(mm.map("abcd").unwrap(), "Z");
    }

    #[test]
    fn test_compile_state() {
        let mut mm = MultiMapper::new();
        mm.add_mapping("a", "b").unwrap();
        assert!(!mm.is_compiled());
        assert!(matches!(mm.map("a"), Err(GlaiveError::State(_))));

        mm.compile();
        assert!(mm.is_compiled());
        assert_eq!(mm.map("a").unwrap(), "b");
        assert_eq!(mm.num_states(), 2);

        mm.add_mapping("c", "d").unwrap();
        assert!(!mm.is_compiled());
        mm.compile();
        assert_eq!(mm.map("ac").unwrap(), "bd");

        assert!(mm.add_mapping("", "x").is_err());
    }

    #[test]
    fn test_empty_mapper_copies_input() {
        let mm = mapper(&[]);
        assert_eq!(mm.map("unchanged").unwrap(), "unchanged");
        assert_eq!(mm.num_states(), 1);
    }

    #[test]
    fn test_overlapping_prefixes_resume_after_replacement() {
        let mm = mapper(&[("abc", "1"), ("bcd", "2"), ("cd", "3")]);
        assert_eq!(mm.map("abcd").unwrap(), "1d");
        assert_eq!(mm.map("xbcdcd").unwrap(), "x23");
        assert_eq!(mm.map("abab").unwrap(), "abab");
    }

    /// Leftmost-longest replacement by trying every pattern at every position.
    fn replace_naively(pairs: &[(&str, &str)], input: &str) -> String {
        let bytes = input.as_bytes();
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let best = pairs
                .iter()
                .filter(|(p, _)| bytes[pos..].starts_with(p.as_bytes()))
                .max_by_key(|(p, _)| p.len())
                .map(|&(p, r)| (p.len(), r));
            match best {
                Some((len, r)) => {
                    out.extend_from_slice(r.as_bytes());
                    pos += len;
                }
                None => {
                    out.push(bytes[pos]);
                    pos += 1;
                }
            }
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_agrees_with_naive_replacement() {
        let pairs = [("ab", "<1>"), ("abab", "<2>"), ("ba", "<3>"), ("b", "<4>"), ("aab", "<5>")];
        let mm = mapper(&pairs);
        let mut state: u32 = 7;
        for _ in 0..300 {
            let len = (state % 12) as usize;
            let mut text = String::new();
            for _ in 0..len {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                text.push(['a', 'b', 'c'][(state >> 16) as usize % 3]);
            }
            state = state.wrapping_add(1);
            assert_eq!(mm.map(&text).unwrap(), replace_naively(&pairs, &text), "{text}");
        }
    }
}
