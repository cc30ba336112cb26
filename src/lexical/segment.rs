//! A single-file segment format readable through any [`Store`].
//!
//! Layout, all integers big-endian or VInt encoded:
//!
//! ```text
//! magic u32, version vint, max_doc vlong
//! deleted: count vlong, doc vlong*
//! fields: count vint, per field {
//!     name string, norms byte[max_doc],
//!     terms: count vlong, per term { text string, doc_freq vlong, offset vlong }
//! }
//! stored: per doc {
//!     count vint, per field {
//!         name string, text string,
//!         tv terms: count vint, per term { text string, count vint, position delta vint* }
//!         tv offsets: count vint, per position { start vlong, end vlong }
//!     }
//! }
//! postings: per term, per doc { doc delta vlong, freq vint, position delta vint* }
//! postings_start u64
//! ```
//!
//! The term dictionary, norms and stored fields are loaded on open; postings
//! are decoded lazily from independent clones of the input stream.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, info};
use parking_lot::Mutex;

use crate::error::{GlaiveError, Result};
use crate::lexical::DocId;
use crate::lexical::memory::{EmptyTermEnum, MemoryIndex, StoredDoc};
use crate::lexical::reader::{IndexReader, TermDocEnum, TermEnum, next_reader_id};
use crate::lexical::term::Term;
use crate::lexical::term_vector::{TVOffset, TVTerm, TermVector};
use crate::storage::Store;
use crate::storage::memory::RamOutput;
use crate::storage::stream::{InStream, OutStream};
use crate::util::bit_vector::BitVector;

const SEGMENT_MAGIC: u32 = 0x474c_5653;
const SEGMENT_VERSION: u32 = 1;
const SCRATCH_BUFFER_SIZE: usize = 4096;

/// Write `index` to `store` as the segment file `name`.
pub fn write_segment(index: &MemoryIndex, store: &dyn Store, name: &str) -> Result<()> {
    let max_doc = index.max_doc();
    let mut out = store.new_output(name)?;
    let mut postings = RamOutput::scratch(SCRATCH_BUFFER_SIZE);

    out.write_u32(SEGMENT_MAGIC)?;
    out.write_vint(SEGMENT_VERSION)?;
    out.write_vlong(max_doc)?;

    out.write_vlong(index.deleted.count() as u64)?;
    for doc in index.deleted.iter_set() {
        out.write_vlong(doc as u64)?;
    }

    out.write_vint(index.fields.len() as u32)?;
    for (field, data) in &index.fields {
        out.write_string(field)?;
        let mut norms = data.norms.as_ref().clone();
        norms.resize(max_doc as usize, 0);
        out.write_bytes(&norms)?;

        out.write_vlong(data.terms.len() as u64)?;
        for (text, list) in &data.terms {
            out.write_string(text)?;
            out.write_vlong(list.len() as u64)?;
            out.write_vlong(postings.length())?;

            let mut last_doc = 0;
            for posting in list.iter() {
                postings.write_vlong(posting.doc - last_doc)?;
                last_doc = posting.doc;
                postings.write_vint(posting.freq())?;
                let mut last_pos = 0;
                for &pos in &posting.positions {
                    postings.write_vint(pos - last_pos)?;
                    last_pos = pos;
                }
            }
        }
    }

    for doc in &index.docs {
        write_stored(out.as_mut(), doc)?;
    }

    let postings_start = out.position()?;
    postings.write_to(out.as_mut())?;
    out.write_u64(postings_start)?;
    out.close()?;

    info!(
        "wrote segment {} ({} docs, {} fields, {} posting bytes)",
        name,
        max_doc,
        index.fields.len(),
        postings.length()
    );
    Ok(())
}

fn write_stored(out: &mut dyn OutStream, doc: &StoredDoc) -> Result<()> {
    let mut names: Vec<&String> = doc.texts.keys().collect();
    names.sort();
    out.write_vint(names.len() as u32)?;
    for name in names {
        out.write_string(name)?;
        out.write_string(&doc.texts[name])?;
        match doc.term_vectors.get(name) {
            Some(tv) => {
                out.write_vint(tv.terms.len() as u32)?;
                for term in &tv.terms {
                    out.write_string(&term.text)?;
                    out.write_vint(term.positions.len() as u32)?;
                    let mut last = 0;
                    for &pos in &term.positions {
                        out.write_vint(pos - last)?;
                        last = pos;
                    }
                }
                out.write_vint(tv.offsets.len() as u32)?;
                for offset in &tv.offsets {
                    out.write_vlong(offset.start as u64)?;
                    out.write_vlong(offset.end as u64)?;
                }
            }
            None => {
                out.write_vint(0)?;
                out.write_vint(0)?;
            }
        }
    }
    Ok(())
}

/// Preallocation for `count` records of at least `min_len` bytes each, capped
/// by what the rest of the stream could hold.
fn capacity_for(input: &mut dyn InStream, count: u64, min_len: u64) -> Result<usize> {
    Ok(count.min(input.remaining()? / min_len) as usize)
}

fn read_stored(input: &mut dyn InStream) -> Result<StoredDoc> {
    let mut doc = StoredDoc::default();
    let count = input.read_vint()?;
    for _ in 0..count {
        let field = input.read_string()?;
        let text = input.read_string()?;

        let num_terms = input.read_vint()?;
        let mut terms = Vec::with_capacity(capacity_for(input, num_terms as u64, 2)?);
        for _ in 0..num_terms {
            let text = input.read_string()?;
            let freq = input.read_vint()?;
            let mut positions = Vec::with_capacity(capacity_for(input, freq as u64, 1)?);
            let mut last = 0;
            for _ in 0..freq {
                last += input.read_vint()?;
                positions.push(last);
            }
            terms.push(TVTerm { text, positions });
        }

        let num_offsets = input.read_vint()?;
        let mut offsets = Vec::with_capacity(capacity_for(input, num_offsets as u64, 2)?);
        for _ in 0..num_offsets {
            let start = input.read_vlong()? as usize;
            let end = input.read_vlong()? as usize;
            offsets.push(TVOffset { start, end });
        }

        if !terms.is_empty() || !offsets.is_empty() {
            doc.term_vectors.insert(
                field.clone(),
                TermVector {
                    field: field.clone(),
                    terms,
                    offsets,
                },
            );
        }
        doc.texts.insert(field, text);
    }
    Ok(doc)
}

#[derive(Debug, Clone, Copy)]
struct TermInfo {
    doc_freq: u64,
    offset: u64,
}

#[derive(Debug)]
struct SegmentField {
    norms: Arc<Vec<u8>>,
    terms: BTreeMap<String, TermInfo>,
}

/// Reads a segment written by [`write_segment`].
#[derive(Debug)]
pub struct SegmentReader {
    id: u64,
    name: String,
    max_doc: DocId,
    deleted: Arc<BitVector>,
    fields: BTreeMap<String, SegmentField>,
    docs: Vec<StoredDoc>,
    postings_start: u64,
    input: Mutex<Box<dyn InStream>>,
}

impl SegmentReader {
    pub fn open(store: &dyn Store, name: &str) -> Result<Self> {
        let mut input = store.open_input(name)?;
        if input.length() < 8 {
            return Err(GlaiveError::eof(format!("segment {name} is truncated")));
        }

        let magic = input.read_u32()?;
        if magic != SEGMENT_MAGIC {
            return Err(GlaiveError::invalid_argument(format!(
                "{name} is not a segment file (magic {magic:#x})"
            )));
        }
        let version = input.read_vint()?;
        if version != SEGMENT_VERSION {
            return Err(GlaiveError::unsupported(format!(
                "segment version {version} in {name}"
            )));
        }
        let max_doc = input.read_vlong()?;
        // every document stores at least its field count
        if max_doc > input.remaining()? {
            return Err(GlaiveError::eof(format!(
                "segment {name} claims {max_doc} documents but is only {} bytes",
                input.length()
            )));
        }

        let mut deleted = BitVector::new(max_doc as usize);
        let num_deleted = input.read_vlong()?;
        for _ in 0..num_deleted {
            let doc = input.read_vlong()?;
            if doc >= max_doc {
                return Err(GlaiveError::invalid_argument(format!(
                    "deleted document {doc} out of range in segment {name}"
                )));
            }
            deleted.set(doc as usize);
        }

        let num_fields = input.read_vint()?;
        let mut fields = BTreeMap::new();
        for _ in 0..num_fields {
            let field = input.read_string()?;
            let mut norms = vec![0u8; max_doc as usize];
            input.read_bytes(&mut norms)?;

            let num_terms = input.read_vlong()?;
            let mut terms = BTreeMap::new();
            for _ in 0..num_terms {
                let text = input.read_string()?;
                let doc_freq = input.read_vlong()?;
                let offset = input.read_vlong()?;
                terms.insert(text, TermInfo { doc_freq, offset });
            }
            fields.insert(
                field,
                SegmentField {
                    norms: Arc::new(norms),
                    terms,
                },
            );
        }

        let mut docs = Vec::with_capacity(capacity_for(input.as_mut(), max_doc, 1)?);
        for _ in 0..max_doc {
            docs.push(read_stored(input.as_mut())?);
        }

        let length = input.length();
        input.seek_to(length - 8)?;
        let postings_start = input.read_u64()?;

        debug!(
            "opened segment {} ({} docs, {} fields)",
            name,
            max_doc,
            fields.len()
        );

        Ok(SegmentReader {
            id: next_reader_id(),
            name: name.to_string(),
            max_doc,
            deleted: Arc::new(deleted),
            fields,
            docs,
            postings_start,
            input: Mutex::new(input),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn term_info(&self, term: &Term) -> Option<TermInfo> {
        self.fields.get(&term.field)?.terms.get(&term.text).copied()
    }

    fn postings(&self, term: &Term) -> Result<SegmentPostings> {
        let Some(info) = self.term_info(term) else {
            return Ok(SegmentPostings::empty());
        };
        let mut input = self.input.lock().clone_stream()?;
        input.seek_to(self.postings_start + info.offset)?;
        Ok(SegmentPostings {
            input: Some(input),
            remaining: info.doc_freq,
            last_doc: 0,
            doc: DocId::MAX,
            positions: Vec::new(),
            pos_idx: 0,
            deleted: (self.deleted.count() > 0).then(|| Arc::clone(&self.deleted)),
        })
    }
}

struct SegmentTermEnum<'a> {
    range: std::collections::btree_map::Range<'a, String, TermInfo>,
    current: Option<(&'a String, &'a TermInfo)>,
}

impl TermEnum for SegmentTermEnum<'_> {
    fn next(&mut self) -> Result<bool> {
        self.current = self.range.next();
        Ok(self.current.is_some())
    }

    fn term(&self) -> &str {
        self.current.map_or("", |(text, _)| text.as_str())
    }

    fn doc_freq(&self) -> u64 {
        self.current.map_or(0, |(_, info)| info.doc_freq)
    }
}

/// Postings decoded on demand from a segment stream.
#[derive(Debug)]
struct SegmentPostings {
    input: Option<Box<dyn InStream>>,
    remaining: u64,
    last_doc: DocId,
    doc: DocId,
    positions: Vec<u32>,
    pos_idx: usize,
    deleted: Option<Arc<BitVector>>,
}

impl SegmentPostings {
    fn empty() -> Self {
        SegmentPostings {
            input: None,
            remaining: 0,
            last_doc: 0,
            doc: DocId::MAX,
            positions: Vec::new(),
            pos_idx: 0,
            deleted: None,
        }
    }
}

impl TermDocEnum for SegmentPostings {
    fn next(&mut self) -> Result<bool> {
        let Some(input) = self.input.as_mut() else {
            return Ok(false);
        };
        while self.remaining > 0 {
            self.remaining -= 1;
            let doc = self.last_doc + input.read_vlong()?;
            self.last_doc = doc;
            let freq = input.read_vint()?;
            self.positions.clear();
            let mut last = 0;
            for _ in 0..freq {
                last += input.read_vint()?;
                self.positions.push(last);
            }
            if self.deleted.as_ref().is_some_and(|d| d.get(doc as usize)) {
                continue;
            }
            self.doc = doc;
            self.pos_idx = 0;
            return Ok(true);
        }
        self.doc = DocId::MAX;
        self.positions.clear();
        Ok(false)
    }

    fn doc(&self) -> DocId {
        self.doc
    }

    fn freq(&self) -> u32 {
        self.positions.len() as u32
    }

    fn next_position(&mut self) -> Result<Option<u32>> {
        let position = self.positions.get(self.pos_idx).copied();
        if position.is_some() {
            self.pos_idx += 1;
        }
        Ok(position)
    }
}

impl IndexReader for SegmentReader {
    fn reader_id(&self) -> u64 {
        self.id
    }

    fn max_doc(&self) -> DocId {
        self.max_doc
    }

    fn is_deleted(&self, doc: DocId) -> bool {
        self.deleted.get(doc as usize)
    }

    fn has_deletions(&self) -> bool {
        self.deleted.count() > 0
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn doc_freq(&self, term: &Term) -> u64 {
        self.term_info(term).map_or(0, |info| info.doc_freq)
    }

    fn terms_from(&self, field: &str, from: &str) -> Result<Box<dyn TermEnum + '_>> {
        match self.fields.get(field) {
            Some(data) => Ok(Box::new(SegmentTermEnum {
                range: data
                    .terms
                    .range::<str, _>((Bound::Included(from), Bound::Unbounded)),
                current: None,
            })),
            None => Ok(Box::new(EmptyTermEnum)),
        }
    }

    fn term_docs_for(&self, term: &Term) -> Result<Box<dyn TermDocEnum>> {
        Ok(Box::new(self.postings(term)?))
    }

    fn term_positions_for(&self, term: &Term) -> Result<Box<dyn TermDocEnum>> {
        Ok(Box::new(self.postings(term)?))
    }

    fn norms(&self, field: &str) -> Option<Arc<Vec<u8>>> {
        self.fields.get(field).map(|f| Arc::clone(&f.norms))
    }

    fn term_vector(&self, doc: DocId, field: &str) -> Result<Option<TermVector>> {
        Ok(self
            .docs
            .get(doc as usize)
            .and_then(|d| d.term_vectors.get(field))
            .cloned())
    }

    fn field_text(&self, doc: DocId, field: &str) -> Result<Option<String>> {
        Ok(self
            .docs
            .get(doc as usize)
            .and_then(|d| d.texts.get(field))
            .cloned())
    }
}

impl MemoryIndex {
    /// Persist this index as a segment file.
    pub fn write_segment(&self, store: &dyn Store, name: &str) -> Result<()> {
        write_segment(self, store, name)
    }
}

/// Field texts keyed by name, as returned by [`SegmentReader::document`].
pub type StoredFields = AHashMap<String, String>;

impl SegmentReader {
    /// All stored field texts of `doc`.
    pub fn document(&self, doc: DocId) -> Result<StoredFields> {
        self.docs
            .get(doc as usize)
            .map(|d| d.texts.clone())
            .ok_or_else(|| {
                GlaiveError::invalid_argument(format!(
                    "document {doc} is out of range (max_doc {})",
                    self.max_doc
                ))
            })
    }
}
