//! Sorting hits by field values.
//!
//! Field values come from a [`FieldCache`] built once per reader by walking the
//! field's terms and their postings. Every document takes the value of the
//! (last) term it contains. Numeric fields give documents without a term the
//! value 0; in string fields they sort after every document with a value.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use log::trace;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{GlaiveError, Result};
use crate::lexical::reader::IndexReader;
use crate::lexical::term::Term;
use crate::search::top_docs::Hit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortType {
    /// Relevance, highest first.
    Score,
    /// Document number.
    Doc,
    /// Term ordinal: the position of the document's term in term order.
    Byte,
    Integer,
    Float,
    /// Byte-wise order of the term text.
    String,
    /// Integer, float or string, decided by the field's first term.
    Auto,
}

impl fmt::Display for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortType::Score => "<SCORE>",
            SortType::Doc => "<DOC>",
            SortType::Byte => "<byte>",
            SortType::Integer => "<integer>",
            SortType::Float => "<float>",
            SortType::String => "<string>",
            SortType::Auto => "<auto>",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    field: Option<String>,
    sort_type: SortType,
    reverse: bool,
}

impl SortField {
    pub fn new<F: Into<String>>(field: F, sort_type: SortType) -> Self {
        SortField {
            field: Some(field.into()),
            sort_type,
            reverse: false,
        }
    }

    pub fn score() -> Self {
        SortField {
            field: None,
            sort_type: SortType::Score,
            reverse: false,
        }
    }

    pub fn doc() -> Self {
        SortField {
            field: None,
            sort_type: SortType::Doc,
            reverse: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn sort_type(&self) -> SortType {
        self.sort_type
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    fn needs_values(&self) -> bool {
        !matches!(self.sort_type, SortType::Score | SortType::Doc)
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{field}:")?;
        }
        write!(f, "{}{}", self.sort_type, if self.reverse { "!" } else { "" })
    }
}

/// An ordered list of sort fields. The default sorts by relevance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    fields: Vec<SortField>,
}

impl Default for Sort {
    fn default() -> Self {
        Sort {
            fields: vec![SortField::score(), SortField::doc()],
        }
    }
}

impl Sort {
    pub fn new(fields: Vec<SortField>) -> Self {
        Sort { fields }
    }

    /// Sort by the named fields, detecting each field's type.
    pub fn by_fields<S: AsRef<str>>(names: &[S]) -> Self {
        let fields = names
            .iter()
            .map(|name| SortField::new(name.as_ref(), SortType::Auto))
            .collect();
        Sort { fields }
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    pub fn add_field(&mut self, field: SortField) {
        self.fields.push(field);
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.fields.iter().map(|sf| sf.to_string()).collect();
        write!(f, "Sort[{}]", fields.join(", "))
    }
}

/// The value a hit was sorted by, one per sort field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SortValue {
    Score(f32),
    Doc(u64),
    Int(i64),
    Float(f32),
    Str(Option<String>),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Score(a), SortValue::Score(b)) => b.total_cmp(a),
            (SortValue::Doc(a), SortValue::Doc(b)) => a.cmp(b),
            (SortValue::Int(a), SortValue::Int(b)) => a.cmp(b),
            (SortValue::Float(a), SortValue::Float(b)) => a.total_cmp(b),
            (SortValue::Str(a), SortValue::Str(b)) => match (a, b) {
                (Some(a), Some(b)) => a.as_bytes().cmp(b.as_bytes()),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            _ => Ordering::Equal,
        }
    }
}

/// Order of two hits under `fields`: `Less` when `a` ranks before `b`.
///
/// Ties are broken by ascending document number.
pub fn compare_hits(fields: &[SortField], a: &Hit, b: &Hit) -> Ordering {
    for (i, field) in fields.iter().enumerate() {
        let ord = match field.sort_type {
            SortType::Score => b.score.total_cmp(&a.score),
            SortType::Doc => a.doc.cmp(&b.doc),
            _ => match (a.sort_values.get(i), b.sort_values.get(i)) {
                (Some(x), Some(y)) => x.compare(y),
                _ => Ordering::Equal,
            },
        };
        let ord = if field.reverse { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.doc.cmp(&b.doc)
}

/// Per-document values of one field.
#[derive(Debug)]
struct FieldValues {
    sort_type: SortType,
    values: Vec<SortValue>,
}

/// Per-reader cache of field values used for sorting.
#[derive(Default)]
pub struct FieldCache {
    entries: Mutex<AHashMap<(u64, String, SortType), Arc<FieldValues>>>,
}

impl fmt::Debug for FieldCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl FieldCache {
    pub fn new() -> Self {
        FieldCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn values(&self, reader: &dyn IndexReader, sf: &SortField) -> Result<Arc<FieldValues>> {
        let field = sf.field.as_deref().unwrap_or_default();
        if !reader.has_field(field) {
            return Err(GlaiveError::invalid_argument(format!(
                "cannot sort by field \"{field}\", it doesn't exist in the index"
            )));
        }
        let sort_type = match sf.sort_type {
            SortType::Auto => detect_type(reader, field)?,
            other => other,
        };
        let key = (reader.reader_id(), field.to_string(), sort_type);
        if let Some(values) = self.entries.lock().get(&key) {
            trace!("field cache hit for {field} {sort_type}");
            return Ok(Arc::clone(values));
        }

        let values = Arc::new(load_values(reader, field, sort_type)?);
        trace!(
            "field cache miss, loaded {} {} values of {field}",
            values.values.len(),
            values.sort_type
        );
        Ok(Arc::clone(self.entries.lock().entry(key).or_insert(values)))
    }
}

fn detect_type(reader: &dyn IndexReader, field: &str) -> Result<SortType> {
    let mut terms = reader.terms(field)?;
    if !terms.next()? {
        if reader.num_docs() > 0 {
            return Err(GlaiveError::invalid_argument(format!(
                "cannot sort by field \"{field}\" as there are no terms in that field"
            )));
        }
        return Ok(SortType::String);
    }
    let text = terms.term();
    Ok(if text.parse::<i64>().is_ok() {
        SortType::Integer
    } else if text.parse::<f32>().is_ok() {
        SortType::Float
    } else {
        SortType::String
    })
}

fn load_values(reader: &dyn IndexReader, field: &str, sort_type: SortType) -> Result<FieldValues> {
    let empty = match sort_type {
        SortType::Float => SortValue::Float(0.0),
        SortType::String => SortValue::Str(None),
        _ => SortValue::Int(0),
    };
    let mut values = vec![empty; reader.max_doc() as usize];
    let mut terms = reader.terms(field)?;
    let mut ordinal = 0;
    while terms.next()? {
        ordinal += 1;
        let text = terms.term();
        let value = match sort_type {
            SortType::Byte => SortValue::Int(ordinal),
            SortType::Integer => SortValue::Int(text.parse().unwrap_or(0)),
            SortType::Float => SortValue::Float(text.parse().unwrap_or(0.0)),
            _ => SortValue::Str(Some(text.to_string())),
        };
        let mut docs = reader.term_docs_for(&Term::new(field, text))?;
        while docs.next()? {
            if let Some(slot) = values.get_mut(docs.doc() as usize) {
                *slot = value.clone();
            }
        }
    }
    Ok(FieldValues { sort_type, values })
}

/// The comparator state for one sort over one reader.
#[derive(Debug)]
pub(crate) struct Sorter {
    fields: Vec<SortField>,
    values: Vec<Option<Arc<FieldValues>>>,
}

impl Sorter {
    pub fn new(sort: &Sort, reader: &dyn IndexReader, cache: &FieldCache) -> Result<Self> {
        let mut values = Vec::with_capacity(sort.fields.len());
        for sf in &sort.fields {
            values.push(if sf.needs_values() {
                Some(cache.values(reader, sf)?)
            } else {
                None
            });
        }
        Ok(Sorter {
            fields: sort.fields.clone(),
            values,
        })
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// Attach the sort values of `hit`.
    pub fn fill(&self, hit: &mut Hit) {
        hit.sort_values = self
            .values
            .iter()
            .zip(&self.fields)
            .map(|(values, sf)| match values {
                Some(fv) => fv
                    .values
                    .get(hit.doc as usize)
                    .cloned()
                    .unwrap_or(SortValue::Str(None)),
                None if sf.sort_type == SortType::Score => SortValue::Score(hit.score),
                None => SortValue::Doc(hit.doc),
            })
            .collect();
    }

    /// The detected type of each field, after resolving `Auto`.
    #[cfg(test)]
    fn resolved_types(&self) -> Vec<SortType> {
        self.values
            .iter()
            .zip(&self.fields)
            .map(|(v, sf)| v.as_ref().map_or(sf.sort_type, |fv| fv.sort_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::memory::MemoryIndex;

    fn index() -> MemoryIndex {
        let mut index = MemoryIndex::new();
        for (name, age, weight) in [
            ("carol", "31", "62.5"),
            ("alice", "27", "55.0"),
            ("bob", "40", "80.25"),
            ("dave", "27", "70"),
        ] {
            index
                .add_document(&[("name", name), ("age", age), ("weight", weight)])
                .unwrap();
        }
        index.add_document(&[("name", "eve")]).unwrap();
        index
    }

    fn sorted(index: &MemoryIndex, sort: &Sort) -> Vec<u64> {
        let cache = FieldCache::new();
        let sorter = Sorter::new(sort, index, &cache).unwrap();
        let mut hits: Vec<Hit> = (0..index.max_doc()).map(|doc| Hit::new(doc, 1.0)).collect();
        for hit in &mut hits {
            sorter.fill(hit);
        }
        hits.sort_by(|a, b| compare_hits(sorter.fields(), a, b));
        hits.iter().map(|h| h.doc).collect()
    }

    #[test]
    fn test_display() {
        assert_eq!(Sort::default().to_string(), "Sort[<SCORE>, <DOC>]");
        let sort = Sort::new(vec![
            SortField::new("age", SortType::Integer).reversed(),
            SortField::doc(),
        ]);
        assert_eq!(sort.to_string(), "Sort[age:<integer>!, <DOC>]");
    }

    #[test]
    fn test_sort_by_string_and_integer() {
        let index = index();
        let by_name = Sort::new(vec![SortField::new("name", SortType::String)]);
        assert_eq!(sorted(&index, &by_name), vec![1, 2, 0, 3, 4]);

        // equal ages fall back to document order; eve has no age
        let by_age = Sort::new(vec![SortField::new("age", SortType::Integer)]);
        assert_eq!(sorted(&index, &by_age), vec![4, 1, 3, 0, 2]);

        let by_age_desc = Sort::new(vec![SortField::new("age", SortType::Integer).reversed()]);
        assert_eq!(sorted(&index, &by_age_desc), vec![2, 0, 1, 3, 4]);
    }

    #[test]
    fn test_auto_detection() {
        let index = index();
        let cache = FieldCache::new();
        let sort = Sort::by_fields(&["age", "weight", "name"]);
        let sorter = Sorter::new(&sort, &index, &cache).unwrap();
        assert_eq!(
            sorter.resolved_types(),
            vec![SortType::Integer, SortType::Float, SortType::String]
        );
        assert_eq!(cache.len(), 3);
        Sorter::new(&sort, &index, &cache).unwrap();
        assert_eq!(cache.len(), 3);

        let by_weight = Sort::by_fields(&["weight"]);
        assert_eq!(sorted(&index, &by_weight), vec![4, 1, 0, 3, 2]);
    }

    #[test]
    fn test_byte_ordinals() {
        let index = index();
        let by_ordinal = Sort::new(vec![SortField::new("name", SortType::Byte).reversed()]);
        assert_eq!(sorted(&index, &by_ordinal), vec![4, 3, 0, 2, 1]);
    }

    #[test]
    fn test_missing_field() {
        let index = index();
        let cache = FieldCache::new();
        let sort = Sort::new(vec![SortField::new("colour", SortType::String)]);
        let err = Sorter::new(&sort, &index, &cache).unwrap_err();
        assert!(matches!(err, GlaiveError::InvalidArgument(_)));
    }
}
