//! Compound (archive) files.
//!
//! A compound file packs several named files into one. It starts with a
//! directory, `VInt(count)` followed by `count` entries of `(u64 offset,
//! string name)`, and continues with the file bodies laid out back to back in
//! directory order. An entry's length is the distance to the next entry's
//! offset, or to the end of the archive for the last one.

use std::io::{self, Read, Seek, SeekFrom};

use ahash::{AHashMap, AHashSet};
use log::debug;
use parking_lot::Mutex;

use crate::error::{GlaiveError, Result};
use crate::storage::memory::resolve_seek;
use crate::storage::{InStream, Lock, OutStream, Store};

/// A directory entry takes at least a `u64` offset and a one-byte name length.
const MIN_ENTRY_LEN: u64 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    offset: u64,
    length: u64,
}

/// A read-only [`Store`] over one compound file.
#[derive(Debug)]
pub struct CompoundStore {
    name: String,
    stream: Mutex<Box<dyn InStream>>,
    entries: AHashMap<String, Entry>,
}

impl CompoundStore {
    /// Read the directory of `name` from `store`.
    pub fn open(store: &dyn Store, name: &str) -> Result<Self> {
        let mut stream = store.open_input(name)?;
        // The stream is dropped on any early return below.
        let entries = Self::read_directory(stream.as_mut())?;

        debug!("opened compound file {} with {} entries", name, entries.len());

        Ok(CompoundStore {
            name: name.to_string(),
            stream: Mutex::new(stream),
            entries,
        })
    }

    fn read_directory(stream: &mut dyn InStream) -> Result<AHashMap<String, Entry>> {
        let count = stream.read_vint()? as usize;
        let fits = (stream.remaining()? / MIN_ENTRY_LEN) as usize;
        let mut listed: Vec<(String, u64)> = Vec::with_capacity(count.min(fits));
        for _ in 0..count {
            let offset = stream.read_u64()?;
            let name = stream.read_string()?;
            listed.push((name, offset));
        }

        let total = stream.length();
        let mut entries = AHashMap::with_capacity(listed.len());
        for (i, (name, offset)) in listed.iter().enumerate() {
            let end = listed.get(i + 1).map_or(total, |(_, next)| *next);
            if end < *offset || end > total {
                return Err(GlaiveError::invalid_argument(format!(
                    "corrupt compound directory entry {name}"
                )));
            }
            entries.insert(
                name.clone(),
                Entry {
                    offset: *offset,
                    length: end - offset,
                },
            );
        }
        Ok(entries)
    }

    /// Name of the underlying compound file.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| GlaiveError::file_not_found(name))
    }

    fn read_only(op: &str) -> GlaiveError {
        GlaiveError::unsupported(format!("{op} is not supported on a compound store"))
    }
}

impl Store for CompoundStore {
    fn touch(&self, _name: &str) -> Result<()> {
        Err(Self::read_only("touch"))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.entries.contains_key(name))
    }

    fn remove(&self, _name: &str) -> Result<bool> {
        Err(Self::read_only("remove"))
    }

    fn rename(&self, _from: &str, _to: &str) -> Result<()> {
        Err(Self::read_only("rename"))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn each(&self, visit: &mut dyn FnMut(&str)) -> Result<()> {
        for name in self.entries.keys() {
            visit(name);
        }
        Ok(())
    }

    fn clear_locks(&self) -> Result<()> {
        Err(Self::read_only("clear_locks"))
    }

    fn clear(&self) -> Result<()> {
        Err(Self::read_only("clear"))
    }

    fn clear_all(&self) -> Result<()> {
        Err(Self::read_only("clear_all"))
    }

    fn length(&self, name: &str) -> Result<u64> {
        Ok(self.entry(name)?.length)
    }

    fn new_output(&self, _name: &str) -> Result<Box<dyn OutStream>> {
        Err(Self::read_only("new_output"))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn InStream>> {
        let entry = self.entry(name)?;
        let mut base = self.stream.lock().clone_stream()?;
        base.seek_to(entry.offset)?;
        Ok(Box::new(SliceInput {
            base,
            start: entry.offset,
            len: entry.length,
            pos: 0,
        }))
    }

    fn open_lock(&self, _name: &str) -> Result<Lock> {
        Err(Self::read_only("open_lock"))
    }
}

/// A window `[start, start + len)` of another input.
#[derive(Debug)]
pub struct SliceInput {
    base: Box<dyn InStream>,
    start: u64,
    len: u64,
    pos: u64,
}

impl Read for SliceInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            return Ok(0);
        }
        let n = (buf.len() as u64).min(self.len - self.pos) as usize;
        let n = self.base.read(&mut buf[..n])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SliceInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.len)?;
        self.base.seek(SeekFrom::Start(self.start + self.pos))?;
        Ok(self.pos)
    }
}

impl InStream for SliceInput {
    fn length(&self) -> u64 {
        self.len
    }

    fn clone_stream(&self) -> Result<Box<dyn InStream>> {
        let mut base = self.base.clone_stream()?;
        base.seek(SeekFrom::Start(self.start + self.pos))?;
        Ok(Box::new(SliceInput {
            base,
            start: self.start,
            len: self.len,
            pos: self.pos,
        }))
    }
}

/// Builds a compound file from files already present in a store.
#[derive(Debug)]
pub struct CompoundWriter<'a> {
    store: &'a dyn Store,
    name: String,
    files: Vec<String>,
    seen: AHashSet<String>,
}

impl<'a> CompoundWriter<'a> {
    pub fn new(store: &'a dyn Store, name: &str) -> Self {
        CompoundWriter {
            store,
            name: name.to_string(),
            files: Vec::new(),
            seen: AHashSet::new(),
        }
    }

    /// Queue `name` for inclusion. Each name may be added once.
    pub fn add_file(&mut self, name: &str) -> Result<()> {
        if !self.seen.insert(name.to_string()) {
            return Err(GlaiveError::invalid_argument(format!(
                "tried to add file \"{name}\" which has already been added to the compound store"
            )));
        }
        self.files.push(name.to_string());
        Ok(())
    }

    /// Write the archive and consume the writer.
    pub fn close(self) -> Result<()> {
        if self.files.is_empty() {
            return Err(GlaiveError::state("no files have been added to the compound store"));
        }

        let count = u32::try_from(self.files.len())
            .map_err(|_| GlaiveError::invalid_argument("too many files for a compound store"))?;

        let mut out = self.store.new_output(&self.name)?;
        out.write_vint(count)?;

        let mut slots = Vec::with_capacity(self.files.len());
        for file in &self.files {
            slots.push(out.position()?);
            out.write_u64(0)?;
            out.write_string(file)?;
        }

        let mut offsets = Vec::with_capacity(self.files.len());
        for file in &self.files {
            offsets.push(out.position()?);
            let mut input = self.store.open_input(file)?;
            let len = input.length();
            out.copy_bytes(input.as_mut(), len)?;
        }

        for (slot, offset) in slots.iter().zip(&offsets) {
            out.seek_to(*slot)?;
            out.write_u64(*offset)?;
        }

        out.close()
    }
}
