//! In-memory store for tests, scratch data and small indexes.
//!
//! Every file is a [`RamFile`]: a growable list of fixed-size buffers that is
//! extended lazily as data is written. Closed files are shared behind an `Arc`
//! so opening an input never copies content, and replacing a file never
//! disturbs readers of the previous version.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::{GlaiveError, Result};
use crate::storage::lock::{LockBackend, LockPolicy, is_lock_file};
use crate::storage::{InStream, Lock, OutStream, Store, StoreConfig};

/// File content made of equally sized buffers.
#[derive(Debug, Clone)]
pub struct RamFile {
    buffers: Vec<Box<[u8]>>,
    buffer_size: usize,
    len: u64,
}

impl RamFile {
    pub fn new(buffer_size: usize) -> Self {
        RamFile {
            buffers: Vec::new(),
            buffer_size: buffer_size.max(1),
            len: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated buffers.
    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> usize {
        if pos >= self.len {
            return 0;
        }
        let available = (self.len - pos).min(buf.len() as u64) as usize;
        let mut copied = 0;
        while copied < available {
            let at = pos as usize + copied;
            let buffer = &self.buffers[at / self.buffer_size];
            let offset = at % self.buffer_size;
            let n = (self.buffer_size - offset).min(available - copied);
            buf[copied..copied + n].copy_from_slice(&buffer[offset..offset + n]);
            copied += n;
        }
        copied
    }

    fn write_at(&mut self, pos: u64, data: &[u8]) {
        let end = pos as usize + data.len();
        while self.buffers.len() * self.buffer_size < end {
            self.buffers
                .push(vec![0u8; self.buffer_size].into_boxed_slice());
        }

        let mut written = 0;
        while written < data.len() {
            let at = pos as usize + written;
            let offset = at % self.buffer_size;
            let buffer = &mut self.buffers[at / self.buffer_size];
            let n = (self.buffer_size - offset).min(data.len() - written);
            buffer[offset..offset + n].copy_from_slice(&data[written..written + n]);
            written += n;
        }
        self.len = self.len.max(end as u64);
    }

    /// The populated part of each buffer, in order.
    fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        let len = self.len as usize;
        let size = self.buffer_size;
        self.buffers.iter().enumerate().filter_map(move |(i, b)| {
            let start = i * size;
            (start < len).then(|| &b[..(len - start).min(size)])
        })
    }
}

/// The shared file table of a [`RamStore`].
#[derive(Debug, Default)]
struct RamFiles {
    files: RwLock<AHashMap<String, Arc<RamFile>>>,
}

impl LockBackend for RamFiles {
    fn create_exclusive(&self, file: &str) -> Result<bool> {
        let mut files = self.files.write();
        if files.contains_key(file) {
            return Ok(false);
        }
        files.insert(file.to_string(), Arc::new(RamFile::new(1)));
        Ok(true)
    }

    fn remove_marker(&self, file: &str) -> Result<()> {
        self.files.write().remove(file);
        Ok(())
    }

    fn marker_exists(&self, file: &str) -> Result<bool> {
        Ok(self.files.read().contains_key(file))
    }
}

/// An in-memory [`Store`].
#[derive(Debug, Clone)]
pub struct RamStore {
    files: Arc<RamFiles>,
    config: StoreConfig,
}

impl RamStore {
    pub fn new(config: StoreConfig) -> Self {
        RamStore {
            files: Arc::new(RamFiles::default()),
            config,
        }
    }

    /// Copy every file of `source` into a new in-memory store.
    pub fn from_store(source: &dyn Store, config: StoreConfig) -> Result<Self> {
        let store = RamStore::new(config);
        for name in source.list()? {
            let mut input = source.open_input(&name)?;
            let mut output = store.new_output(&name)?;
            let len = input.length();
            output.copy_bytes(input.as_mut(), len)?;
            output.close()?;
        }
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Total size of all files in bytes.
    pub fn total_size(&self) -> u64 {
        self.files.files.read().values().map(|f| f.len()).sum()
    }

    fn get(&self, name: &str) -> Result<Arc<RamFile>> {
        self.files
            .files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GlaiveError::file_not_found(name))
    }
}

impl Default for RamStore {
    fn default() -> Self {
        RamStore::new(StoreConfig::default())
    }
}

impl Store for RamStore {
    fn touch(&self, name: &str) -> Result<()> {
        self.files
            .files
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RamFile::new(self.config.buffer_size)));
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.files.files.read().contains_key(name))
    }

    fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.files.files.write().remove(name).is_some())
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.files.write();
        let file = files
            .remove(from)
            .ok_or_else(|| GlaiveError::file_not_found(from))?;
        files.insert(to.to_string(), file);
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self
            .files
            .files
            .read()
            .keys()
            .filter(|name| !is_lock_file(name))
            .count())
    }

    fn each(&self, visit: &mut dyn FnMut(&str)) -> Result<()> {
        let names: Vec<String> = self
            .files
            .files
            .read()
            .keys()
            .filter(|name| !is_lock_file(name))
            .cloned()
            .collect();
        for name in &names {
            visit(name);
        }
        Ok(())
    }

    fn clear_locks(&self) -> Result<()> {
        self.files.files.write().retain(|name, _| !is_lock_file(name));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.files.files.write().retain(|name, _| is_lock_file(name));
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.files.files.write().clear();
        Ok(())
    }

    fn length(&self, name: &str) -> Result<u64> {
        Ok(self.get(name)?.len())
    }

    fn new_output(&self, name: &str) -> Result<Box<dyn OutStream>> {
        Ok(Box::new(RamOutput {
            file: RamFile::new(self.config.buffer_size),
            pos: 0,
            target: Some((name.to_string(), Arc::clone(&self.files))),
            closed: false,
        }))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn InStream>> {
        Ok(Box::new(RamInput {
            file: self.get(name)?,
            pos: 0,
        }))
    }

    fn open_lock(&self, name: &str) -> Result<Lock> {
        let backend: Arc<dyn LockBackend> = self.files.clone();
        Ok(Lock::new(
            name,
            &self.config.lock_prefix,
            backend,
            LockPolicy::single_shot(),
        ))
    }
}

/// A cursor over a closed [`RamFile`].
#[derive(Debug, Clone)]
pub struct RamInput {
    file: Arc<RamFile>,
    pos: u64,
}

impl RamInput {
    pub fn new(file: Arc<RamFile>) -> Self {
        RamInput { file, pos: 0 }
    }
}

impl Read for RamInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read_at(self.pos, buf);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for RamInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.file.len())?;
        Ok(self.pos)
    }
}

impl InStream for RamInput {
    fn length(&self) -> u64 {
        self.file.len()
    }

    fn clone_stream(&self) -> Result<Box<dyn InStream>> {
        Ok(Box::new(self.clone()))
    }
}

/// Output into a [`RamFile`].
///
/// Outputs created by [`RamStore::new_output`] publish their file on close.
/// Dropping one that was never closed discards what was written. A scratch
/// output created with [`RamOutput::scratch`] belongs to no store; its content
/// is copied elsewhere with [`RamOutput::write_to`].
#[derive(Debug)]
pub struct RamOutput {
    file: RamFile,
    pos: u64,
    target: Option<(String, Arc<RamFiles>)>,
    closed: bool,
}

impl RamOutput {
    /// A scratch buffer not associated with any store.
    pub fn scratch(buffer_size: usize) -> Self {
        RamOutput {
            file: RamFile::new(buffer_size),
            pos: 0,
            target: None,
            closed: false,
        }
    }

    pub fn length(&self) -> u64 {
        self.file.len()
    }

    /// Copy the whole content into `out`.
    pub fn write_to(&self, out: &mut dyn OutStream) -> Result<()> {
        for chunk in self.file.chunks() {
            out.write_bytes(chunk)?;
        }
        Ok(())
    }

    /// Empty the buffer for reuse.
    pub fn reset(&mut self) {
        self.file = RamFile::new(self.file.buffer_size);
        self.pos = 0;
        self.closed = false;
    }

    fn publish(&mut self) {
        if let Some((name, files)) = &self.target {
            let buffer_size = self.file.buffer_size;
            let file = std::mem::replace(&mut self.file, RamFile::new(buffer_size));
            files.files.write().insert(name.clone(), Arc::new(file));
        }
    }
}

impl Write for RamOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("write to closed stream"));
        }
        self.file.write_at(self.pos, buf);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for RamOutput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.file.len())?;
        Ok(self.pos)
    }
}

impl OutStream for RamOutput {
    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.publish();
            self.closed = true;
        }
        Ok(())
    }
}

pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, len: u64) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(p) => p as i128,
        SeekFrom::End(off) => len as i128 + off as i128,
        SeekFrom::Current(off) => current as i128 + off as i128,
    };
    if target < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek before start of stream",
        ));
    }
    Ok(target as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RamStore {
        RamStore::new(StoreConfig {
            buffer_size: 4,
            ..StoreConfig::default()
        })
    }

    #[test]
    fn test_create_and_read_file() {
        let store = store();

        let mut output = store.new_output("test.txt").unwrap();
        output.write_bytes(b"Hello, Memory!").unwrap();
        output.close().unwrap();

        let mut input = store.open_input("test.txt").unwrap();
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer).unwrap();

        assert_eq!(buffer, b"Hello, Memory!");
        assert_eq!(input.length(), 14);
        assert_eq!(store.total_size(), 14);
    }

    #[test]
    fn test_buffers_grow_lazily() {
        let mut file = RamFile::new(4);
        assert_eq!(file.num_buffers(), 0);
        file.write_at(0, b"abcdefghij");
        assert_eq!(file.num_buffers(), 3);
        assert_eq!(file.len(), 10);

        let mut buf = [0u8; 6];
        assert_eq!(file.read_at(3, &mut buf), 6);
        assert_eq!(&buf, b"defghi");
        assert_eq!(file.read_at(10, &mut buf), 0);
    }

    #[test]
    fn test_not_visible_until_closed() {
        let store = store();
        let mut output = store.new_output("seg").unwrap();
        output.write_bytes(b"data").unwrap();
        assert!(!store.exists("seg").unwrap());
        output.close().unwrap();
        assert!(store.exists("seg").unwrap());
    }

    #[test]
    fn test_unclosed_output_is_discarded() {
        let store = store();
        let mut output = store.new_output("old").unwrap();
        output.write_bytes(b"kept").unwrap();
        output.close().unwrap();

        let mut output = store.new_output("old").unwrap();
        output.write_bytes(b"half written").unwrap();
        drop(output);
        let mut output = store.new_output("fresh").unwrap();
        output.write_bytes(b"lost").unwrap();
        drop(output);

        assert_eq!(store.length("old").unwrap(), 4);
        assert!(!store.exists("fresh").unwrap());
    }

    #[test]
    fn test_file_operations() {
        let store = store();
        assert!(!store.exists("a").unwrap());

        store.touch("a").unwrap();
        assert!(store.exists("a").unwrap());
        assert_eq!(store.length("a").unwrap(), 0);

        store.rename("a", "b").unwrap();
        assert!(!store.exists("a").unwrap());
        assert!(store.remove("b").unwrap());
        assert!(!store.remove("b").unwrap());
        assert!(store.rename("missing", "x").unwrap_err().is_file_not_found());
        assert!(store.length("missing").unwrap_err().is_file_not_found());
        assert!(store.open_input("missing").unwrap_err().is_file_not_found());
    }

    #[test]
    fn test_clear_variants() {
        let store = store();
        store.touch("a").unwrap();
        store.touch("b").unwrap();
        let mut lock = store.open_lock("write").unwrap();
        assert!(lock.obtain().unwrap());

        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(lock.is_locked().unwrap());

        store.touch("c").unwrap();
        store.clear_locks().unwrap();
        assert!(store.exists("c").unwrap());
        let probe = store.open_lock("write").unwrap();
        assert!(!probe.is_locked().unwrap());

        store.clear_all().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_memory_lock_is_single_shot() {
        let store = store();
        let mut first = store.open_lock("commit").unwrap();
        let mut second = store.open_lock("commit").unwrap();
        assert!(first.obtain().unwrap());
        assert!(!second.obtain().unwrap());
        drop(first);
        assert!(second.obtain().unwrap());
    }

    #[test]
    fn test_input_clone_is_independent() {
        let store = store();
        let mut output = store.new_output("nums").unwrap();
        for i in 0..10u32 {
            output.write_u32(i).unwrap();
        }
        output.close().unwrap();

        let mut input = store.open_input("nums").unwrap();
        assert_eq!(input.read_u32().unwrap(), 0);
        let mut clone = input.clone_stream().unwrap();
        assert_eq!(input.read_u32().unwrap(), 1);
        assert_eq!(input.read_u32().unwrap(), 2);
        assert_eq!(clone.read_u32().unwrap(), 1);

        clone.seek_to(36).unwrap();
        assert_eq!(clone.read_u32().unwrap(), 9);
        assert!(clone.read_byte().unwrap_err().is_eof());
        assert!(clone.seek_to(41).unwrap_err().is_eof());
    }

    #[test]
    fn test_replace_does_not_disturb_readers() {
        let store = store();
        let mut output = store.new_output("f").unwrap();
        output.write_bytes(b"old content").unwrap();
        output.close().unwrap();

        let mut reader = store.open_input("f").unwrap();

        let mut output = store.new_output("f").unwrap();
        output.write_bytes(b"new").unwrap();
        output.close().unwrap();

        let mut old = Vec::new();
        reader.read_to_end(&mut old).unwrap();
        assert_eq!(old, b"old content");
        assert_eq!(store.length("f").unwrap(), 3);
    }

    #[test]
    fn test_scratch_write_to_and_reset() {
        let store = store();
        let mut scratch = RamOutput::scratch(4);
        scratch.write_vint(300).unwrap();
        scratch.write_string("scratch").unwrap();
        assert_eq!(scratch.length(), 10);

        let mut output = store.new_output("copy").unwrap();
        scratch.write_to(output.as_mut()).unwrap();
        output.close().unwrap();
        assert!(!store.exists("scratch").unwrap());

        let mut input = store.open_input("copy").unwrap();
        assert_eq!(input.read_vint().unwrap(), 300);
        assert_eq!(input.read_string().unwrap(), "scratch");

        scratch.reset();
        assert_eq!(scratch.length(), 0);
        scratch.write_byte(7).unwrap();
        assert_eq!(scratch.length(), 1);
    }

    #[test]
    fn test_seek_back_and_patch() {
        let store = store();
        let mut output = store.new_output("patched").unwrap();
        output.write_u64(0).unwrap();
        output.write_bytes(b"body").unwrap();
        output.seek_to(0).unwrap();
        output.write_u64(8).unwrap();
        output.close().unwrap();

        let mut input = store.open_input("patched").unwrap();
        assert_eq!(input.length(), 12);
        assert_eq!(input.read_u64().unwrap(), 8);
    }
}
