//! File-system store.
//!
//! Each file is a regular OS file inside one directory. Outputs are written to
//! a hidden temporary file and renamed into place on close, so a reader never
//! observes a partially written file. Listing skips dotfiles and lock markers.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use memmap2::{Mmap, MmapOptions};

use crate::error::{GlaiveError, Result};
use crate::storage::lock::{LockBackend, is_lock_file};
use crate::storage::memory::resolve_seek;
use crate::storage::{InStream, Lock, OutStream, Store, StoreConfig};

/// A [`Store`] backed by a directory.
///
/// Use [`crate::storage::registry::StoreRegistry`] to share one instance per
/// directory.
#[derive(Debug)]
pub struct FsStore {
    directory: PathBuf,
    config: StoreConfig,
    locks: Arc<FsLocks>,
}

impl FsStore {
    /// Open a store over `directory`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(directory: P, config: StoreConfig) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            fs::create_dir_all(&directory)?;
        }

        if !directory.is_dir() {
            return Err(GlaiveError::invalid_argument(format!(
                "path is not a directory: {}",
                directory.display()
            )));
        }

        debug!("opened fs store at {}", directory.display());

        Ok(FsStore {
            locks: Arc::new(FsLocks {
                directory: directory.clone(),
            }),
            directory,
            config,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn names(&self, include: impl Fn(&str) -> bool) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') && include(name) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn remove_matching(&self, include: impl Fn(&str) -> bool) -> Result<()> {
        for name in self.names(include)? {
            fs::remove_file(self.file_path(&name))?;
        }
        Ok(())
    }
}

impl Drop for FsStore {
    fn drop(&mut self) {
        debug!("closed fs store at {}", self.directory.display());
    }
}

impl Store for FsStore {
    fn touch(&self, name: &str) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path(name))?;
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.file_path(name).is_file())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(self.file_path(from), self.file_path(to))
            .map_err(|e| GlaiveError::from_open(e, from))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.names(|name| !is_lock_file(name))?.len())
    }

    fn each(&self, visit: &mut dyn FnMut(&str)) -> Result<()> {
        for name in self.names(|name| !is_lock_file(name))? {
            visit(&name);
        }
        Ok(())
    }

    fn clear_locks(&self) -> Result<()> {
        self.remove_matching(is_lock_file)
    }

    fn clear(&self) -> Result<()> {
        self.remove_matching(|name| !is_lock_file(name))
    }

    fn clear_all(&self) -> Result<()> {
        self.remove_matching(|_| true)
    }

    fn length(&self, name: &str) -> Result<u64> {
        let metadata =
            fs::metadata(self.file_path(name)).map_err(|e| GlaiveError::from_open(e, name))?;
        Ok(metadata.len())
    }

    fn new_output(&self, name: &str) -> Result<Box<dyn OutStream>> {
        let path = self.file_path(name);
        let temp_path = self.file_path(&format!(".{name}.tmp"));
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        Ok(Box::new(FsOutput {
            writer: Some(BufWriter::with_capacity(self.config.buffer_size, file)),
            path,
            temp_path,
        }))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn InStream>> {
        let path = self.file_path(name);
        let file = File::open(&path).map_err(|e| GlaiveError::from_open(e, name))?;
        let size = file.metadata()?.len();

        if self.config.use_mmap && size > 0 {
            // SAFETY: closed files are never modified in place; replacement
            // goes through a rename, which leaves this mapping intact.
            let mmap = unsafe { MmapOptions::new().map(&file)? };
            return Ok(Box::new(MmapInput {
                mmap: Arc::new(mmap),
                pos: 0,
            }));
        }

        Ok(Box::new(FsInput {
            reader: BufReader::with_capacity(self.config.buffer_size, file),
            path,
            buffer_size: self.config.buffer_size,
            size,
            pos: 0,
        }))
    }

    fn open_lock(&self, name: &str) -> Result<Lock> {
        let backend: Arc<dyn LockBackend> = self.locks.clone();
        Ok(Lock::new(
            name,
            &self.config.lock_prefix,
            backend,
            self.config.lock_policy(),
        ))
    }
}

/// Lock markers as exclusively created files.
#[derive(Debug)]
struct FsLocks {
    directory: PathBuf,
}

impl LockBackend for FsLocks {
    fn create_exclusive(&self, file: &str) -> Result<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.directory.join(file))
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_marker(&self, file: &str) -> Result<()> {
        match fs::remove_file(self.directory.join(file)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn marker_exists(&self, file: &str) -> Result<bool> {
        Ok(self.directory.join(file).exists())
    }
}

/// Buffered input over an OS file.
#[derive(Debug)]
pub struct FsInput {
    reader: BufReader<File>,
    path: PathBuf,
    buffer_size: usize,
    size: u64,
    pos: u64,
}

impl Read for FsInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for FsInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.reader.seek(pos)?;
        Ok(self.pos)
    }
}

impl InStream for FsInput {
    fn length(&self) -> u64 {
        self.size
    }

    fn clone_stream(&self) -> Result<Box<dyn InStream>> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        reader.seek(SeekFrom::Start(self.pos))?;
        Ok(Box::new(FsInput {
            reader,
            path: self.path.clone(),
            buffer_size: self.buffer_size,
            size: self.size,
            pos: self.pos,
        }))
    }
}

/// Input served from a shared memory map.
#[derive(Debug, Clone)]
pub struct MmapInput {
    mmap: Arc<Mmap>,
    pos: u64,
}

impl Read for MmapInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data: &[u8] = &self.mmap;
        if self.pos >= data.len() as u64 {
            return Ok(0);
        }
        let start = self.pos as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MmapInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.mmap.len() as u64)?;
        Ok(self.pos)
    }
}

impl InStream for MmapInput {
    fn length(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn clone_stream(&self) -> Result<Box<dyn InStream>> {
        Ok(Box::new(self.clone()))
    }
}

/// Buffered output published by renaming on close.
///
/// An output dropped without a successful [`OutStream::close`] removes its
/// temporary file and leaves the target untouched.
#[derive(Debug)]
pub struct FsOutput {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    temp_path: PathBuf,
}

impl FsOutput {
    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::other("write to closed stream"))
    }
}

impl Write for FsOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Seek for FsOutput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.writer()?.seek(pos)
    }
}

impl OutStream for FsOutput {
    fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        let published = writer
            .flush()
            .and_then(|_| writer.get_ref().sync_all())
            .and_then(|_| {
                drop(writer);
                fs::rename(&self.temp_path, &self.path)
            });
        if let Err(e) = published {
            let _ = fs::remove_file(&self.temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for FsOutput {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
            if let Err(e) = fs::remove_file(&self.temp_path) {
                warn!(
                    "failed to discard unclosed output {}: {}",
                    self.temp_path.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store(use_mmap: bool) -> (TempDir, FsStore) {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            use_mmap,
            lock_retry_delay_ms: 1,
            ..StoreConfig::default()
        };
        let store = FsStore::open(temp_dir.path(), config).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_create_and_read_file() {
        for use_mmap in [false, true] {
            let (_temp_dir, store) = create_test_store(use_mmap);

            let mut output = store.new_output("test.txt").unwrap();
            output.write_bytes(b"Hello, World!").unwrap();
            output.write_vlong(1 << 40).unwrap();
            output.close().unwrap();

            let mut input = store.open_input("test.txt").unwrap();
            let mut buffer = [0u8; 13];
            input.read_bytes(&mut buffer).unwrap();
            assert_eq!(&buffer, b"Hello, World!");
            assert_eq!(input.read_vlong().unwrap(), 1 << 40);
            assert!(input.read_byte().unwrap_err().is_eof());
        }
    }

    #[test]
    fn test_output_invisible_until_close() {
        let (_temp_dir, store) = create_test_store(false);
        let mut output = store.new_output("seg").unwrap();
        output.write_bytes(b"partial").unwrap();
        assert!(!store.exists("seg").unwrap());
        assert_eq!(store.count().unwrap(), 0);
        output.close().unwrap();
        assert_eq!(store.length("seg").unwrap(), 7);
    }

    #[test]
    fn test_dropped_output_leaves_no_trace() {
        let (temp_dir, store) = create_test_store(false);
        let mut output = store.new_output("seg").unwrap();
        output.write_bytes(b"complete").unwrap();
        output.close().unwrap();

        let mut output = store.new_output("seg").unwrap();
        output.write_bytes(b"torn").unwrap();
        drop(output);
        let mut output = store.new_output("other").unwrap();
        output.write_bytes(b"torn").unwrap();
        drop(output);

        assert_eq!(store.length("seg").unwrap(), 8);
        assert!(!store.exists("other").unwrap());
        let entries = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_file_operations() {
        let (_temp_dir, store) = create_test_store(false);
        assert!(!store.exists("nonexistent.txt").unwrap());

        store.touch("a").unwrap();
        store.touch("a").unwrap();
        assert_eq!(store.length("a").unwrap(), 0);

        store.rename("a", "b").unwrap();
        assert_eq!(store.list().unwrap(), vec!["b".to_string()]);
        assert!(store.remove("b").unwrap());
        assert!(!store.remove("b").unwrap());

        assert!(store.open_input("missing").unwrap_err().is_file_not_found());
        assert!(store.length("missing").unwrap_err().is_file_not_found());
    }

    #[test]
    fn test_clone_keeps_position() {
        let (_temp_dir, store) = create_test_store(false);
        let mut output = store.new_output("nums").unwrap();
        for i in 0..4u32 {
            output.write_u32(i).unwrap();
        }
        output.close().unwrap();

        let mut input = store.open_input("nums").unwrap();
        input.read_u32().unwrap();
        let mut clone = input.clone_stream().unwrap();
        assert_eq!(clone.read_u32().unwrap(), 1);
        assert_eq!(input.read_u32().unwrap(), 1);
        assert_eq!(clone.position().unwrap(), 8);
    }

    #[test]
    fn test_locks() {
        let (_temp_dir, store) = create_test_store(false);
        let mut first = store.open_lock("write").unwrap();
        let mut second = store.open_lock("write").unwrap();

        assert!(!second.is_locked().unwrap());
        assert!(first.obtain().unwrap());
        assert!(second.is_locked().unwrap());
        assert!(!second.obtain().unwrap());
        assert_eq!(store.count().unwrap(), 0);

        store.clear_locks().unwrap();
        assert!(second.obtain().unwrap());
    }

    #[test]
    fn test_clear() {
        let (_temp_dir, store) = create_test_store(false);
        store.touch("a").unwrap();
        store.touch("b").unwrap();
        let mut lock = store.open_lock("write").unwrap();
        assert!(lock.obtain().unwrap());

        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(lock.is_locked().unwrap());

        store.clear_all().unwrap();
        let probe = store.open_lock("write").unwrap();
        assert!(!probe.is_locked().unwrap());
    }
}
