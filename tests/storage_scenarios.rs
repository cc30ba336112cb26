//! Byte store, encoding and text utility properties.

use std::sync::Arc;

use glaive::error::{GlaiveError, Result};
use glaive::lexical::memory::MemoryIndex;
use glaive::lexical::segment::SegmentReader;
use glaive::query::term::TermQuery;
use glaive::search::searcher::{IndexSearcher, SearchRequest, Searcher};
use glaive::storage::compound::{CompoundStore, CompoundWriter};
use glaive::storage::file::FsStore;
use glaive::storage::memory::{RamOutput, RamStore};
use glaive::storage::registry::StoreRegistry;
use glaive::storage::{InStream, OutStream, Store, StoreConfig};
use glaive::util::multimapper::MultiMapper;
use glaive::util::varint::{decode_vlong, encode_vlong, encoded_len};
use glaive::util::wildcard::wc_match;
use tempfile::TempDir;

fn write_file(store: &dyn Store, name: &str, content: &[u8]) -> Result<()> {
    let mut out = store.new_output(name)?;
    out.write_bytes(content)?;
    out.close()
}

fn read_file(store: &dyn Store, name: &str) -> Result<Vec<u8>> {
    let mut input = store.open_input(name)?;
    let mut buf = vec![0u8; input.length() as usize];
    input.read_bytes(&mut buf)?;
    Ok(buf)
}

#[test]
fn test_vint_round_trip() -> Result<()> {
    let mut samples: Vec<u64> = (0..300).collect();
    for shift in 0..35 {
        let base = 1u64 << shift;
        samples.extend([base - 1, base, base + 1]);
    }
    samples.push((1u64 << 35) - 1);

    for n in samples {
        let bytes = encode_vlong(n);
        let bits = (64 - n.leading_zeros() as usize).max(1);
        assert_eq!(bytes.len(), bits.div_ceil(7), "length of {n}");
        assert_eq!(encoded_len(n), bytes.len());
        assert_eq!(decode_vlong(&bytes)?, (n, bytes.len()));
    }
    Ok(())
}

#[test]
fn test_stream_round_trip_and_eof() -> Result<()> {
    let store = RamStore::new(StoreConfig::default());
    let mut out = store.new_output("values")?;
    out.write_vint(300)?;
    out.write_vlong(1 << 40)?;
    out.write_u32(0xDEAD_BEEF)?;
    out.write_string("glaive")?;
    out.close()?;

    let mut input = store.open_input("values")?;
    assert_eq!(input.read_vint()?, 300);
    assert_eq!(input.read_vlong()?, 1 << 40);
    assert_eq!(input.read_u32()?, 0xDEAD_BEEF);
    assert_eq!(input.read_string()?, "glaive");
    assert!(matches!(input.read_byte(), Err(GlaiveError::Eof(_))));
    Ok(())
}

#[test]
fn test_compound_directory_on_disk() -> Result<()> {
    let dir = TempDir::new()?;
    let store = FsStore::open(dir.path(), StoreConfig::default())?;
    let blobs: Vec<(String, Vec<u8>)> = (0..6)
        .map(|i| (format!("_{i}.dat"), (0..i * 37).map(|b| b as u8).collect()))
        .collect();
    for (name, content) in &blobs {
        write_file(&store, name, content)?;
    }

    let mut writer = CompoundWriter::new(&store, "_all.cfs");
    for (name, _) in &blobs {
        writer.add_file(name)?;
    }
    writer.close()?;

    let compound = CompoundStore::open(&store, "_all.cfs")?;
    assert_eq!(compound.count()?, blobs.len());
    for (name, content) in &blobs {
        assert_eq!(compound.length(name)?, content.len() as u64);
        assert_eq!(&read_file(&compound, name)?, content);
    }
    assert!(matches!(
        compound.new_output("more"),
        Err(GlaiveError::UnsupportedOperation(_))
    ));
    assert!(compound.open_input("_9.dat").unwrap_err().is_file_not_found());
    Ok(())
}

#[test]
fn test_failed_compound_close_leaves_nothing_behind() -> Result<()> {
    let dir = TempDir::new()?;
    let fs = FsStore::open(dir.path(), StoreConfig::default())?;
    let ram = RamStore::new(StoreConfig::default());
    let stores: [&dyn Store; 2] = [&fs, &ram];

    for store in stores {
        write_file(store, "a", b"12345")?;
        let mut writer = CompoundWriter::new(store, "x.cfs");
        writer.add_file("a")?;
        writer.add_file("missing")?;
        assert!(writer.close().unwrap_err().is_file_not_found());

        assert!(!store.exists("x.cfs")?);
        assert_eq!(store.list()?, vec!["a".to_string()]);
    }
    Ok(())
}

#[test]
fn test_store_mutation_replaces_whole_files() -> Result<()> {
    let dir = TempDir::new()?;
    let fs = FsStore::open(dir.path(), StoreConfig::default())?;
    let ram = RamStore::new(StoreConfig::default());
    let stores: [&dyn Store; 2] = [&fs, &ram];

    for store in stores {
        write_file(store, "doc", b"first version, rather long")?;
        assert_eq!(read_file(store, "doc")?, b"first version, rather long");

        write_file(store, "doc", b"second")?;
        assert_eq!(read_file(store, "doc")?, b"second");
        assert_eq!(store.length("doc")?, 6);

        assert!(store.remove("doc")?);
        assert!(!store.exists("doc")?);
        assert!(store.open_input("doc").unwrap_err().is_file_not_found());
    }
    Ok(())
}

#[test]
fn test_scratch_buffer_copies_into_store() -> Result<()> {
    let store = RamStore::new(StoreConfig::default());
    let mut scratch = RamOutput::scratch(16);
    scratch.write_string("buffered content spanning buffers")?;
    let len = scratch.length();

    let mut out = store.new_output("copy")?;
    scratch.write_to(out.as_mut())?;
    out.close()?;
    assert_eq!(store.length("copy")?, len);
    assert_eq!(
        store.open_input("copy")?.read_string()?,
        "buffered content spanning buffers"
    );

    scratch.reset();
    assert_eq!(scratch.length(), 0);
    Ok(())
}

#[test]
fn test_registry_shares_directory_stores() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = StoreRegistry::new();
    let first = registry.open(dir.path(), StoreConfig::default())?;
    let second = registry.open(dir.path(), StoreConfig::default())?;
    assert!(Arc::ptr_eq(&first, &second));

    let mut lock = first.open_lock("write")?;
    assert!(lock.obtain()?);
    assert!(second.open_lock("write")?.is_locked()?);
    lock.release()?;
    assert!(!second.open_lock("write")?.is_locked()?);
    Ok(())
}

#[test]
fn test_segment_inside_compound_store() -> Result<()> {
    let mut index = MemoryIndex::new();
    index.add_document(&[("body", "alpha beta")])?;
    index.add_document(&[("body", "beta gamma")])?;

    let store = RamStore::new(StoreConfig::default());
    index.write_segment(&store, "_0.seg")?;
    let mut writer = CompoundWriter::new(&store, "_0.cfs");
    writer.add_file("_0.seg")?;
    writer.close()?;
    store.remove("_0.seg")?;

    let compound = CompoundStore::open(&store, "_0.cfs")?;
    let searcher = IndexSearcher::new(Arc::new(SegmentReader::open(&compound, "_0.seg")?));
    let top = searcher.search(&TermQuery::new("body", "beta").into(), &SearchRequest::new())?;
    assert_eq!(top.total_hits, 2);
    Ok(())
}

#[test]
fn test_wildcard_matcher() {
    assert!(wc_match("a*c", "abc"));
    assert!(!wc_match("a*c", "ab"));
    assert!(wc_match("a?c", "abc"));
    assert!(!wc_match("a?c", "abbc"));
    assert!(wc_match("*", ""));
    assert!(wc_match("a*b*c", "aXXbYc"));
}

#[test]
fn test_multimapper_longest_match() -> Result<()> {
    let mut mapper = MultiMapper::new();
    mapper.add_mapping("ab", "X")?;
    mapper.add_mapping("a", "Y")?;
    assert!(matches!(mapper.map("ab"), Err(GlaiveError::State(_))));

    mapper.compile();
    assert_eq!(mapper.map("ab")?, "X");
    assert_eq!(mapper.map("ac")?, "Yc");
    assert_eq!(mapper.map("aab")?, "YX");
    Ok(())
}
