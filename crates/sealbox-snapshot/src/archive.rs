//! Read-only filesystem over the embedded archive.
//!
//! The zip blob is parsed once at mount time into a flat entry index; the
//! parser is then dropped. After that every lookup is a hash probe and every
//! file read is a slice of the shared buffer (stored entries) or of a buffer
//! inflated at mount (compressed entries). Entries live for the process
//! lifetime and are never mutated.

use std::io::{Cursor, Read};
use std::ops::Range;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use zip::ZipArchive;

use crate::error::{Result, SnapshotError};
use crate::path::canonical_rel;

/// Kind of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Stat record for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: EntryKind,
    /// Byte size for files; directories report a synthetic size of 0.
    pub size: u64,
}

impl FileStat {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// File payload: a range of the shared archive buffer, or bytes inflated
/// once at mount time.
#[derive(Debug, Clone)]
enum EntryData {
    Stored(Range<usize>),
    Inflated(Arc<[u8]>),
}

#[derive(Debug)]
enum Entry {
    File { size: u64, data: EntryData },
    Directory { children: Vec<String> },
}

/// Open read handle for one archive file.
#[derive(Debug)]
pub struct ArchiveFile {
    buf: Arc<[u8]>,
    data: EntryData,
    len: u64,
}

impl ArchiveFile {
    /// Total length of the file in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes at `offset..offset + length`, shortened only at end of file.
    pub fn read_at(&self, offset: u64, length: usize) -> &[u8] {
        let bytes = self.bytes();
        let start = (offset as usize).min(bytes.len());
        let end = start.saturating_add(length).min(bytes.len());
        &bytes[start..end]
    }

    /// The whole file contents, without copying.
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            EntryData::Stored(range) => &self.buf[range.clone()],
            EntryData::Inflated(bytes) => bytes,
        }
    }
}

/// The archive filesystem: every entry of the embedded blob, rooted at the
/// virtual root. The root directory is synthesized even when the blob has
/// no explicit entry for it.
pub struct ArchiveFs {
    buf: Arc<[u8]>,
    entries: FxHashMap<String, Entry>,
}

impl ArchiveFs {
    /// Parse the archive buffer and build the entry index.
    pub fn mount(buf: Arc<[u8]>) -> Result<Self> {
        let entries = build_index(&buf)?;
        Ok(Self { buf, entries })
    }

    fn lookup(&self, path: &str) -> Result<&Entry> {
        let key = canonical_rel(path).ok_or_else(|| SnapshotError::NotFound(path.to_string()))?;
        self.entries
            .get(&key)
            .ok_or_else(|| SnapshotError::NotFound(path.to_string()))
    }

    /// Kind and size of the entry at `path`.
    pub fn stat(&self, path: &str) -> Result<FileStat> {
        match self.lookup(path)? {
            Entry::File { size, .. } => Ok(FileStat {
                kind: EntryKind::File,
                size: *size,
            }),
            Entry::Directory { .. } => Ok(FileStat {
                kind: EntryKind::Directory,
                size: 0,
            }),
        }
    }

    /// Open a read handle for the file at `path`.
    pub fn open(&self, path: &str) -> Result<ArchiveFile> {
        match self.lookup(path)? {
            Entry::Directory { .. } => Err(SnapshotError::IsADirectory(path.to_string())),
            Entry::File { size, data } => Ok(ArchiveFile {
                buf: Arc::clone(&self.buf),
                data: data.clone(),
                len: *size,
            }),
        }
    }

    /// The whole contents of the file at `path`.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.open(path)?.bytes().to_vec())
    }

    /// Child names of the directory at `path`, in no particular order.
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        match self.lookup(path)? {
            Entry::File { .. } => Err(SnapshotError::NotADirectory(path.to_string())),
            Entry::Directory { children } => Ok(children.clone()),
        }
    }

    pub fn is_file(&self, path: &str) -> bool {
        matches!(self.stat(path), Ok(stat) if stat.is_file())
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.stat(path), Ok(stat) if stat.is_dir())
    }

    /// Number of entries in the index, the synthesized root included.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

fn build_index(buf: &[u8]) -> Result<FxHashMap<String, Entry>> {
    let mut archive =
        ZipArchive::new(Cursor::new(buf)).map_err(|e| SnapshotError::Archive(e.to_string()))?;

    let mut entries: FxHashMap<String, Entry> = FxHashMap::default();
    entries.insert(String::new(), Entry::Directory { children: Vec::new() });

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| SnapshotError::Archive(e.to_string()))?;

        // Entries that would escape the root are dropped.
        let Some(name) = canonical_rel(file.name()) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        if file.is_dir() {
            ensure_dir(&mut entries, &name);
            continue;
        }

        let size = file.size();
        let data = match file.compression() {
            zip::CompressionMethod::Stored => {
                let start = file.data_start() as usize;
                let end = start + size as usize;
                if end > buf.len() {
                    return Err(SnapshotError::Archive(format!(
                        "entry {} runs past the end of the archive",
                        name
                    )));
                }
                EntryData::Stored(start..end)
            }
            _ => {
                let mut bytes = Vec::with_capacity(size as usize);
                file.read_to_end(&mut bytes)
                    .map_err(|e| SnapshotError::Archive(e.to_string()))?;
                EntryData::Inflated(bytes.into())
            }
        };
        insert_file(&mut entries, name, size, data);
    }

    Ok(entries)
}

fn insert_file(entries: &mut FxHashMap<String, Entry>, path: String, size: u64, data: EntryData) {
    let (parent, name) = split_parent(&path);
    ensure_dir(entries, parent);
    link_child(entries, parent, name);
    entries.insert(path.clone(), Entry::File { size, data });
}

fn ensure_dir(entries: &mut FxHashMap<String, Entry>, path: &str) {
    if path.is_empty() || entries.contains_key(path) {
        return;
    }
    let (parent, name) = split_parent(path);
    ensure_dir(entries, parent);
    link_child(entries, parent, name);
    entries.insert(path.to_string(), Entry::Directory { children: Vec::new() });
}

fn link_child(entries: &mut FxHashMap<String, Entry>, parent: &str, name: &str) {
    if let Some(Entry::Directory { children }) = entries.get_mut(parent) {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}
