//! In-memory package store
//!
//! A [`Package`] holds every part of an opened XLSX file as raw bytes, keyed by
//! part name (`xl/workbook.xml`, `[Content_Types].xml`, ...). Parts are never
//! re-serialized from a model: edits replace the bytes of the parts they touch
//! and leave everything else exactly as it was read.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use crate::error::{PackageError, PackageResult};

/// Name of the content-type registry part
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Normalize a part name: forward slashes, no leading slash.
pub fn normalize_part_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    name.trim_start_matches('/').to_string()
}

/// Ordered map from part name to part bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartMap {
    parts: BTreeMap<String, Vec<u8>>,
}

impl PartMap {
    /// Create an empty part map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the map holds no parts
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Whether a part exists
    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(&normalize_part_name(name))
    }

    /// Raw bytes of a part
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .get(&normalize_part_name(name))
            .map(Vec::as_slice)
    }

    /// A part decoded as UTF-8, or `None` if the part does not exist
    pub fn get_str(&self, name: &str) -> PackageResult<Option<&str>> {
        match self.get(name) {
            Some(bytes) => std::str::from_utf8(bytes)
                .map(Some)
                .map_err(|_| PackageError::NonUtf8Part(normalize_part_name(name))),
            None => Ok(None),
        }
    }

    /// A part decoded as UTF-8, failing with [`PackageError::MissingPart`] if absent
    pub fn require_str(&self, name: &str) -> PackageResult<&str> {
        self.get_str(name)?
            .ok_or_else(|| PackageError::MissingPart(normalize_part_name(name)))
    }

    /// Insert or replace a part, returning the previous bytes
    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.parts.insert(normalize_part_name(name), bytes.into())
    }

    /// Remove a part
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(&normalize_part_name(name))
    }

    /// Iterate part names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Iterate parts in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<N: AsRef<str>, B: Into<Vec<u8>>> FromIterator<(N, B)> for PartMap {
    fn from_iter<I: IntoIterator<Item = (N, B)>>(iter: I) -> Self {
        let mut map = PartMap::new();
        for (name, bytes) in iter {
            map.insert(name.as_ref(), bytes);
        }
        map
    }
}

/// A shareable package.
///
/// All access goes through an internal `RwLock`. Multi-part edits should run
/// inside [`Package::edit`] so that scanning for free identifiers and writing
/// the parts that use them happens under one write lock.
#[derive(Debug, Default)]
pub struct Package {
    parts: RwLock<PartMap>,
}

impl Package {
    /// Create an empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing part map
    pub fn from_parts(parts: PartMap) -> Self {
        Self {
            parts: RwLock::new(parts),
        }
    }

    /// Open a package from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> PackageResult<Self> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a package from ZIP bytes
    pub fn from_bytes(bytes: &[u8]) -> PackageResult<Self> {
        Self::read(Cursor::new(bytes))
    }

    /// Read a package from a reader
    pub fn read<R: Read + Seek>(reader: R) -> PackageResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut parts = PartMap::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = normalize_part_name(entry.name());
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            parts.insert(&name, bytes);
        }

        if !parts.contains(CONTENT_TYPES_PART) {
            return Err(PackageError::InvalidFormat(format!(
                "Missing {CONTENT_TYPES_PART}"
            )));
        }

        log::debug!("read package with {} parts", parts.len());
        Ok(Self::from_parts(parts))
    }

    /// Write the package to a file path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> PackageResult<()> {
        let file = File::create(path)?;
        self.write(file)
    }

    /// Write the package as ZIP bytes
    pub fn to_bytes(&self) -> PackageResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(Cursor::new(&mut buf))?;
        Ok(buf)
    }

    /// Write the package to a writer
    pub fn write<W: Write + Seek>(&self, writer: W) -> PackageResult<()> {
        let parts = self.snapshot();
        let mut zip = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        // [Content_Types].xml goes first, as Excel writes it
        if let Some(bytes) = parts.get(CONTENT_TYPES_PART) {
            zip.start_file(CONTENT_TYPES_PART, options)?;
            zip.write_all(bytes)?;
        }
        for (name, bytes) in parts.iter() {
            if name == CONTENT_TYPES_PART {
                continue;
            }
            zip.start_file(name, options)?;
            zip.write_all(bytes)?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Clone the current parts
    pub fn snapshot(&self) -> PartMap {
        self.read_parts(PartMap::clone)
    }

    /// Copy of one part's bytes
    pub fn part(&self, name: &str) -> Option<Vec<u8>> {
        self.read_parts(|parts| parts.get(name).map(<[u8]>::to_vec))
    }

    /// Run a closure with shared access to the parts
    pub fn read_parts<T>(&self, f: impl FnOnce(&PartMap) -> T) -> T {
        let guard = self.parts.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    /// Run a closure with exclusive access to the parts.
    ///
    /// Writes made by the closure are visible as soon as it returns, whether it
    /// succeeded or not. There is no rollback.
    pub fn edit<T>(&self, f: impl FnOnce(&mut PartMap) -> T) -> T {
        let mut guard = self.parts.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    /// Replace a part only if its current bytes equal `expected`.
    ///
    /// `expected = None` means the part must not exist yet. Returns whether the
    /// swap happened.
    pub fn compare_and_swap(&self, name: &str, expected: Option<&[u8]>, new: Vec<u8>) -> bool {
        self.edit(|parts| {
            if parts.get(name) != expected {
                return false;
            }
            parts.insert(name, new);
            true
        })
    }
}
