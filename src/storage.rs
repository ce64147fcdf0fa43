//! Relative-path file access shared by the asset and template phases.
//!
//! Every path handed to a reader or writer is rooted with a leading `/` and
//! separated by `/`, independent of the host platform. Paths that escape the
//! root (`..`) are rejected before any I/O happens.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use walkdir::WalkDir;

use crate::error::{Result, SiteError};

/// Read access to a tree of files
pub trait FileReader {
    /// List every file below the root, sorted, directories excluded
    fn list(&self) -> Result<Vec<String>>;

    /// Read the full contents of one file
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Copy a file from this reader into `writer` under a new path
    fn copy_to(&self, writer: &dyn FileWriter, from: &str, to: &str) -> Result<()> {
        let data = self.read(from)?;
        writer.write(to, &data)
    }
}

/// Write access to a tree of files
pub trait FileWriter {
    /// Write `data` to `path`, creating parent directories as needed
    fn write(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// Strip the leading `/` and reject paths that would leave the root
pub(crate) fn validate_path(path: &str) -> Result<&str> {
    let invalid = || SiteError::InvalidPath {
        path: path.to_string(),
    };

    let relative = path.strip_prefix('/').ok_or_else(invalid)?;
    if relative.is_empty() || relative.split('/').any(|segment| segment == "..") {
        return Err(invalid());
    }

    Ok(relative)
}

/// Convert a path relative to a storage root into `/a/b.ext` form.
///
/// Names that are not valid UTF-8 are rejected rather than mangled.
fn to_rooted(relative: &Path) -> Result<String> {
    let mut rooted = String::new();
    for component in relative.components() {
        if let Component::Normal(name) = component {
            let name = name.to_str().ok_or_else(|| SiteError::InvalidPath {
                path: format!("{:?}", relative.as_os_str()),
            })?;
            rooted.push('/');
            rooted.push_str(name);
        }
    }
    Ok(rooted)
}

/// ENOSPC on Unix
#[inline]
fn is_disk_full(err: &io::Error) -> bool {
    err.raw_os_error() == Some(28)
}

/// Storage rooted at a directory on the local file system
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory all relative paths resolve against
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }
}

impl FileReader for DirStorage {
    fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|source| SiteError::List {
                root: self.root.clone(),
                source,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            files.push(to_rooted(relative)?);
        }

        files.sort();
        Ok(files)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|source| SiteError::Read { path: full, source })
    }
}

impl FileWriter for DirStorage {
    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;

        if let Some(parent) = full.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    if is_disk_full(&e) {
                        return SiteError::DiskFull {
                            path: parent.to_path_buf(),
                        };
                    }
                    SiteError::CreateDir {
                        path: parent.to_path_buf(),
                        source: e,
                    }
                })?;
            }
        }

        fs::write(&full, data).map_err(|e| {
            if is_disk_full(&e) {
                return SiteError::DiskFull { path: full.clone() };
            }
            SiteError::Write {
                path: full.clone(),
                source: e,
            }
        })
    }
}

/// In-memory storage; clones share the same file tree
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Rc<RefCell<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a storage pre-populated with `(path, contents)` pairs
    pub fn with_files<P, D>(files: impl IntoIterator<Item = (P, D)>) -> Self
    where
        P: Into<String>,
        D: Into<Vec<u8>>,
    {
        let storage = Self::new();
        for (path, data) in files {
            storage.insert(path, data);
        }
        storage
    }

    /// Insert or replace a file without path validation
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(path.into(), data.into());
    }

    /// Contents of a file, if present
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.borrow().is_empty()
    }
}

impl FileReader for MemoryStorage {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.files.borrow().keys().cloned().collect())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.get(path).ok_or_else(|| SiteError::Read {
            path: PathBuf::from(path),
            source: io::Error::new(io::ErrorKind::NotFound, "file not found in memory storage"),
        })
    }
}

impl FileWriter for MemoryStorage {
    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        validate_path(path)?;
        self.insert(path, data);
        Ok(())
    }
}
