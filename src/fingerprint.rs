//! Content-addressed static asset pipeline.
//!
//! Every asset is renamed to `/<stem>_<sha256><ext>` so that it can be served
//! with far-future cache headers: any change to its bytes produces a new name.
//! Optionally a gzip sibling (`<name>.gz`) is written next to each asset.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, SiteError};
use crate::storage::{FileReader, FileWriter};

/// Mapping from original asset path to fingerprinted output path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssetMap {
    entries: BTreeMap<String, String>,
}

impl AssetMap {
    /// Fingerprinted path for an original asset path
    #[inline]
    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    pub fn contains(&self, original: &str) -> bool {
        self.entries.contains_key(original)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(original, fingerprinted)` pairs ordered by original path
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pretty-printed JSON manifest `{ "original": "fingerprinted" }`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Counters reported by [`Fingerprinter::emit`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    /// Assets written under their fingerprinted name
    pub files: u64,
    /// Uncompressed bytes written
    pub bytes: u64,
    /// `.gz` siblings written
    pub compressed: u64,
}

/// Lowercase hex SHA-256 of `data`
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Split a file name at its last dot, keeping the dot with the extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

/// Fingerprinted output path for an asset: `/<stem>_<hash><ext>`.
///
/// Only the file name of `original` is kept; directories are flattened.
pub fn fingerprint_path(original: &str, data: &[u8]) -> String {
    let name = original.rsplit('/').next().unwrap_or(original);
    let (stem, ext) = split_extension(name);
    format!("/{}_{}{}", stem, content_hash(data), ext)
}

/// Gzip `data` with a freshly created encoder
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Fingerprints an input asset tree into an output tree
pub struct Fingerprinter {
    input: Box<dyn FileReader>,
    output: Box<dyn FileWriter>,
    ignored: HashSet<String>,
    map: Option<AssetMap>,
}

impl Fingerprinter {
    pub fn new(input: impl FileReader + 'static, output: impl FileWriter + 'static) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
            ignored: HashSet::new(),
            map: None,
        }
    }

    /// Exclude original paths from the map and the output.
    ///
    /// Takes effect on the next [`build_map`](Self::build_map).
    pub fn ignore<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored.extend(paths.into_iter().map(Into::into));
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored.contains(path)
    }

    /// The asset map, once built
    pub fn map(&self) -> Option<&AssetMap> {
        self.map.as_ref()
    }

    /// Hash every non-ignored input file and rebuild the asset map.
    ///
    /// On failure the previous map is discarded and no map is left behind.
    pub fn build_map(&mut self) -> Result<usize> {
        self.map = None;

        let files = self.input.list()?;
        let mut map = AssetMap::default();

        for file in files {
            if self.ignored.contains(&file) {
                debug!(path = %file, "Skipping ignored asset");
                continue;
            }

            let data = self.input.read(&file)?;
            let target = fingerprint_path(&file, &data);
            debug!(path = %file, target = %target, "Fingerprinted asset");
            map.entries.insert(file, target);
        }

        let count = map.len();
        info!(assets = count, ignored = self.ignored.len(), "Built asset map");
        self.map = Some(map);
        Ok(count)
    }

    /// Fingerprinted path for `original`
    pub fn resolve(&self, original: &str) -> Result<&str> {
        let map = self.map.as_ref().ok_or(SiteError::MapNotBuilt)?;
        map.get(original).ok_or_else(|| SiteError::AssetNotFound {
            path: original.to_string(),
        })
    }

    /// Write every mapped asset under its fingerprinted name, building the
    /// map first if needed. With `compress`, a `.gz` sibling is written too.
    ///
    /// The first read, compression or write failure aborts the remaining assets.
    pub fn emit(&mut self, compress: bool) -> Result<EmitSummary> {
        if self.map.is_none() {
            self.build_map()?;
        }
        let map = self.map.as_ref().ok_or(SiteError::MapNotBuilt)?;

        let mut summary = EmitSummary::default();

        for (original, target) in map.iter() {
            let data = self.input.read(original)?;
            self.output.write(target, &data)?;
            summary.files += 1;
            summary.bytes += data.len() as u64;

            if compress {
                let compressed = gzip(&data).map_err(|source| SiteError::Compress {
                    path: original.to_string(),
                    source,
                })?;
                self.output.write(&format!("{target}.gz"), &compressed)?;
                summary.compressed += 1;
            }
        }

        info!(
            files = summary.files,
            bytes = summary.bytes,
            compressed = summary.compressed,
            "Emitted static assets"
        );
        Ok(summary)
    }
}
