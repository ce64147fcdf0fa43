//! Public URL lookup for fingerprinted assets.
//!
//! A resolver can only be built from a finished [`AssetMap`], so templates
//! never observe a half-built map.

use crate::error::{Result, SiteError};
use crate::fingerprint::AssetMap;

/// Read-only lookup from an original asset path to its public URL
pub trait AssetResolver: Send + Sync {
    fn resolve_url(&self, original: &str) -> Result<String>;
}

/// Resolves URLs as `base + fingerprinted path`
#[derive(Debug, Clone)]
pub struct AssetUrls {
    base: String,
    map: Option<AssetMap>,
}

impl AssetUrls {
    /// `base` is the URL prefix followed by the static output prefix,
    /// e.g. `https://cdn.example.com/static`
    pub fn new(base: impl Into<String>, map: AssetMap) -> Self {
        Self {
            base: base.into(),
            map: Some(map),
        }
    }

    /// Resolver for sites without a static directory; every lookup is empty
    pub fn disabled() -> Self {
        Self {
            base: String::new(),
            map: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.map.is_some()
    }
}

impl AssetResolver for AssetUrls {
    fn resolve_url(&self, original: &str) -> Result<String> {
        let Some(map) = &self.map else {
            return Ok(String::new());
        };

        map.get(original)
            .map(|path| format!("{}{}", self.base, path))
            .ok_or_else(|| SiteError::AssetNotFound {
                path: original.to_string(),
            })
    }
}
