//! # Sitegen
//!
//! Static site generation with content-addressed asset fingerprinting.
//!
//! A build copies every static asset to `<output>/<static prefix>/<name>_<sha256>.<ext>`
//! (optionally with a `.gz` sibling), then renders Handlebars templates whose
//! `{{static "/path"}}` calls resolve to those fingerprinted URLs.
//!
//! ## Features
//!
//! - SHA-256 content hashing for cache-busting file names
//! - Optional gzip precompression of assets
//! - Handlebars templates with injectable functions
//! - Asset manifest output
//!
//! ## Usage
//!
//! ```ignore
//! use sitegen::config::SiteConfig;
//! use sitegen::generator::Generator;
//!
//! let config = SiteConfig::new("public")
//!     .with_templates("templates")
//!     .with_static("static")
//!     .with_compression(true);
//!
//! let mut generator = Generator::new(config)?;
//! generator.add("/index.html", "index", &serde_json::json!({ "List": ["A", "B"] }))?;
//! generator.run()?;
//! ```

/// CLI configuration and site settings
pub mod config;

/// Error types for build operations
pub mod error;

/// Asset hashing, renaming and compression
pub mod fingerprint;

/// Build orchestration
pub mod generator;

/// Asset URL lookup exposed to templates
pub mod resolver;

/// Relative-path file access
pub mod storage;

/// Template loading and rendering
pub mod template;
