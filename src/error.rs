use std::path::PathBuf;
use thiserror::Error;

/// Site generation error types
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Failed to list files under {root}")]
    List {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No space left on device for {path}")]
    DiskFull { path: PathBuf },

    #[error("Invalid relative path: {path}")]
    InvalidPath { path: String },

    #[error("Template {path} is not valid UTF-8")]
    InvalidUtf8 {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Failed to compress {path}")]
    Compress {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Asset map has not been built yet")]
    MapNotBuilt,

    #[error("Asset not fingerprinted: {path}")]
    AssetNotFound { path: String },

    #[error("Failed to parse template {path}")]
    TemplateParse {
        path: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("Template {name} loaded from both {first} and {second}")]
    DuplicateTemplate {
        name: String,
        first: String,
        second: String,
    },

    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("Failed to render template {name}")]
    Render {
        name: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },

    #[error("Failed to serialize data for {output}")]
    Data {
        output: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Output directory not set")]
    MissingOutputDir,

    #[error("No template directory configured")]
    NoTemplateDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T, E = SiteError> = std::result::Result<T, E>;
