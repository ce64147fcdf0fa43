//! CLI configuration and resolved site settings.

use clap::Parser;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};

use crate::template::TemplateMatcher;

/// Default sub-path under the output directory for fingerprinted assets
pub const DEFAULT_STATIC_PREFIX: &str = "/static";

/// Build a static site from templates and fingerprinted assets
#[derive(Parser, Debug)]
#[command(name = "sitegen")]
#[command(version)]
#[command(about = "Build a static site from templates and fingerprinted assets")]
pub struct Cli {
    /// Output directory
    #[arg(short, long)]
    pub output: PathBuf,

    /// Template directory (no pages are rendered without it)
    #[arg(short, long)]
    pub templates: Option<PathBuf>,

    /// Static asset directory (no assets are fingerprinted without it)
    #[arg(short = 's', long = "static")]
    pub static_dir: Option<PathBuf>,

    /// Prefix prepended to every asset URL (e.g. https://cdn.example.com)
    #[arg(long, default_value = "")]
    pub url_prefix: String,

    /// Output sub-path for fingerprinted assets
    #[arg(long, default_value = DEFAULT_STATIC_PREFIX)]
    pub static_prefix: String,

    /// Write a gzip-compressed copy next to every asset
    #[arg(short = 'z', long)]
    pub compress: bool,

    /// Regex selecting template files (default: paths ending in .html)
    #[arg(long)]
    pub template_pattern: Option<String>,

    /// Asset paths to leave out (comma-separated, e.g. /drafts/a.png)
    #[arg(short, long, value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Page to render as OUTPUT=TEMPLATE[:DATA.json] (repeatable)
    #[arg(short, long = "page")]
    pub pages: Vec<String>,

    /// Write the asset map as JSON to this output path
    #[arg(long)]
    pub manifest: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Settings for one site build
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Root of all generated files
    pub output_dir: PathBuf,
    /// Template root (None = skip rendering)
    pub template_dir: Option<PathBuf>,
    /// Static asset root (None = skip fingerprinting)
    pub static_dir: Option<PathBuf>,
    /// Prepended to every resolved asset URL
    pub url_prefix: String,
    /// Output sub-path for assets; empty falls back to [`DEFAULT_STATIC_PREFIX`]
    pub static_prefix: String,
    /// Write `.gz` siblings for assets
    pub compress_static: bool,
    /// Which template files are loaded
    pub template_matcher: TemplateMatcher,
    /// Asset paths excluded from fingerprinting
    pub ignore: Vec<String>,
    /// Output path for the JSON asset map
    pub manifest: Option<String>,
}

impl SiteConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            template_dir: None,
            static_dir: None,
            url_prefix: String::new(),
            static_prefix: DEFAULT_STATIC_PREFIX.to_string(),
            compress_static: false,
            template_matcher: TemplateMatcher::default(),
            ignore: Vec::new(),
            manifest: None,
        }
    }

    pub fn with_templates(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    pub fn with_static(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    pub fn with_static_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.static_prefix = prefix.into();
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress_static = compress;
        self
    }

    pub fn with_template_matcher(mut self, matcher: TemplateMatcher) -> Self {
        self.template_matcher = matcher;
        self
    }

    pub fn with_ignored<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_manifest(mut self, path: impl Into<String>) -> Self {
        self.manifest = Some(path.into());
        self
    }
}

/// A page requested on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct PageArg {
    pub output: String,
    pub template: String,
    pub data: Option<PathBuf>,
}

impl PageArg {
    /// Parse `OUTPUT=TEMPLATE[:DATA.json]`
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let Some((output, rest)) = s.split_once('=') else {
            bail!("invalid page '{}': expected OUTPUT=TEMPLATE[:DATA.json]", s);
        };

        let (template, data) = match rest.split_once(':') {
            Some((template, data)) => (template, Some(PathBuf::from(data))),
            None => (rest, None),
        };

        if output.is_empty() || template.is_empty() {
            bail!("invalid page '{}': output and template must not be empty", s);
        }

        let output = if output.starts_with('/') {
            output.to_string()
        } else {
            format!("/{output}")
        };

        Ok(Self {
            output,
            template: template.to_string(),
            data,
        })
    }

    /// Load the page's JSON data, or an empty object when none was given
    pub fn load_data(&self) -> anyhow::Result<Value> {
        let Some(path) = &self.data else {
            return Ok(Value::Object(Default::default()));
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read page data {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in page data {}", path.display()))
    }
}

/// Page registered for rendering, with its data loaded
#[derive(Debug, Clone)]
pub struct Page {
    pub output: String,
    pub template: String,
    pub data: Value,
}

/// Runtime configuration parsed from CLI
#[derive(Debug, Clone)]
pub struct Config {
    pub site: SiteConfig,
    pub pages: Vec<Page>,
    pub verbose: u8,
}

impl Config {
    /// Create Config from CLI arguments
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let mut site = SiteConfig::new(cli.output)
            .with_url_prefix(cli.url_prefix)
            .with_static_prefix(cli.static_prefix)
            .with_compression(cli.compress)
            .with_ignored(cli.ignore);

        if let Some(dir) = cli.templates {
            site = site.with_templates(dir);
        }
        if let Some(dir) = cli.static_dir {
            site = site.with_static(dir);
        }
        if let Some(pattern) = cli.template_pattern {
            let re = Regex::new(&pattern)
                .with_context(|| format!("Invalid template pattern '{}'", pattern))?;
            site = site.with_template_matcher(TemplateMatcher::Pattern(re));
        }
        if let Some(manifest) = cli.manifest {
            site = site.with_manifest(manifest);
        }

        if !cli.pages.is_empty() && site.template_dir.is_none() {
            bail!("--page requires --templates");
        }

        let mut pages = Vec::with_capacity(cli.pages.len());
        for raw in &cli.pages {
            let arg = PageArg::parse(raw)?;
            let data = arg.load_data()?;
            pages.push(Page {
                output: arg.output,
                template: arg.template,
                data,
            });
        }

        Ok(Config {
            site,
            pages,
            verbose: cli.verbose,
        })
    }
}
