//! Site build orchestration.
//!
//! A build runs two phases in a fixed order:
//! 1. fingerprint and emit static assets
//! 2. load templates and render every registered page
//!
//! Templates can only see asset URLs through an [`AssetUrls`] built from the
//! finished asset map, so rendering never starts before fingerprinting ends.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{SiteConfig, DEFAULT_STATIC_PREFIX};
use crate::error::{Result, SiteError};
use crate::fingerprint::Fingerprinter;
use crate::resolver::{AssetResolver, AssetUrls};
use crate::storage::{DirStorage, FileWriter};
use crate::template::{TemplateFn, TemplateRenderer};

/// A page to render: template plus the data bound to it
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub template: String,
    pub data: Value,
}

/// Outcome of a successful build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Assets written under fingerprinted names
    pub assets: u64,
    /// Uncompressed asset bytes written
    pub bytes: u64,
    /// `.gz` siblings written
    pub compressed: u64,
    /// Pages rendered
    pub pages: u64,
    /// Wall time of the build
    pub duration: Duration,
}

/// Normalize the static output prefix to `/segment[/segment]` form.
///
/// An empty prefix falls back to [`DEFAULT_STATIC_PREFIX`]; `/` places assets
/// directly in the output root.
pub fn normalize_static_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        return DEFAULT_STATIC_PREFIX.to_string();
    }

    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Builds a site from a [`SiteConfig`] and a set of registered pages
pub struct Generator {
    config: SiteConfig,
    static_prefix: String,
    site_output: DirStorage,
    fingerprinter: Option<Fingerprinter>,
    renderer: Option<TemplateRenderer>,
    jobs: BTreeMap<String, RenderJob>,
}

impl Generator {
    /// Wire the asset and template phases to their directories
    pub fn new(config: SiteConfig) -> Result<Self> {
        if config.output_dir.as_os_str().is_empty() {
            return Err(SiteError::MissingOutputDir);
        }

        let static_prefix = normalize_static_prefix(&config.static_prefix);
        let site_output = DirStorage::new(&config.output_dir);

        let fingerprinter = config.static_dir.as_ref().map(|dir| {
            let static_output = config.output_dir.join(static_prefix.trim_start_matches('/'));
            let mut fp = Fingerprinter::new(DirStorage::new(dir), DirStorage::new(static_output));
            fp.ignore(config.ignore.iter().cloned());
            fp
        });

        let renderer = config
            .template_dir
            .as_ref()
            .map(|dir| TemplateRenderer::new(DirStorage::new(dir), site_output.clone()));

        Ok(Self {
            config,
            static_prefix,
            site_output,
            fingerprinter,
            renderer,
            jobs: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Normalized output sub-path for assets
    pub fn static_prefix(&self) -> &str {
        &self.static_prefix
    }

    /// Register a page; registering the same output path again replaces it
    pub fn add<T: Serialize>(
        &mut self,
        output_path: impl Into<String>,
        template: impl Into<String>,
        data: &T,
    ) -> Result<()> {
        let output_path = output_path.into();
        let data = serde_json::to_value(data).map_err(|source| SiteError::Data {
            output: output_path.clone(),
            source,
        })?;

        self.jobs.insert(
            output_path,
            RenderJob {
                template: template.into(),
                data,
            },
        );
        Ok(())
    }

    pub fn job(&self, output_path: &str) -> Option<&RenderJob> {
        self.jobs.get(output_path)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Expose extra functions to templates
    pub fn register_functions<I>(&mut self, funcs: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Box<TemplateFn>)>,
    {
        let renderer = self.renderer.as_mut().ok_or(SiteError::NoTemplateDir)?;
        renderer.register_functions(funcs);
        Ok(())
    }

    /// Exclude asset paths from fingerprinting; no-op without a static directory
    pub fn ignore<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(fp) = self.fingerprinter.as_mut() {
            fp.ignore(paths);
        }
    }

    fn asset_base(&self) -> String {
        format!(
            "{}{}",
            self.config.url_prefix.trim_end_matches('/'),
            self.static_prefix
        )
    }

    /// Resolver over the current asset map, as handed to templates
    pub fn asset_resolver(&self) -> Result<AssetUrls> {
        let Some(fp) = &self.fingerprinter else {
            return Ok(AssetUrls::disabled());
        };

        let map = fp.map().ok_or(SiteError::MapNotBuilt)?;
        Ok(AssetUrls::new(self.asset_base(), map.clone()))
    }

    /// Public URL of an asset; empty when no static directory is configured
    pub fn resolve_asset_url(&self, original: &str) -> Result<String> {
        match &self.fingerprinter {
            None => Ok(String::new()),
            Some(fp) => Ok(format!("{}{}", self.asset_base(), fp.resolve(original)?)),
        }
    }

    /// Run the asset phase, then the template phase.
    ///
    /// The first error aborts the build. Files written before the error are
    /// left in place; re-running the build overwrites them.
    pub fn run(&mut self) -> Result<BuildReport> {
        let start = Instant::now();
        let mut report = BuildReport::default();

        info!(output = %self.config.output_dir.display(), "Starting build");

        self.emit_assets(&mut report)?;
        self.render_pages(&mut report)?;

        report.duration = start.elapsed();
        info!(
            assets = report.assets,
            pages = report.pages,
            elapsed_ms = report.duration.as_millis() as u64,
            "Build finished"
        );
        Ok(report)
    }

    fn emit_assets(&mut self, report: &mut BuildReport) -> Result<()> {
        let Some(fp) = self.fingerprinter.as_mut() else {
            debug!("No static directory configured, skipping assets");
            return Ok(());
        };

        fp.build_map()?;
        let summary = fp.emit(self.config.compress_static)?;
        report.assets = summary.files;
        report.bytes = summary.bytes;
        report.compressed = summary.compressed;

        if let Some(manifest) = &self.config.manifest {
            let map = fp.map().ok_or(SiteError::MapNotBuilt)?;
            let json = map.to_json().map_err(|source| SiteError::Data {
                output: manifest.clone(),
                source,
            })?;
            let path = if manifest.starts_with('/') {
                manifest.clone()
            } else {
                format!("/{manifest}")
            };
            self.site_output.write(&path, json.as_bytes())?;
            debug!(path = %path, "Wrote asset manifest");
        }

        Ok(())
    }

    fn render_pages(&mut self, report: &mut BuildReport) -> Result<()> {
        if self.renderer.is_none() {
            debug!("No template directory configured, skipping pages");
            return Ok(());
        }

        let resolver: Arc<dyn AssetResolver> = Arc::new(self.asset_resolver()?);
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        renderer.set_asset_resolver(resolver);
        renderer.load_matching(&self.config.template_matcher)?;

        for (output, job) in &self.jobs {
            renderer.render_to_output(output, &job.template, &job.data)?;
            report.pages += 1;
        }

        info!(pages = report.pages, "Rendered pages");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint_path;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, data: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    // ==================== normalize_static_prefix tests ====================

    #[test]
    fn test_normalize_static_prefix() {
        assert_eq!(normalize_static_prefix(""), "/static");
        assert_eq!(normalize_static_prefix("/static"), "/static");
        assert_eq!(normalize_static_prefix("assets/"), "/assets");
        assert_eq!(normalize_static_prefix("/a/b/"), "/a/b");
        assert_eq!(normalize_static_prefix("/"), "");
    }

    // ==================== Generator::new tests ====================

    #[test]
    fn test_new_requires_output_dir() {
        assert!(matches!(
            Generator::new(SiteConfig::new("")),
            Err(SiteError::MissingOutputDir)
        ));
    }

    #[test]
    fn test_new_normalizes_prefix() {
        let generator = Generator::new(SiteConfig::new("out").with_static_prefix("")).unwrap();
        assert_eq!(generator.static_prefix(), "/static");
    }

    // ==================== job registration tests ====================

    #[test]
    fn test_add_last_registration_wins() {
        let mut generator = Generator::new(SiteConfig::new("out")).unwrap();

        generator.add("/index.html", "old", &json!({"v": 1})).unwrap();
        generator.add("/index.html", "new", &json!({"v": 2})).unwrap();

        assert_eq!(generator.job_count(), 1);
        let job = generator.job("/index.html").unwrap();
        assert_eq!(job.template, "new");
        assert_eq!(job.data, json!({"v": 2}));
    }

    #[test]
    fn test_register_functions_requires_templates() {
        let mut generator = Generator::new(SiteConfig::new("out")).unwrap();

        let result = generator.register_functions(Vec::<(String, Box<TemplateFn>)>::new());

        assert!(matches!(result, Err(SiteError::NoTemplateDir)));
    }

    // ==================== asset URL tests ====================

    #[test]
    fn test_resolve_asset_url_without_static_dir_is_empty() {
        let generator = Generator::new(SiteConfig::new("out")).unwrap();
        assert_eq!(generator.resolve_asset_url("/logo.png").unwrap(), "");
    }

    #[test]
    fn test_resolve_asset_url_before_run_fails() {
        let temp = TempDir::new().unwrap();
        let generator =
            Generator::new(SiteConfig::new(temp.path().join("out")).with_static(temp.path())).unwrap();

        assert!(matches!(
            generator.resolve_asset_url("/logo.png"),
            Err(SiteError::MapNotBuilt)
        ));
        assert!(matches!(generator.asset_resolver(), Err(SiteError::MapNotBuilt)));
    }

    #[test]
    fn test_resolve_asset_url_with_prefixes() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "assets/app.js", "app");
        let config = SiteConfig::new(temp.path().join("out"))
            .with_static(temp.path().join("assets"))
            .with_url_prefix("https://cdn.example.com/")
            .with_static_prefix("/s");
        let mut generator = Generator::new(config).unwrap();

        generator.run().unwrap();

        assert_eq!(
            generator.resolve_asset_url("/app.js").unwrap(),
            format!("https://cdn.example.com/s{}", fingerprint_path("/app.js", b"app"))
        );
    }

    // ==================== run tests ====================

    #[test]
    fn test_run_static_only() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "assets/css/site.css", "body{}");
        let out = temp.path().join("out");
        let mut generator =
            Generator::new(SiteConfig::new(&out).with_static(temp.path().join("assets"))).unwrap();

        let report = generator.run().unwrap();

        assert_eq!(report.assets, 1);
        assert_eq!(report.pages, 0);
        let target = fingerprint_path("/css/site.css", b"body{}");
        assert!(out.join(format!("static{target}")).exists());
    }

    #[test]
    fn test_run_templates_only_static_is_empty() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "tpl/index.html", r#"<link href="{{static "/site.css"}}">"#);
        let out = temp.path().join("out");
        let mut generator =
            Generator::new(SiteConfig::new(&out).with_templates(temp.path().join("tpl"))).unwrap();
        generator.add("/index.html", "index", &json!({})).unwrap();

        generator.run().unwrap();

        assert_eq!(
            fs::read_to_string(out.join("index.html")).unwrap(),
            r#"<link href="">"#
        );
    }

    #[test]
    fn test_run_missing_template_aborts() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "tpl/index.html", "home");
        let out = temp.path().join("out");
        let mut generator =
            Generator::new(SiteConfig::new(&out).with_templates(temp.path().join("tpl"))).unwrap();
        generator.add("/about.html", "about", &json!({})).unwrap();

        let result = generator.run();

        assert!(matches!(result, Err(SiteError::TemplateNotFound { .. })));
        assert!(!out.join("about.html").exists());
    }

    #[test]
    fn test_run_asset_failure_skips_templates() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "tpl/index.html", "home");
        let out = temp.path().join("out");
        let config = SiteConfig::new(&out)
            .with_templates(temp.path().join("tpl"))
            .with_static(temp.path().join("missing-assets"));
        let mut generator = Generator::new(config).unwrap();
        generator.add("/index.html", "index", &json!({})).unwrap();

        let result = generator.run();

        assert!(matches!(result, Err(SiteError::List { .. })));
        assert!(!out.join("index.html").exists());
    }

    #[test]
    fn test_run_writes_manifest() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "assets/logo.png", "png");
        let out = temp.path().join("out");
        let config = SiteConfig::new(&out)
            .with_static(temp.path().join("assets"))
            .with_manifest("assets.json");
        let mut generator = Generator::new(config).unwrap();

        generator.run().unwrap();

        let manifest: Value =
            serde_json::from_str(&fs::read_to_string(out.join("assets.json")).unwrap()).unwrap();
        assert_eq!(manifest["/logo.png"], fingerprint_path("/logo.png", b"png"));
    }

    #[test]
    fn test_run_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "assets/logo.png", "png");
        write(temp.path(), "tpl/index.html", r#"<img src="{{static "/logo.png"}}">"#);
        let out = temp.path().join("out");
        let config = SiteConfig::new(&out)
            .with_static(temp.path().join("assets"))
            .with_templates(temp.path().join("tpl"));
        let mut generator = Generator::new(config).unwrap();
        generator.add("/index.html", "index", &json!({})).unwrap();

        generator.run().unwrap();
        let first = fs::read(out.join("index.html")).unwrap();
        let report = generator.run().unwrap();
        let second = fs::read(out.join("index.html")).unwrap();

        assert_eq!(first, second);
        assert_eq!(report.pages, 1);
    }

    #[test]
    fn test_run_with_registered_function() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "tpl/index.html", "{{upper site}}");
        let out = temp.path().join("out");
        let mut generator =
            Generator::new(SiteConfig::new(&out).with_templates(temp.path().join("tpl"))).unwrap();
        let upper: Box<TemplateFn> = Box::new(|args| match args {
            [Value::String(s)] => Ok(Value::String(s.to_uppercase())),
            _ => Err("expected a string".to_string()),
        });
        generator
            .register_functions([("upper".to_string(), upper)])
            .unwrap();
        generator.add("/index.html", "index", &json!({"site": "docs"})).unwrap();

        generator.run().unwrap();

        assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "DOCS");
    }
}
