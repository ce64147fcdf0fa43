//! Template loading and rendering on top of Handlebars.
//!
//! Templates are named after their file name without extension
//! (`/pages/index.html` → `index`) and can include each other as partials.
//! The registry runs in strict mode, so referencing data that is not present
//! fails the render instead of producing empty output. Values are written
//! as-is: no HTML escaping is applied, since outputs are not only HTML.

use std::collections::BTreeMap;
use std::sync::Arc;

use handlebars::{Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, ScopedJson};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, SiteError};
use crate::resolver::AssetResolver;
use crate::storage::{FileReader, FileWriter};

/// Name under which the asset URL resolver is exposed to templates
pub const STATIC_FUNCTION: &str = "static";

/// A function callable from templates, e.g. `{{shout title}}`
pub type TemplateFn = dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync;

/// Adapts a [`TemplateFn`] to a Handlebars helper
struct FunctionHelper {
    name: String,
    func: Box<TemplateFn>,
}

impl HelperDef for FunctionHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> std::result::Result<ScopedJson<'reg, 'rc>, RenderError> {
        let args: Vec<Value> = h.params().iter().map(|p| p.value().clone()).collect();
        (self.func)(&args)
            .map(ScopedJson::Derived)
            .map_err(|msg| RenderError::new(format!("{}: {}", self.name, msg)))
    }
}

/// Predicate selecting which input files are loaded as templates
#[derive(Debug, Clone)]
pub enum TemplateMatcher {
    /// Paths ending in the suffix, with at least one character before it
    Suffix(String),
    /// Paths matching a regular expression
    Pattern(Regex),
}

impl TemplateMatcher {
    pub fn is_match(&self, path: &str) -> bool {
        match self {
            Self::Suffix(suffix) => path.len() > suffix.len() + 1 && path.ends_with(suffix.as_str()),
            Self::Pattern(re) => re.is_match(path),
        }
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::Suffix(".html".to_string())
    }
}

/// Template name for a file path: its file name with the last extension removed
pub fn template_name(path: &str) -> &str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(idx) => &file_name[..idx],
        None => file_name,
    }
}

/// Loads templates from one tree and renders them into another
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
    /// Template name → path it was loaded from
    sources: BTreeMap<String, String>,
    input: Box<dyn FileReader>,
    output: Box<dyn FileWriter>,
}

impl TemplateRenderer {
    pub fn new(input: impl FileReader + 'static, output: impl FileWriter + 'static) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);

        Self {
            registry,
            sources: BTreeMap::new(),
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    /// Expose a single function to every template
    pub fn register_function<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.register_functions([(name.to_string(), Box::new(func) as Box<TemplateFn>)]);
    }

    /// Expose named functions to every template; later registrations replace earlier ones
    pub fn register_functions<I>(&mut self, funcs: I)
    where
        I: IntoIterator<Item = (String, Box<TemplateFn>)>,
    {
        for (name, func) in funcs {
            debug!(function = %name, "Registered template function");
            self.registry.register_helper(
                &name,
                Box::new(FunctionHelper {
                    name: name.clone(),
                    func,
                }),
            );
        }
    }

    /// Expose `resolver` to templates as `{{static "/path"}}`
    pub fn set_asset_resolver(&mut self, resolver: Arc<dyn AssetResolver>) {
        self.register_function(STATIC_FUNCTION, move |args| match args {
            [Value::String(path)] => resolver
                .resolve_url(path)
                .map(Value::String)
                .map_err(|e| e.to_string()),
            _ => Err("expected exactly one asset path string".to_string()),
        });
    }

    /// Load every input file accepted by `matcher`.
    ///
    /// Stops at the first file that fails to read or parse.
    pub fn load_matching(&mut self, matcher: &TemplateMatcher) -> Result<usize> {
        let files = self.input.list()?;
        let mut loaded = 0;

        for file in files.iter().filter(|f| matcher.is_match(f)) {
            self.load_one(template_name(file), file)?;
            loaded += 1;
        }

        info!(templates = loaded, "Loaded templates");
        Ok(loaded)
    }

    /// Load a single file under an explicit name.
    ///
    /// Reloading the same path under the same name replaces the template;
    /// loading a different path under a taken name is an error.
    pub fn load_one(&mut self, name: &str, path: &str) -> Result<()> {
        if let Some(first) = self.sources.get(name) {
            if first != path {
                return Err(SiteError::DuplicateTemplate {
                    name: name.to_string(),
                    first: first.clone(),
                    second: path.to_string(),
                });
            }
        }

        let data = self.input.read(path)?;
        let source = String::from_utf8(data).map_err(|source| SiteError::InvalidUtf8 {
            path: path.to_string(),
            source,
        })?;

        self.registry
            .register_template_string(name, source)
            .map_err(|e| SiteError::TemplateParse {
                path: path.to_string(),
                source: Box::new(e),
            })?;

        self.sources.insert(name.to_string(), path.to_string());
        debug!(template = name, path, "Loaded template");
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Names of all loaded templates, sorted
    pub fn template_names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Render a loaded template against `data`
    pub fn render_to_bytes<T>(&self, name: &str, data: &T) -> Result<Vec<u8>>
    where
        T: Serialize,
    {
        if !self.has_template(name) {
            return Err(SiteError::TemplateNotFound {
                name: name.to_string(),
            });
        }

        self.registry
            .render(name, data)
            .map(String::into_bytes)
            .map_err(|e| SiteError::Render {
                name: name.to_string(),
                source: Box::new(e),
            })
    }

    /// Render a loaded template and write the result to `output_path`
    pub fn render_to_output<T>(&self, output_path: &str, name: &str, data: &T) -> Result<usize>
    where
        T: Serialize,
    {
        let rendered = self.render_to_bytes(name, data)?;
        self.output.write(output_path, &rendered)?;
        debug!(template = name, output = output_path, bytes = rendered.len(), "Rendered page");
        Ok(rendered.len())
    }
}
