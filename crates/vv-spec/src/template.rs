use std::fs;
use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::render::ViewName;

const ERROR_SUMMARY_PARTIAL: &str = "error_summary";
const TEMPLATE_EXTENSION: &str = "hbs";

const BUILTIN_TEMPLATES: [(ViewName, &str); 4] = [
    (ViewName::Start, include_str!("../templates/start.hbs")),
    (
        ViewName::SpeciesSelection,
        include_str!("../templates/species-selection.hbs"),
    ),
    (
        ViewName::AnimalCounts,
        include_str!("../templates/animal-counts.hbs"),
    ),
    (
        ViewName::Confirmation,
        include_str!("../templates/confirmation.hbs"),
    ),
];
const BUILTIN_ERROR_SUMMARY: &str = include_str!("../templates/error_summary.hbs");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template '{name}' failed to compile: {source}")]
    Template {
        name: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },
    #[error("failed to render view '{view}': {source}")]
    Render {
        view: ViewName,
        #[source]
        source: Box<handlebars::RenderError>,
    },
    #[error("failed to read template '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode view '{view}': {source}")]
    Json {
        view: ViewName,
        #[source]
        source: serde_json::Error,
    },
}

/// Turns a view name and its data bag into a response body.
pub trait Renderer {
    fn render(&self, view: ViewName, data: &Value) -> Result<String, RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&self, view: ViewName, data: &Value) -> Result<String, RenderError> {
        (**self).render(view, data)
    }
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render(&self, view: ViewName, data: &Value) -> Result<String, RenderError> {
        (**self).render(view, data)
    }
}

/// Handlebars templates, one per view, plus an `error_summary` partial.
///
/// Built-in templates produce plain text. Any of them can be replaced by a
/// `<view>.hbs` file in a template directory.
#[derive(Debug)]
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl HandlebarsRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        register_partial(&mut registry, ERROR_SUMMARY_PARTIAL, BUILTIN_ERROR_SUMMARY)?;
        for (view, template) in BUILTIN_TEMPLATES {
            register_template(&mut registry, view.as_str(), template)?;
        }
        Ok(Self { registry })
    }

    /// Replaces built-in templates with `<name>.hbs` files found in `dir`.
    pub fn with_template_dir(mut self, dir: &Path) -> Result<Self, RenderError> {
        if let Some(template) = read_override(dir, ERROR_SUMMARY_PARTIAL)? {
            register_partial(&mut self.registry, ERROR_SUMMARY_PARTIAL, &template)?;
        }
        for view in ViewName::ALL {
            if let Some(template) = read_override(dir, view.as_str())? {
                register_template(&mut self.registry, view.as_str(), &template)?;
                debug!(view = view.as_str(), dir = %dir.display(), "template overridden");
            }
        }
        Ok(self)
    }

    /// Escape values for HTML output. Off by default for text templates.
    pub fn escape_html(mut self) -> Self {
        self.registry.register_escape_fn(handlebars::html_escape);
        self
    }
}

impl Renderer for HandlebarsRenderer {
    fn render(&self, view: ViewName, data: &Value) -> Result<String, RenderError> {
        self.registry
            .render(view.as_str(), data)
            .map_err(|source| RenderError::Render {
                view,
                source: Box::new(source),
            })
    }
}

/// Serialises `{view, data}` as pretty JSON; for API callers and debugging.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, view: ViewName, data: &Value) -> Result<String, RenderError> {
        serde_json::to_string_pretty(&json!({
            "view": view.as_str(),
            "data": data,
        }))
        .map_err(|source| RenderError::Json { view, source })
    }
}

fn register_template(
    registry: &mut Handlebars<'static>,
    name: &str,
    template: &str,
) -> Result<(), RenderError> {
    registry
        .register_template_string(name, template)
        .map_err(|source| RenderError::Template {
            name: name.to_string(),
            source: Box::new(source),
        })
}

fn register_partial(
    registry: &mut Handlebars<'static>,
    name: &str,
    template: &str,
) -> Result<(), RenderError> {
    registry
        .register_partial(name, template)
        .map_err(|source| RenderError::Template {
            name: name.to_string(),
            source: Box::new(source),
        })
}

fn read_override(dir: &Path, name: &str) -> Result<Option<String>, RenderError> {
    let path = dir.join(format!("{name}.{TEMPLATE_EXTENSION}"));
    if !path.is_file() {
        return Ok(None);
    }
    fs::read_to_string(&path)
        .map(Some)
        .map_err(|source| RenderError::Io { path, source })
}
