use std::fs;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use gray_matter::engine::YAML;
use gray_matter::{Matter, Pod};
use minijinja::Environment;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde_json::{Map, Value, json};

use crate::engine::{BuildRequest, BuildResults, Engine, Rendered};
use crate::error::EngineError;
use crate::files::{self, Component};
use crate::options::{self, Options};

/// Layouts wrapping layouts deeper than this are assumed to be cyclic.
const MAX_LAYOUT_DEPTH: usize = 16;

static PARSER: LazyLock<Matter<YAML>> = LazyLock::new(Matter::<YAML>::new);

/// Split a document into its YAML front matter and body.
fn front_matter(path: &Utf8Path, text: &str) -> Result<(Map<String, Value>, String), EngineError> {
    let malformed = |e: String| EngineError::FrontMatter(path.to_owned(), anyhow::anyhow!(e));

    let entity = PARSER.parse(text).map_err(|e| malformed(e.to_string()))?;
    let object = entity
        .data
        .unwrap_or_else(Pod::new_hash)
        .deserialize::<Value>()
        .map_err(|e| malformed(e.to_string()))?;

    let body = match entity.content.strip_prefix('\n') {
        Some(body) => body.to_string(),
        None => entity.content,
    };

    match object {
        Value::Object(map) => Ok((map, body)),
        Value::Null => Ok((Map::new(), body)),
        _ => Err(malformed("front matter must be a mapping".into())),
    }
}

fn read(root: &Utf8Path, path: &Utf8Path) -> Result<String, EngineError> {
    fs::read_to_string(root.join(path)).map_err(|source| EngineError::Read {
        path: path.to_owned(),
        source,
    })
}

fn string_option<'a>(metadata: &'a Options, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(Value::as_str)
}

/// `none`, `false` and the empty string all mean no layout.
fn layout_name(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(name) if !name.is_empty() && name != "none" && name != "false" => {
            Some(name.clone())
        }
        _ => None,
    }
}

/// Renders components with `minijinja`, reading YAML front matter with
/// `gray_matter`.
///
/// Front matter of a page is available both at the top level of the context
/// and under `page`. Every file matched by the `partials` option can be
/// included by its file stem. Pages are wrapped in the layout chosen by their
/// front matter or the `layout` option, found in `layoutdir`, the rendered
/// page is passed to the layout as `body`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JinjaEngine;

struct Page<'a, 'env> {
    request: &'a BuildRequest<'a>,
    env: &'a Environment<'env>,
}

impl Page<'_, '_> {
    fn context(&self, front: &Map<String, Value>) -> Value {
        let mut context = self.request.data.clone();
        context.insert("options".into(), Value::Object(self.request.metadata.clone()));
        context.extend(front.clone());
        context.insert("page".into(), Value::Object(front.clone()));
        Value::Object(context)
    }

    fn render(&self, name: &str, source: &str, context: &Value) -> Result<String, EngineError> {
        self.env
            .render_named_str(name, source, context)
            .map_err(|e| EngineError::Render(name.to_string(), e.into()))
    }

    fn layout_path(&self, name: &str) -> Utf8PathBuf {
        let metadata = self.request.metadata;
        let dir = string_option(metadata, "layoutdir").unwrap_or_default();
        let mut path = Utf8Path::new(dir).join(name);

        if path.extension().is_none() {
            let ext = string_option(metadata, "layoutext").unwrap_or_default();
            path = Utf8PathBuf::from(format!("{path}{ext}"));
        }

        path
    }

    fn dest(&self, component: &Component) -> Utf8PathBuf {
        let mut dest = component.dest.clone();
        match string_option(self.request.metadata, "ext") {
            Some("") => {}
            Some(ext) => {
                dest.set_extension(ext.trim_start_matches('.'));
            }
            None => {
                dest.set_extension("html");
            }
        }
        dest
    }

    fn assemble(&self, component: &Component) -> Result<Rendered, EngineError> {
        let root = self.request.root;
        let text = read(root, &component.src)?;
        let (front, body) = front_matter(&component.src, &text)?;

        let mut context = self.context(&front);
        let mut content = self.render(component.src.as_str(), &body, &context)?;

        let mut layout = layout_name(
            front
                .get("layout")
                .or_else(|| self.request.metadata.get("layout")),
        );

        let mut depth = 0;
        while let Some(name) = layout {
            depth += 1;
            let path = self.layout_path(&name);
            if depth > MAX_LAYOUT_DEPTH {
                return Err(EngineError::LayoutDepth(path, MAX_LAYOUT_DEPTH));
            }
            if !root.join(&path).is_file() {
                return Err(EngineError::LayoutNotFound(path));
            }

            let text = read(root, &path)?;
            let (front, body) = front_matter(&path, &text)?;

            if let Value::Object(map) = &mut context {
                map.insert("body".into(), Value::String(content));
                map.insert("layout".into(), Value::Object(front.clone()));
            }

            content = self.render(path.as_str(), &body, &context)?;
            layout = layout_name(front.get("layout"));
        }

        tracing::debug!(src = %component.src, dest = %component.dest, "rendered");

        Ok(Rendered {
            dest: self.dest(component),
            content,
        })
    }
}

impl Engine for JinjaEngine {
    fn defaults(&self) -> Options {
        Options::from_iter([
            ("ext".to_string(), json!(".html")),
            ("layoutdir".to_string(), json!("")),
            ("layoutext".to_string(), json!("")),
            ("partials".to_string(), json!([])),
        ])
    }

    fn build(&self, request: &BuildRequest<'_>) -> Result<BuildResults, EngineError> {
        let patterns: Vec<String> = options::arrayify(request.metadata.get("partials"))
            .into_iter()
            .filter_map(|pattern| pattern.as_str().map(ToOwned::to_owned))
            .collect();

        let mut partials = Vec::new();
        for path in files::expand(request.root, &patterns).map_err(anyhow::Error::from)? {
            let text = read(request.root, &path)?;
            let (_, body) = front_matter(&path, &text)?;
            let name = path.file_stem().unwrap_or(path.as_str()).to_string();
            partials.push((name, body));
        }

        let mut env = Environment::new();
        for (name, body) in &partials {
            env.add_template(name, body)
                .map_err(|e| EngineError::Render(name.clone(), e.into()))?;
        }

        let page = Page {
            request,
            env: &env,
        };

        request
            .components
            .par_iter()
            .map(|component| page.assemble(component))
            .collect::<Result<Vec<_>, _>>()
            .map(BuildResults::from_iter)
    }
}
