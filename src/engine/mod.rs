//! The seam between the task driver and the engine assembling the pages.
//!
//! The driver prepares a [`BuildRequest`] for every target run, the engine
//! renders each component and hands back [`BuildResults`]. Anything about
//! templates, layouts or partials is up to the engine.

#[cfg(feature = "minijinja")]
mod jinja;

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::files::Component;
use crate::options::Options;

#[cfg(feature = "minijinja")]
pub use jinja::JinjaEngine;

/// Everything the engine gets to see for a single target.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Name of the target being built.
    pub name: &'a str,
    /// Directory the component paths are relative to.
    pub root: &'a Utf8Path,
    /// Merged options of the target.
    pub metadata: &'a Options,
    pub components: &'a [Component],
    /// Package, site and `data` files, keyed by name.
    pub data: &'a Map<String, Value>,
}

/// A rendered component, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Destination, relative to the request root.
    pub dest: Utf8PathBuf,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildResults {
    pub components: BTreeMap<String, Rendered>,
}

impl BuildResults {
    /// Add a rendered component keyed by its destination, replacing an earlier
    /// one headed for the same file.
    pub fn insert(&mut self, rendered: Rendered) {
        self.components.insert(rendered.dest.to_string(), rendered);
    }
}

impl FromIterator<Rendered> for BuildResults {
    fn from_iter<T: IntoIterator<Item = Rendered>>(iter: T) -> Self {
        let mut results = Self::default();
        for rendered in iter {
            results.insert(rendered);
        }
        results
    }
}

/// Template assembly engine.
pub trait Engine: Send + Sync {
    /// Options the engine falls back to, overridden by task and target options.
    fn defaults(&self) -> Options {
        Options::new()
    }

    fn build(&self, request: &BuildRequest<'_>) -> Result<BuildResults, EngineError>;
}

impl<F> Engine for F
where
    F: Fn(&BuildRequest<'_>) -> Result<BuildResults, EngineError> + Send + Sync,
{
    fn build(&self, request: &BuildRequest<'_>) -> Result<BuildResults, EngineError> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_component_wins_same_destination() {
        let results: BuildResults = [
            Rendered {
                dest: "out/t.html".into(),
                content: "one".into(),
            },
            Rendered {
                dest: "out/t.html".into(),
                content: "two".into(),
            },
            Rendered {
                dest: "out/a.html".into(),
                content: "alert".into(),
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(results.components.len(), 2);
        assert_eq!(results.components["out/t.html"].content, "two");
    }

    #[test]
    fn closures_are_engines() {
        let engine = |request: &BuildRequest<'_>| -> Result<BuildResults, EngineError> {
            Ok(request
                .components
                .iter()
                .map(|c| Rendered {
                    dest: c.dest.clone(),
                    content: request.name.to_string(),
                })
                .collect())
        };

        let components = vec![Component {
            src: "a.hbs".into(),
            dest: "out/a.hbs".into(),
        }];
        let request = BuildRequest {
            name: "pages",
            root: Utf8Path::new(""),
            metadata: &Options::new(),
            components: &components,
            data: &Map::new(),
        };

        let results = engine.build(&request).unwrap();
        assert!(engine.defaults().is_empty());
        assert_eq!(results.components["out/a.hbs"].content, "pages");
    }
}
