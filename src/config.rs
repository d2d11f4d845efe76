//! Reading the task configuration and the data handed to templates.

use std::collections::HashMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::files;
use crate::options::{self, MergeTable, Options, Strategy};

/// Key holding task-wide options, every other key names a target.
pub const TASK_OPTIONS: &str = "options";

/// Key holding per-option merge strategies, e.g. `{ "assets": "union" }`.
pub const MERGE_TABLE: &str = "merge";

/// Package metadata, available to templates as `pkg`.
pub const PACKAGE_FILE: &str = "package.json";

/// Site-wide settings, available to templates as `site`.
pub const SITE_FILE: &str = ".assemblerc.yml";

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a JSON or YAML file, picked by extension.
pub(crate) fn read_value(path: &Utf8Path) -> Result<Value, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;

    match path.extension() {
        Some("yml" | "yaml") => serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_owned(),
            source,
        }),
        _ => serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_owned(),
            source,
        }),
    }
}

/// Immutable snapshot of a task block, shared by every target run.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Directory all globs and destinations are relative to.
    pub root: Utf8PathBuf,
    options: Options,
    merge: MergeTable,
    targets: Map<String, Value>,
}

impl TaskConfig {
    /// Read a task configuration file, the root becomes its parent directory.
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let root = path.parent().map(ToOwned::to_owned).unwrap_or_default();
        Self::from_value(root, read_value(path)?)
    }

    pub fn from_value(root: impl Into<Utf8PathBuf>, value: Value) -> Result<Self, ConfigError> {
        let mut map = match value {
            Value::Object(map) => map,
            other => return Err(ConfigError::NotAnObject(kind(&other))),
        };

        let options = match map.shift_remove(TASK_OPTIONS) {
            None | Some(Value::Null) => Options::new(),
            Some(Value::Object(options)) => options,
            Some(other) => return Err(ConfigError::NotAnObject(kind(&other))),
        };

        let merge = match map.shift_remove(MERGE_TABLE) {
            None | Some(Value::Null) => MergeTable::empty(),
            Some(value @ Value::Object(_)) => {
                let declared: HashMap<String, Strategy> =
                    serde_json::from_value(value).map_err(ConfigError::MergeStrategy)?;
                declared
                    .into_iter()
                    .fold(MergeTable::empty(), |table, (key, strategy)| {
                        table.with(key, strategy)
                    })
            }
            Some(other) => return Err(ConfigError::NotAnObject(kind(&other))),
        };

        if let Some(other) = map.values().find(|target| !target.is_object()) {
            return Err(ConfigError::NotAnObject(kind(other)));
        }

        Ok(Self {
            root: root.into(),
            options,
            merge,
            targets: map,
        })
    }

    /// Merge strategies declared under [`MERGE_TABLE`], layered over the
    /// caller's table when a target runs.
    pub fn merge(&self) -> &MergeTable {
        &self.merge
    }

    /// Task-wide options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Target names in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn target(&self, name: &str) -> Result<&Map<String, Value>, ConfigError> {
        self.targets
            .get(name)
            .and_then(Value::as_object)
            .ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))
    }

    /// Options declared on a single target.
    pub fn target_options(&self, name: &str) -> Result<Options, ConfigError> {
        match self.target(name)?.get(TASK_OPTIONS) {
            None | Some(Value::Null) => Ok(Options::new()),
            Some(Value::Object(options)) => Ok(options.clone()),
            Some(other) => Err(ConfigError::NotAnObject(kind(other))),
        }
    }
}

/// Load the data exposed to templates.
///
/// `pkg` comes from [`PACKAGE_FILE`], `site` from [`SITE_FILE`], both are
/// optional. Each file matched by the `data` option is stored under its file
/// stem, a file named `data.*` is merged into the top level.
pub fn load_data(root: &Utf8Path, metadata: &Options) -> Result<Map<String, Value>, ConfigError> {
    let mut data = Map::new();

    let package = root.join(PACKAGE_FILE);
    if package.is_file() {
        data.insert("pkg".into(), read_value(&package)?);
    }

    let site = root.join(SITE_FILE);
    if site.is_file() {
        data.insert("site".into(), read_value(&site)?);
    }

    let patterns: Vec<String> = options::arrayify(metadata.get("data"))
        .into_iter()
        .filter_map(|pattern| pattern.as_str().map(ToOwned::to_owned))
        .collect();

    for rel in files::expand(root, &patterns)? {
        let value = read_value(&root.join(&rel))?;
        let stem = rel.file_stem().unwrap_or_default();

        match value {
            Value::Object(map) if stem == "data" => data.extend(map),
            value => {
                data.insert(stem.to_string(), value);
            }
        }
    }

    Ok(data)
}
