//! Merging of task-wide and target-specific options into the flat metadata
//! handed over to the engine.
//!
//! Options are layered, from lowest to highest precedence: engine defaults,
//! task options, target options. Keys listed in a [`MergeTable`] as [`Union`]
//! or [`Collect`] are not overwritten, instead the task and target arrays are
//! joined together.
//!
//! [`Union`]: Strategy::Union
//! [`Collect`]: Strategy::Collect

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Flat option mapping, kept in declaration order.
pub type Options = Map<String, Value>;

/// Log level used when neither the command line nor the options name one.
pub const DEFAULT_LOG_LEVEL: &str = "error";

/// How a single option is combined across the task and target scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Target value replaces the task value.
    Overwrite,
    /// Task array followed by target array, duplicates removed.
    Union,
    /// Same as [`Strategy::Union`], but the option is always present.
    Collect,
}

/// Per-option merge strategies. Options which are not listed are overwritten.
#[derive(Debug, Clone)]
pub struct MergeTable {
    strategies: HashMap<String, Strategy>,
}

impl MergeTable {
    /// Table in which every option is overwritten.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, strategy: Strategy) -> Self {
        self.strategies.insert(key.into(), strategy);
        self
    }

    /// Layer `other` on top of this table, its strategies win.
    pub fn extend(mut self, other: &MergeTable) -> Self {
        self.strategies.extend(
            other
                .strategies
                .iter()
                .map(|(key, strategy)| (key.clone(), *strategy)),
        );
        self
    }

    pub fn strategy(&self, key: &str) -> Strategy {
        self.strategies
            .get(key)
            .copied()
            .unwrap_or(Strategy::Overwrite)
    }
}

impl Default for MergeTable {
    fn default() -> Self {
        Self::empty()
            .with("partials", Strategy::Collect)
            .with("helpers", Strategy::Union)
            .with("plugins", Strategy::Union)
            .with("data", Strategy::Union)
            .with("utils", Strategy::Union)
            .with("mixins", Strategy::Union)
            .with("collections", Strategy::Union)
    }
}

/// Wraps a value into an array, `null` becomes an empty array.
pub fn arrayify(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

/// Ordered union, the first occurrence of every value wins.
pub fn union(first: Vec<Value>, second: Vec<Value>) -> Vec<Value> {
    let mut acc: Vec<Value> = Vec::with_capacity(first.len() + second.len());
    for value in first.into_iter().chain(second) {
        if !acc.contains(&value) {
            acc.push(value);
        }
    }
    acc
}

/// Produce the single flat options mapping for one target.
pub fn normalize(
    defaults: &Options,
    task: &Options,
    target: &Options,
    table: &MergeTable,
) -> Options {
    let mut merged = defaults.clone();

    for (key, value) in task.iter().chain(target) {
        merged.insert(key.clone(), value.clone());
    }

    let keys: Vec<&String> = merged
        .keys()
        .chain(
            table
                .strategies
                .iter()
                .filter(|(_, strategy)| **strategy != Strategy::Overwrite)
                .map(|(key, _)| key),
        )
        .collect();

    let mut resolved: Vec<(String, Value)> = Vec::new();
    for key in keys {
        let strategy = table.strategy(key);
        if strategy == Strategy::Overwrite || resolved.iter().any(|(k, _)| k == key) {
            continue;
        }

        let value = if task.contains_key(key) || target.contains_key(key) {
            union(arrayify(task.get(key)), arrayify(target.get(key)))
        } else if defaults.contains_key(key) {
            arrayify(defaults.get(key))
        } else if strategy == Strategy::Collect {
            vec![]
        } else {
            continue;
        };

        resolved.push((key.clone(), Value::Array(value)));
    }

    for (key, value) in resolved {
        merged.insert(key, value);
    }

    merged
}

/// Settle the effective log level and store it under `log.level`.
///
/// The command line wins over the options, which win over [`DEFAULT_LOG_LEVEL`].
pub fn resolve_log_level(options: &mut Options, cli: Option<&str>) -> String {
    let declared = options
        .get("log")
        .and_then(|log| log.get("level"))
        .and_then(Value::as_str)
        .filter(|level| !level.is_empty());

    let level = cli
        .or(declared)
        .unwrap_or(DEFAULT_LOG_LEVEL)
        .to_string();

    let log = options
        .entry("log")
        .or_insert_with(|| Value::Object(Map::new()));
    if !log.is_object() {
        *log = Value::Object(Map::new());
    }
    if let Value::Object(log) = log {
        log.insert("level".into(), Value::String(level.clone()));
    }

    level
}

/// Whether an option is set to anything other than `null`, `false` or `""`.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
