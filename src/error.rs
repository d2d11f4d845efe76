use std::fmt;

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilesError {
    #[error("Couldn't compile glob pattern '{0}'.\n{1}")]
    GlobPattern(String, glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Malformed files declaration: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read '{path}'.\n{source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't parse JSON in '{path}'.\n{source}")]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Couldn't parse YAML in '{path}'.\n{source}")]
    Yaml {
        path: Utf8PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Task configuration must be an object, found {0}")]
    NotAnObject(&'static str),

    #[error("Unknown merge strategy in `merge`.\n{0}")]
    MergeStrategy(#[source] serde_json::Error),

    #[error("Target '{0}' is not defined")]
    UnknownTarget(String),

    #[error(transparent)]
    Files(#[from] FilesError),
}

/// Failure reported by an [`Engine`](crate::engine::Engine) implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Couldn't read template '{path}'.\n{source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed front matter in '{0}':\n{1}")]
    FrontMatter(Utf8PathBuf, anyhow::Error),

    #[error("Layout '{0}' not found")]
    LayoutNotFound(Utf8PathBuf),

    #[error("Layout '{0}' nested deeper than {1} levels")]
    LayoutDepth(Utf8PathBuf, usize),

    #[error("Template '{0}':\n{1}")]
    Render(String, anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A single file which couldn't be written.
#[derive(Debug, Error)]
#[error("Couldn't write '{path}': {source}")]
pub struct WriteError {
    pub path: Utf8PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Every write that failed during one target run.
#[derive(Debug)]
pub struct WriteErrors(pub Vec<WriteError>);

impl fmt::Display for WriteErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} file(s) couldn't be written", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n  {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WriteErrors {}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Error while reading the configuration:\n{0}")]
    Config(#[from] ConfigError),

    #[error("Error while normalizing files:\n{0}")]
    Files(#[from] FilesError),

    #[error("Error while building target '{0}':\n{1}")]
    Engine(String, EngineError),

    #[error("Error while writing components:\n{0}")]
    Write(#[from] WriteErrors),

    #[error("Couldn't write debug output '{0}'.\n{1}")]
    Debug(Utf8PathBuf, std::io::Error),
}
