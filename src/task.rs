//! Driving a single target from configuration to files on disk.

use std::fs;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use console::style;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::{self, TaskConfig};
use crate::engine::{BuildRequest, Engine};
use crate::error::TaskError;
use crate::files::{self, Component};
use crate::io;
use crate::options::{self, MergeTable};

/// Where the debug dump goes when `debug` is simply switched on.
pub const DEBUG_FILE: &str = "options.json";

/// Settings coming from the caller rather than the task configuration.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Log level given on the command line, wins over `options.log.level`.
    pub log: Option<String>,
    /// How options are merged across the task and target scopes. Strategies
    /// declared in the task configuration are layered on top.
    pub table: MergeTable,
}

/// Outcome of a successful target run.
#[derive(Debug, Clone)]
pub struct Report {
    pub target: String,
    /// Every file written, in no particular order.
    pub written: Vec<Utf8PathBuf>,
    pub elapsed: Duration,
}

/// Dump the merged options and the resolved components for inspection.
fn dump_options(
    config: &TaskConfig,
    metadata: &options::Options,
    components: &[Component],
) -> Result<(), TaskError> {
    let path = match metadata.get("debug") {
        Some(Value::String(path)) => config.root.join(path),
        _ => config.root.join(DEBUG_FILE),
    };

    let write = || -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let dump = json!({ "options": metadata, "components": components });
        let json = serde_json::to_vec_pretty(&dump).map_err(std::io::Error::other)?;
        fs::write(&path, json)
    };

    write().map_err(|e| TaskError::Debug(path.clone(), e))
}

/// Build one target and write its files.
///
/// Options are merged first, then the files declaration is resolved, the
/// template data is loaded and the engine is invoked. Nothing is written if any
/// of those steps fails. Success is only reported once every write finished.
pub fn run_target(
    config: &TaskConfig,
    target: &str,
    engine: &dyn Engine,
    settings: &Settings,
) -> Result<Report, TaskError> {
    let s = Instant::now();
    let span = tracing::info_span!("target", name = target);
    let _enter = span.enter();

    let table = settings.table.clone().extend(config.merge());
    let mut metadata = options::normalize(
        &engine.defaults(),
        config.options(),
        &config.target_options(target)?,
        &table,
    );
    let level = options::resolve_log_level(&mut metadata, settings.log.as_deref());
    debug!(level = %level, "merged options");

    let mappings = files::mappings(config.target(target)?)?;
    let components = files::normalize(&config.root, &mappings)?;
    info!("resolved {} components", components.len());

    let data = config::load_data(&config.root, &metadata)?;

    if options::is_truthy(metadata.get("debug")) {
        dump_options(config, &metadata, &components)?;
    }

    let request = BuildRequest {
        name: target,
        root: &config.root,
        metadata: &metadata,
        components: &components,
        data: &data,
    };

    let results = engine
        .build(&request)
        .map_err(|e| TaskError::Engine(target.to_string(), e))?;

    let written = io::write_components(&config.root, &results)?;

    eprintln!(
        "  {} {} files {} {}",
        style(target).cyan(),
        written.len(),
        style("OK").green(),
        io::as_overhead(s)
    );

    Ok(Report {
        target: target.to_string(),
        written,
        elapsed: s.elapsed(),
    })
}

/// Run the named targets in order, or every target when none are named.
///
/// Stops at the first target that fails.
pub fn run(
    config: &TaskConfig,
    targets: &[String],
    engine: &dyn Engine,
    settings: &Settings,
) -> Result<Vec<Report>, TaskError> {
    let targets: Vec<String> = match targets {
        [] => config.targets().map(ToOwned::to_owned).collect(),
        named => named.to_vec(),
    };

    targets
        .iter()
        .map(|target| run_target(config, target, engine, settings))
        .collect()
}
