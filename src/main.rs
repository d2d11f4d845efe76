use anyhow::Context;
use assemble_task::{JinjaEngine, Settings, TaskConfig};
use camino::Utf8PathBuf;
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Assemble templates into static pages")]
struct Args {
    /// Targets to run, all of them when omitted.
    targets: Vec<String>,

    /// Task configuration file, JSON or YAML.
    #[arg(short, long, default_value = "assemble.json")]
    config: Utf8PathBuf,

    /// Directory the configuration path is resolved against.
    #[arg(long)]
    cwd: Option<Utf8PathBuf>,

    /// Log level, overrides `options.log.level`.
    #[arg(long)]
    log: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let filter = level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log.as_deref());

    let path = match &args.cwd {
        Some(cwd) => cwd.join(&args.config),
        None => args.config.clone(),
    };

    eprintln!(
        "Running {} from {}",
        style("assemble").red(),
        style(&path).blue()
    );

    let config = TaskConfig::load(&path).with_context(|| format!("loading {path}"))?;

    let settings = Settings {
        log: args.log,
        ..Default::default()
    };

    let reports = assemble_task::run(&config, &args.targets, &JinjaEngine, &settings)?;
    let total: usize = reports.iter().map(|report| report.written.len()).sum();

    eprintln!(
        "Assembled {} files in {} targets",
        style(total).green(),
        reports.len()
    );

    Ok(())
}
