#![forbid(unsafe_code)]
//! Build task assembling static pages from templates.
//!
//! A task block names task-wide `options` and any number of targets. Running a
//! target merges its options with the task options, resolves its files
//! declaration into [`Component`]s, hands both to an [`Engine`] and writes what
//! the engine renders.
//!
//! ```no_run
//! use assemble_task::{JinjaEngine, Settings, TaskConfig, run};
//!
//! let config = TaskConfig::load("assemble.json")?;
//! for report in run(&config, &[], &JinjaEngine, &Settings::default())? {
//!     println!("{}: {} files", report.target, report.written.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
mod error;
pub mod files;
mod io;
pub mod options;
mod task;

pub use crate::config::TaskConfig;
#[cfg(feature = "minijinja")]
pub use crate::engine::JinjaEngine;
pub use crate::engine::{BuildRequest, BuildResults, Engine, Rendered};
pub use crate::error::*;
pub use crate::files::{Component, Mapping, Sources};
pub use crate::options::{MergeTable, Options, Strategy};
pub use crate::task::{DEBUG_FILE, Report, Settings, run, run_target};
