use std::fmt::Display;
use std::fs;
use std::sync::LazyLock;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use console::Style;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::engine::BuildResults;
use crate::error::{WriteError, WriteErrors};

const ANSI_BLUE: Style = Style::new().blue();

static PROGRESS_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
});

pub fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

fn write_file(path: &Utf8Path, content: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    fs::write(path, content)
}

/// Write every rendered component under `root`.
///
/// Writes run concurrently on the rayon pool. All of them are attempted, the
/// failures are gathered into a single [`WriteErrors`]. Files written before a
/// failure stay on disk.
pub fn write_components(
    root: &Utf8Path,
    results: &BuildResults,
) -> Result<Vec<Utf8PathBuf>, WriteErrors> {
    let rendered: Vec<_> = results.components.values().collect();

    let bar = ProgressBar::new(rendered.len() as u64).with_style(PROGRESS_STYLE.clone());
    bar.set_message("Writing components...");

    let outcomes: Vec<Result<Utf8PathBuf, WriteError>> = rendered
        .par_iter()
        .progress_with(bar.clone())
        .map(|component| {
            let path = root.join(&component.dest);
            tracing::debug!(dest = %path, "writing");

            write_file(&path, &component.content)
                .map(|()| path.clone())
                .map_err(|source| WriteError { path, source })
        })
        .collect();

    bar.finish_and_clear();

    let (written, failed): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(Result::is_ok);
    let failed: Vec<WriteError> = failed.into_iter().filter_map(Result::err).collect();

    if !failed.is_empty() {
        return Err(WriteErrors(failed));
    }

    Ok(written.into_iter().filter_map(Result::ok).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Rendered;

    #[test]
    fn writes_nested_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        let results: BuildResults = [
            Rendered {
                dest: "out/a.html".into(),
                content: "a".into(),
            },
            Rendered {
                dest: "out/deep/b.html".into(),
                content: "b".into(),
            },
        ]
        .into_iter()
        .collect();

        let mut written = write_components(&root, &results).unwrap();
        written.sort();

        assert_eq!(written, vec![root.join("out/a.html"), root.join("out/deep/b.html")]);
        assert_eq!(fs::read_to_string(root.join("out/deep/b.html")).unwrap(), "b");
    }

    #[test]
    fn gathers_every_failure() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        // a plain file where directories are expected
        fs::write(root.join("blocked"), "").unwrap();

        let results: BuildResults = [
            Rendered {
                dest: "blocked/one.html".into(),
                content: "1".into(),
            },
            Rendered {
                dest: "blocked/two.html".into(),
                content: "2".into(),
            },
            Rendered {
                dest: "ok.html".into(),
                content: "ok".into(),
            },
        ]
        .into_iter()
        .collect();

        let errors = write_components(&root, &results).unwrap_err();

        assert_eq!(errors.0.len(), 2);
        assert!(root.join("ok.html").is_file());
    }
}
