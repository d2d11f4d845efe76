//! Turning a target's files declaration into an ordered list of
//! [`Component`]s.
//!
//! Three shapes are accepted, all of them resolve to the same list:
//!
//! ```json
//! { "src": ["a.hbs", "b.hbs"], "dest": "out/" }
//! { "files": { "out/": ["a.hbs", "b.hbs"], "out/single.html": "c.hbs" } }
//! { "files": [{ "expand": true, "cwd": "pages", "src": "**/*.hbs", "dest": "out/" }] }
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern, glob_with};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FilesError;

/// One resolved source to destination mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Component {
    /// Source template, relative to the task root.
    pub src: Utf8PathBuf,
    /// Destination file, relative to the task root.
    pub dest: Utf8PathBuf,
}

/// Glob patterns, either a single one or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Sources {
    One(String),
    Many(Vec<String>),
}

impl Default for Sources {
    fn default() -> Self {
        Sources::Many(vec![])
    }
}

impl Sources {
    fn patterns(&self) -> &[String] {
        match self {
            Sources::One(one) => std::slice::from_ref(one),
            Sources::Many(many) => many,
        }
    }
}

/// A single entry of a files declaration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mapping {
    #[serde(default)]
    pub src: Sources,
    #[serde(default)]
    pub dest: Option<String>,
    /// Map every match individually, keeping its path relative to `cwd`.
    #[serde(default)]
    pub expand: bool,
    /// Directory the `src` patterns are matched in.
    #[serde(default)]
    pub cwd: Option<Utf8PathBuf>,
    /// Drop the directory part of each match.
    #[serde(default)]
    pub flatten: bool,
    /// Replacement extension for expanded destinations.
    #[serde(default)]
    pub ext: Option<String>,
}

impl Mapping {
    pub fn new(src: Sources, dest: impl Into<String>) -> Self {
        Self {
            src,
            dest: Some(dest.into()),
            ..Default::default()
        }
    }
}

fn sources(dest: &str, value: &Value) -> Result<Sources, FilesError> {
    Sources::deserialize(value).map_err(|_| {
        FilesError::Malformed(format!(
            "sources for '{dest}' must be a string or a list of strings"
        ))
    })
}

/// Read the files declaration out of a target configuration.
///
/// A target without `files` or `src` declares no files at all.
pub fn mappings(target: &Map<String, Value>) -> Result<Vec<Mapping>, FilesError> {
    match target.get("files") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(dest, src)| -> Result<_, FilesError> {
                Ok(Mapping::new(sources(dest, src)?, dest.as_str()))
            })
            .collect(),
        Some(Value::Array(entries)) => entries
            .iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                Value::Object(_) => Mapping::deserialize(entry)
                    .map_err(|e| FilesError::Malformed(format!("entry {i}: {e}"))),
                _ => Err(FilesError::Malformed(format!(
                    "entry {i} must be an object"
                ))),
            })
            .collect(),
        Some(_) => Err(FilesError::Malformed(
            "`files` must be an object or an array".into(),
        )),
        None => match target.get("src") {
            Some(src) => {
                let dest = match target.get("dest") {
                    Some(Value::String(dest)) => Some(dest.clone()),
                    None | Some(Value::Null) => None,
                    Some(_) => {
                        return Err(FilesError::Malformed("`dest` must be a string".into()));
                    }
                };
                let src = sources(dest.as_deref().unwrap_or_default(), src)?;
                Ok(vec![Mapping {
                    src,
                    dest,
                    ..Default::default()
                }])
            }
            None => Ok(vec![]),
        },
    }
}

fn is_dir_dest(dest: &str) -> bool {
    dest.ends_with('/') || dest.ends_with('\\')
}

/// Expand `{a,b}` alternatives, which `glob` does not understand.
fn braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0;
    let mut parts = Vec::new();
    let mut start = open + 1;

    for (i, c) in pattern[open..].char_indices().map(|(i, c)| (i + open, c)) {
        match c {
            '{' => depth += 1,
            ',' if depth == 1 => {
                parts.push(&pattern[start..i]);
                start = i + 1;
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    parts.push(&pattern[start..i]);
                    let (head, tail) = (&pattern[..open], &pattern[i + 1..]);
                    return parts
                        .into_iter()
                        .flat_map(|part| braces(&format!("{head}{part}{tail}")))
                        .collect();
                }
            }
            _ => {}
        }
    }

    // unbalanced, leave it to glob
    vec![pattern.to_string()]
}

/// Wildcards never match a leading dot, dotfiles have to be named explicitly.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: true,
};

/// Match patterns inside `base`, returning paths relative to `base`.
///
/// Patterns starting with `!` remove earlier matches. Order is first-seen and
/// every path appears once.
pub(crate) fn expand(base: &Utf8Path, patterns: &[String]) -> Result<Vec<Utf8PathBuf>, FilesError> {
    let mut acc: Vec<Utf8PathBuf> = Vec::new();

    for pattern in patterns.iter().flat_map(|pattern| braces(pattern)) {
        let pattern = &pattern;
        if let Some(negated) = pattern.strip_prefix('!') {
            let negated = Pattern::new(negated)
                .map_err(|e| FilesError::GlobPattern(pattern.clone(), e))?;
            acc.retain(|path| !negated.matches_with(path.as_str(), MATCH_OPTIONS));
            continue;
        }

        let full = if base.as_str().is_empty() {
            pattern.clone()
        } else {
            format!("{}/{}", Pattern::escape(base.as_str()), pattern)
        };

        let paths = glob_with(&full, MATCH_OPTIONS).map_err(|e| FilesError::GlobPattern(pattern.clone(), e))?;
        for path in paths {
            let path = Utf8PathBuf::try_from(path?)?;
            if path.is_dir() {
                continue;
            }

            let rel = path.strip_prefix(base).unwrap_or(&path).to_path_buf();
            if !acc.contains(&rel) {
                acc.push(rel);
            }
        }
    }

    Ok(acc)
}

fn expanded_dest(mapping: &Mapping, rel: &Utf8Path) -> Utf8PathBuf {
    let mut tail = match (mapping.flatten, rel.file_name()) {
        (true, Some(name)) => Utf8PathBuf::from(name),
        _ => rel.to_path_buf(),
    };

    if let Some(ext) = &mapping.ext {
        tail.set_extension(ext.trim_start_matches('.'));
    }

    match &mapping.dest {
        Some(dest) => Utf8Path::new(dest).join(tail),
        None => tail,
    }
}

/// Resolve one mapping against the task root.
fn resolve(root: &Utf8Path, mapping: &Mapping) -> Result<Vec<Component>, FilesError> {
    let cwd = mapping.cwd.clone().unwrap_or_default();
    let matches = expand(&root.join(&cwd), mapping.src.patterns())?;

    if mapping.expand {
        return Ok(matches
            .iter()
            .map(|rel| Component {
                src: cwd.join(rel),
                dest: expanded_dest(mapping, rel),
            })
            .collect());
    }

    let dest = mapping
        .dest
        .as_deref()
        .ok_or_else(|| FilesError::Malformed("mapping is missing `dest`".into()))?;

    Ok(matches
        .iter()
        .map(|rel| {
            let dest = match (is_dir_dest(dest), rel.file_name()) {
                (true, Some(name)) => Utf8Path::new(dest).join(name),
                _ => Utf8PathBuf::from(dest),
            };
            Component {
                src: cwd.join(rel),
                dest,
            }
        })
        .collect())
}

/// Produce the component list for all mappings, in declaration order.
///
/// Patterns matching nothing contribute no components.
pub fn normalize(root: &Utf8Path, mappings: &[Mapping]) -> Result<Vec<Component>, FilesError> {
    let mut components = Vec::new();
    for mapping in mappings {
        components.extend(resolve(root, mapping)?);
    }
    Ok(components)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;

    fn fixture(files: &[&str]) -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        (dir, root)
    }

    fn target(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn pairs(components: &[Component]) -> Vec<(&str, &str)> {
        components
            .iter()
            .map(|c| (c.src.as_str(), c.dest.as_str()))
            .collect()
    }

    #[test]
    fn object_shape_with_directory_dest() {
        let (_dir, root) = fixture(&["a.tpl", "b.tpl"]);
        let decl = mappings(&target(json!({ "files": { "out/": ["a.tpl", "b.tpl"] } }))).unwrap();

        let components = normalize(&root, &decl).unwrap();

        assert_eq!(
            pairs(&components),
            vec![("a.tpl", "out/a.tpl"), ("b.tpl", "out/b.tpl")]
        );
    }

    #[test]
    fn object_shape_with_file_dest() {
        let (_dir, root) = fixture(&["t1.hbs", "t2.hbs", "alert.hbs"]);
        let decl = mappings(&target(json!({
            "files": {
                "out/alert.html": "alert.hbs",
                "out/t.html": ["t*.hbs"],
            }
        })))
        .unwrap();

        let components = normalize(&root, &decl).unwrap();

        assert_eq!(
            pairs(&components),
            vec![
                ("alert.hbs", "out/alert.html"),
                ("t1.hbs", "out/t.html"),
                ("t2.hbs", "out/t.html"),
            ]
        );
    }

    #[test]
    fn expand_shape_with_cwd() {
        let (_dir, root) = fixture(&["src/a.tpl", "src/b.tpl", "src/c.txt", "other/d.tpl"]);
        let decl = mappings(&target(json!({
            "files": [{ "expand": true, "cwd": "src", "src": "*.tpl", "dest": "out/" }]
        })))
        .unwrap();

        let components = normalize(&root, &decl).unwrap();

        assert_eq!(
            pairs(&components),
            vec![("src/a.tpl", "out/a.tpl"), ("src/b.tpl", "out/b.tpl")]
        );
    }

    #[test]
    fn expand_keeps_subdirectories_unless_flattened() {
        let (_dir, root) = fixture(&["pages/blog/post.hbs"]);

        let nested = Mapping {
            src: Sources::One("**/*.hbs".into()),
            dest: Some("out".into()),
            expand: true,
            cwd: Some("pages".into()),
            ext: Some(".html".into()),
            ..Default::default()
        };
        let flat = Mapping {
            flatten: true,
            ..nested.clone()
        };

        let components = normalize(&root, &[nested, flat]).unwrap();

        assert_eq!(
            pairs(&components),
            vec![
                ("pages/blog/post.hbs", "out/blog/post.html"),
                ("pages/blog/post.hbs", "out/post.html"),
            ]
        );
    }

    #[test]
    fn compact_shape() {
        let (_dir, root) = fixture(&["components/alert.hbs", "two.hbs"]);
        let decl = mappings(&target(json!({
            "src": ["components/alert.hbs", "t*.hbs"],
            "dest": "out/"
        })))
        .unwrap();

        let components = normalize(&root, &decl).unwrap();

        assert_eq!(
            pairs(&components),
            vec![
                ("components/alert.hbs", "out/alert.hbs"),
                ("two.hbs", "out/two.hbs")
            ]
        );
    }

    #[test]
    fn negated_patterns_and_duplicates() {
        let (_dir, root) = fixture(&["a.hbs", "b.hbs", "draft.hbs"]);
        let decl = vec![Mapping::new(
            Sources::Many(vec!["*.hbs".into(), "a.hbs".into(), "!draft.hbs".into()]),
            "out/",
        )];

        let components = normalize(&root, &decl).unwrap();

        assert_eq!(
            pairs(&components),
            vec![("a.hbs", "out/a.hbs"), ("b.hbs", "out/b.hbs")]
        );
    }

    #[test]
    fn no_match_is_not_an_error() {
        let (_dir, root) = fixture(&[]);
        let decl = mappings(&target(json!({
            "files": [{ "expand": true, "cwd": "src", "src": "*.tpl", "dest": "out/" }]
        })))
        .unwrap();

        assert!(normalize(&root, &decl).unwrap().is_empty());
    }

    #[test]
    fn target_without_files() {
        assert!(mappings(&target(json!({ "options": {} }))).unwrap().is_empty());
    }

    #[test]
    fn malformed_declarations() {
        assert!(matches!(
            mappings(&target(json!({ "files": "out/" }))),
            Err(FilesError::Malformed(_))
        ));
        assert!(matches!(
            mappings(&target(json!({ "files": { "out/": 42 } }))),
            Err(FilesError::Malformed(_))
        ));
        assert!(matches!(
            mappings(&target(json!({ "files": [{ "src": "a", "dset": "b" }] }))),
            Err(FilesError::Malformed(_))
        ));

        let (_dir, root) = fixture(&["a.hbs"]);
        let missing_dest = Mapping {
            src: Sources::One("a.hbs".into()),
            ..Default::default()
        };
        assert!(matches!(
            normalize(&root, &[missing_dest]),
            Err(FilesError::Malformed(_))
        ));
    }

    #[test]
    fn brace_alternatives() {
        assert_eq!(braces("a/*.hbs"), vec!["a/*.hbs"]);
        assert_eq!(braces("{foo,bar}.hbs"), vec!["foo.hbs", "bar.hbs"]);
        assert_eq!(
            braces("{a,b{c,d}}/x"),
            vec!["a/x", "bc/x", "bd/x"]
        );
        assert_eq!(braces("{a,b"), vec!["{a,b"]);

        let (_dir, root) = fixture(&["data/a.json", "data/b.yml", "data/c.txt"]);
        let found = expand(&root, &["data/*.{json,yml}".to_string()]).unwrap();
        assert_eq!(found, vec![Utf8PathBuf::from("data/a.json"), Utf8PathBuf::from("data/b.yml")]);
    }

    #[test]
    fn wildcards_skip_dotfiles() {
        let (_dir, root) = fixture(&["a.hbs", ".draft.hbs", ".hidden/b.hbs"]);

        let found = expand(&root, &["**/*.hbs".to_string()]).unwrap();
        assert_eq!(found, vec![Utf8PathBuf::from("a.hbs")]);

        let named = expand(&root, &[".draft.hbs".to_string()]).unwrap();
        assert_eq!(named, vec![Utf8PathBuf::from(".draft.hbs")]);
    }

    #[test]
    fn invalid_pattern() {
        let (_dir, root) = fixture(&[]);
        let decl = vec![Mapping::new(Sources::One("[".into()), "out/")];

        assert!(matches!(
            normalize(&root, &decl),
            Err(FilesError::GlobPattern(..))
        ));
    }
}
