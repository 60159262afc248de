use std::path::{Path, PathBuf};

use crate::api::CompileOptions;
use crate::diagnostic::Diagnostic;
use crate::span::Span;

pub const PROJECT_FILE: &str = "velox.toml";

/// Project configuration from velox.toml.
#[derive(Clone, Debug)]
pub struct Project {
    pub name: String,
    /// Program tree to compile, resolved against `root_dir`.
    pub entry: PathBuf,
    pub root_dir: PathBuf,
    /// `[optimize] rounds`
    pub rounds: Option<usize>,
    /// `[optimize] bounded_rewrites`
    pub bounded_rewrites: Option<bool>,
    /// `[runtime] prefix`
    pub runtime_prefix: Option<String>,
    /// `[native] triple`
    pub triple: Option<String>,
}

fn config_error(path: &Path, line: usize, message: String) -> Diagnostic {
    Diagnostic::error(
        format!("{}:{}: {}", path.display(), line, message),
        Span::dummy(),
    )
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl Project {
    /// Load project from a velox.toml file.
    pub fn load(toml_path: &Path) -> Result<Project, Diagnostic> {
        let content = std::fs::read_to_string(toml_path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read '{}': {}", toml_path.display(), e),
                Span::dummy(),
            )
        })?;
        let root_dir = toml_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Self::parse(&content, toml_path, root_dir)
    }

    fn parse(content: &str, toml_path: &Path, root_dir: PathBuf) -> Result<Project, Diagnostic> {
        let mut name = String::new();
        let mut entry = String::new();
        let mut rounds = None;
        let mut bounded_rewrites = None;
        let mut runtime_prefix = None;
        let mut triple = None;
        let mut current_section = String::new();

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(config_error(
                    toml_path,
                    line_no,
                    format!("expected `key = value`, found '{}'", trimmed),
                ));
            };
            let key = key.trim().trim_matches('"');
            let value = value.trim();
            let text = value.trim_matches('"');

            match (current_section.as_str(), key) {
                ("project", "name") => name = text.to_string(),
                ("project", "entry") => entry = text.to_string(),
                ("optimize", "rounds") => {
                    let n = value.parse::<usize>().map_err(|_| {
                        config_error(
                            toml_path,
                            line_no,
                            format!("'rounds' must be a non-negative integer, found '{}'", value),
                        )
                    })?;
                    rounds = Some(n);
                }
                ("optimize", "bounded_rewrites") => {
                    let b = parse_bool(value).ok_or_else(|| {
                        config_error(
                            toml_path,
                            line_no,
                            format!("'bounded_rewrites' must be true or false, found '{}'", value),
                        )
                    })?;
                    bounded_rewrites = Some(b);
                }
                ("runtime", "prefix") => runtime_prefix = Some(text.to_string()),
                ("native", "triple") => triple = Some(text.to_string()),
                _ => {}
            }
        }

        if name.is_empty() {
            return Err(Diagnostic::error(
                format!("missing 'name' in {}", PROJECT_FILE),
                Span::dummy(),
            ));
        }

        if entry.is_empty() {
            entry = "main.json".to_string();
        }

        Ok(Project {
            name,
            entry: root_dir.join(&entry),
            root_dir,
            rounds,
            bounded_rewrites,
            runtime_prefix,
            triple,
        })
    }

    /// Try to find a velox.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(PROJECT_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Defaults overlaid with the values this file sets.
    pub fn compile_options(&self) -> CompileOptions {
        let mut options = CompileOptions::default();
        if let Some(rounds) = self.rounds {
            options.rounds = rounds;
        }
        if let Some(bounded) = self.bounded_rewrites {
            options.bounded_rewrites = bounded;
        }
        if let Some(prefix) = &self.runtime_prefix {
            options.runtime_prefix = prefix.clone();
        }
        if let Some(triple) = &self.triple {
            options.triple = triple.clone();
        }
        options
    }
}
