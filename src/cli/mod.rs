pub mod build;
pub mod lower;
pub mod opt;
pub mod run;

use std::path::{Path, PathBuf};
use std::process;

use velox::config::project::{Project, PROJECT_FILE};
use velox::CompileOptions;

/// Resolved input: program tree file and optional project.
pub struct ResolvedInput {
    pub entry: PathBuf,
    pub project: Option<Project>,
}

fn load_project(toml_path: &Path) -> Project {
    match Project::load(toml_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e.message);
            process::exit(1);
        }
    }
}

/// Find the project governing a file, if any.
pub fn project_for(path: &Path) -> Option<Project> {
    Project::find(path.parent().unwrap_or(Path::new("."))).map(|p| load_project(&p))
}

/// Resolve an input path (tree file or project directory) to an entry and optional project.
pub fn resolve_input(input: &Path) -> ResolvedInput {
    if input.is_dir() {
        let toml_path = input.join(PROJECT_FILE);
        if !toml_path.exists() {
            eprintln!("error: no {} found in '{}'", PROJECT_FILE, input.display());
            process::exit(1);
        }
        let project = load_project(&toml_path);
        return ResolvedInput {
            entry: project.entry.clone(),
            project: Some(project),
        };
    }

    if !input.extension().is_some_and(|e| e == "json") {
        eprintln!("error: input must be a .json program tree or project directory");
        process::exit(1);
    }

    ResolvedInput {
        entry: input.to_path_buf(),
        project: project_for(input),
    }
}

/// Project settings overlaid with command-line overrides.
pub fn resolve_options(project: Option<&Project>, rounds: Option<usize>) -> CompileOptions {
    let mut options = project
        .map(Project::compile_options)
        .unwrap_or_default();
    if let Some(rounds) = rounds {
        options.rounds = rounds;
    }
    options
}

/// Read a text file, exiting on error.
pub fn read_or_exit(path: &Path) -> String {
    match velox::read_text(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: {}", e.message);
            process::exit(1);
        }
    }
}

/// Write a text file, exiting on error.
pub fn write_or_exit(path: &Path, text: &str) {
    if let Err(e) = velox::write_text(path, text) {
        eprintln!("error: {}", e.message);
        process::exit(1);
    }
}

/// Load a program tree, rendering parse errors against the file text.
pub fn load_program_or_exit(path: &Path) -> velox::ast::Program {
    let text = read_or_exit(path);
    match velox::parse_program_json(&text) {
        Ok(program) => program,
        Err(e) => {
            e.render(&path.to_string_lossy(), &text);
            process::exit(1);
        }
    }
}

/// Render register-IR parse warnings to stderr.
pub fn report_parse_warnings(path: &Path, text: &str) {
    let parsed = velox::ir::reg::parse::parse_program(text);
    velox::diagnostic::render_diagnostics(&parsed.diagnostics, &path.to_string_lossy(), text);
}

/// Output file stem of an input path.
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("program")
        .to_string()
}
