pub mod settings;

use std::path::{Path, PathBuf};

use anyhow::Context;
use include_dir::{Dir, DirEntry, include_dir};

use crate::registry::Registry;
use crate::template::{EventTemplate, TemplateFile};
use settings::Settings;

static STDLIB: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Build search dirs in priority order:
/// 1. `.movehist/templates/` (repo-local, resolved from CWD)
/// 2. `{config_dir}/movehist/templates/` (user-level, platform-native)
/// 3. any extra dirs from settings
///
/// The embedded built-in set is appended by `discover_all_templates`.
pub fn default_search_dirs(settings: &Settings) -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(".movehist/templates"));
    }

    if let Some(config) = dirs::config_dir() {
        dirs.push(config.join("movehist/templates"));
    }

    dirs.extend(settings.extra_template_dirs.iter().cloned());
    dirs
}

/// Try to load a template file from `path`. Returns `Ok(Some(templates))` on
/// success, `Ok(None)` if the file does not exist, or `Err` for other I/O /
/// parse errors.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or contains invalid TOML.
pub fn try_load_template_file(path: &Path) -> anyhow::Result<Option<Vec<EventTemplate>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("failed to read template file: {}", path.display())));
        }
    };
    let templates = parse_template_file(&content, &path.display().to_string())
        .with_context(|| format!("failed to parse template file: {}", path.display()))?;
    Ok(Some(templates))
}

/// Parse a template document, stamping each entry with `<origin>#<index>`.
///
/// # Errors
///
/// Returns an error if `content` is not a valid template document.
pub fn parse_template_file(content: &str, origin: &str) -> anyhow::Result<Vec<EventTemplate>> {
    let file: TemplateFile = toml::from_str(content)?;
    Ok(file
        .template
        .into_iter()
        .enumerate()
        .map(|(i, t)| t.with_origin(format!("{origin}#{}", i + 1)))
        .collect())
}

/// Recursively find all `.toml` files under `dir`, sorted by relative path.
/// Skips hidden entries (names starting with `.`).
///
/// Silently returns an empty vec if the directory doesn't exist or can't be read.
pub fn discover_template_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_template_files(dir, &mut files);
    files.sort();
    files
}

fn collect_template_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        if path.is_dir() {
            collect_template_files(&path, files);
        } else if path.extension().is_some_and(|e| e == "toml") {
            files.push(path);
        }
    }
}

/// Load every template across `search_dirs`, then the embedded built-in set
/// (unless disabled), in registration order.
///
/// Order is (search dir priority, relative path, entry index), so repo-local
/// templates win specificity ties against user-level and built-in ones.
/// Invalid files are skipped; with `verbose` each skip is reported on stderr.
pub fn discover_all_templates(
    search_dirs: &[PathBuf],
    include_builtin: bool,
    verbose: bool,
) -> Vec<EventTemplate> {
    let mut all = Vec::new();

    for dir in search_dirs {
        for path in discover_template_files(dir) {
            match try_load_template_file(&path) {
                Ok(Some(templates)) => {
                    if verbose {
                        eprintln!(
                            "[movehist] loaded {} template(s) from {}",
                            templates.len(),
                            path.display()
                        );
                    }
                    all.extend(templates);
                }
                Ok(None) => {}
                Err(e) => {
                    if verbose {
                        eprintln!("[movehist] skipping {e:#}");
                    }
                }
            }
        }
    }

    if include_builtin {
        all.extend(builtin_templates(verbose));
    }

    all
}

/// Templates compiled into the binary, sorted by relative path.
pub fn builtin_templates(verbose: bool) -> Vec<EventTemplate> {
    let mut files: Vec<_> = STDLIB
        .find("**/*.toml")
        .map(|entries| {
            entries
                .filter_map(|entry| match entry {
                    DirEntry::File(file) => Some(file),
                    DirEntry::Dir(_) => None,
                })
                .collect()
        })
        .unwrap_or_default();
    files.sort_by(|a, b| a.path().cmp(b.path()));

    let mut all = Vec::new();
    for file in files {
        let origin = PathBuf::from("<built-in>").join(file.path());
        let content = file.contents_utf8().unwrap_or("");
        match parse_template_file(content, &origin.display().to_string()) {
            Ok(templates) => all.extend(templates),
            Err(e) => {
                if verbose {
                    eprintln!(
                        "[movehist] skipping invalid built-in {}: {e:#}",
                        origin.display()
                    );
                }
            }
        }
    }
    all
}

/// Discover templates per `settings` and register them in one go.
pub fn load_registry(settings: &Settings, verbose: bool) -> Registry {
    let search_dirs = default_search_dirs(settings);
    if verbose {
        for dir in &search_dirs {
            eprintln!("[movehist] search dir {}", dir.display());
        }
    }
    let mut registry = Registry::new();
    registry.register(discover_all_templates(
        &search_dirs,
        settings.include_builtin,
        verbose,
    ));
    if verbose && !registry.has_universal_fallback() {
        eprintln!(
            "[movehist] warning: no `* * *` template registered; unmatched records will fall back"
        );
    }
    registry
}
