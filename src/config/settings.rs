use std::path::{Path, PathBuf};

pub const DEFAULT_FALLBACK_LABEL: &str = "Unrecognized event";

/// Runtime settings merged from config files and environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Title shown for records no template resolves.
    pub fallback_label: String,
    /// Whether the embedded built-in templates are registered.
    pub include_builtin: bool,
    /// Extra template dirs searched after the user-level dir.
    pub extra_template_dirs: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fallback_label: DEFAULT_FALLBACK_LABEL.to_string(),
            include_builtin: true,
            extra_template_dirs: Vec::new(),
        }
    }
}

/// Private: parsed representation of a movehist config file.
#[derive(serde::Deserialize, Default)]
struct ConfigFile {
    display: Option<DisplaySection>,
    templates: Option<TemplatesSection>,
}

#[derive(serde::Deserialize)]
struct DisplaySection {
    fallback_label: Option<String>,
}

#[derive(serde::Deserialize)]
struct TemplatesSection {
    builtin: Option<bool>,
    #[serde(default)]
    dirs: Vec<PathBuf>,
}

/// Read a config file. Returns `None` on any error.
fn read_config(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge the config file at `path` into `settings`, if it can be read.
/// Relative template dirs are resolved against the file's own directory.
fn apply_config(settings: &mut Settings, path: &Path) {
    if let Some(file) = read_config(path) {
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        apply_file(settings, file, base);
    }
}

fn apply_file(settings: &mut Settings, file: ConfigFile, base: &Path) {
    if let Some(label) = file.display.and_then(|d| d.fallback_label) {
        settings.fallback_label = label;
    }
    if let Some(templates) = file.templates {
        if let Some(builtin) = templates.builtin {
            settings.include_builtin = builtin;
        }
        settings
            .extra_template_dirs
            .extend(templates.dirs.into_iter().map(|dir| base.join(dir)));
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

impl Settings {
    /// Load settings using auto-detected paths. Priority (highest first):
    /// 1. environment (`MOVEHIST_FALLBACK_LABEL`, `MOVEHIST_NO_BUILTIN`)
    /// 2. `{project_root}/.movehist/config.toml`
    /// 3. `{config_dir}/movehist/config.toml`
    /// 4. defaults
    pub fn load(project_root: Option<&Path>) -> Self {
        let global = dirs::config_dir().map(|d| d.join("movehist").join("config.toml"));
        Self::load_from(project_root, global.as_deref())
    }

    /// Load settings from explicit paths. Useful for testing.
    pub fn load_from(project_root: Option<&Path>, global_config: Option<&Path>) -> Self {
        let mut settings = Self::default();

        if let Some(path) = global_config {
            apply_config(&mut settings, path);
        }
        if let Some(root) = project_root {
            apply_config(&mut settings, &root.join(".movehist").join("config.toml"));
        }

        if let Ok(label) = std::env::var("MOVEHIST_FALLBACK_LABEL")
            && !label.trim().is_empty()
        {
            settings.fallback_label = label;
        }
        if env_flag("MOVEHIST_NO_BUILTIN") == Some(true) {
            settings.include_builtin = false;
        }

        settings
    }
}

/// Walk up from `dir` to find the nearest ancestor containing `.git` or `.movehist/`.
/// Falls back to `dir` itself if neither is found.
pub fn project_root_for(dir: &Path) -> PathBuf {
    let mut current = dir.to_path_buf();
    loop {
        if current.join(".git").exists() || current.join(".movehist").is_dir() {
            return current;
        }
        if !current.pop() {
            break;
        }
    }
    dir.to_path_buf()
}
