use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::context::ContextWindow;
use crate::docx::changes::{ChangeFilter, ExtractOptions};
use crate::docx::structure::StructureOptions;
use crate::pipeline::ConvertOptions;
use crate::report::OutputFormat;
use crate::textutil::NEWLINE_PLACEHOLDER;

pub const CONFIG_FILENAME: &str = "docx-critic.toml";
pub const CONFIG_ENV: &str = "DOCX_CRITIC_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub extract: ExtractSection,
    #[serde(default)]
    pub output: OutputSection,
}

/// Per-side context window, in characters.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct ContextSection {
    #[serde(default)]
    pub min_len: Option<usize>,
    #[serde(default)]
    pub max_len: Option<usize>,
    #[serde(default)]
    pub step: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExtractSection {
    /// "all", "insertions" or "deletions".
    #[serde(default)]
    pub changes: Option<ChangeFilter>,
    #[serde(default)]
    pub comments: Option<bool>,
    /// Report highlighted runs as insertions by "(highlight)".
    #[serde(default)]
    pub highlights_as_insertions: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct OutputSection {
    /// "git" or "json".
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub newline_placeholder: Option<String>,
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub min_context: Option<usize>,
    pub max_context: Option<usize>,
    pub changes: Option<ChangeFilter>,
    pub no_comments: bool,
    pub highlights: bool,
    pub format: Option<OutputFormat>,
}

/// Everything an extraction run needs, after merging file and flags.
#[derive(Clone, Debug)]
pub struct Settings {
    pub convert: ConvertOptions,
    pub window: ContextWindow,
    pub format: OutputFormat,
    pub newline_placeholder: String,
}

impl AppConfig {
    pub fn resolve(&self, o: &Overrides) -> anyhow::Result<Settings> {
        let defaults = ContextWindow::default();
        let window = ContextWindow {
            min_len: o
                .min_context
                .or(self.context.min_len)
                .unwrap_or(defaults.min_len),
            max_len: o
                .max_context
                .or(self.context.max_len)
                .unwrap_or(defaults.max_len),
            step: self.context.step.unwrap_or(defaults.step),
        };
        if window.step == 0 {
            return Err(anyhow!("context step must be at least 1"));
        }
        if window.min_len > window.max_len {
            return Err(anyhow!(
                "context min ({}) exceeds max ({})",
                window.min_len,
                window.max_len
            ));
        }

        let highlights =
            o.highlights || self.extract.highlights_as_insertions.unwrap_or(false);
        let convert = ConvertOptions {
            extract: ExtractOptions {
                filter: o.changes.or(self.extract.changes).unwrap_or_default(),
                structure: StructureOptions {
                    highlights_as_insertions: highlights,
                },
            },
            comments: !o.no_comments && self.extract.comments.unwrap_or(true),
        };

        Ok(Settings {
            convert,
            window,
            format: o.format.or(self.output.format).unwrap_or_default(),
            newline_placeholder: self
                .output
                .newline_placeholder
                .clone()
                .unwrap_or_else(|| NEWLINE_PLACEHOLDER.to_string()),
        })
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 4) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text)
        .with_context(|| format!("parse config toml: {}", path.display()))?;
    Ok(cfg)
}

/// Explicit path, then `$DOCX_CRITIC_CONFIG`, then an upward search. No file at all means
/// built-in defaults; an explicitly named file that cannot be read is an error.
pub fn load_effective(explicit: Option<&Path>) -> anyhow::Result<(AppConfig, Option<PathBuf>)> {
    let named = explicit.map(Path::to_path_buf).or_else(|| {
        std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    });
    if let Some(path) = named {
        let cfg = load_config(&path)?;
        return Ok((cfg, Some(path)));
    }
    match find_default_config(CONFIG_FILENAME) {
        Some(path) => Ok((load_config(&path)?, Some(path))),
        None => Ok((AppConfig::default(), None)),
    }
}

pub const DEFAULT_CONFIG_TOML: &str = r#"# docx-critic configuration. Every key is optional; command-line flags win.

[context]
# Characters of context per side: start at min_len, grow by step until the
# snippet is unique in the document, never beyond max_len.
min_len = 15
max_len = 100
step = 10

[extract]
# "all", "insertions" or "deletions"
changes = "all"
comments = true
# Report highlighted text as insertions by "(highlight)".
highlights_as_insertions = false

[output]
# "git" or "json"
format = "git"
# Replaces line breaks inside single-line report fields.
newline_placeholder = "↵"
"#;

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Err(anyhow!(
            "config already exists: {} (use --force to overwrite)",
            cfg_path.display()
        ));
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}
