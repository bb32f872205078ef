use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use schema_annotate::Configuration;

/// Name of the optional per-project config file
pub const CONFIG_FILE: &str = ".schema-annotate.toml";

/// Files that mark a project root
const ROOT_MARKERS: &[&str] = &["Gemfile", CONFIG_FILE];

/// Project context for annotate/remove runs
pub struct ProjectContext {
    /// Root directory of the project (where the Gemfile is)
    pub project_root: PathBuf,
    /// Path to the config file (may not exist)
    pub config_path: PathBuf,
    /// Loaded configuration, defaults when the file is absent
    pub config: ProjectConfig,
}

/// Configuration stored in .schema-annotate.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub annotate: AnnotateSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateSettings {
    #[serde(flatten)]
    pub engine: Configuration,

    /// Schema manifest dumped by the host application
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

impl Default for AnnotateSettings {
    fn default() -> Self {
        Self {
            engine: Configuration::default(),
            manifest: default_manifest(),
        }
    }
}

fn default_manifest() -> PathBuf {
    PathBuf::from("tmp/schema_annotate.json")
}

impl ProjectContext {
    /// Find and load project context from current directory or ancestors
    pub fn find() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::find_from(&current_dir)
    }

    /// Find project context starting from the given directory
    pub fn find_from(start: &Path) -> Result<Self> {
        let project_root = Self::find_project_root(start)?;
        Self::from_root(project_root)
    }

    /// Create context from a known project root
    pub fn from_root(project_root: PathBuf) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE);

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {CONFIG_FILE}"))?;
            toml::from_str::<ProjectConfig>(&content)
                .with_context(|| format!("Failed to parse {CONFIG_FILE}"))?
        } else {
            ProjectConfig::default()
        };

        Ok(Self {
            project_root,
            config_path,
            config,
        })
    }

    fn find_project_root(start: &Path) -> Result<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if ROOT_MARKERS.iter().any(|marker| current.join(marker).exists()) {
                return Ok(current);
            }

            if !current.pop() {
                anyhow::bail!(
                    "Could not find a Gemfile or {CONFIG_FILE} in {start:?} or any parent directory. \
                     Are you in a Rails project?"
                );
            }
        }
    }

    /// Manifest path, resolved against the project root unless absolute
    pub fn manifest_path(&self, manifest: Option<&Path>) -> PathBuf {
        let manifest = manifest.unwrap_or(&self.config.annotate.manifest);
        if manifest.is_absolute() {
            manifest.to_path_buf()
        } else {
            self.project_root.join(manifest)
        }
    }
}
