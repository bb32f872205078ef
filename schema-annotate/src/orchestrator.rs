use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Configuration;
use crate::errors::{AnnotateError, AnnotateResult};
use crate::merge::{FileMerger, Markers};
use crate::registry::ModelRegistry;
use crate::render::AnnotationRenderer;
use crate::scope::ScopeRecorder;
use crate::types::{Model, underscore};

/// What a run does to each model's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Annotate,
    Remove,
}

/// Drives one annotate/remove pass over every descendant of the root model.
pub struct Orchestrator<'a> {
    registry: &'a ModelRegistry,
    scopes: &'a ScopeRecorder,
    config: &'a Configuration,
    project_root: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        registry: &'a ModelRegistry,
        scopes: &'a ScopeRecorder,
        config: &'a Configuration,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            scopes,
            config,
            project_root: project_root.into(),
        }
    }

    /// Run `mode` and return the changed files, relative to the project root.
    ///
    /// A model whose file cannot be read or written is logged and skipped.
    pub fn run(&self, mode: Mode) -> AnnotateResult<Vec<PathBuf>> {
        let model_dir = self.project_root.join(&self.config.model_dir);
        if !model_dir.is_dir() {
            return Err(AnnotateError::MissingModelDir(model_dir));
        }
        let model_files = list_model_files(&model_dir);
        let renderer = AnnotationRenderer::new(self.registry, self.scopes, self.config.position);
        let merger = FileMerger::new(self.config.position);
        let mut changed: Vec<PathBuf> = Vec::new();
        let mut taken_keys: HashSet<String> = HashSet::new();

        let models = self.registry.descendants(&self.config.root_model);
        debug!(
            "{} model(s) descend from {}; {} file(s) under {}",
            models.len(),
            self.config.root_model,
            model_files.len(),
            model_dir.display()
        );

        for model in models {
            if model.is_abstract {
                debug!("skipping abstract model {}", model.name);
                continue;
            }

            let file = model.expected_file();
            if !model_files.contains(&file) {
                debug!("no model file {file} for {}", model.name);
                continue;
            }

            let relative = if self.config.schema_file_mode() {
                self.config.schema_file.clone()
            } else {
                self.config.model_dir.join(&file)
            };

            let markers = self.block_markers(&merger, model, &mut taken_keys);
            let block = match mode {
                Mode::Annotate => Some(renderer.render_with(model, &markers)),
                Mode::Remove => None,
            };

            match merger.apply_with(&self.project_root.join(&relative), model, &markers, block.as_deref()) {
                Ok(outcome) if outcome.written => {
                    info!("updated {} for {}", relative.display(), model.name);
                    if !changed.contains(&relative) {
                        changed.push(relative);
                    }
                }
                Ok(_) => {}
                Err(err) => warn!("skipping {}: {err}", model.name),
            }
        }

        Ok(changed)
    }

    /// Markers for `model`. In the shared schema file the table key belongs to the
    /// base model; a subclass on its parent's table, or any later model on a taken
    /// table, is keyed `<table>:<file stem>`.
    fn block_markers(&self, merger: &FileMerger, model: &Model, taken_keys: &mut HashSet<String>) -> Markers {
        let markers = merger.markers_for(model);
        let Some(key) = markers.key() else {
            return markers;
        };
        let inherits_table = self
            .registry
            .get(&model.parent)
            .is_some_and(|parent| parent.table == model.table);
        if !inherits_table && taken_keys.insert(key.to_string()) {
            return markers;
        }

        let fallback = format!("{key}:{}", underscore(model.name.as_str()));
        debug!("{} shares table `{key}`; keying its block as `{fallback}`", model.name);
        taken_keys.insert(fallback.clone());
        Markers::new(Some(&fallback))
    }

    pub fn annotate(&self) -> AnnotateResult<Vec<PathBuf>> {
        self.run(Mode::Annotate)
    }

    pub fn remove(&self) -> AnnotateResult<Vec<PathBuf>> {
        self.run(Mode::Remove)
    }
}

/// Model source files under `model_dir`, as `/`-separated relative paths.
fn list_model_files(model_dir: &Path) -> HashSet<String> {
    WalkDir::new(model_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "rb"))
        .filter_map(|e| {
            let relative = e.path().strip_prefix(model_dir).ok()?;
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(parts.join("/"))
        })
        .collect()
}
