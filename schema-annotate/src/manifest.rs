//! Host-supplied schema manifest.
//!
//! The host application dumps its models (table, ordered columns, relations
//! and scope call sites) to JSON; this module loads that description into a
//! [`ModelRegistry`] and a [`ScopeRecorder`].

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{AnnotateError, AnnotateResult};
use crate::registry::ModelRegistry;
use crate::scope::{BalanceChecker, CallSite, Scope, ScopeRecorder};
use crate::types::Model;

/// One model entry of the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestModel {
    #[serde(flatten)]
    pub model: Model,

    #[serde(default)]
    pub scopes: Vec<ScopeDeclaration>,
}

/// A scope as declared by the host: literal text, or a call site to extract it from.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeDeclaration {
    pub name: String,

    #[serde(default)]
    pub parameters: Vec<String>,

    /// Declaring file, relative to the project root.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// 1-based declaration line within `file`.
    #[serde(default)]
    pub line: Option<usize>,

    /// Literal source, when the host already captured it.
    #[serde(default)]
    pub definition: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    models: Vec<Value>,
}

/// A model entry that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedModel {
    pub name: String,
    pub reason: String,
}

/// Parsed manifest. Entries are decoded one by one so a bad model is skipped, not fatal.
#[derive(Debug)]
pub struct Manifest {
    pub models: Vec<ManifestModel>,
    pub skipped: Vec<SkippedModel>,
}

impl Manifest {
    pub fn load(path: &Path) -> AnnotateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| AnnotateError::io(path, err))?;
        Self::parse(&content).map_err(|source| AnnotateError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawManifest = serde_json::from_str(json)?;
        let mut models = Vec::with_capacity(raw.models.len());
        let mut skipped = Vec::new();

        for (index, entry) in raw.models.into_iter().enumerate() {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .map_or_else(|| format!("#{index}"), str::to_string);

            match serde_json::from_value::<ManifestModel>(entry) {
                Ok(model) if model.model.name.as_str().is_empty() => skipped.push(SkippedModel {
                    name,
                    reason: "model name is empty".to_string(),
                }),
                Ok(model) => models.push(model),
                Err(err) => {
                    warn!("skipping model {name}: {err}");
                    skipped.push(SkippedModel {
                        name,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(Self { models, skipped })
    }

    /// Register every model and its scopes. Scope call sites resolve against `project_root`.
    pub fn register(
        self,
        registry: &mut ModelRegistry,
        scopes: &mut ScopeRecorder,
        project_root: &Path,
        checker: &dyn BalanceChecker,
    ) {
        for ManifestModel { model, scopes: declared } in self.models {
            let id = model.name.clone();
            if !registry.register(model) {
                continue;
            }

            for declaration in declared {
                match (declaration.definition, declaration.file, declaration.line) {
                    (Some(definition), _, _) => {
                        scopes.record(Scope::new(declaration.name, id.clone(), declaration.parameters, definition));
                    }
                    (None, Some(file), Some(line)) => {
                        let site = CallSite {
                            path: project_root.join(file),
                            line,
                        };
                        scopes.intercept(&declaration.name, id.clone(), declaration.parameters, &site, checker);
                    }
                    (None, _, _) => {
                        debug!("scope `{}` on {id} has no call site", declaration.name);
                        scopes.record(Scope::new(declaration.name, id.clone(), declaration.parameters, ""));
                    }
                }
            }
        }
    }
}
