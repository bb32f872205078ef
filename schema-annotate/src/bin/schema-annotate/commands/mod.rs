pub mod annotate;
pub mod remove;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Table};
use serde::Serialize;

use schema_annotate::{
    AnnotateError, AnnotationPosition, Configuration, DelimiterBalance, Manifest, Mode, ModelRegistry, Orchestrator,
    ScopeRecorder,
};

use crate::context::ProjectContext;
use crate::output::{GlobalOptions, OutputManager, TableDisplay};
use crate::theme::{table_color, ICONS, THEME};

/// Arguments shared by `annotate` and `remove`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Where blocks are placed (overrides .schema-annotate.toml)
    #[arg(long, value_parser = parse_position)]
    pub position: Option<AnnotationPosition>,

    /// Path to the schema manifest dumped by the host application
    #[arg(long, env = "SCHEMA_ANNOTATE_MANIFEST")]
    pub manifest: Option<PathBuf>,
}

fn parse_position(value: &str) -> Result<AnnotationPosition, AnnotateError> {
    value.parse()
}

/// Files touched by one run
#[derive(Debug, Serialize)]
pub struct ChangeReport {
    pub mode: &'static str,
    pub position: AnnotationPosition,
    pub changed: Vec<PathBuf>,
}

impl ChangeReport {
    fn marker(&self) -> (&'static str, colored::Color) {
        if self.mode == "remove" {
            (ICONS.stripped, THEME.stripped)
        } else {
            (ICONS.annotated, THEME.annotated)
        }
    }
}

impl TableDisplay for ChangeReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = OutputManager::themed_table(options, &["", "File"]);
        let (icon, color) = self.marker();
        for path in &self.changed {
            let cell = Cell::new(icon);
            let cell = if options.no_color { cell } else { cell.fg(table_color(color)) };
            table.add_row(vec![cell, Cell::new(path.display())]);
        }
        table
    }

    fn to_compact(&self) -> String {
        let files: Vec<String> = self.changed.iter().map(|p| p.display().to_string()).collect();
        format!("{} {}: {}", self.mode, self.changed.len(), files.join(","))
    }
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Annotate => "annotate",
        Mode::Remove => "remove",
    }
}

/// Load the manifest into a fresh registry and scope recorder.
fn load_models(manifest_path: &Path, project_root: &Path, output: &OutputManager) -> Result<(ModelRegistry, ScopeRecorder)> {
    let manifest = Manifest::load(manifest_path)
        .with_context(|| format!("Failed to load schema manifest {}", manifest_path.display()))?;

    for skipped in &manifest.skipped {
        output.warning(&format!("Skipping model {}: {}", skipped.name, skipped.reason));
    }

    let mut registry = ModelRegistry::new();
    let mut scopes = ScopeRecorder::new();
    manifest.register(&mut registry, &mut scopes, project_root, &DelimiterBalance);
    output.verbose(&format!(
        "Loaded {} model(s) and {} scope(s) from {}",
        registry.len(),
        scopes.len(),
        manifest_path.display()
    ));

    Ok((registry, scopes))
}

/// Shared body of `annotate` and `remove`.
pub fn run(mode: Mode, args: RunArgs, output: &OutputManager) -> Result<()> {
    let ctx = ProjectContext::find()?;
    execute_in(&ctx, mode, args, output)
}

fn execute_in(ctx: &ProjectContext, mode: Mode, args: RunArgs, output: &OutputManager) -> Result<()> {
    let mut config: Configuration = ctx.config.annotate.engine.clone();
    if let Some(position) = args.position {
        config = config.with_position(position);
    }
    let manifest_path = ctx.manifest_path(args.manifest.as_deref());
    output.verbose(&format!("Project root: {}", ctx.project_root.display()));
    if ctx.config_path.exists() {
        output.verbose(&format!("Using {}", ctx.config_path.display()));
    }

    let (registry, scopes) = load_models(&manifest_path, &ctx.project_root, output)?;

    output.progress(match mode {
        Mode::Annotate => "Annotating models",
        Mode::Remove => "Removing annotations",
    });
    let result = Orchestrator::new(&registry, &scopes, &config, &ctx.project_root).run(mode);
    output.clear_line();
    let changed = match result {
        Ok(changed) => changed,
        Err(AnnotateError::MissingModelDir(dir)) => {
            output.error(&format!("Model directory {} does not exist.", dir.display()));
            output.info("Set `model_dir` under [annotate] in .schema-annotate.toml.");
            anyhow::bail!("Model directory not found");
        }
        Err(err) => return Err(err).context("Annotation run failed"),
    };

    if changed.is_empty() {
        output.info("Nothing to change");
    } else {
        output.success(&format!("{} file(s) changed", changed.len()));
    }

    output.display(&ChangeReport {
        mode: mode_name(mode),
        position: config.position,
        changed,
    })
}
