//! Schema annotation engine.
//!
//! Renders YARD `@!parse` blocks describing each model's columns, relations and
//! scopes, and merges them into model sources (or one shared schema file)
//! without disturbing anything else in those files. Re-running is a no-op.
//!
//! # Example
//!
//! ```ignore
//! use schema_annotate::{Configuration, DelimiterBalance, Manifest, ModelRegistry, Orchestrator, ScopeRecorder};
//!
//! let mut registry = ModelRegistry::new();
//! let mut scopes = ScopeRecorder::new();
//! Manifest::load("tmp/schema_annotate.json".as_ref())?
//!     .register(&mut registry, &mut scopes, ".".as_ref(), &DelimiterBalance);
//!
//! let config = Configuration::default();
//! let changed = Orchestrator::new(&registry, &scopes, &config, ".").annotate()?;
//! ```

pub mod config;
pub mod errors;
pub mod manifest;
pub mod merge;
pub mod orchestrator;
pub mod registry;
pub mod relations;
pub mod render;
pub mod scope;
pub mod type_map;
pub mod types;

pub use config::{AnnotationPosition, Configuration};
pub use errors::{AnnotateError, AnnotateResult};
pub use manifest::Manifest;
pub use merge::{FileMerger, Markers, MergeOutcome};
pub use orchestrator::{Mode, Orchestrator};
pub use registry::ModelRegistry;
pub use relations::{RelationDescriber, RelationDoc};
pub use render::AnnotationRenderer;
pub use scope::{BalanceChecker, CallSite, DelimiterBalance, Scope, ScopeRecorder};
pub use type_map::DocType;
pub use types::{Attribute, Coder, ColumnType, Model, ModelId, Relation, RelationKind};
