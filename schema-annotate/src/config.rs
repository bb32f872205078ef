use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AnnotateError;

/// Where annotation blocks are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnnotationPosition {
    /// Prepended to each model file, below any magic comments.
    Top,
    /// Appended to each model file.
    Bottom,
    /// Diverted to one shared schema file, one keyed block per model.
    #[default]
    SchemaFile,
}

impl AnnotationPosition {
    pub const VALUES: &'static [&'static str] = &["top", "bottom", "schema_file"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationPosition::Top => "top",
            AnnotationPosition::Bottom => "bottom",
            AnnotationPosition::SchemaFile => "schema_file",
        }
    }
}

impl fmt::Display for AnnotationPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnotationPosition {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(AnnotationPosition::Top),
            "bottom" => Ok(AnnotationPosition::Bottom),
            "schema_file" => Ok(AnnotationPosition::SchemaFile),
            other => Err(AnnotateError::InvalidPosition {
                got: other.to_string(),
                expected: Self::VALUES,
            }),
        }
    }
}

impl TryFrom<String> for AnnotationPosition {
    type Error = AnnotateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnnotationPosition> for String {
    fn from(position: AnnotationPosition) -> Self {
        position.as_str().to_string()
    }
}

/// Run-wide settings. Built once before a run and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub position: AnnotationPosition,

    /// Model source directory, relative to the project root.
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Shared schema file used when `position = "schema_file"`, relative to the project root.
    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,

    /// Root type whose descendants are annotated.
    #[serde(default = "default_root_model")]
    pub root_model: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            position: AnnotationPosition::default(),
            model_dir: default_model_dir(),
            schema_file: default_schema_file(),
            root_model: default_root_model(),
        }
    }
}

impl Configuration {
    pub fn with_position(mut self, position: AnnotationPosition) -> Self {
        self.position = position;
        self
    }

    pub fn schema_file_mode(&self) -> bool {
        self.position == AnnotationPosition::SchemaFile
    }
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("app/models")
}

fn default_schema_file() -> PathBuf {
    PathBuf::from("config/annotate_solargraph_schema.rb")
}

fn default_root_model() -> String {
    "ApplicationRecord".to_string()
}
