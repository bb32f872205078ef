//! Schema description types supplied by the host application.
//!
//! These replace live reflection over a running object model: the host
//! describes every model (table, ordered columns, ordered relations) and the
//! engine works only from these values.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Foreign key placeholder used when the column cannot be discovered.
pub const UNKNOWN_COLUMN: &str = "<unknown>";

/// Qualified type name identifying a model (e.g. `"Admin::UserRole"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ModelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A model mapped to one schema table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Qualified type name.
    pub name: ModelId,

    /// Name of the parent type (e.g. `ApplicationRecord`).
    pub parent: String,

    /// Table the model maps to.
    #[serde(default)]
    pub table: String,

    /// Abstract models are never annotated.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// Persisted columns in declaration order.
    #[serde(default)]
    pub attributes: Vec<Attribute>,

    /// Declared associations.
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Model {
    pub fn new(name: impl Into<String>, parent: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: ModelId::new(name),
            parent: parent.into(),
            table: table.into(),
            is_abstract: false,
            attributes: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            column_type,
        });
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn abstract_model(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Model file path relative to the model directory, e.g. `admin/user_role.rb`.
    pub fn expected_file(&self) -> String {
        format!("{}.rb", underscore(self.name.as_str()))
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// A persisted column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,

    #[serde(flatten)]
    pub column_type: ColumnType,
}

/// Raw column type tag plus an optional serialization coder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    /// Schema type tag such as `integer` or `datetime`. Absent for virtual attributes.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coder: Option<Coder>,
}

impl ColumnType {
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            coder: None,
        }
    }

    pub fn with_coder(mut self, coder: Coder) -> Self {
        self.coder = Some(coder);
        self
    }

    /// Tag as printed in stanzas; absent tags print as an empty string.
    pub fn raw_tag(&self) -> &str {
        self.tag.as_deref().unwrap_or_default()
    }
}

/// Custom serialization coder attached to a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Coder {
    /// Coder that declares the class it (de)serializes.
    Class { class_name: String },
    /// Generic structured-data coder.
    Json,
}

/// Relation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    Through,
    Polymorphic,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::BelongsTo => "belongs_to",
            RelationKind::HasOne => "has_one",
            RelationKind::HasMany => "has_many",
            RelationKind::Through => "through",
            RelationKind::Polymorphic => "polymorphic",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared association between two models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    /// Accessor name.
    pub name: String,

    pub kind: RelationKind,

    /// Target type name. Absent for polymorphic relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,

    /// Polymorphic interface this relation is the inverse of (`as: :imageable`).
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub as_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<Through>,
}

impl Relation {
    fn new(name: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            target: None,
            foreign_key: None,
            as_name: None,
            through: None,
        }
    }

    pub fn belongs_to(name: impl Into<String>, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            foreign_key: Some(foreign_key.into()),
            ..Self::new(name, RelationKind::BelongsTo)
        }
    }

    pub fn has_one(name: impl Into<String>, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            foreign_key: Some(foreign_key.into()),
            ..Self::new(name, RelationKind::HasOne)
        }
    }

    pub fn has_many(name: impl Into<String>, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            foreign_key: Some(foreign_key.into()),
            ..Self::new(name, RelationKind::HasMany)
        }
    }

    pub fn polymorphic(name: impl Into<String>) -> Self {
        Self::new(name, RelationKind::Polymorphic)
    }

    /// `through` relation resolved against `intermediate`, optionally with an explicit source.
    pub fn through(name: impl Into<String>, intermediate: impl Into<String>, source: Option<Relation>) -> Self {
        Self {
            through: Some(Through {
                intermediate: intermediate.into(),
                source: source.map(Box::new),
            }),
            ..Self::new(name, RelationKind::Through)
        }
    }

    /// Mark this relation as the inverse of the polymorphic interface `name`.
    pub fn inverse_of(mut self, name: impl Into<String>) -> Self {
        self.as_name = Some(name.into());
        self
    }

    pub fn foreign_key_or_unknown(&self) -> &str {
        self.foreign_key.as_deref().unwrap_or(UNKNOWN_COLUMN)
    }
}

/// Indirection of a `through` relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Through {
    /// Type the relation passes through.
    pub intermediate: String,

    /// Relation on the intermediate type. Resolved by accessor name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Box<Relation>>,
}

/// Convert a qualified type name to its file stem: `Admin::HTMLPage` -> `admin/html_page`.
pub fn underscore(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (index, segment) in name.split("::").enumerate() {
        if index > 0 {
            result.push('/');
        }
        let chars: Vec<char> = segment.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            if c.is_uppercase() {
                let prev = i.checked_sub(1).map(|p| chars[p]);
                let next = chars.get(i + 1).copied();
                let boundary = match prev {
                    Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                    Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                    _ => false,
                };
                if boundary {
                    result.push('_');
                }
                result.extend(c.to_lowercase());
            } else {
                result.push(c);
            }
        }
    }
    result
}
