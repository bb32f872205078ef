//! Column type tag to documentation type mapping.

use std::fmt;

use crate::types::{Coder, ColumnType};

/// Documentation-facing type synthesized for an attribute or relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocType {
    Float,
    BigDecimal,
    Integer,
    Time,
    Date,
    String,
    Boolean,
    Hash,
    /// Generic fallback.
    Object,
    /// A named class (relation target, coder class).
    Class(String),
    /// Ordered collection of a named class.
    Collection(String),
    /// Any of several classes, in discovery order.
    Union(Vec<String>),
}

impl DocType {
    /// Wrap as `Array<inner>`. Collections and unions are returned unchanged.
    pub fn collection_of(inner: DocType) -> Self {
        match inner {
            DocType::Collection(_) | DocType::Union(_) => inner,
            other => DocType::Collection(other.to_string()),
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocType::Float => f.write_str("Float"),
            DocType::BigDecimal => f.write_str("BigDecimal"),
            DocType::Integer => f.write_str("Integer"),
            DocType::Time => f.write_str("Time"),
            DocType::Date => f.write_str("Date"),
            DocType::String => f.write_str("String"),
            DocType::Boolean => f.write_str("Boolean"),
            DocType::Hash => f.write_str("Hash"),
            DocType::Object => f.write_str("Object"),
            DocType::Class(name) => f.write_str(name),
            DocType::Collection(name) => write!(f, "Array<{name}>"),
            DocType::Union(names) => f.write_str(&names.join(", ")),
        }
    }
}

/// Map a raw schema tag to its documentation type. Unknown or absent tags map to `Object`.
pub fn map_tag(tag: Option<&str>) -> DocType {
    match tag {
        Some("float") => DocType::Float,
        Some("integer") => DocType::Integer,
        Some("decimal") => DocType::BigDecimal,
        Some("datetime" | "timestamp" | "time") => DocType::Time,
        Some("json" | "jsonb") => DocType::Hash,
        Some("date") => DocType::Date,
        Some("text" | "string" | "binary" | "inet" | "uuid") => DocType::String,
        Some("boolean") => DocType::Boolean,
        _ => DocType::Object,
    }
}

/// Map a column type, preferring a serialization coder's declared class over the tag.
pub fn map_column(column_type: &ColumnType) -> DocType {
    match &column_type.coder {
        Some(Coder::Class { class_name }) => DocType::Class(class_name.clone()),
        Some(Coder::Json) => DocType::Hash,
        None => map_tag(column_type.tag.as_deref()),
    }
}
