//! Documentation types and descriptions for declared relations.
//!
//! Polymorphic and `through` relations need the whole model set: the former
//! looks for inverse declarations on every model, the latter resolves its
//! source relation on the intermediate model.

use log::debug;

use crate::registry::ModelRegistry;
use crate::type_map::DocType;
use crate::types::{Model, Relation, RelationKind, UNKNOWN_COLUMN};

/// Nested `through` chains longer than this are treated as unresolvable.
const MAX_THROUGH_DEPTH: usize = 8;

/// Rendered facts about one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDoc {
    pub doc_type: DocType,
    pub description: String,
}

pub struct RelationDescriber<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> RelationDescriber<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn describe(&self, model: &Model, relation: &Relation) -> RelationDoc {
        match relation.kind {
            RelationKind::Polymorphic => self.polymorphic(model, relation),
            RelationKind::Through => self.through(model, relation),
            RelationKind::BelongsTo => {
                let target = self.resolve(relation.target.as_deref());
                let column = format!("{}.{}", model.table, relation.foreign_key_or_unknown());
                direct(relation.kind, target_type(target), &column)
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                let target = self.resolve(relation.target.as_deref());
                let table = target.map_or(UNKNOWN_COLUMN, |t| t.table.as_str());
                let column = format!("{table}.{}", relation.foreign_key_or_unknown());
                let doc_type = if relation.kind == RelationKind::HasMany {
                    DocType::collection_of(target_type(target))
                } else {
                    target_type(target)
                };
                direct(relation.kind, doc_type, &column)
            }
        }
    }

    fn resolve(&self, target: Option<&str>) -> Option<&'a Model> {
        let name = target?;
        let model = self.registry.get(name);
        if model.is_none() {
            debug!("relation target `{name}` is not a known model");
        }
        model
    }

    fn polymorphic(&self, model: &Model, relation: &Relation) -> RelationDoc {
        // Drops the final character of the plural table name ("images" -> "image").
        let mut singular = model.table.clone();
        singular.pop();

        let matches: Vec<String> = self
            .registry
            .sorted()
            .into_iter()
            .filter(|candidate| {
                candidate
                    .relations
                    .iter()
                    .any(|r| r.as_name.as_deref() == Some(relation.name.as_str()) && r.name == singular)
            })
            .map(|candidate| candidate.name.to_string())
            .collect();

        let doc_type = if matches.is_empty() {
            debug!("no inverse found for polymorphic `{}.{}`", model.name, relation.name);
            DocType::Object
        } else {
            DocType::Union(matches)
        };

        let foreign_key = relation
            .foreign_key
            .clone()
            .unwrap_or_else(|| format!("{}_id", relation.name));

        RelationDoc {
            description: format!(
                "Polymorphic relation. Database columns `{table}.{foreign_key}` and `{table}.{}_type`.",
                relation.name,
                table = model.table
            ),
            doc_type,
        }
    }

    fn through(&self, model: &Model, relation: &Relation) -> RelationDoc {
        let intermediate = relation
            .through
            .as_ref()
            .map_or(UNKNOWN_COLUMN, |t| t.intermediate.as_str());

        let (kind, doc_type) = match self.through_target(model, relation, 0) {
            Some((target, true)) => (
                RelationKind::HasMany,
                DocType::collection_of(target_type(self.resolve(target.as_deref()))),
            ),
            Some((target, false)) => (RelationKind::HasOne, target_type(self.resolve(target.as_deref()))),
            None => {
                debug!("unable to resolve `{}.{}` through `{intermediate}`", model.name, relation.name);
                (RelationKind::HasOne, DocType::Object)
            }
        };

        let target_name = match &doc_type {
            DocType::Collection(inner) => inner.clone(),
            other => other.to_string(),
        };

        RelationDoc {
            description: format!("`{kind}` relation with `{target_name}` through `{intermediate}`."),
            doc_type,
        }
    }

    /// Final target type name of a `through` relation and whether it yields a collection.
    fn through_target(&self, owner: &Model, relation: &Relation, depth: usize) -> Option<(Option<String>, bool)> {
        if depth >= MAX_THROUGH_DEPTH {
            return None;
        }

        let through = relation.through.as_ref()?;
        let intermediate = self.registry.get(&through.intermediate);
        let source = match through.source.as_deref() {
            Some(source) => source,
            None => find_source(intermediate?, &relation.name)?,
        };

        let via_many = owner
            .relations
            .iter()
            .any(|r| r.kind == RelationKind::HasMany && r.target.as_deref() == Some(through.intermediate.as_str()));

        match source.kind {
            RelationKind::Through => {
                let (target, many) = self.through_target(intermediate?, source, depth + 1)?;
                Some((target, many || via_many))
            }
            RelationKind::Polymorphic => Some((None, via_many)),
            kind => Some((source.target.clone(), kind == RelationKind::HasMany || via_many)),
        }
    }
}

/// Source relation on the intermediate model: same accessor, or its singular form.
fn find_source<'m>(intermediate: &'m Model, name: &str) -> Option<&'m Relation> {
    intermediate.relation(name).or_else(|| {
        let mut singular = name.to_string();
        singular.pop();
        intermediate.relation(&singular)
    })
}

fn target_type(target: Option<&Model>) -> DocType {
    target.map_or(DocType::Object, |t| DocType::Class(t.name.to_string()))
}

fn direct(kind: RelationKind, doc_type: DocType, column: &str) -> RelationDoc {
    let target_name = match &doc_type {
        DocType::Collection(inner) => inner.clone(),
        other => other.to_string(),
    };
    RelationDoc {
        description: format!("`{kind}` relation with `{target_name}`. Database column `{column}`."),
        doc_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    fn library() -> ModelRegistry {
        [
            Model::new("Author", "ApplicationRecord", "authors")
                .with_attribute("id", ColumnType::tagged("integer"))
                .with_relation(Relation::has_many("books", "Book", "author_id"))
                .with_relation(Relation::has_one("image", "Image", "imageable_id").inverse_of("imageable")),
            Model::new("Book", "ApplicationRecord", "books")
                .with_relation(Relation::belongs_to("author", "Author", "author_id"))
                .with_relation(Relation::belongs_to("publisher", "Publisher", "publisher_id"))
                .with_relation(Relation::has_one("image", "Image", "imageable_id").inverse_of("imageable")),
            Model::new("Essay", "ApplicationRecord", "essays")
                .with_relation(Relation::belongs_to("author", "Author", "author_id"))
                .with_relation(Relation::through("image", "Author", None)),
            Model::new("Image", "ApplicationRecord", "images").with_relation(Relation::polymorphic("imageable")),
            Model::new("Publisher", "ApplicationRecord", "publishers")
                .with_relation(Relation::has_many("books", "Book", "publisher_id"))
                .with_relation(Relation::through("authors", "Book", None)),
        ]
        .into_iter()
        .collect()
    }

    fn describe(registry: &ModelRegistry, model: &str, relation: &str) -> RelationDoc {
        let model = registry.get(model).unwrap();
        let relation = model.relation(relation).unwrap();
        RelationDescriber::new(registry).describe(model, relation)
    }

    #[test]
    fn test_belongs_to_cites_owner_table() {
        let registry = library();
        let doc = describe(&registry, "Book", "author");
        assert_eq!(doc.doc_type.to_string(), "Author");
        assert_eq!(
            doc.description,
            "`belongs_to` relation with `Author`. Database column `books.author_id`."
        );
    }

    #[test]
    fn test_has_many_cites_target_table() {
        let registry = library();
        let doc = describe(&registry, "Author", "books");
        assert_eq!(doc.doc_type.to_string(), "Array<Book>");
        assert_eq!(
            doc.description,
            "`has_many` relation with `Book`. Database column `books.author_id`."
        );
    }

    #[test]
    fn test_has_one_cites_target_table() {
        let registry = library();
        let doc = describe(&registry, "Author", "image");
        assert_eq!(doc.doc_type.to_string(), "Image");
        assert_eq!(
            doc.description,
            "`has_one` relation with `Image`. Database column `images.imageable_id`."
        );
    }

    #[test]
    fn test_polymorphic_unions_inverse_declarations() {
        let registry = library();
        let doc = describe(&registry, "Image", "imageable");
        assert_eq!(doc.doc_type.to_string(), "Author, Book");
        assert_eq!(
            doc.description,
            "Polymorphic relation. Database columns `images.imageable_id` and `images.imageable_type`."
        );
    }

    #[test]
    fn test_polymorphic_without_inverse_falls_back() {
        let registry: ModelRegistry = [Model::new("Image", "ApplicationRecord", "images")
            .with_relation(Relation::polymorphic("imageable"))]
        .into_iter()
        .collect();
        assert_eq!(describe(&registry, "Image", "imageable").doc_type, DocType::Object);
    }

    #[test]
    fn test_has_one_through_never_cites_a_column() {
        let registry = library();
        let doc = describe(&registry, "Essay", "image");
        assert_eq!(doc.doc_type.to_string(), "Image");
        assert_eq!(doc.description, "`has_one` relation with `Image` through `Author`.");
    }

    #[test]
    fn test_has_many_through_collection_owner() {
        let registry = library();
        let doc = describe(&registry, "Publisher", "authors");
        assert_eq!(doc.doc_type.to_string(), "Array<Author>");
        assert_eq!(doc.description, "`has_many` relation with `Author` through `Book`.");
    }

    #[test]
    fn test_explicit_through_source() {
        let registry = library();
        let model = Model::new("Shelf", "ApplicationRecord", "shelves").with_relation(Relation::through(
            "covers",
            "Book",
            Some(Relation::has_many("covers", "Image", "imageable_id")),
        ));
        let doc = RelationDescriber::new(&registry).describe(&model, &model.relations[0]);
        assert_eq!(doc.doc_type.to_string(), "Array<Image>");
    }

    #[test]
    fn test_dangling_target_falls_back() {
        let registry = library();
        let model = Model::new("Review", "ApplicationRecord", "reviews")
            .with_relation(Relation::has_many("critics", "Critic", "review_id"))
            .with_relation(Relation::belongs_to("magazine", "Magazine", "magazine_id"));

        let describer = RelationDescriber::new(&registry);
        let critics = describer.describe(&model, &model.relations[0]);
        assert_eq!(critics.doc_type.to_string(), "Array<Object>");
        assert_eq!(
            critics.description,
            "`has_many` relation with `Object`. Database column `<unknown>.review_id`."
        );

        let magazine = describer.describe(&model, &model.relations[1]);
        assert_eq!(magazine.doc_type, DocType::Object);
        assert!(magazine.description.ends_with("`reviews.magazine_id`."));
    }

    #[test]
    fn test_unresolvable_through_falls_back() {
        let registry = library();
        let model = Model::new("Review", "ApplicationRecord", "reviews")
            .with_relation(Relation::through("owners", "Nowhere", None));
        let doc = RelationDescriber::new(&registry).describe(&model, &model.relations[0]);
        assert_eq!(doc.doc_type, DocType::Object);
        assert_eq!(doc.description, "`has_one` relation with `Object` through `Nowhere`.");
    }
}
