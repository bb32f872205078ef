//! Composes one delimited annotation block per model.

use std::fmt::Write;

use crate::config::AnnotationPosition;
use crate::merge::{FileMerger, Markers};
use crate::registry::ModelRegistry;
use crate::relations::RelationDescriber;
use crate::scope::ScopeRecorder;
use crate::type_map::{DocType, map_column};
use crate::types::Model;

/// Renders the `@!parse` block for a model. Output is byte-stable for unchanged inputs.
pub struct AnnotationRenderer<'a> {
    registry: &'a ModelRegistry,
    scopes: &'a ScopeRecorder,
    merger: FileMerger,
}

impl<'a> AnnotationRenderer<'a> {
    pub fn new(registry: &'a ModelRegistry, scopes: &'a ScopeRecorder, position: AnnotationPosition) -> Self {
        Self {
            registry,
            scopes,
            merger: FileMerger::new(position),
        }
    }

    pub fn render(&self, model: &Model) -> String {
        self.render_with(model, &self.merger.markers_for(model))
    }

    /// Render between explicit markers, for models that cannot use their table key.
    pub fn render_with(&self, model: &Model, markers: &Markers) -> String {
        let mut block = String::new();

        let _ = writeln!(block, "{}", markers.start());
        block.push_str("# @!parse\n");
        let _ = writeln!(block, "#   class {} < {}", model.name, model.parent);

        for scope in self.scopes.scopes_for(model.name.as_str()) {
            block.push_str(&scope.documentation());
        }

        let describer = RelationDescriber::new(self.registry);
        let mut relations: Vec<_> = model.relations.iter().collect();
        relations.sort_by(|a, b| a.name.cmp(&b.name));
        for relation in relations {
            let doc = describer.describe(model, relation);
            write_stanza(&mut block, &relation.name, &doc.description, &doc.doc_type);
        }

        for attribute in &model.attributes {
            let description = format!(
                "Database column `{}.{}`, type: `{}`.",
                model.table,
                attribute.name,
                attribute.column_type.raw_tag()
            );
            write_stanza(&mut block, &attribute.name, &description, &map_column(&attribute.column_type));
        }

        block.push_str("#   end\n");
        let _ = writeln!(block, "# {}", markers.end());
        block
    }
}

/// Paired setter/getter stanza.
fn write_stanza(block: &mut String, name: &str, description: &str, doc_type: &DocType) {
    let _ = writeln!(block, "#     # {description}");
    let _ = writeln!(block, "#     # @param val [{doc_type}, nil]");
    let _ = writeln!(block, "#     def {name}=(val); end");
    let _ = writeln!(block, "#     # {description}");
    let _ = writeln!(block, "#     # @return [{doc_type}, nil]");
    let _ = writeln!(block, "#     def {name}; end");
}
