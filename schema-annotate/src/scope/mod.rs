//! Declared scopes and the recorder that collects them per model.

mod extract;

use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, warn};

use crate::types::ModelId;

pub use extract::{
    BalanceChecker, DelimiterBalance, Extraction, MAX_SCOPE_LINES, extract_definition, extract_from_source,
};

/// A named, parameterized query helper declared on a model. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    name: String,
    model: ModelId,
    parameters: Vec<String>,
    definition: String,
}

impl Scope {
    pub fn new(name: impl Into<String>, model: ModelId, parameters: Vec<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model,
            parameters,
            definition: definition.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &ModelId {
        &self.model
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Synthesized call signature, e.g. `def self.since(ago); end`.
    pub fn signature(&self) -> String {
        format!("def self.{}({}); end", self.name, self.parameters.join(", "))
    }

    /// Documentation stanza for this scope, each line comment-prefixed.
    pub fn documentation(&self) -> String {
        let mut doc = format!("#     # Scope `:{}`.\n#     #\n", self.name);
        for line in self.definition.lines() {
            doc.push_str("#     #     ");
            doc.push_str(line);
            doc.push('\n');
        }
        doc.push_str("#     #\n");
        doc.push_str(&format!("#     # @return [Array<{}>, nil]\n", self.model));
        doc.push_str(&format!("#     {}\n", self.signature()));
        doc
    }
}

/// Where a scope was declared: file and 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub path: PathBuf,
    pub line: usize,
}

/// Registry of declared scopes, keyed by owning model and kept sorted by name.
///
/// Lookups are always model-scoped, so entries left over from earlier loads
/// never leak into another model's annotation.
#[derive(Debug, Default)]
pub struct ScopeRecorder {
    scopes: HashMap<ModelId, Vec<Scope>>,
}

impl ScopeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope. A later declaration with the same name replaces the earlier one.
    pub fn record(&mut self, scope: Scope) {
        let scopes = self.scopes.entry(scope.model.clone()).or_default();
        match scopes.binary_search_by(|s| s.name.as_str().cmp(scope.name())) {
            Ok(existing) => {
                debug!("scope `{}` on {} redeclared", scope.name, scope.model);
                scopes[existing] = scope;
            }
            Err(slot) => scopes.insert(slot, scope),
        }
    }

    /// Declaration hook: extract the literal definition at `site`, then record it.
    ///
    /// Never fails. An unreadable or unbalanced definition is recorded with
    /// whatever text was captured.
    pub fn intercept(
        &mut self,
        name: &str,
        model: ModelId,
        parameters: Vec<String>,
        site: &CallSite,
        checker: &dyn BalanceChecker,
    ) {
        let extraction = extract_definition(&site.path, site.line, checker);
        if !extraction.complete {
            warn!(
                "scope `{name}` on {model} at {}:{} recorded with partial source",
                site.path.display(),
                site.line
            );
        }
        self.record(Scope::new(name, model, parameters, extraction.text));
    }

    pub fn scopes_for(&self, model: &str) -> &[Scope] {
        self.scopes.get(model).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.scopes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_document_single_line_scope() {
        let scope = Scope::new(
            "since",
            ModelId::new("Book"),
            vec!["ago".to_string()],
            r#"scope :since, ->(ago) { where("created_at > ?", ago) }"#,
        );

        assert_eq!(scope.signature(), "def self.since(ago); end");
        assert_eq!(
            scope.documentation(),
            concat!(
                "#     # Scope `:since`.\n",
                "#     #\n",
                "#     #     scope :since, ->(ago) { where(\"created_at > ?\", ago) }\n",
                "#     #\n",
                "#     # @return [Array<Book>, nil]\n",
                "#     def self.since(ago); end\n",
            )
        );
    }

    #[test]
    fn test_document_multi_line_scope() {
        let scope = Scope::new(
            "some_scope",
            ModelId::new("Object"),
            vec!["now".to_string(), "then".to_string()],
            "scope(:some_scope, lambda do |now, then|\n  next unless now\n\n  where(\"created_at > ?\", now)\nend)",
        );

        assert_eq!(
            scope.documentation(),
            concat!(
                "#     # Scope `:some_scope`.\n",
                "#     #\n",
                "#     #     scope(:some_scope, lambda do |now, then|\n",
                "#     #       next unless now\n",
                "#     #     \n",
                "#     #       where(\"created_at > ?\", now)\n",
                "#     #     end)\n",
                "#     #\n",
                "#     # @return [Array<Object>, nil]\n",
                "#     def self.some_scope(now, then); end\n",
            )
        );
    }

    #[test]
    fn test_scopes_are_sorted_and_model_scoped() {
        let mut recorder = ScopeRecorder::new();
        let book = ModelId::new("Book");
        recorder.record(Scope::new("since", book.clone(), vec![], "scope :since"));
        recorder.record(Scope::new("expensive", book.clone(), vec![], "scope :expensive"));
        recorder.record(Scope::new("hard_cover", book.clone(), vec![], "scope :hard_cover"));
        recorder.record(Scope::new("since", ModelId::new("Author"), vec![], "scope :since"));

        let names: Vec<&str> = recorder.scopes_for("Book").iter().map(Scope::name).collect();
        assert_eq!(names, vec!["expensive", "hard_cover", "since"]);
        assert_eq!(recorder.scopes_for("Author").len(), 1);
        assert!(recorder.scopes_for("Essay").is_empty());
        assert_eq!(recorder.len(), 4);
    }

    #[test]
    fn test_redeclared_scope_replaces_previous() {
        let mut recorder = ScopeRecorder::new();
        let book = ModelId::new("Book");
        recorder.record(Scope::new("since", book.clone(), vec![], "old"));
        recorder.record(Scope::new("since", book, vec!["ago".to_string()], "new"));
        let scopes = recorder.scopes_for("Book");
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].definition(), "new");
    }

    #[test]
    fn test_intercept_captures_call_site() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "class Image < ApplicationRecord").unwrap();
        writeln!(file, "  scope :between, ->(from, to) {{ where(\"created_at > ? AND created_at < ?\", from, to) }}").unwrap();
        writeln!(file, "end").unwrap();

        let mut recorder = ScopeRecorder::new();
        let site = CallSite {
            path: file.path().to_path_buf(),
            line: 2,
        };
        recorder.intercept(
            "between",
            ModelId::new("Image"),
            vec!["from".to_string(), "to".to_string()],
            &site,
            &DelimiterBalance,
        );

        let scope = &recorder.scopes_for("Image")[0];
        assert_eq!(
            scope.definition(),
            r#"scope :between, ->(from, to) { where("created_at > ? AND created_at < ?", from, to) }"#
        );
        assert_eq!(scope.signature(), "def self.between(from, to); end");
    }

    #[test]
    fn test_intercept_unreadable_file_still_registers() {
        let mut recorder = ScopeRecorder::new();
        let site = CallSite {
            path: PathBuf::from("/nonexistent/app/models/book.rb"),
            line: 4,
        };
        recorder.intercept("since", ModelId::new("Book"), vec![], &site, &DelimiterBalance);
        assert_eq!(recorder.scopes_for("Book")[0].definition(), "");
    }
}
