//! Locating, inserting, replacing and removing annotation blocks in file text.
//!
//! Everything outside the block being touched is preserved byte-for-byte, and
//! a merge that would not change the content never writes.

use std::borrow::Cow;
use std::path::Path;

use log::debug;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

use crate::config::AnnotationPosition;
use crate::errors::{AnnotateError, AnnotateResult};
use crate::types::Model;

const BLOCK_NAME: &str = "AnnotationBlock";

/// Prefix carried by every body line of a model-file block.
const COMMENT_PREFIX: &str = "#   ";
const PARSE_DIRECTIVE: &str = "# @!parse";

static MAGIC_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#\s*(?:-\*-\s*)?(?:(?:en)?coding\s*:.*|frozen_string_literal\s*:.+)$")
        .expect("magic comment pattern is valid")
});

/// Start/end marker pair, keyed by table name in schema-file mode.
///
/// The removal pattern is compiled once per pair.
#[derive(Debug, Clone)]
pub struct Markers {
    key: Option<String>,
    pattern: Regex,
}

impl Markers {
    pub fn new(key: Option<&str>) -> Self {
        let qualifier = key.map(|k| format!(":{k}")).unwrap_or_default();
        let start = regex::escape(&format!("# %%<{BLOCK_NAME}:Start{qualifier}>%%"));
        let end = regex::escape(&format!("%%<{BLOCK_NAME}:End{qualifier}>%%"));
        Self {
            key: key.map(str::to_string),
            pattern: Regex::new(&format!(r"(?s)\n?{start}.*?{end}\n?\n?")).expect("escaped marker pattern is valid"),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn qualifier(&self) -> String {
        self.key.as_ref().map(|k| format!(":{k}")).unwrap_or_default()
    }

    /// Blank line followed by `# %%<AnnotationBlock:Start[:key]>%%`.
    pub fn start(&self) -> String {
        format!("\n# %%<{BLOCK_NAME}:Start{}>%%", self.qualifier())
    }

    /// `%%<AnnotationBlock:End[:key]>%%` followed by a newline.
    pub fn end(&self) -> String {
        format!("%%<{BLOCK_NAME}:End{}>%%\n", self.qualifier())
    }

    /// Content with the first block for this key removed.
    pub fn remove_from<'c>(&self, content: &'c str) -> Cow<'c, str> {
        self.pattern.replacen(content, 1, "")
    }

    pub fn is_present_in(&self, content: &str) -> bool {
        self.pattern.is_match(content)
    }

    /// Content with the first block for this key replaced by `replacement`, taken literally.
    fn replace_in<'c>(&self, content: &'c str, replacement: &str) -> Cow<'c, str> {
        self.pattern.replacen(content, 1, NoExpand(replacement))
    }
}

impl PartialEq for Markers {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Markers {}

/// Split leading magic comment lines (`# frozen_string_literal: true`, encodings) from the rest.
pub fn split_magic_comments(content: &str) -> (&str, &str) {
    let mut end = 0;
    for line in content.split_inclusive('\n') {
        if !MAGIC_COMMENT.is_match(line.trim_end_matches(['\r', '\n'])) {
            break;
        }
        end += line.len();
    }
    content.split_at(end)
}

/// Turn a comment-escaped block into literal declarations for the shared schema file.
pub fn to_schema_declarations(block: &str) -> String {
    block
        .split_inclusive('\n')
        .filter(|line| line.trim_end() != PARSE_DIRECTIVE)
        .map(|line| line.strip_prefix(COMMENT_PREFIX).unwrap_or(line))
        .collect()
}

/// Result of merging a block into a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub old_content: String,
    pub new_content: String,
    pub written: bool,
}

/// Computes and applies block insert/update/remove for one annotation position.
#[derive(Debug, Clone, Copy)]
pub struct FileMerger {
    position: AnnotationPosition,
}

impl FileMerger {
    pub fn new(position: AnnotationPosition) -> Self {
        Self { position }
    }

    pub fn position(&self) -> AnnotationPosition {
        self.position
    }

    /// Markers used for `model` under this position.
    pub fn markers_for(&self, model: &Model) -> Markers {
        match self.position {
            AnnotationPosition::SchemaFile => Markers::new(Some(&model.table)),
            AnnotationPosition::Top | AnnotationPosition::Bottom => Markers::new(None),
        }
    }

    /// New file content for `content`. `block = None` removes the model's block.
    pub fn merge(&self, content: &str, model: &Model, block: Option<&str>) -> String {
        self.merge_with(content, &self.markers_for(model), block)
    }

    /// [`merge`](Self::merge) with explicit markers.
    pub fn merge_with(&self, content: &str, markers: &Markers, block: Option<&str>) -> String {
        let Some(block) = block else {
            return markers.remove_from(content).into_owned();
        };

        match self.position {
            AnnotationPosition::Top => {
                let stripped = markers.remove_from(content);
                let (magic, rest) = split_magic_comments(&stripped);
                format!("{magic}{block}{rest}")
            }
            AnnotationPosition::Bottom => {
                let stripped = markers.remove_from(content);
                format!("{stripped}{block}")
            }
            AnnotationPosition::SchemaFile => {
                // Replaced in place so the other models' blocks keep their order.
                let declarations = to_schema_declarations(block);
                if markers.is_present_in(content) {
                    markers.replace_in(content, &declarations).into_owned()
                } else {
                    format!("{content}{declarations}")
                }
            }
        }
    }

    /// Read `path`, merge, and write only when the content changed.
    ///
    /// A missing file reads as empty. Abstract models are never touched.
    pub fn apply(&self, path: &Path, model: &Model, block: Option<&str>) -> AnnotateResult<MergeOutcome> {
        self.apply_with(path, model, &self.markers_for(model), block)
    }

    /// [`apply`](Self::apply) with explicit markers.
    pub fn apply_with(
        &self,
        path: &Path,
        model: &Model,
        markers: &Markers,
        block: Option<&str>,
    ) -> AnnotateResult<MergeOutcome> {
        let old_content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(AnnotateError::io(path, err)),
        };

        if model.is_abstract {
            debug!("{} is abstract; leaving {} untouched", model.name, path.display());
            return Ok(MergeOutcome {
                new_content: old_content.clone(),
                old_content,
                written: false,
            });
        }

        let new_content = self.merge_with(&old_content, markers, block);
        if new_content == old_content {
            debug!("{} already up to date", path.display());
            return Ok(MergeOutcome {
                old_content,
                new_content,
                written: false,
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| AnnotateError::io(parent, err))?;
        }
        std::fs::write(path, &new_content).map_err(|err| AnnotateError::io(path, err))?;

        Ok(MergeOutcome {
            old_content,
            new_content,
            written: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "\n# %%<AnnotationBlock:Start>%%\n# @!parse\n#   class Book < ApplicationRecord\n#   end\n# %%<AnnotationBlock:End>%%\n\n";

    fn book() -> Model {
        Model::new("Book", "ApplicationRecord", "books")
    }

    #[test]
    fn test_markers() {
        let plain = Markers::new(None);
        assert_eq!(plain.start(), "\n# %%<AnnotationBlock:Start>%%");
        assert_eq!(plain.end(), "%%<AnnotationBlock:End>%%\n");

        let keyed = Markers::new(Some("books"));
        assert_eq!(keyed.start(), "\n# %%<AnnotationBlock:Start:books>%%");
        assert_eq!(keyed.end(), "%%<AnnotationBlock:End:books>%%\n");
    }

    #[test]
    fn test_unkeyed_pattern_ignores_keyed_blocks() {
        let keyed = "\n# %%<AnnotationBlock:Start:books>%%\nclass Book\nend\n# %%<AnnotationBlock:End:books>%%\n\n";
        assert!(!Markers::new(None).is_present_in(keyed));
        assert!(Markers::new(Some("books")).is_present_in(keyed));
        assert!(!Markers::new(Some("book")).is_present_in(keyed));
        assert!(!Markers::new(Some("books:novel")).is_present_in(keyed));
    }

    #[test]
    fn test_markers_compare_by_key() {
        let keyed = Markers::new(Some("vehicles"));
        assert_eq!(keyed, keyed.clone());
        assert_eq!(keyed.key(), Some("vehicles"));
        assert_ne!(keyed, Markers::new(Some("vehicles:car")));
        assert_ne!(Markers::new(None), keyed);
        assert_eq!(Markers::new(None).key(), None);
    }

    #[test]
    fn test_explicit_markers_share_a_table() {
        let merger = FileMerger::new(AnnotationPosition::SchemaFile);
        let vehicle = Model::new("Vehicle", "ApplicationRecord", "vehicles");
        let car = Model::new("Car", "Vehicle", "vehicles");
        let car_markers = Markers::new(Some("vehicles:car"));
        let vehicle_block = "\n# %%<AnnotationBlock:Start:vehicles>%%\n#   class Vehicle < ApplicationRecord\n#   end\n# %%<AnnotationBlock:End:vehicles>%%\n\n";
        let car_block = "\n# %%<AnnotationBlock:Start:vehicles:car>%%\n#   class Car < Vehicle\n#   end\n# %%<AnnotationBlock:End:vehicles:car>%%\n\n";

        let content = merger.merge("", &vehicle, Some(vehicle_block));
        let content = merger.merge_with(&content, &car_markers, Some(car_block));
        assert!(content.contains("class Vehicle < ApplicationRecord"));
        assert!(content.contains("class Car < Vehicle"));
        assert_eq!(merger.merge(&content, &vehicle, Some(vehicle_block)), content);
        assert_eq!(merger.merge_with(&content, &car_markers, Some(car_block)), content);

        let without_car = merger.merge_with(&content, &car_markers, None);
        assert_eq!(without_car, to_schema_declarations(vehicle_block));
        assert_eq!(merger.merge(&without_car, &car, None), "");
    }

    #[test]
    fn test_split_magic_comments() {
        let content = "# frozen_string_literal: true\n# encoding: utf-8\n\nclass Book\nend\n";
        let (magic, rest) = split_magic_comments(content);
        assert_eq!(magic, "# frozen_string_literal: true\n# encoding: utf-8\n");
        assert_eq!(rest, "\nclass Book\nend\n");

        for line in [
            "# coding: utf-8",
            "# -*- coding: utf-8 -*-",
            "# -*- encoding : utf-8 -*-",
            "#encoding: utf-8",
            "# -*- frozen_string_literal: true -*-",
        ] {
            let (magic, _) = split_magic_comments(line);
            assert_eq!(magic, line, "{line}");
        }

        let (magic, rest) = split_magic_comments("class Book\n# frozen_string_literal: true\n");
        assert!(magic.is_empty());
        assert!(rest.starts_with("class Book"));
    }

    #[test]
    fn test_bottom_append_and_round_trip() {
        let merger = FileMerger::new(AnnotationPosition::Bottom);
        let original = "class Book < ApplicationRecord\nend\n";
        let annotated = merger.merge(original, &book(), Some(BLOCK));
        assert_eq!(annotated, format!("{original}{BLOCK}"));
        assert_eq!(merger.merge(&annotated, &book(), Some(BLOCK)), annotated);
        assert_eq!(merger.merge(&annotated, &book(), None), original);
    }

    #[test]
    fn test_top_hoists_magic_comments() {
        let merger = FileMerger::new(AnnotationPosition::Top);
        let original = "# frozen_string_literal: true\n\nclass Book < ApplicationRecord\nend\n";
        let annotated = merger.merge(original, &book(), Some(BLOCK));
        assert_eq!(
            annotated,
            format!("# frozen_string_literal: true\n{BLOCK}\nclass Book < ApplicationRecord\nend\n")
        );
        assert_eq!(merger.merge(&annotated, &book(), Some(BLOCK)), annotated);
        assert_eq!(merger.merge(&annotated, &book(), None), original);
    }

    #[test]
    fn test_update_replaces_stale_block() {
        let merger = FileMerger::new(AnnotationPosition::Bottom);
        let stale = format!("class Book\nend\n{}", BLOCK.replace("ApplicationRecord", "OldBase"));
        let updated = merger.merge(&stale, &book(), Some(BLOCK));
        assert_eq!(updated, format!("class Book\nend\n{BLOCK}"));
    }

    #[test]
    fn test_to_schema_declarations() {
        let block = "\n# %%<AnnotationBlock:Start:books>%%\n# @!parse\n#   class Book < ApplicationRecord\n#     # @return [Integer, nil]\n#     def id; end\n#   end\n# %%<AnnotationBlock:End:books>%%\n\n";
        assert_eq!(
            to_schema_declarations(block),
            "\n# %%<AnnotationBlock:Start:books>%%\nclass Book < ApplicationRecord\n  # @return [Integer, nil]\n  def id; end\nend\n# %%<AnnotationBlock:End:books>%%\n\n"
        );
    }

    #[test]
    fn test_schema_file_keeps_block_order() {
        let merger = FileMerger::new(AnnotationPosition::SchemaFile);
        let author = Model::new("Author", "ApplicationRecord", "authors");
        let author_block = "\n# %%<AnnotationBlock:Start:authors>%%\n#   class Author < ApplicationRecord\n#   end\n# %%<AnnotationBlock:End:authors>%%\n\n";
        let book_block = "\n# %%<AnnotationBlock:Start:books>%%\n#   class Book < ApplicationRecord\n#   end\n# %%<AnnotationBlock:End:books>%%\n\n";

        let content = merger.merge("", &author, Some(author_block));
        let content = merger.merge(&content, &book(), Some(book_block));
        let again = merger.merge(&content, &author, Some(author_block));
        assert_eq!(again, content);
        assert!(content.find("Start:authors").unwrap() < content.find("Start:books").unwrap());

        let without_author = merger.merge(&content, &author, None);
        assert!(!without_author.contains("authors"));
        assert_eq!(without_author, to_schema_declarations(book_block));
    }

    #[test]
    fn test_replacement_text_is_literal() {
        let merger = FileMerger::new(AnnotationPosition::SchemaFile);
        let block = "\n# %%<AnnotationBlock:Start:books>%%\n#   def price; \"$1.00\"; end\n# %%<AnnotationBlock:End:books>%%\n\n";
        let content = merger.merge("", &book(), Some(block));
        let again = merger.merge(&content, &book(), Some(block));
        assert!(again.contains("$1.00"));
        assert_eq!(again, content);
    }

    #[test]
    fn test_apply_skips_unchanged_and_abstract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.rb");
        std::fs::write(&path, "class Book\nend\n").unwrap();

        let merger = FileMerger::new(AnnotationPosition::Bottom);
        let first = merger.apply(&path, &book(), Some(BLOCK)).unwrap();
        assert!(first.written);
        let second = merger.apply(&path, &book(), Some(BLOCK)).unwrap();
        assert!(!second.written);
        assert_eq!(second.old_content, second.new_content);

        let abstract_book = book().abstract_model();
        let outcome = merger.apply(&path, &abstract_book, None).unwrap();
        assert!(!outcome.written);
        assert_eq!(outcome.new_content, first.new_content);
    }

    #[test]
    fn test_apply_remove_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.rb");
        let outcome = FileMerger::new(AnnotationPosition::Bottom)
            .apply(&path, &book(), None)
            .unwrap();
        assert!(!outcome.written);
        assert!(outcome.old_content.is_empty());
        assert!(outcome.new_content.is_empty());
        assert!(!path.exists());
    }
}
