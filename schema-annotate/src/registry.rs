use std::collections::{HashMap, HashSet};

use log::warn;

use crate::types::Model;

/// Arena of model descriptions indexed by identity, with parent/children links.
///
/// Stands in for runtime subclass enumeration: descendants of a root type are
/// found by walking the parent-name graph.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: Vec<Model>,
    index: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. Returns `false` (and keeps the first) when the name is already taken.
    pub fn register(&mut self, model: Model) -> bool {
        let name = model.name.as_str().to_string();
        if self.index.contains_key(&name) {
            warn!("model `{name}` registered twice; keeping the first description");
            return false;
        }

        let slot = self.models.len();
        self.children.entry(model.parent.clone()).or_default().push(slot);
        self.index.insert(name, slot);
        self.models.push(model);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        self.index.get(name).map(|&slot| &self.models[slot])
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All models, sorted by name.
    pub fn sorted(&self) -> Vec<&Model> {
        let mut models: Vec<&Model> = self.models.iter().collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }

    /// Direct children of `parent`, in registration order.
    pub fn children_of(&self, parent: &str) -> impl Iterator<Item = &Model> {
        self.children
            .get(parent)
            .into_iter()
            .flatten()
            .map(|&slot| &self.models[slot])
    }

    /// All transitive descendants of `root`, sorted by name. `root` need not be registered.
    pub fn descendants(&self, root: &str) -> Vec<&Model> {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut stack: Vec<&str> = vec![root];
        let mut found = Vec::new();

        while let Some(parent) = stack.pop() {
            for &slot in self.children.get(parent).into_iter().flatten() {
                if !seen.insert(slot) {
                    continue;
                }
                let model = &self.models[slot];
                stack.push(model.name.as_str());
                found.push(model);
            }
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }
}

impl FromIterator<Model> for ModelRegistry {
    fn from_iter<I: IntoIterator<Item = Model>>(iter: I) -> Self {
        let mut registry = Self::new();
        for model in iter {
            registry.register(model);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        [
            Model::new("ApplicationRecord", "ActiveRecord::Base", "").abstract_model(),
            Model::new("Vehicle", "ApplicationRecord", "vehicles"),
            Model::new("Car", "Vehicle", "vehicles"),
            Model::new("Book", "ApplicationRecord", "books"),
            Model::new("Legacy", "ActiveRecord::Base", "legacies"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_descendants_are_transitive_and_sorted() {
        let registry = registry();
        let names: Vec<&str> = registry
            .descendants("ApplicationRecord")
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["Book", "Car", "Vehicle"]);
    }

    #[test]
    fn test_descendants_of_unregistered_root() {
        let registry = registry();
        let names: Vec<&str> = registry
            .descendants("ActiveRecord::Base")
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["ApplicationRecord", "Book", "Car", "Legacy", "Vehicle"]);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = registry();
        assert!(!registry.register(Model::new("Book", "Other", "other_books")));
        assert_eq!(registry.get("Book").map(|m| m.table.as_str()), Some("books"));
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.children_of("Other").count(), 0);
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let registry: ModelRegistry = [Model::new("A", "B", "as"), Model::new("B", "A", "bs")]
            .into_iter()
            .collect();
        assert_eq!(registry.descendants("A").len(), 2);
    }
}
