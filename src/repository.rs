use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use crate::{errors::RepositoryError, recipe::Recipe, types::Value};

/// A repository entry: either a fully-built object or a recipe that can
/// build one.
#[derive(Debug, Clone)]
pub enum Entry {
    Object(Value),
    Recipe(Arc<Recipe>),
}

/// Sorted name-keyed store of concrete objects and unbuilt recipes.
///
/// The only resource shared between concurrent construction passes; adds
/// are duplicate-checked and inserted under one lock so two passes cannot
/// both believe they are first to materialize a name.
#[derive(Debug, Default)]
pub struct Repository {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl Repository {
    pub fn new() -> Self {
        Repository::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().unwrap().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Entry> {
        self.entries.read().unwrap().get(name).cloned()
    }

    pub fn recipe(&self, name: &str) -> Option<Arc<Recipe>> {
        match self.get(name) {
            Some(Entry::Recipe(recipe)) => Some(recipe),
            _ => None,
        }
    }

    pub fn object(&self, name: &str) -> Option<Value> {
        match self.get(name) {
            Some(Entry::Object(value)) => Some(value),
            _ => None,
        }
    }

    /// Registers a recipe under its own name. The name must be unbound or
    /// bound to another recipe; rebinding over a constructed object is a
    /// duplicate registration.
    pub fn add_recipe(&self, recipe: Arc<Recipe>) -> Result<(), RepositoryError> {
        let name = match recipe.name() {
            Some(name) => name.to_string(),
            None => return Err(RepositoryError::AnonymousRecipe),
        };
        let mut entries = self.entries.write().unwrap();
        if let Some(Entry::Object(_)) = entries.get(&name) {
            return Err(RepositoryError::Duplicate(name));
        }
        entries.insert(name, Entry::Recipe(recipe));
        Ok(())
    }

    /// Binds a constructed object. Promoting a recipe-valued name to its
    /// built object is allowed; rebinding over another object is not.
    pub fn add_object(&self, name: impl Into<String>, value: Value) -> Result<(), RepositoryError> {
        let name = name.into();
        let mut entries = self.entries.write().unwrap();
        if let Some(Entry::Object(_)) = entries.get(&name) {
            return Err(RepositoryError::Duplicate(name));
        }
        entries.insert(name, Entry::Object(value));
        Ok(())
    }

    /// All known names, in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::ValueRecipe;

    #[test]
    fn duplicate_object_binding_is_rejected() {
        let repository = Repository::new();
        repository.add_object("a", Value::Int(1)).unwrap();
        let err = repository.add_object("a", Value::Int(2)).unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(name) if name == "a"));
    }

    #[test]
    fn recipe_promotes_to_object() {
        let repository = Repository::new();
        let recipe = ValueRecipe::new(Value::Int(1)).named("a").into_recipe();
        repository.add_recipe(recipe).unwrap();
        repository.add_object("a", Value::Int(1)).unwrap();
        assert!(repository.object("a").is_some());
        assert!(repository.recipe("a").is_none());
    }

    #[test]
    fn anonymous_recipes_cannot_be_registered() {
        let repository = Repository::new();
        let recipe = ValueRecipe::new(Value::Null).into_recipe();
        assert!(matches!(
            repository.add_recipe(recipe),
            Err(RepositoryError::AnonymousRecipe)
        ));
    }

    #[test]
    fn names_come_back_sorted() {
        let repository = Repository::new();
        repository.add_object("b", Value::Int(2)).unwrap();
        repository.add_object("a", Value::Int(1)).unwrap();
        assert_eq!(repository.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
