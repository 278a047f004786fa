use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use indexmap::IndexMap;

use crate::{
    convert::{Converter, DefaultConverter},
    errors::{CircularDependencyError, ConstructionError, ConversionError},
    recipe::Recipe,
    reference::Reference,
    repository::Repository,
    types::{TypeHint, Value},
};

/// Construction-time environment for one pass.
///
/// Created once per outer `create_all` and threaded explicitly through
/// every recipe creation; there is no ambient thread-local state. Tracks
/// the in-progress recipe stack (the cycle-detection trigger), completed
/// named objects, and references still waiting on a name.
pub struct ExecutionContext<'a> {
    repository: &'a Repository,
    converter: Box<dyn Converter>,
    stack: Vec<Arc<Recipe>>,
    objects: IndexMap<String, Value>,
    unresolved: HashMap<String, Vec<Reference>>,
    /// Names in completion order; nested passes attribute their own
    /// constructions by recording an offset into this log.
    log: Vec<String>,
    /// Shared sink for failures raised inside deferred reference actions,
    /// which run outside the normal call chain and cannot return an error.
    failures: Arc<Mutex<Vec<ConstructionError>>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(repository: &'a Repository) -> Self {
        Self::with_converter(repository, Box::new(DefaultConverter))
    }

    pub fn with_converter(repository: &'a Repository, converter: Box<dyn Converter>) -> Self {
        ExecutionContext {
            repository,
            converter,
            stack: Vec::new(),
            objects: IndexMap::new(),
            unresolved: HashMap::new(),
            log: Vec::new(),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn repository(&self) -> &'a Repository {
        self.repository
    }

    pub fn convert(&self, value: Value, target: &TypeHint) -> Result<Value, ConversionError> {
        self.converter.convert(value, target)
    }

    /// Registers a recipe as under construction. Pushing a recipe already
    /// on the stack is the circular-dependency trigger; the reported cycle
    /// is the stack sub-path from its first occurrence, anonymous recipes
    /// pruned except for the triggering one.
    pub fn push(&mut self, recipe: &Arc<Recipe>) -> Result<(), CircularDependencyError> {
        if let Some(first) = self.stack.iter().position(|r| Arc::ptr_eq(r, recipe)) {
            let mut cycle: Vec<String> = self.stack[first..]
                .iter()
                .filter(|r| r.name().is_some() || Arc::ptr_eq(r, recipe))
                .map(|r| display_name(r))
                .collect();
            cycle.push(display_name(recipe));
            return Err(CircularDependencyError { cycle });
        }
        self.stack.push(recipe.clone());
        Ok(())
    }

    /// Callers pair every `push` with exactly one `pop`, including on
    /// error returns.
    pub fn pop(&mut self) -> Option<Arc<Recipe>> {
        self.stack.pop()
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn contains_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn object(&self, name: &str) -> Option<Value> {
        self.objects.get(name).cloned()
    }

    /// Registers a finished (or partially-built, self-referential) value
    /// and immediately satisfies any references waiting on that name.
    pub fn add_object(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        tracing::debug!(name = %name, value = ?value, "object registered");
        if self.objects.insert(name.clone(), value.clone()).is_none() {
            self.log.push(name.clone());
        }
        if let Some(waiters) = self.unresolved.remove(&name) {
            for reference in waiters {
                reference.set(value.clone());
            }
        }
    }

    /// Queues a reference, or resolves it synchronously when the name is
    /// already built.
    pub fn add_reference(&mut self, reference: Reference) {
        if let Some(value) = self.objects.get(reference.name()).cloned() {
            reference.set(value);
            return;
        }
        let name = reference.name().to_string();
        self.unresolved.entry(name).or_default().push(reference);
    }

    /// Names still awaited by queued references.
    pub fn unresolved_names(&self) -> Vec<String> {
        self.unresolved.keys().cloned().collect()
    }

    /// Current position in the construction log; pass it to
    /// [`constructed_since`](Self::constructed_since) to attribute objects
    /// built during a nested pass.
    pub fn log_position(&self) -> usize {
        self.log.len()
    }

    pub fn constructed_since(&self, position: usize) -> &[String] {
        &self.log[position.min(self.log.len())..]
    }

    pub(crate) fn failure_sink(&self) -> Arc<Mutex<Vec<ConstructionError>>> {
        self.failures.clone()
    }

    /// The first failure recorded by a deferred action, if any; taking it
    /// clears the sink. Checked after every construction loop so a failed
    /// deferred assignment aborts the pass like an eager one would.
    pub fn take_deferred_failure(&mut self) -> Option<ConstructionError> {
        self.failures.lock().unwrap().drain(..).next()
    }
}

fn display_name(recipe: &Recipe) -> String {
    recipe.name().unwrap_or("<anonymous>").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::ValueRecipe;

    fn recipe(name: &str) -> Arc<Recipe> {
        ValueRecipe::new(Value::Null).named(name).into_recipe()
    }

    #[test]
    fn pushing_a_recipe_twice_reports_the_cycle() {
        let repository = Repository::new();
        let mut ctx = ExecutionContext::new(&repository);
        let a = recipe("a");
        let b = recipe("b");
        ctx.push(&a).unwrap();
        ctx.push(&b).unwrap();
        let err = ctx.push(&a).unwrap_err();
        assert_eq!(err.cycle, vec!["a", "b", "a"]);
    }

    #[test]
    fn anonymous_recipes_are_pruned_from_the_cycle_except_the_trigger() {
        let repository = Repository::new();
        let mut ctx = ExecutionContext::new(&repository);
        let anon = ValueRecipe::new(Value::Null).into_recipe();
        let b = recipe("b");
        ctx.push(&anon).unwrap();
        ctx.push(&b).unwrap();
        let err = ctx.push(&anon).unwrap_err();
        assert_eq!(err.cycle, vec!["<anonymous>", "b", "<anonymous>"]);
    }

    #[test]
    fn references_resolve_immediately_when_object_exists() {
        let repository = Repository::new();
        let mut ctx = ExecutionContext::new(&repository);
        ctx.add_object("a", Value::Int(1));
        let reference = Reference::new("a");
        ctx.add_reference(reference.clone());
        assert!(reference.get().unwrap().same_instance(&Value::Int(1)));
        assert!(ctx.unresolved_names().is_empty());
    }

    #[test]
    fn queued_references_fire_when_the_object_arrives() {
        let repository = Repository::new();
        let mut ctx = ExecutionContext::new(&repository);
        let reference = Reference::new("a");
        ctx.add_reference(reference.clone());
        assert_eq!(ctx.unresolved_names(), vec!["a".to_string()]);
        ctx.add_object("a", Value::Int(1));
        assert!(reference.is_resolved());
        assert!(ctx.unresolved_names().is_empty());
    }

    #[test]
    fn deferred_failures_surface_once_through_the_context() {
        let repository = Repository::new();
        let mut ctx = ExecutionContext::new(&repository);
        assert!(ctx.take_deferred_failure().is_none());
        ctx.failure_sink()
            .lock()
            .unwrap()
            .push(ConstructionError::Internal("boom"));
        assert!(ctx.take_deferred_failure().is_some());
        assert!(ctx.take_deferred_failure().is_none());
    }

    #[test]
    fn log_offsets_attribute_nested_constructions() {
        let repository = Repository::new();
        let mut ctx = ExecutionContext::new(&repository);
        ctx.add_object("outer", Value::Int(1));
        let position = ctx.log_position();
        ctx.add_object("inner", Value::Int(2));
        assert_eq!(ctx.constructed_since(position), ["inner".to_string()]);
    }
}
