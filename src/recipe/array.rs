use std::sync::{Arc, RwLock};

use crate::{
    context::ExecutionContext,
    errors::ConstructionError,
    recipe::{Created, Options, Recipe},
    types::{ArrayHandle, Object, TypeHint, Value},
};

/// Builds an ordered sequence from entry recipes.
///
/// The backing container is registered into the execution context before
/// entries are created, so self-referential structures resolve instead of
/// deadlocking. Entries that come back as deferred references occupy a
/// `Null` placeholder slot that is overwritten on resolution.
#[derive(Debug, Default)]
pub struct ArrayRecipe {
    name: Option<String>,
    options: Options,
    entries: Vec<Arc<Recipe>>,
}

impl ArrayRecipe {
    pub fn new() -> Self {
        ArrayRecipe::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Allows every entry to be satisfied lazily, removing this recipe's
    /// constructor edges from the sort graph.
    pub fn lazy(mut self) -> Self {
        self.options.lazy_assignment = true;
        self
    }

    pub fn push(&mut self, entry: Arc<Recipe>) {
        self.entries.push(entry);
    }

    pub fn push_all(&mut self, entries: impl IntoIterator<Item = Arc<Recipe>>) {
        self.entries.extend(entries);
    }

    pub fn into_recipe(self) -> Arc<Recipe> {
        Arc::new(Recipe::Array(self))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub(crate) fn nested_recipes(&self) -> Vec<Arc<Recipe>> {
        self.entries.clone()
    }

    pub(crate) fn constructor_recipes(&self) -> Vec<Arc<Recipe>> {
        if self.options.lazy_assignment {
            Vec::new()
        } else {
            self.nested_recipes()
        }
    }

    pub(crate) fn create(&self, ctx: &mut ExecutionContext<'_>) -> Result<Created, ConstructionError> {
        build_sequence(ctx, self.name.as_deref(), self.options, &self.entries, false)
            .map(Created::Value)
    }
}

/// An [`ArrayRecipe`] that de-duplicates inserted values, both eagerly
/// and when a deferred reference resolves.
#[derive(Debug, Default)]
pub struct SetRecipe {
    name: Option<String>,
    options: Options,
    entries: Vec<Arc<Recipe>>,
}

impl SetRecipe {
    pub fn new() -> Self {
        SetRecipe::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn lazy(mut self) -> Self {
        self.options.lazy_assignment = true;
        self
    }

    pub fn push(&mut self, entry: Arc<Recipe>) {
        self.entries.push(entry);
    }

    pub fn into_recipe(self) -> Arc<Recipe> {
        Arc::new(Recipe::Set(self))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub(crate) fn nested_recipes(&self) -> Vec<Arc<Recipe>> {
        self.entries.clone()
    }

    pub(crate) fn constructor_recipes(&self) -> Vec<Arc<Recipe>> {
        if self.options.lazy_assignment {
            Vec::new()
        } else {
            self.nested_recipes()
        }
    }

    pub(crate) fn create(&self, ctx: &mut ExecutionContext<'_>) -> Result<Created, ConstructionError> {
        build_sequence(ctx, self.name.as_deref(), self.options, &self.entries, true)
            .map(Created::Value)
    }
}

fn build_sequence(
    ctx: &mut ExecutionContext<'_>,
    name: Option<&str>,
    options: Options,
    entries: &[Arc<Recipe>],
    dedup: bool,
) -> Result<Value, ConstructionError> {
    let handle: ArrayHandle = Arc::new(RwLock::new(Vec::with_capacity(entries.len())));
    let value = if dedup {
        Value::Set(handle.clone())
    } else {
        Value::Array(handle.clone())
    };

    // register before filling so self-referential entries can resolve
    if let Some(name) = name {
        ctx.add_object(name, value.clone());
    }

    let lazy = options.lazy_assignment;
    for entry in entries {
        match Recipe::create(entry, ctx, &TypeHint::Any, lazy)? {
            Created::Value(created) => {
                let mut slots = handle.write().unwrap();
                if dedup && slots.iter().any(|existing| existing.same_instance(&created)) {
                    continue;
                }
                // a null entry is inserted as null, never skipped
                slots.push(created);
            }
            Created::Ref(reference) if dedup => {
                // a unique marker holds the slot; sibling resolutions may
                // remove slots, so positions cannot be captured by index
                let marker = Value::Opaque(Object::new(PendingSlot));
                handle.write().unwrap().push(marker.clone());
                let handle = handle.clone();
                reference.on_set(Box::new(move |resolved| {
                    let mut slots = handle.write().unwrap();
                    let duplicate = slots.iter().any(|existing| existing.same_instance(resolved));
                    if let Some(at) = slots.iter().position(|existing| existing.same_instance(&marker)) {
                        if duplicate {
                            slots.remove(at);
                        } else {
                            slots[at] = resolved.clone();
                        }
                    }
                }));
            }
            Created::Ref(reference) => {
                let slot = {
                    let mut slots = handle.write().unwrap();
                    slots.push(Value::Null);
                    slots.len() - 1
                };
                let handle = handle.clone();
                reference.on_set(Box::new(move |resolved| {
                    handle.write().unwrap()[slot] = resolved.clone();
                }));
            }
        }
    }
    Ok(value)
}

struct PendingSlot;
