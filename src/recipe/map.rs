use std::sync::{Arc, RwLock};

use crate::{
    context::ExecutionContext,
    errors::ConstructionError,
    recipe::{Created, Options, Recipe},
    reference::Reference,
    types::{MapFlavor, MapHandle, MapValue, TypeHint, Value},
};

/// Builds a map from an ordered list of (key, value) entry recipes.
///
/// Entry order is preserved as declared under the default flavor. Either
/// side of an entry may resolve to a deferred reference; insertion is then
/// postponed until the implicated references resolve.
#[derive(Debug)]
pub struct MapRecipe {
    name: Option<String>,
    options: Options,
    flavor: MapFlavor,
    entries: Vec<(Arc<Recipe>, Arc<Recipe>)>,
}

impl Default for MapRecipe {
    fn default() -> Self {
        MapRecipe::new()
    }
}

impl MapRecipe {
    pub fn new() -> Self {
        MapRecipe::with_flavor(MapFlavor::Ordered)
    }

    pub fn with_flavor(flavor: MapFlavor) -> Self {
        MapRecipe {
            name: None,
            options: Options::default(),
            flavor,
            entries: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Allows entries to be satisfied lazily, removing this recipe's
    /// constructor edges from the sort graph.
    pub fn lazy(mut self) -> Self {
        self.options.lazy_assignment = true;
        self
    }

    pub fn put(&mut self, key: Arc<Recipe>, value: Arc<Recipe>) {
        self.entries.push((key, value));
    }

    pub fn put_all(&mut self, entries: impl IntoIterator<Item = (Arc<Recipe>, Arc<Recipe>)>) {
        self.entries.extend(entries);
    }

    pub fn into_recipe(self) -> Arc<Recipe> {
        Arc::new(Recipe::Map(self))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub(crate) fn nested_recipes(&self) -> Vec<Arc<Recipe>> {
        let mut nested = Vec::with_capacity(self.entries.len() * 2);
        for (key, value) in &self.entries {
            nested.push(key.clone());
            nested.push(value.clone());
        }
        nested
    }

    pub(crate) fn constructor_recipes(&self) -> Vec<Arc<Recipe>> {
        if self.options.lazy_assignment {
            Vec::new()
        } else {
            self.nested_recipes()
        }
    }

    pub(crate) fn create(&self, ctx: &mut ExecutionContext<'_>) -> Result<Created, ConstructionError> {
        let handle: MapHandle = Arc::new(RwLock::new(MapValue::new(self.flavor)));
        let value = Value::Map(handle.clone());

        // register before filling so self-referential entries can resolve
        if let Some(name) = &self.name {
            ctx.add_object(name.clone(), value.clone());
        }

        let lazy = self.options.lazy_assignment;
        for (key_recipe, value_recipe) in &self.entries {
            let key = Recipe::create(key_recipe, ctx, &TypeHint::Any, lazy)?;
            let val = Recipe::create(value_recipe, ctx, &TypeHint::Any, lazy)?;
            match (key, val) {
                (Created::Value(key), Created::Value(val)) => {
                    handle.write().unwrap().insert(key, val);
                }
                (Created::Value(key), Created::Ref(reference)) => {
                    // a null placeholder holds the key's slot until the
                    // value resolves
                    handle.write().unwrap().insert(key.clone(), Value::Null);
                    let handle = handle.clone();
                    reference.on_set(Box::new(move |resolved| {
                        handle.write().unwrap().insert(key, resolved.clone());
                    }));
                }
                (Created::Ref(key), val) => {
                    let entry = Arc::new(DeferredEntry {
                        map: handle.clone(),
                        key: key.clone(),
                        value: match val {
                            Created::Value(value) => DeferredValue::Ready(value),
                            Created::Ref(reference) => DeferredValue::Pending(reference),
                        },
                    });
                    let waiter = entry.clone();
                    key.on_set(Box::new(move |_| waiter.try_insert()));
                    if let DeferredValue::Pending(reference) = &entry.value {
                        let waiter = entry.clone();
                        reference.on_set(Box::new(move |_| waiter.try_insert()));
                    }
                }
            }
        }
        Ok(Created::Value(value))
    }
}

enum DeferredValue {
    Ready(Value),
    Pending(Reference),
}

/// A map entry whose key (and possibly value) is still a reference. The
/// insertion happens only once all implicated references are resolved;
/// firing on one side tolerates the other still being pending.
struct DeferredEntry {
    map: MapHandle,
    key: Reference,
    value: DeferredValue,
}

impl DeferredEntry {
    fn try_insert(&self) {
        let Some(key) = self.key.get() else {
            return;
        };
        let value = match &self.value {
            DeferredValue::Ready(value) => value.clone(),
            DeferredValue::Pending(reference) => match reference.get() {
                Some(value) => value,
                None => return,
            },
        };
        self.map.write().unwrap().insert(key, value);
    }
}
