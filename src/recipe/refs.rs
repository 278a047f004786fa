use std::sync::Arc;

use crate::{
    context::ExecutionContext,
    errors::{ConstructionError, NoSuchObjectError},
    recipe::{Created, Options, Recipe},
    reference::Reference,
    repository::Repository,
    types::{TypeHint, Value},
};

/// A constant leaf value, converted against the expected type on creation.
#[derive(Debug)]
pub struct ValueRecipe {
    name: Option<String>,
    options: Options,
    value: Value,
    coerce: Option<TypeHint>,
}

impl ValueRecipe {
    pub fn new(value: Value) -> Self {
        ValueRecipe {
            name: None,
            options: Options::default(),
            value,
            coerce: None,
        }
    }

    /// Forces conversion to a specific target type instead of the caller's
    /// expected type.
    pub fn coerced(value: Value, target: TypeHint) -> Self {
        ValueRecipe {
            coerce: Some(target),
            ..ValueRecipe::new(value)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn into_recipe(self) -> Arc<Recipe> {
        Arc::new(Recipe::Value(self))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub(crate) fn create(
        &self,
        ctx: &mut ExecutionContext<'_>,
        hint: &TypeHint,
    ) -> Result<Created, ConstructionError> {
        let target = self.coerce.as_ref().unwrap_or(hint);
        let value = ctx.convert(self.value.clone(), target)?;
        if let Some(name) = &self.name {
            ctx.add_object(name.clone(), value.clone());
        }
        Ok(Created::Value(value))
    }
}

/// Re-injects another named recipe's product.
///
/// Eager creation recurses through the repository (the construction stack
/// catches constructor cycles); when lazy references are allowed and the
/// target is still unbuilt, a deferred [`Reference`] is queued instead.
#[derive(Debug)]
pub struct RefRecipe {
    name: Option<String>,
    options: Options,
    target: String,
    id_only: bool,
}

impl RefRecipe {
    pub fn new(target: impl Into<String>) -> Self {
        RefRecipe {
            name: None,
            options: Options::default(),
            target: target.into(),
            id_only: false,
        }
    }

    /// Injects the validated target *name* as a string instead of the
    /// object itself.
    pub fn id_ref(target: impl Into<String>) -> Self {
        RefRecipe {
            id_only: true,
            ..RefRecipe::new(target)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn into_recipe(self) -> Arc<Recipe> {
        Arc::new(Recipe::Ref(self))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub(crate) fn nested_recipes(&self, repository: &Repository) -> Vec<Arc<Recipe>> {
        if self.id_only {
            return Vec::new();
        }
        repository.recipe(&self.target).into_iter().collect()
    }

    /// The target is consumed eagerly whenever this recipe itself sits in
    /// an eager position; the graph walk decides which.
    pub(crate) fn constructor_recipes(&self, repository: &Repository) -> Vec<Arc<Recipe>> {
        self.nested_recipes(repository)
    }

    pub(crate) fn create(
        &self,
        ctx: &mut ExecutionContext<'_>,
        lazy_refs_allowed: bool,
    ) -> Result<Created, ConstructionError> {
        if self.id_only {
            if !ctx.contains_object(&self.target) && !ctx.repository().contains(&self.target) {
                return Err(NoSuchObjectError(self.target.clone()).into());
            }
            return Ok(self.finish(ctx, Value::Str(self.target.clone())));
        }

        // objects built earlier in this pass win over repository bindings
        if let Some(value) = ctx.object(&self.target) {
            return Ok(self.finish(ctx, value));
        }

        let repository = ctx.repository();
        if let Some(value) = repository.object(&self.target) {
            return Ok(self.finish(ctx, value));
        }

        if lazy_refs_allowed {
            if !repository.contains(&self.target) {
                return Err(NoSuchObjectError(self.target.clone()).into());
            }
            let reference = Reference::new(self.target.clone());
            ctx.add_reference(reference.clone());
            tracing::debug!(target = %self.target, "deferred reference queued");
            return Ok(Created::Ref(reference));
        }
        match repository.recipe(&self.target) {
            Some(recipe) => {
                let value = Recipe::create(&recipe, ctx, &TypeHint::Any, false)?.into_value()?;
                Ok(self.finish(ctx, value))
            }
            None => Err(NoSuchObjectError(self.target.clone()).into()),
        }
    }

    /// A named ref aliases its target: the resolved value registers under
    /// the ref's own name as well.
    fn finish(&self, ctx: &mut ExecutionContext<'_>, value: Value) -> Created {
        if let Some(name) = &self.name {
            ctx.add_object(name.clone(), value.clone());
        }
        Created::Value(value)
    }
}
