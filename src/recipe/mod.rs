use std::sync::Arc;

use crate::{
    context::ExecutionContext,
    errors::ConstructionError,
    reference::Reference,
    repository::Repository,
    types::{TypeHint, Value},
};

mod array;
mod bean;
mod map;
mod refs;

pub use array::{ArrayRecipe, SetRecipe};
pub use bean::{BeanFactory, BeanRecipe};
pub use map::MapRecipe;
pub use refs::{RefRecipe, ValueRecipe};

/// Flags altering construction semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// All of this recipe's dependencies may be satisfied after the fact
    /// through deferred references. Collection recipes with this option
    /// report no constructor recipes, which is what breaks cycles running
    /// through collection-valued edges.
    pub lazy_assignment: bool,
}

/// Outcome of creating a nested value: either the value itself, or a
/// deferred reference to a name still under construction.
#[derive(Debug)]
pub enum Created {
    Value(Value),
    Ref(Reference),
}

impl Created {
    /// Unwraps an eagerly-created value; a reference here means a recipe
    /// produced one without being asked to.
    pub(crate) fn into_value(self) -> Result<Value, ConstructionError> {
        match self {
            Created::Value(value) => Ok(value),
            Created::Ref(_) => Err(ConstructionError::Internal(
                "deferred reference produced during eager creation",
            )),
        }
    }
}

/// One unit of construction work, named or anonymous.
///
/// A closed set of strategies dispatched by match; identity (for cycle
/// detection and the one-recipe-per-name invariant) is `Arc` pointer
/// identity. Recipes are stateless with respect to having been built;
/// singleton semantics live in the repository and execution context.
#[derive(Debug)]
pub enum Recipe {
    Value(ValueRecipe),
    Array(ArrayRecipe),
    Set(SetRecipe),
    Map(MapRecipe),
    Bean(BeanRecipe),
    Ref(RefRecipe),
}

impl Recipe {
    pub fn name(&self) -> Option<&str> {
        match self {
            Recipe::Value(r) => r.name(),
            Recipe::Array(r) => r.name(),
            Recipe::Set(r) => r.name(),
            Recipe::Map(r) => r.name(),
            Recipe::Bean(r) => r.name(),
            Recipe::Ref(r) => r.name(),
        }
    }

    pub fn options(&self) -> Options {
        match self {
            Recipe::Value(r) => r.options(),
            Recipe::Array(r) => r.options(),
            Recipe::Set(r) => r.options(),
            Recipe::Map(r) => r.options(),
            Recipe::Bean(r) => r.options(),
            Recipe::Ref(r) => r.options(),
        }
    }

    /// Every recipe this one directly references, in declaration order.
    /// Used for graph discovery only, never for ordering.
    pub fn nested_recipes(&self, repository: &Repository) -> Vec<Arc<Recipe>> {
        match self {
            Recipe::Value(_) => Vec::new(),
            Recipe::Array(r) => r.nested_recipes(),
            Recipe::Set(r) => r.nested_recipes(),
            Recipe::Map(r) => r.nested_recipes(),
            Recipe::Bean(r) => r.nested_recipes(),
            Recipe::Ref(r) => r.nested_recipes(repository),
        }
    }

    /// The strict subset of nested recipes that must be fully built before
    /// this recipe's own construction runs.
    pub fn constructor_recipes(&self, repository: &Repository) -> Vec<Arc<Recipe>> {
        match self {
            Recipe::Value(_) => Vec::new(),
            Recipe::Array(r) => r.constructor_recipes(),
            Recipe::Set(r) => r.constructor_recipes(),
            Recipe::Map(r) => r.constructor_recipes(),
            Recipe::Bean(r) => r.constructor_recipes(),
            Recipe::Ref(r) => r.constructor_recipes(repository),
        }
    }

    /// Builds the value, pairing a stack push with a pop on every exit
    /// path. With `lazy_refs_allowed`, a reference to a name still under
    /// construction comes back as [`Created::Ref`] instead of recursing.
    pub fn create(
        this: &Arc<Recipe>,
        ctx: &mut ExecutionContext<'_>,
        hint: &TypeHint,
        lazy_refs_allowed: bool,
    ) -> Result<Created, ConstructionError> {
        ctx.push(this)?;
        let result = this.create_inner(ctx, hint, lazy_refs_allowed);
        ctx.pop();
        result
    }

    fn create_inner(
        &self,
        ctx: &mut ExecutionContext<'_>,
        hint: &TypeHint,
        lazy_refs_allowed: bool,
    ) -> Result<Created, ConstructionError> {
        match self {
            Recipe::Value(r) => r.create(ctx, hint),
            Recipe::Array(r) => r.create(ctx),
            Recipe::Set(r) => r.create(ctx),
            Recipe::Map(r) => r.create(ctx),
            Recipe::Bean(r) => r.create(ctx),
            Recipe::Ref(r) => r.create(ctx, lazy_refs_allowed),
        }
    }
}
