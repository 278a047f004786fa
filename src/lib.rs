//! Generic object-graph construction engine.
//!
//! A [`Repository`] maps logical names to either already-built objects or
//! [`Recipe`]s describing how to build one. The [`ObjectGraph`] materializes
//! a set of requested names: it discovers the recipe dependency graph,
//! topologically sorts it, diagnoses unbreakable circular dependencies, and
//! drives construction in dependency order inside an [`ExecutionContext`].
//! Cycles that run through lazily-assignable edges (collection entries, bean
//! properties) are broken transparently with deferred [`Reference`] cells.

pub mod context;
pub mod convert;
pub mod errors;
pub mod graph;
pub mod recipe;
pub mod reference;
pub mod repository;
pub mod types;

pub use context::ExecutionContext;
pub use convert::{Converter, DefaultConverter};
pub use errors::{
    CircularDependencyError, ConstructionError, ConversionError, NoSuchObjectError,
    RepositoryError,
};
pub use graph::ObjectGraph;
pub use recipe::{
    ArrayRecipe, BeanFactory, BeanRecipe, Created, MapRecipe, Options, Recipe, RefRecipe,
    SetRecipe, ValueRecipe,
};
pub use reference::Reference;
pub use repository::{Entry, Repository};
pub use types::{
    ArrayHandle, Bean, BeanHandle, MapFlavor, MapHandle, MapValue, Object, TypeHint, Value,
};
