use thiserror::Error;

/// Top level failure of a construction pass.
///
/// All failures abort the entire `create_all` pass; there is no partial
/// result and nothing is retried.
#[derive(Error, Debug)]
pub enum ConstructionError {
    /// A recipe could not produce its value.
    #[error("Failed to construct '{type_name}': {reason}")]
    Failed { type_name: String, reason: String },
    /// A value could not be assigned to a named attribute.
    #[error("Failed to construct '{type_name}' (attribute '{attribute}'): {reason}")]
    Attribute {
        type_name: String,
        attribute: String,
        reason: String,
    },
    /// Two distinct recipe instances were discovered under one name.
    #[error("The name '{0}' is assigned to multiple recipes")]
    DuplicateRecipeName(String),
    #[error(transparent)]
    Circular(#[from] CircularDependencyError),
    #[error(transparent)]
    NoSuchObject(#[from] NoSuchObjectError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// An internal invariant was violated; a bug in this crate, not in the
    /// caller's recipe definitions.
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

/// A cycle composed entirely of eager (constructor) dependencies.
///
/// `cycle` is the minimal repeating sub-path, first node repeated at the
/// end, anonymous recipes pruned except for the node that triggered the
/// detection.
#[derive(Error, Debug, Clone)]
#[error("Circular dependency detected: {}", render_cycle(.cycle))]
pub struct CircularDependencyError {
    pub cycle: Vec<String>,
}

/// A requested name has neither a concrete binding nor a recipe.
#[derive(Error, Debug, Clone)]
#[error("No object or recipe registered under the name '{0}'")]
pub struct NoSuchObjectError(pub String);

/// Errors from the name-keyed repository.
#[derive(Error, Debug, Clone)]
pub enum RepositoryError {
    /// The name is already bound to a constructed object.
    #[error("The name '{0}' is already bound to a constructed object")]
    Duplicate(String),
    /// Only named recipes can be registered for lookup.
    #[error("Cannot register an anonymous recipe in the repository")]
    AnonymousRecipe,
}

/// A value could not be coerced to the requested target type.
#[derive(Error, Debug, Clone)]
#[error("Unable to convert a {from} value to {to}")]
pub struct ConversionError {
    pub from: String,
    pub to: String,
}

fn render_cycle(cycle: &[String]) -> String {
    cycle.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_error_renders_full_path() {
        let err = CircularDependencyError {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
    }

    #[test]
    fn construction_error_wraps_specializations() {
        let err: ConstructionError = NoSuchObjectError("missing".into()).into();
        assert_eq!(
            err.to_string(),
            "No object or recipe registered under the name 'missing'"
        );
    }
}
