use std::{fmt, sync::Arc};

use crate::{
    context::ExecutionContext,
    errors::ConstructionError,
    recipe::{Created, Options, Recipe},
    types::{Bean, TypeHint, Value},
};

/// Caller-supplied bean constructor, consuming the built constructor
/// arguments in declaration order.
pub type BeanFactory = Arc<dyn Fn(Vec<Value>) -> Result<Value, String> + Send + Sync>;

/// Builds one bean instance from constructor arguments and properties.
///
/// Arguments are strict prerequisites: they are built eagerly and consumed
/// by the factory (or land in the record bean's field table). Properties
/// are assigned after the instance is registered under its name, which is
/// what lets property-mediated cycles re-enter and resolve.
pub struct BeanRecipe {
    name: Option<String>,
    options: Options,
    type_name: String,
    arguments: Vec<(String, Arc<Recipe>)>,
    properties: Vec<(String, Arc<Recipe>)>,
    factory: Option<BeanFactory>,
}

impl BeanRecipe {
    pub fn new(type_name: impl Into<String>) -> Self {
        BeanRecipe {
            name: None,
            options: Options::default(),
            type_name: type_name.into(),
            arguments: Vec::new(),
            properties: Vec::new(),
            factory: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Allows property values to be satisfied lazily through deferred
    /// references.
    pub fn lazy(mut self) -> Self {
        self.options.lazy_assignment = true;
        self
    }

    /// Replaces the default record-bean construction with a caller-supplied
    /// factory consuming the built constructor arguments in declaration
    /// order.
    pub fn with_factory(mut self, factory: BeanFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn add_argument(&mut self, name: impl Into<String>, recipe: Arc<Recipe>) {
        self.arguments.push((name.into(), recipe));
    }

    pub fn set_property(&mut self, name: impl Into<String>, recipe: Arc<Recipe>) {
        self.properties.push((name.into(), recipe));
    }

    pub fn into_recipe(self) -> Arc<Recipe> {
        Arc::new(Recipe::Bean(self))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn nested_recipes(&self) -> Vec<Arc<Recipe>> {
        self.arguments
            .iter()
            .chain(self.properties.iter())
            .map(|(_, recipe)| recipe.clone())
            .collect()
    }

    /// Constructor arguments only; properties are satisfied after the
    /// instance exists and never force construction ordering.
    pub(crate) fn constructor_recipes(&self) -> Vec<Arc<Recipe>> {
        if self.options.lazy_assignment {
            Vec::new()
        } else {
            self.arguments
                .iter()
                .map(|(_, recipe)| recipe.clone())
                .collect()
        }
    }

    pub(crate) fn create(&self, ctx: &mut ExecutionContext<'_>) -> Result<Created, ConstructionError> {
        let mut arguments = Vec::with_capacity(self.arguments.len());
        for (argument, recipe) in &self.arguments {
            let value = Recipe::create(recipe, ctx, &TypeHint::Any, false)?.into_value()?;
            arguments.push((argument.as_str(), value));
        }

        let value = match &self.factory {
            Some(factory) => {
                let values = arguments.into_iter().map(|(_, value)| value).collect();
                factory(values).map_err(|reason| ConstructionError::Failed {
                    type_name: self.type_name.clone(),
                    reason,
                })?
            }
            None => {
                let bean = Bean::new(&self.type_name);
                for (argument, value) in arguments {
                    bean.set(argument, value);
                }
                Value::Bean(Arc::new(bean))
            }
        };

        // register before property assignment so circular-but-breakable
        // references can re-enter by name
        if let Some(name) = &self.name {
            ctx.add_object(name.clone(), value.clone());
        }

        let lazy = self.options.lazy_assignment;
        for (property, recipe) in &self.properties {
            match Recipe::create(recipe, ctx, &TypeHint::Any, lazy)? {
                Created::Value(created) => {
                    assign(&value, &self.type_name, property, created)?;
                }
                Created::Ref(reference) => {
                    let target = value.clone();
                    let type_name = self.type_name.clone();
                    let property = property.clone();
                    let failures = ctx.failure_sink();
                    reference.on_set(Box::new(move |resolved| {
                        if let Err(error) = assign(&target, &type_name, &property, resolved.clone())
                        {
                            failures.lock().unwrap().push(error);
                        }
                    }));
                }
            }
        }
        Ok(Created::Value(value))
    }
}

fn assign(
    target: &Value,
    type_name: &str,
    property: &str,
    value: Value,
) -> Result<(), ConstructionError> {
    match target {
        Value::Bean(bean) => {
            bean.set(property, value);
            Ok(())
        }
        other => Err(ConstructionError::Attribute {
            type_name: type_name.to_string(),
            attribute: property.to_string(),
            reason: format!("cannot assign a property to a {} value", other.type_label()),
        }),
    }
}

impl fmt::Debug for BeanRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanRecipe")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("arguments", &self.arguments.len())
            .field("properties", &self.properties.len())
            .field("factory", &self.factory.is_some())
            .finish()
    }
}
