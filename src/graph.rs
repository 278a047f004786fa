use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use indexmap::IndexMap;

use crate::{
    context::ExecutionContext,
    errors::{CircularDependencyError, ConstructionError, NoSuchObjectError},
    recipe::Recipe,
    repository::Repository,
    types::{TypeHint, Value},
};

/// Orchestrates a construction pass: discovers the recipe dependency
/// graph for a set of requested names, sorts it leaf-first, diagnoses
/// constructor-only cycles, and drives creation in dependency order.
pub struct ObjectGraph {
    repository: Arc<Repository>,
}

/// One named recipe in the sort graph. Edges point from a dependency to
/// its dependents so leaves can be plucked first; `reference_count` is the
/// pending in-degree.
struct Node {
    name: String,
    recipe: Arc<Recipe>,
    references: Vec<usize>,
    reference_count: usize,
}

impl Default for ObjectGraph {
    fn default() -> Self {
        ObjectGraph::new()
    }
}

impl ObjectGraph {
    pub fn new() -> Self {
        ObjectGraph::with_repository(Arc::new(Repository::new()))
    }

    pub fn with_repository(repository: Arc<Repository>) -> Self {
        ObjectGraph { repository }
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// Convenience wrapper over [`create_all`](Self::create_all) for one
    /// name.
    pub fn create(&self, name: &str) -> Result<Value, ConstructionError> {
        let mut objects = self.create_all(&[name])?;
        objects.shift_remove(name).ok_or(ConstructionError::Internal(
            "requested name missing from its own construction result",
        ))
    }

    /// Materializes the requested names in a fresh execution context.
    ///
    /// The returned mapping holds names resolved to pre-existing objects
    /// first, followed by every name constructed during the pass in
    /// construction order.
    pub fn create_all(
        &self,
        names: &[&str],
    ) -> Result<IndexMap<String, Value>, ConstructionError> {
        let mut ctx = ExecutionContext::new(&self.repository);
        self.create_all_in(&mut ctx, names)
    }

    /// Materializes the requested names inside an already-active context,
    /// attributing to this call only the objects it constructs. The
    /// context is left to its owner.
    pub fn create_all_in(
        &self,
        ctx: &mut ExecutionContext<'_>,
        names: &[&str],
    ) -> Result<IndexMap<String, Value>, ConstructionError> {
        let entry_position = ctx.log_position();
        let sorted = self.sorted_recipes(names)?;
        tracing::debug!(
            requested = names.len(),
            recipes = sorted.len(),
            order = ?sorted.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            "construction order resolved"
        );

        // names already bound to concrete objects pass through unchanged
        let mut objects = IndexMap::new();
        for &name in names {
            if sorted.iter().any(|(sorted_name, _)| sorted_name == name) {
                continue;
            }
            match self.repository.object(name) {
                Some(value) => {
                    objects.insert(name.to_string(), value);
                }
                None => return Err(NoSuchObjectError(name.to_string()).into()),
            }
        }

        // build each recipe in dependency order; an earlier creation may
        // already have side-effected a later name into existence
        for (name, recipe) in &sorted {
            if ctx.contains_object(name) {
                continue;
            }
            tracing::debug!(name = %name, "constructing");
            Recipe::create(recipe, ctx, &TypeHint::Any, false)?;
        }

        // a deferred assignment failing aborts the pass like an eager one
        if let Some(error) = ctx.take_deferred_failure() {
            return Err(error);
        }

        for name in ctx.constructed_since(entry_position).to_vec() {
            if let Some(value) = ctx.object(&name) {
                objects.insert(name, value);
            }
        }
        Ok(objects)
    }

    /// Builds the dependency graph over the requested names' recipes and
    /// returns them topologically sorted, leaves first.
    fn sorted_recipes(
        &self,
        names: &[&str],
    ) -> Result<Vec<(String, Arc<Recipe>)>, ConstructionError> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for &name in names {
            if let Some(recipe) = self.repository.recipe(name) {
                self.create_node(name, recipe, &mut nodes, &mut index)?;
            }
        }

        // isolated nodes (no edges at all) construct before any chains
        let mut pending: Vec<usize> = nodes.iter().map(|node| node.reference_count).collect();
        let mut sorted: Vec<usize> = Vec::with_capacity(nodes.len());
        let mut leaves: VecDeque<usize> = VecDeque::new();
        for (at, node) in nodes.iter().enumerate() {
            if node.reference_count == 0 {
                if node.references.is_empty() {
                    sorted.push(at);
                } else {
                    leaves.push_back(at);
                }
            }
        }

        // pluck leaves until none remain
        while let Some(at) = leaves.pop_front() {
            sorted.push(at);
            for position in 0..nodes[at].references.len() {
                let dependent = nodes[at].references[position];
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    leaves.push_back(dependent);
                }
            }
        }

        // leftover nodes mean one or more circuits among constructor edges
        if sorted.len() != nodes.len() {
            for at in 0..nodes.len() {
                if pending[at] == 0 {
                    continue;
                }
                let mut stack = Vec::with_capacity(nodes.len());
                if let Some(circuit) = find_circuit(&nodes, at, &mut stack) {
                    return Err(render_circuit(&nodes, &circuit).into());
                }
            }
            // reaching this point is a programming error, not a definition
            // problem in the caller's recipes
            tracing::error!("unsorted nodes remain but no circuit was found");
            return Err(ConstructionError::Internal(
                "expected a circular dependency",
            ));
        }

        Ok(sorted
            .into_iter()
            .map(|at| (nodes[at].name.clone(), nodes[at].recipe.clone()))
            .collect())
    }

    /// Creates one graph node per distinct named recipe, reusing nodes on
    /// revisit. Anonymous nested recipes are not nodes of their own; their
    /// nested (and, when eagerly held, constructor) recipes merge upward
    /// into the visiting node's edge set.
    fn create_node(
        &self,
        name: &str,
        recipe: Arc<Recipe>,
        nodes: &mut Vec<Node>,
        index: &mut HashMap<String, usize>,
    ) -> Result<usize, ConstructionError> {
        if let Some(&at) = index.get(name) {
            // revisiting a name must find the exact same recipe instance
            if !Arc::ptr_eq(&nodes[at].recipe, &recipe) {
                return Err(ConstructionError::DuplicateRecipeName(name.to_string()));
            }
            return Ok(at);
        }

        let at = nodes.len();
        nodes.push(Node {
            name: name.to_string(),
            recipe: recipe.clone(),
            references: Vec::new(),
            reference_count: 0,
        });
        index.insert(name.to_string(), at);

        let mut nested: VecDeque<Arc<Recipe>> =
            recipe.nested_recipes(&self.repository).into();
        let mut constructors: Vec<Arc<Recipe>> = recipe.constructor_recipes(&self.repository);
        while let Some(nested_recipe) = nested.pop_front() {
            let eager = constructors
                .iter()
                .any(|constructor| Arc::ptr_eq(constructor, &nested_recipe));
            match nested_recipe.name().map(str::to_string) {
                Some(nested_name) => {
                    let nested_at = self.create_node(&nested_name, nested_recipe, nodes, index)?;
                    // an edge means "dependency must finish before the
                    // dependent can start"
                    if eager {
                        nodes[at].reference_count += 1;
                        nodes[nested_at].references.push(at);
                    }
                }
                None => {
                    nested.extend(nested_recipe.nested_recipes(&self.repository));
                    // a lazily-held anonymous recipe cannot force eager
                    // edges onto the visitor
                    if eager {
                        constructors.extend(nested_recipe.constructor_recipes(&self.repository));
                    }
                }
            }
        }
        Ok(at)
    }
}

/// Depth-first walk along dependent edges keeping the current path; a node
/// already on the path closes the minimal circuit.
fn find_circuit(nodes: &[Node], at: usize, stack: &mut Vec<usize>) -> Option<Vec<usize>> {
    if let Some(first) = stack.iter().position(|&on_path| on_path == at) {
        let mut circuit: Vec<usize> = stack[first..].to_vec();
        circuit.push(at);
        return Some(circuit);
    }
    stack.push(at);
    for &dependent in &nodes[at].references {
        if let Some(circuit) = find_circuit(nodes, dependent, stack) {
            return Some(circuit);
        }
    }
    stack.pop();
    None
}

/// Renders the circuit as names, pruning anonymous recipes except for the
/// node that triggered the detection.
fn render_circuit(nodes: &[Node], circuit: &[usize]) -> CircularDependencyError {
    let trigger = circuit[circuit.len() - 1];
    let cycle = circuit
        .iter()
        .filter(|&&at| at == trigger || nodes[at].recipe.name().is_some())
        .map(|&at| nodes[at].name.clone())
        .collect();
    CircularDependencyError { cycle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{BeanRecipe, RefRecipe, ValueRecipe};

    fn leaf(name: &str) -> Arc<Recipe> {
        ValueRecipe::new(Value::Int(0)).named(name).into_recipe()
    }

    fn bean_depending_on(name: &str, dependency: &str) -> Arc<Recipe> {
        let mut bean = BeanRecipe::new("Widget").named(name);
        bean.add_argument("dep", RefRecipe::new(dependency).into_recipe());
        bean.into_recipe()
    }

    fn graph_with(recipes: Vec<Arc<Recipe>>) -> ObjectGraph {
        let repository = Arc::new(Repository::new());
        for recipe in recipes {
            repository.add_recipe(recipe).unwrap();
        }
        ObjectGraph::with_repository(repository)
    }

    #[test]
    fn dependencies_sort_before_dependents() {
        let graph = graph_with(vec![bean_depending_on("a", "b"), leaf("b")]);
        let sorted = graph.sorted_recipes(&["a"]).unwrap();
        let names: Vec<_> = sorted.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn isolated_nodes_sort_before_any_chain() {
        let graph = graph_with(vec![
            bean_depending_on("a", "b"),
            leaf("b"),
            leaf("lone1"),
            leaf("lone2"),
        ]);
        let sorted = graph.sorted_recipes(&["a", "lone1", "lone2"]).unwrap();
        let names: Vec<_> = sorted.iter().map(|(name, _)| name.as_str()).collect();
        let chain_start = names.iter().position(|&n| n == "b" || n == "a").unwrap();
        assert!(names[..chain_start].contains(&"lone1"));
        assert!(names[..chain_start].contains(&"lone2"));
    }

    #[test]
    fn same_name_with_two_recipe_instances_is_an_error() {
        let repository = Arc::new(Repository::new());
        repository.add_recipe(leaf("x")).unwrap();
        // a root bean holding a *different* recipe instance also named "x"
        let mut bean = BeanRecipe::new("Widget").named("a");
        bean.add_argument("dep", leaf("x"));
        repository.add_recipe(bean.into_recipe()).unwrap();
        let graph = ObjectGraph::with_repository(repository);
        let err = graph.sorted_recipes(&["x", "a"]).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::DuplicateRecipeName(name) if name == "x"
        ));
    }

    #[test]
    fn self_cycle_is_reported() {
        let graph = graph_with(vec![bean_depending_on("a", "a")]);
        let err = graph.sorted_recipes(&["a"]).unwrap_err();
        match err {
            ConstructionError::Circular(circular) => {
                assert_eq!(circular.cycle, vec!["a", "a"]);
            }
            other => panic!("expected circular dependency, got {other}"),
        }
    }
}
