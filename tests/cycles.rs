use std::sync::Arc;

use graft_di::{
    ArrayRecipe, BeanRecipe, CircularDependencyError, ConstructionError, MapRecipe, ObjectGraph,
    RefRecipe, Repository, Value, ValueRecipe,
};

fn graph() -> ObjectGraph {
    ObjectGraph::with_repository(Arc::new(Repository::new()))
}

fn bean_with_argument(name: &str, dependency: &str) -> Arc<graft_di::Recipe> {
    let mut bean = BeanRecipe::new("Widget").named(name);
    bean.add_argument("dep", RefRecipe::new(dependency).into_recipe());
    bean.into_recipe()
}

fn expect_cycle(err: ConstructionError) -> CircularDependencyError {
    match err {
        ConstructionError::Circular(circular) => circular,
        other => panic!("expected a circular dependency, got {other}"),
    }
}

/// The reported cycle must be some rotation of the expected one, ends
/// joined.
fn assert_rotation_of(cycle: &[String], expected: &[&str]) {
    assert_eq!(cycle.len(), expected.len() + 1, "cycle {cycle:?}");
    assert_eq!(cycle.first(), cycle.last());
    let ring: Vec<&str> = cycle[..cycle.len() - 1].iter().map(String::as_str).collect();
    let rotated = (0..expected.len()).any(|shift| {
        (0..expected.len()).all(|at| ring[at] == expected[(at + shift) % expected.len()])
    });
    assert!(rotated, "cycle {cycle:?} is not a rotation of {expected:?}");
}

#[test]
fn constructor_only_two_cycle_fails() {
    let graph = graph();
    graph
        .repository()
        .add_recipe(bean_with_argument("a", "b"))
        .unwrap();
    graph
        .repository()
        .add_recipe(bean_with_argument("b", "a"))
        .unwrap();

    let circular = expect_cycle(graph.create_all(&["a"]).unwrap_err());
    assert_rotation_of(&circular.cycle, &["a", "b"]);
}

#[test]
fn reported_cycle_is_minimal() {
    let graph = graph();
    // c hangs off the a<->b cycle but is not part of it
    graph
        .repository()
        .add_recipe(bean_with_argument("a", "b"))
        .unwrap();
    graph
        .repository()
        .add_recipe(bean_with_argument("b", "a"))
        .unwrap();
    graph
        .repository()
        .add_recipe(bean_with_argument("c", "a"))
        .unwrap();

    let circular = expect_cycle(graph.create_all(&["c"]).unwrap_err());
    assert!(!circular.cycle.contains(&"c".to_string()));
    assert_rotation_of(&circular.cycle, &["a", "b"]);
}

#[test]
fn three_cycle_fails_with_full_path() {
    let graph = graph();
    for (name, dependency) in [("a", "b"), ("b", "c"), ("c", "a")] {
        graph
            .repository()
            .add_recipe(bean_with_argument(name, dependency))
            .unwrap();
    }
    let circular = expect_cycle(graph.create_all(&["a", "b", "c"]).unwrap_err());
    assert_rotation_of(&circular.cycle, &["a", "c", "b"]);
}

#[test]
fn lazy_map_edge_breaks_the_cycle() {
    let graph = graph();
    // a: map with an entry pointing at b; b: bean whose property points
    // back at a. The map edge is lazy, so the cycle is breakable.
    let mut a = MapRecipe::new().named("a").lazy();
    a.put(
        ValueRecipe::new(Value::Str("peer".into())).into_recipe(),
        RefRecipe::new("b").into_recipe(),
    );
    graph.repository().add_recipe(a.into_recipe()).unwrap();

    let mut b = BeanRecipe::new("Peer").named("b");
    b.set_property("owner", RefRecipe::new("a").into_recipe());
    graph.repository().add_recipe(b.into_recipe()).unwrap();

    let objects = graph.create_all(&["a", "b"]).unwrap();
    let Value::Map(map) = &objects["a"] else {
        panic!("expected a map for 'a'");
    };
    let Value::Bean(bean) = &objects["b"] else {
        panic!("expected a bean for 'b'");
    };
    // a's map contains b, and b's property holds a
    assert!(map
        .read()
        .unwrap()
        .get(&Value::Str("peer".into()))
        .unwrap()
        .same_instance(&objects["b"]));
    assert!(bean.get("owner").unwrap().same_instance(&objects["a"]));
}

#[test]
fn lazy_array_edge_breaks_the_cycle() {
    let graph = graph();
    let mut a = ArrayRecipe::new().named("a").lazy();
    a.push(RefRecipe::new("b").into_recipe());
    graph.repository().add_recipe(a.into_recipe()).unwrap();

    let mut b = BeanRecipe::new("Peer").named("b");
    b.set_property("owner", RefRecipe::new("a").into_recipe());
    graph.repository().add_recipe(b.into_recipe()).unwrap();

    let objects = graph.create_all(&["a"]).unwrap();
    let Value::Array(array) = &objects["a"] else {
        panic!("expected an array for 'a'");
    };
    let entries = array.read().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].same_instance(&objects["b"]));
}

#[test]
fn eager_map_keeps_the_cycle_unbreakable() {
    let graph = graph();
    // same shape as the lazy test, but without the lazy option the map
    // entry is a constructor edge and the cycle must fail
    let mut a = MapRecipe::new().named("a");
    a.put(
        ValueRecipe::new(Value::Str("peer".into())).into_recipe(),
        RefRecipe::new("b").into_recipe(),
    );
    graph.repository().add_recipe(a.into_recipe()).unwrap();
    graph
        .repository()
        .add_recipe(bean_with_argument("b", "a"))
        .unwrap();

    let circular = expect_cycle(graph.create_all(&["a", "b"]).unwrap_err());
    assert_rotation_of(&circular.cycle, &["a", "b"]);
}

#[test]
fn property_cycle_resolves_through_reentry() {
    let graph = graph();
    // properties are never constructor edges; two beans pointing at each
    // other through properties wire up via in-pass re-entry
    let mut a = BeanRecipe::new("Left").named("a");
    a.set_property("peer", RefRecipe::new("b").into_recipe());
    let mut b = BeanRecipe::new("Right").named("b");
    b.set_property("peer", RefRecipe::new("a").into_recipe());
    graph.repository().add_recipe(a.into_recipe()).unwrap();
    graph.repository().add_recipe(b.into_recipe()).unwrap();

    let objects = graph.create_all(&["a", "b"]).unwrap();
    let Value::Bean(a_bean) = &objects["a"] else {
        panic!("expected a bean for 'a'");
    };
    let Value::Bean(b_bean) = &objects["b"] else {
        panic!("expected a bean for 'b'");
    };
    assert!(a_bean.get("peer").unwrap().same_instance(&objects["b"]));
    assert!(b_bean.get("peer").unwrap().same_instance(&objects["a"]));
}

#[test]
fn deferred_map_entry_with_reference_key_waits_for_both_sides() {
    let graph = graph();
    // both the key and the value of the map entry are lazy references
    let mut a = MapRecipe::new().named("a").lazy();
    a.put(
        RefRecipe::new("key").into_recipe(),
        RefRecipe::new("val").into_recipe(),
    );
    graph.repository().add_recipe(a.into_recipe()).unwrap();
    graph
        .repository()
        .add_recipe(ValueRecipe::new(Value::Str("k".into())).named("key").into_recipe())
        .unwrap();
    graph
        .repository()
        .add_recipe(ValueRecipe::new(Value::Int(5)).named("val").into_recipe())
        .unwrap();

    let objects = graph.create_all(&["a", "key", "val"]).unwrap();
    let Value::Map(map) = &objects["a"] else {
        panic!("expected a map for 'a'");
    };
    let map = map.read().unwrap();
    assert_eq!(map.len(), 1);
    assert!(map
        .get(&Value::Str("k".into()))
        .unwrap()
        .same_instance(&Value::Int(5)));
}
