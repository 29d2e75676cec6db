//! Partitioning and base accessors over a diamond of exposed classes.

mod support;

use pyexpose_core::decl::{DeclGraph, Ty};
use pyexpose_core::diagnostics::BuildConfig;
use pyexpose_cpp::conversion::ConversionRegistry;
use pyexpose_cpp::dispatch::{build_tree, Candidate};
use pyexpose_cpp::hierarchy::{downcast, partition};
use serde_json::json;

use support::{build, diamond, id};

const CLASSES: [(&str, &str); 5] = [
    ("A", "_20"),
    ("B", "_22"),
    ("C", "_24"),
    ("D", "_26"),
    ("E", "_28"),
];

fn exposed(graph: &DeclGraph) -> ConversionRegistry<'_> {
    let mut registry = ConversionRegistry::new(graph, &BuildConfig::default());
    for (name, key) in CLASSES {
        registry.register_class(id(graph, key), name).unwrap();
    }
    registry.link_hierarchy();
    registry
}

#[test]
fn single_inheritance_chain_is_trivial() {
    let graph = diamond();
    let registry = exposed(&graph);
    let d = partition(&registry, id(&graph, "_26")).unwrap();
    assert!(d.is_trivial());
    assert_eq!(d.classes, vec![id(&graph, "_26"), id(&graph, "_28")]);
}

#[test]
fn multiple_inheritance_opens_a_node() {
    let graph = diamond();
    let registry = exposed(&graph);
    let a = partition(&registry, id(&graph, "_20")).unwrap();
    assert_eq!(a.node_count(), 2);
    assert_eq!(
        a.classes,
        vec![id(&graph, "_20"), id(&graph, "_22"), id(&graph, "_24")]
    );
    assert_eq!(a.derived[0].main, id(&graph, "_26"));
    assert_eq!(a.derived[0].classes, vec![id(&graph, "_26"), id(&graph, "_28")]);
}

#[test]
fn class_reached_twice_is_placed_once() {
    let graph = diamond();
    let registry = exposed(&graph);
    let all = partition(&registry, id(&graph, "_20")).unwrap().all_classes();
    assert_eq!(all.len(), CLASSES.len());
}

#[test]
fn ancestors_of_a_multiply_inheriting_class_cast_through_accessor() {
    let graph = diamond();
    let registry = exposed(&graph);
    let cast = |key: &str| registry.exposed_class(id(&graph, key)).unwrap().cast_base();
    assert_eq!(cast("_20").fill("o"), "get_base_A(o,false)");
    assert_eq!(cast("_22").fill("o"), "get_base_B(o,false)");
    assert_eq!(cast("_26").fill("o"), "cast_base_D(o)");
    assert_eq!(cast("_28").fill("o"), "cast_base_E(o)");
}

#[test]
fn base_accessor_tests_the_forking_subclass() {
    let graph = diamond();
    let registry = exposed(&graph);
    let a = downcast(&registry, id(&graph, "_20")).unwrap();
    let names: Vec<&str> = a.checks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["D"]);
    let text = a.render();
    assert!(text.contains("static_cast<A*>(reinterpret_cast<D*>(1))"), "{text}");
    assert!(text.contains("bool safe=true"), "{text}");

    assert!(downcast(&registry, id(&graph, "_26")).unwrap().is_direct());
}

#[test]
fn module_build_emits_a_downcast_per_class() {
    let graph = diamond();
    let classes: Vec<_> = CLASSES
        .iter()
        .map(|(name, _)| json!({ "name": name, "cpp": name }))
        .collect();
    let module = build(&graph, json!({ "module": "shapes", "classes": classes }));
    assert_eq!(module.classes.len(), 5);
    assert_eq!(module.classes[3].bases, vec!["B".to_string(), "C".to_string()]);
    assert_eq!(module.classes[0].downcast.checks.len(), 1);
    assert!(module.classes[4].downcast.is_direct());
    for class in &module.classes {
        assert!(!class.capabilities.any());
    }
}

#[test]
fn derived_class_branches_are_tested_before_bases() {
    let graph = diamond();
    let registry = exposed(&graph);
    let candidates = ["_20", "_22", "_28"]
        .iter()
        .enumerate()
        .map(|(n, key)| Candidate {
            id: n,
            label: format!("f({key})"),
            args: vec![Ty::Node(id(&graph, key)).pointer()],
        })
        .collect();
    let tree = build_tree(candidates, &registry).unwrap();
    let order: Vec<usize> = tree
        .objects
        .iter()
        .filter_map(|o| o.node.terminal.as_ref().map(|t| t.id))
        .collect();
    assert_eq!(order, vec![2, 1, 0]);
}
