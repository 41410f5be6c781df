//! End-to-end tests for the change algebra and the transaction envelope.
//!
//! Nested lists run remove → change → add, are validated before anything
//! moves, and every mutation reports through one flushed notification batch.

use std::sync::Arc;

use matter_rs::{
    Attribute, ElementChange, ElementCondition, Error, Graph, MatterChange, MatterKind,
    MemoryBackend, NodeId, ObjectKind, PhysicalObjectChange, PhysicalObjectCondition, Quantity,
    QuantityChange, RecordingSink, Relation, StateOfMatter, StorageBackend,
};
use pretty_assertions::assert_eq;

struct Lab {
    graph: Graph<MemoryBackend>,
    h: NodeId,
    o: NodeId,
}

fn lab() -> Lab {
    let graph = Graph::open_memory().unwrap();
    let h = graph.create_element("Hydrogen", "H", 1).unwrap();
    let o = graph.create_element("Oxygen", "O", 8).unwrap();
    Lab { graph, h, o }
}

fn substance(graph: &Graph<MemoryBackend>, name: &str) -> NodeId {
    graph
        .create_matter(name, MatterKind::Substance, StateOfMatter::Liquid)
        .unwrap()
}

// ============================================================================
// 1. Ordering
// ============================================================================

#[test]
fn test_remove_runs_before_add() {
    let Lab { graph, h, o } = lab();
    let water = substance(&graph, "Water");
    graph.add_element(water, h, Quantity::exact(1.0)).unwrap();
    graph.add_element(water, o, Quantity::exact(1.0)).unwrap();

    let mut change = MatterChange::of(water);
    change.elements.remove_by(ElementCondition::of(h)).unwrap();
    change
        .elements
        .add(graph.valued(Relation::Elements, h).unwrap().with_quantity(Quantity::exact(3.0)))
        .unwrap();
    graph.apply(&change, water).unwrap();

    assert_eq!(graph.chemical_formula(water).unwrap(), "OHHH");
    assert_eq!(graph.compact_formula(water).unwrap(), "OH3");
}

#[test]
fn test_invalid_level_changes_nothing() {
    let Lab { graph, h, o } = lab();
    let water = substance(&graph, "Water");
    graph.add_element(water, h, Quantity::exact(1.0)).unwrap();
    graph.add_element(water, o, Quantity::exact(1.0)).unwrap();

    let sink = Arc::new(RecordingSink::new());
    let graph = graph.with_sink(sink.clone());
    let before = graph.backend().stats();

    // O survives the removal, so adding it again is rejected up front,
    // together with the state written at the same level.
    let mut change = MatterChange::of(water).with_state(StateOfMatter::Gas);
    change.elements.remove_by(ElementCondition::of(h)).unwrap();
    change.elements.add(graph.valued(Relation::Elements, o).unwrap()).unwrap();
    assert!(matches!(graph.apply(&change, water), Err(Error::AlreadyExists(_))));
    assert_eq!(graph.chemical_formula(water).unwrap(), "HO");
    assert_eq!(graph.default_state(water).unwrap(), StateOfMatter::Liquid);
    assert_eq!(graph.backend().stats(), before);
    assert!(sink.is_empty());

    let mut missing = MatterChange::of(water);
    let carbon = graph.create_element("Carbon", "C", 6).unwrap();
    missing.elements.change(ElementChange::of(carbon)).unwrap();
    assert!(matches!(graph.apply(&missing, water), Err(Error::NotFound(_))));
}

#[test]
fn test_nested_failure_keeps_outer_level() {
    let graph = Graph::open_memory().unwrap();
    let table = graph.create_object("Table", ObjectKind::Tangible).unwrap();
    let leg = graph.create_object("Leg", ObjectKind::Tangible).unwrap();
    let top = graph.create_object("Top", ObjectKind::Tangible).unwrap();
    graph.add_part(table, leg, Quantity::exact(4.0)).unwrap();
    graph.add_part(table, top, Quantity::exact(1.0)).unwrap();

    // The leg would contain the table it is part of.
    let mut inner = PhysicalObjectChange::of(leg);
    inner.parts.add(graph.valued(Relation::Parts, table).unwrap()).unwrap();
    let mut change = PhysicalObjectChange::of(table);
    change.parts.remove_by(PhysicalObjectCondition::of(top)).unwrap();
    change.parts.change(inner).unwrap();

    assert!(matches!(graph.apply(&change, table), Err(Error::CycleRejected { .. })));
    let parts: Vec<NodeId> = graph.parts(table).unwrap().into_iter().map(|e| e.target).collect();
    assert_eq!(parts, vec![leg, top]);
}

#[test]
fn test_change_overrides_inherited_edge_first() {
    let Lab { graph, h, .. } = lab();
    let acid = substance(&graph, "Acid");
    let vinegar = substance(&graph, "Vinegar");
    graph.add_parent(vinegar, acid).unwrap();
    let original = graph.add_element(acid, h, Quantity::exact(1.0)).unwrap();

    let mut change = MatterChange::of(vinegar);
    change
        .elements
        .change(ElementChange::of(h).with_quantity(QuantityChange::Increase(1.0)))
        .unwrap();
    graph.apply(&change, vinegar).unwrap();

    let local = graph.overridden(vinegar, Relation::Elements).unwrap();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].quantity, Quantity::exact(2.0));
    assert_eq!(graph.edge(original).unwrap().quantity, Quantity::exact(1.0));
    assert!(graph.inherited(vinegar, Relation::Elements).unwrap().is_empty());
}

#[test]
fn test_removal_reaches_local_edges_only() {
    let graph = Graph::open_memory().unwrap();
    let table = graph.create_object("Table", ObjectKind::Tangible).unwrap();
    let desk = graph.create_object("Desk", ObjectKind::Tangible).unwrap();
    let leg = graph.create_object("Leg", ObjectKind::Tangible).unwrap();
    let top = graph.create_object("Top", ObjectKind::Tangible).unwrap();
    graph.add_parent(desk, table).unwrap();
    graph.add_part(table, leg, Quantity::exact(4.0)).unwrap();
    graph.add_part(desk, top, Quantity::exact(1.0)).unwrap();

    let mut change = PhysicalObjectChange::of(desk);
    change.parts.remove_by(PhysicalObjectCondition::default()).unwrap();
    graph.apply(&change, desk).unwrap();

    let parts: Vec<NodeId> = graph.parts(desk).unwrap().into_iter().map(|e| e.target).collect();
    assert_eq!(parts, vec![leg]);
}

#[test]
fn test_nested_add_respects_cycle_guard() {
    let graph = Graph::open_memory().unwrap();
    let outer = graph.create_object("Outer", ObjectKind::Tangible).unwrap();
    let inner = graph.create_object("Inner", ObjectKind::Tangible).unwrap();
    graph.add_part(outer, inner, Quantity::exact(1.0)).unwrap();

    let mut change = PhysicalObjectChange::of(inner);
    change.parts.add(graph.valued(Relation::Parts, outer).unwrap()).unwrap();
    assert!(matches!(graph.apply(&change, inner), Err(Error::CycleRejected { .. })));
}

// ============================================================================
// 2. Quantity limits
// ============================================================================

#[test]
fn test_overflowing_increase_keeps_edge_readable() {
    let graph = Graph::open_memory().unwrap();
    let water = substance(&graph, "Water");
    let brine = graph
        .create_matter("Brine", MatterKind::Mixture, StateOfMatter::Liquid)
        .unwrap();
    let edge = graph.add_substance(brine, water, Quantity::exact(1e308)).unwrap();

    let grow = MatterChange::default().with_quantity(QuantityChange::Increase(f64::MAX));
    assert!(matches!(graph.apply(&grow, edge), Err(Error::InvalidArgument(_))));

    let substances = graph.substances(brine).unwrap();
    assert_eq!(substances.len(), 1);
    assert_eq!(substances[0].quantity, Quantity::exact(1e308));
}

#[test]
fn test_formula_limit_applies_to_changes() {
    let Lab { graph, h, o } = lab();
    let water = substance(&graph, "Water");
    let edge = graph.add_element(water, h, Quantity::exact(2.0)).unwrap();
    graph.add_element(water, o, Quantity::exact(1.0)).unwrap();

    let huge = ElementChange::default().with_quantity(QuantityChange::Set(Quantity::exact(1e19)));
    assert!(matches!(graph.apply(&huge, edge), Err(Error::InvalidArgument(_))));

    let mut nested = MatterChange::of(water);
    nested
        .elements
        .change(ElementChange::of(o).with_quantity(QuantityChange::Increase(1e19)))
        .unwrap();
    assert!(matches!(graph.apply(&nested, water), Err(Error::InvalidArgument(_))));
    assert_eq!(graph.compact_formula(water).unwrap(), "H2O");
}

// ============================================================================
// 3. Transaction envelope and notifications
// ============================================================================

#[test]
fn test_one_change_one_flush() {
    let sink = Arc::new(RecordingSink::new());
    let Lab { graph, h, o } = lab();
    let graph = graph.with_sink(sink.clone());
    let water = substance(&graph, "Water");
    sink.take();

    let before = graph.backend().stats();
    {
        let _tx = graph.begin_change();
        graph.add_element(water, h, Quantity::exact(2.0)).unwrap();
        graph.add_element(water, o, Quantity::exact(1.0)).unwrap();
        graph.set_name(water, "Dihydrogen monoxide").unwrap();
        assert!(sink.is_empty());
    }
    let after = graph.backend().stats();

    assert_eq!(after.changes, before.changes + 1);
    assert_eq!(
        sink.changed(water),
        vec![Attribute::Formula, Attribute::Relation(Relation::Elements), Attribute::Name]
    );
}

#[test]
fn test_each_create_is_one_change() {
    let graph = Graph::open_memory().unwrap();
    let before = graph.backend().stats();
    graph.create_object("Stone", ObjectKind::Tangible).unwrap();
    graph.create_element("Neon", "Ne", 10).unwrap();
    let after = graph.backend().stats();
    assert_eq!(after.changes - before.changes, 2);
    assert_eq!(after.batches - before.batches, 2);
}

#[test]
fn test_graphs_sharing_a_backend_keep_their_changes() {
    let backend = MemoryBackend::new();
    let first = Graph::with_backend(backend.clone()).unwrap();
    let second = Graph::with_backend(backend).unwrap();

    let _tx = first.begin_change();
    second.create_object("Shelf", ObjectKind::Tangible).unwrap();
    let jar = first.create_object("Jar", ObjectKind::Tangible).unwrap();
    assert_eq!(first.name(jar).unwrap(), "Jar");
}

#[test]
fn test_remove_node_is_a_removal() {
    let Lab { graph, h, .. } = lab();
    let water = substance(&graph, "Water");
    graph.add_element(water, h, Quantity::exact(2.0)).unwrap();

    graph.remove_node(h).unwrap();
    assert!(graph.elements(water).unwrap().is_empty());
    assert_eq!(graph.chemical_formula(water).unwrap(), "");
    assert_eq!(graph.backend().stats().removals, 1);
}
