//! End-to-end tests for matter composition and conditions.
//!
//! Exercises the chemical formula, nested all/any condition sets on
//! mixtures, and checks that evaluating conditions never writes.

use std::sync::Arc;

use matter_rs::{
    ConditionSet, ElementCondition, EqualitySign, Graph, MatterCondition, MatterKind,
    MixtureCondition, NodeId, ObjectKind, PhysicalObjectCondition, Presence, Quantity,
    RecordingSink, StateOfMatter, StorageBackend, ValueSign,
};
use pretty_assertions::assert_eq;

// ============================================================================
// 1. Formula
// ============================================================================

#[test]
fn test_water_formula() {
    let graph = Graph::open_memory().unwrap();
    let h = graph.create_element("Hydrogen", "H", 1).unwrap();
    let o = graph.create_element("Oxygen", "O", 8).unwrap();
    let water = graph
        .create_matter("Water", MatterKind::Substance, StateOfMatter::Liquid)
        .unwrap();

    graph.add_element(water, h, Quantity::exact(2.0)).unwrap();
    graph.add_element(water, o, Quantity::exact(1.0)).unwrap();
    assert_eq!(graph.chemical_formula(water).unwrap(), "HHO");
    assert_eq!(graph.compact_formula(water).unwrap(), "H2O");

    graph.remove_element(water, o).unwrap();
    assert_eq!(graph.chemical_formula(water).unwrap(), "HH");
    assert!(graph.remove_element(water, o).is_err());
}

#[test]
fn test_inherited_elements_leave_formula_alone() {
    let graph = Graph::open_memory().unwrap();
    let c = graph.create_element("Carbon", "C", 6).unwrap();
    let hydrocarbon = graph
        .create_matter("Hydrocarbon", MatterKind::Substance, StateOfMatter::Gas)
        .unwrap();
    let methane = graph
        .create_matter("Methane", MatterKind::Substance, StateOfMatter::Gas)
        .unwrap();
    graph.add_parent(methane, hydrocarbon).unwrap();
    graph.add_element(hydrocarbon, c, Quantity::exact(1.0)).unwrap();

    assert_eq!(graph.elements(methane).unwrap().len(), 1);
    assert_eq!(graph.chemical_formula(methane).unwrap(), "");
}

// ============================================================================
// 2. Mixtures: all versus any
// ============================================================================

struct Kitchen {
    graph: Graph<matter_rs::MemoryBackend>,
    water: NodeId,
    salt: NodeId,
    sugar: NodeId,
    brine: NodeId,
}

fn kitchen() -> Kitchen {
    let graph = Graph::open_memory().unwrap();
    let water = graph
        .create_matter("Water", MatterKind::Substance, StateOfMatter::Liquid)
        .unwrap();
    let salt = graph
        .create_matter("Salt", MatterKind::Substance, StateOfMatter::Solid)
        .unwrap();
    let sugar = graph
        .create_matter("Sugar", MatterKind::Substance, StateOfMatter::Solid)
        .unwrap();
    let brine = graph
        .create_matter("Brine", MatterKind::Mixture, StateOfMatter::Liquid)
        .unwrap();
    graph.add_substance(brine, water, Quantity::exact(0.9)).unwrap();
    graph.add_substance(brine, salt, Quantity::exact(0.1)).unwrap();
    Kitchen { graph, water, salt, sugar, brine }
}

#[test]
fn test_mixture_all_versus_any() {
    let Kitchen { graph, water, salt, sugar, brine } = kitchen();

    let all = ConditionSet::new()
        .with(MatterCondition::of(water))
        .unwrap()
        .with(MatterCondition::of(sugar))
        .unwrap();
    let mut any = all.clone();
    any.has_all_mandatory = false;

    assert!(!graph.matches(&MixtureCondition::default().with_substances(all), brine).unwrap());
    assert!(graph.matches(&MixtureCondition::default().with_substances(any), brine).unwrap());

    let both = ConditionSet::new()
        .with(MatterCondition::of(water))
        .unwrap()
        .with(MatterCondition::of(salt).with_quantity(ValueSign::Less, 0.5))
        .unwrap();
    assert!(graph.matches(&MixtureCondition::default().with_substances(both), brine).unwrap());

    // An empty set always matches.
    assert!(graph
        .matches(&MixtureCondition::default().with_substances(ConditionSet::any()), brine)
        .unwrap());
}

#[test]
fn test_nested_mixtures() {
    let Kitchen { graph, salt, brine, .. } = kitchen();
    let soup = graph
        .create_matter("Soup", MatterKind::Mixture, StateOfMatter::Liquid)
        .unwrap();
    graph.add_mixture(soup, brine, Quantity::exact(1.0)).unwrap();

    let salty = MixtureCondition::default()
        .with_substances(ConditionSet::new().with(MatterCondition::of(salt)).unwrap());
    let soup_of_brine = MixtureCondition::of(soup)
        .with_mixtures(ConditionSet::new().with(salty.clone()).unwrap());
    assert!(graph.matches(&soup_of_brine, soup).unwrap());
    assert!(!graph.matches(&salty, soup).unwrap());
}

// ============================================================================
// 3. Condition purity
// ============================================================================

#[test]
fn test_conditions_never_write() {
    let sink = Arc::new(RecordingSink::new());
    let Kitchen { graph, water, brine, .. } = kitchen();
    let graph = graph.with_sink(sink.clone());

    let h = graph.create_element("Hydrogen", "H", 1).unwrap();
    graph.add_element(water, h, Quantity::exact(2.0)).unwrap();
    let cup = graph.create_object("Cup", ObjectKind::Tangible).unwrap();
    let edge = graph.add_matter(cup, brine, Quantity::exact(0.3)).unwrap();

    let before = graph.backend().stats();
    sink.take();

    let hydrogenated = MatterCondition::default().with_elements(
        ConditionSet::new()
            .with(ElementCondition::default().with_symbol(EqualitySign::Equal, "H"))
            .unwrap(),
    );
    let full_cup = PhysicalObjectCondition::of(cup)
        .with_default_space(Presence::Absent)
        .with_matter(
            ConditionSet::new()
                .with(MatterCondition::of(brine).with_quantity(ValueSign::GreaterOrEqual, 0.25))
                .unwrap(),
        );

    for _ in 0..3 {
        assert!(graph.matches(&hydrogenated, water).unwrap());
        assert!(!graph.matches(&hydrogenated, brine).unwrap());
        assert!(graph.matches(&full_cup, cup).unwrap());
        assert!(graph.matches(&MatterCondition::of(brine), edge).unwrap());
    }

    assert_eq!(graph.backend().stats(), before);
    assert!(sink.is_empty());
}
