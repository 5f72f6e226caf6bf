//! Tests for labelling snapshot elements critical.

use foldline_common::{Diagnostics, WarningKind};
use foldline_dom::{DomSnapshot, ElementSnapshot, NodeIndex, Rect, Viewport};
use foldline_extract::{ExtractOptions, SelectorOverrides, classify};

fn critical_ids(snapshot: &DomSnapshot, options: &ExtractOptions) -> (Vec<String>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let overrides = SelectorOverrides::parse(options, &mut diagnostics);
    let set = classify(snapshot, Viewport::new(800.0, 600.0), &overrides, &mut diagnostics);
    let ids = set
        .iter()
        .map(|index| snapshot.element(index).id.to_string())
        .collect();
    (ids, diagnostics)
}

fn boxed(id: &str, classes: &[&str], rect: Rect) -> ElementSnapshot {
    ElementSnapshot::new(id, "div")
        .with_parent("root")
        .with_classes(classes)
        .with_rect(rect)
}

#[test]
fn test_positive_area_overlap_is_required() -> anyhow::Result<()> {
    let snapshot = DomSnapshot::new(vec![
        ElementSnapshot::new("root", "body").with_rect(Rect::new(0.0, 0.0, 800.0, 2000.0)),
        boxed("inside", &[], Rect::new(10.0, 10.0, 100.0, 100.0)),
        boxed("straddling", &[], Rect::new(0.0, 550.0, 100.0, 100.0)),
        boxed("touching", &[], Rect::new(0.0, 600.0, 100.0, 100.0)),
        boxed("right", &[], Rect::new(800.0, 0.0, 100.0, 100.0)),
        boxed("flat", &[], Rect::new(0.0, 0.0, 800.0, 0.0)),
        boxed("left", &[], Rect::new(-200.0, 0.0, 201.0, 10.0)),
    ])?;
    let (ids, diagnostics) = critical_ids(&snapshot, &ExtractOptions::default());
    assert_eq!(ids, ["root", "inside", "straddling", "left"]);
    assert!(diagnostics.is_empty());
    Ok(())
}

#[test]
fn test_display_none_hides_the_subtree() -> anyhow::Result<()> {
    let snapshot = DomSnapshot::new(vec![
        ElementSnapshot::new("root", "body").with_rect(Rect::new(0.0, 0.0, 800.0, 600.0)),
        boxed("drawer", &["drawer"], Rect::new(0.0, 0.0, 300.0, 600.0)).hidden(),
        ElementSnapshot::new("link", "a")
            .with_parent("drawer")
            .with_rect(Rect::new(0.0, 0.0, 300.0, 20.0)),
    ])?;
    let (ids, _) = critical_ids(&snapshot, &ExtractOptions::default());
    assert_eq!(ids, ["root"]);
    Ok(())
}

#[test]
fn test_missing_geometry_warns() -> anyhow::Result<()> {
    let snapshot = DomSnapshot::new(vec![
        ElementSnapshot::new("root", "body").with_rect(Rect::new(0.0, 0.0, 800.0, 600.0)),
        ElementSnapshot::new("svg", "svg").with_parent("root"),
    ])?;
    let (ids, diagnostics) = critical_ids(&snapshot, &ExtractOptions::default());
    assert_eq!(ids, ["root"]);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.warnings()[0].kind, WarningKind::GeometryMissing);
    assert!(diagnostics.warnings()[0].message.contains("svg"));
    Ok(())
}

#[test]
fn test_force_include_ignores_geometry_and_visibility() -> anyhow::Result<()> {
    let snapshot = DomSnapshot::new(vec![
        ElementSnapshot::new("root", "body").with_rect(Rect::new(0.0, 0.0, 800.0, 600.0)),
        boxed("modal", &["modal"], Rect::new(0.0, 0.0, 400.0, 300.0)).hidden(),
        boxed("cta", &["cta"], Rect::new(0.0, 5000.0, 100.0, 40.0)),
        ElementSnapshot::new("nogeo", "div")
            .with_parent("root")
            .with_classes(&["cta"]),
    ])?;
    let options = ExtractOptions::default().force_include(".modal, .cta");
    let (ids, diagnostics) = critical_ids(&snapshot, &options);
    assert_eq!(ids, ["root", "modal", "cta", "nogeo"]);
    assert!(diagnostics.is_empty());
    Ok(())
}

#[test]
fn test_force_exclude_needs_a_certain_match() -> anyhow::Result<()> {
    let snapshot = DomSnapshot::new(vec![
        ElementSnapshot::new("root", "body").with_rect(Rect::new(0.0, 0.0, 800.0, 600.0)),
        boxed("banner", &["banner"], Rect::new(0.0, 0.0, 800.0, 60.0)),
        boxed("button", &["button"], Rect::new(0.0, 100.0, 80.0, 30.0)),
    ])?;
    let options = ExtractOptions::default()
        .force_exclude(".banner")
        .force_exclude(".button:hover");
    let (ids, _) = critical_ids(&snapshot, &options);
    assert_eq!(ids, ["root", "button"]);
    Ok(())
}

#[test]
fn test_critical_set_is_in_document_order() -> anyhow::Result<()> {
    let snapshot = DomSnapshot::new(vec![
        boxed("b", &[], Rect::new(0.0, 0.0, 10.0, 10.0)),
        ElementSnapshot::new("root", "body").with_rect(Rect::new(0.0, 0.0, 800.0, 600.0)),
        boxed("a", &[], Rect::new(0.0, 0.0, 10.0, 10.0)),
    ])?;
    let mut diagnostics = Diagnostics::new();
    let set = classify(
        &snapshot,
        Viewport::new(800.0, 600.0),
        &SelectorOverrides::default(),
        &mut diagnostics,
    );
    let indices: Vec<NodeIndex> = set.iter().collect();
    assert_eq!(indices, [NodeIndex(0), NodeIndex(1), NodeIndex(2)]);
    assert!(set.contains(NodeIndex(2)));
    assert_eq!(set.len(), 3);
    Ok(())
}
