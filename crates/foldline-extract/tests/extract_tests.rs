//! End-to-end extraction tests.

use foldline_common::WarningKind;
use foldline_css::parser::StylesheetInput;
use foldline_dom::{DomSnapshot, ElementSnapshot, Rect, Viewport};
use foldline_extract::{
    ExtractError, ExtractOptions, ExtractionRequest, Inclusion, LoadingStrategy, Reason,
    extract_critical_css,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sheets(texts: &[&str]) -> Vec<StylesheetInput> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| StylesheetInput::new(format!("sheet{i}.css"), *text))
        .collect()
}

/// A 1300x900 page: a header in view, a card in view, a footer far below.
fn page() -> anyhow::Result<DomSnapshot> {
    Ok(DomSnapshot::new(vec![
        ElementSnapshot::new("html", "html").with_rect(Rect::new(0.0, 0.0, 1300.0, 3000.0)),
        ElementSnapshot::new("body", "body")
            .with_parent("html")
            .with_rect(Rect::new(0.0, 0.0, 1300.0, 3000.0)),
        ElementSnapshot::new("header", "header")
            .with_parent("body")
            .with_classes(&["header"])
            .with_rect(Rect::new(0.0, 0.0, 1300.0, 120.0)),
        ElementSnapshot::new("card", "div")
            .with_parent("body")
            .with_classes(&["card", "x"])
            .with_attribute("id", "x")
            .with_rect(Rect::new(20.0, 140.0, 400.0, 300.0)),
        ElementSnapshot::new("footer", "footer")
            .with_parent("body")
            .with_classes(&["footer"])
            .with_rect(Rect::new(0.0, 2800.0, 1300.0, 200.0)),
    ])?)
}

fn desktop() -> Viewport {
    Viewport::new(1300.0, 900.0)
}

#[test]
fn test_scenario_a_splits_by_geometry() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&[".header{color:red}", ".footer{color:blue}"]),
        &page()?,
        desktop(),
        &ExtractOptions::default(),
    )?;
    assert_eq!(result.critical_css, ".header{color:red}");
    assert_eq!(result.deferred_css, ".footer{color:blue}");
    assert_eq!(result.report[0].included, Inclusion::Critical);
    assert_eq!(result.report[1].included, Inclusion::Deferred);
    assert_eq!(result.report[1].reason, Reason::NoCriticalMatch);
    assert!(result.warnings.is_empty());
    Ok(())
}

#[test]
fn test_scenario_b_ignored_at_rule_is_deferred_only() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&["@media print{.header{color:red}}"]),
        &page()?,
        desktop(),
        &ExtractOptions::default().ignore_at_rule("print"),
    )?;
    assert_eq!(result.critical_css, "");
    assert_eq!(result.deferred_css, "@media print{.header{color:red}}");
    assert_eq!(result.report[0].reason, Reason::IgnoredAtRule);
    Ok(())
}

#[test]
fn test_scenario_c_media_wrapper_is_kept() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&["@media (min-width:768px){.card{display:flex}}"]),
        &page()?,
        desktop(),
        &ExtractOptions::default(),
    )?;
    assert_eq!(result.critical_css, "@media (min-width:768px){.card{display:flex}}");
    assert_eq!(result.deferred_css, "");
    assert!(!result.loading.has_deferred);
    Ok(())
}

#[test]
fn test_scenario_d_source_order_beats_specificity() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&["#x{color:red}", ".x{color:blue}"]),
        &page()?,
        desktop(),
        &ExtractOptions::default(),
    )?;
    assert_eq!(result.critical_css, "#x{color:red}\n.x{color:blue}");
    assert_eq!(result.report[0].source_index, 0);
    assert_eq!(result.report[1].source_index, 1);
    assert_eq!(result.report[0].specificity[0].to_array(), [1, 0, 0]);
    Ok(())
}

#[test]
fn test_media_mismatch_at_viewport() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&["@media (max-width:600px){.header{font-size:12px}} .header{margin:0}"]),
        &page()?,
        desktop(),
        &ExtractOptions::default(),
    )?;
    assert_eq!(result.critical_css, ".header{margin:0}");
    assert_eq!(result.deferred_css, "@media (max-width:600px){.header{font-size:12px}}");
    assert_eq!(result.report[0].reason, Reason::MediaMismatch);
    Ok(())
}

#[test]
fn test_ambiguous_media_goes_to_both_with_warning() -> anyhow::Result<()> {
    init();
    let css = "@media (prefers-color-scheme:dark){.footer{color:white}}";
    let result = extract_critical_css(&sheets(&[css]), &page()?, desktop(), &ExtractOptions::default())?;
    assert_eq!(result.critical_css, css);
    assert_eq!(result.deferred_css, css);
    assert_eq!(result.report[0].included, Inclusion::Both);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, WarningKind::AmbiguousCondition);
    assert_eq!(result.warnings[0].rule_source_index, Some(0));
    Ok(())
}

#[test]
fn test_pseudo_elements_follow_their_host() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&[".header::before{content:\"*\"} .footer::after{content:\"-\"}"]),
        &page()?,
        desktop(),
        &ExtractOptions::default(),
    )?;
    assert_eq!(result.critical_css, ".header::before{content:\"*\"}");
    assert_eq!(result.deferred_css, ".footer::after{content:\"-\"}");
    Ok(())
}

#[test]
fn test_at_rules_included_by_reference() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&[
            "@font-face{font-family:Inter;src:url(i.woff2)}\
             @keyframes fade{to{opacity:1}}\
             @keyframes other{to{opacity:0}}",
            ".header{font-family:Inter;animation:fade 1s}",
        ]),
        &page()?,
        desktop(),
        &ExtractOptions::default(),
    )?;
    assert_eq!(
        result.critical_css,
        "@font-face{font-family:Inter;src:url(i.woff2)}\n\
         @keyframes fade{to{opacity:1}}\n\
         .header{font-family:Inter;animation:fade 1s}"
    );
    assert_eq!(result.deferred_css, "@keyframes other{to{opacity:0}}");
    assert_eq!(result.report[0].reason, Reason::Referenced);
    assert_eq!(result.report[2].reason, Reason::Unreferenced);
    assert_eq!(result.report[1].selector_text, "@keyframes fade");
    assert!(result.report[1].specificity.is_empty());
    Ok(())
}

#[test]
fn test_references_through_custom_properties() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&[
            "@font-face{font-family:\"Brand Sans\";src:url(b.woff2)}\
             @keyframes fade{to{opacity:1}}",
            ".header{--brand:\"Brand Sans\";--anim:fade;font-family:var(--brand);animation:var(--anim) 1s}",
        ]),
        &page()?,
        desktop(),
        &ExtractOptions::default(),
    )?;
    assert!(result.critical_css.contains("@font-face{font-family:\"Brand Sans\";src:url(b.woff2)}"));
    assert!(result.critical_css.contains("@keyframes fade{to{opacity:1}}"));
    assert_eq!(result.deferred_css, "");
    assert_eq!(result.report[0].reason, Reason::Referenced);
    assert_eq!(result.report[1].reason, Reason::Referenced);
    Ok(())
}

#[test]
fn test_font_shorthand_family_with_digits_is_referenced() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&[
            "@font-face{font-family:Oswald2;src:url(o.woff2)}",
            ".header{font:bold 700 16px/1.2 Oswald2, sans-serif}",
        ]),
        &page()?,
        desktop(),
        &ExtractOptions::default(),
    )?;
    assert_eq!(
        result.critical_css,
        "@font-face{font-family:Oswald2;src:url(o.woff2)}\n\
         .header{font:bold 700 16px/1.2 Oswald2, sans-serif}"
    );
    assert_eq!(result.deferred_css, "");
    Ok(())
}

#[test]
fn test_ignored_media_type_only_matches_required_types() -> anyhow::Result<()> {
    init();
    let result = extract_critical_css(
        &sheets(&[
            "@media not print{.header{color:red}}",
            "@layer print{.header{margin:0}}",
            "@media only print{.header{color:black}}",
        ]),
        &page()?,
        desktop(),
        &ExtractOptions::default().ignore_at_rule("print"),
    )?;
    assert_eq!(
        result.critical_css,
        "@media not print{.header{color:red}}\n@layer print{.header{margin:0}}"
    );
    assert_eq!(result.deferred_css, "@media only print{.header{color:black}}");
    assert_eq!(result.report[2].reason, Reason::IgnoredAtRule);
    Ok(())
}

#[test]
fn test_overrides() -> anyhow::Result<()> {
    init();
    let options = ExtractOptions::default()
        .force_include(".footer")
        .force_exclude("#x");
    let result = extract_critical_css(
        &sheets(&[".footer{color:blue} .card{color:red}"]),
        &page()?,
        desktop(),
        &options,
    )?;
    assert_eq!(result.critical_css, ".footer{color:blue}");
    assert_eq!(result.deferred_css, ".card{color:red}");
    Ok(())
}

#[test]
fn test_force_include_beats_force_exclude() -> anyhow::Result<()> {
    init();
    let options = ExtractOptions::default()
        .force_include("footer")
        .force_exclude(".footer");
    let result = extract_critical_css(
        &sheets(&[".footer{color:blue}"]),
        &page()?,
        desktop(),
        &options,
    )?;
    assert_eq!(result.critical_css, ".footer{color:blue}");
    Ok(())
}

#[test]
fn test_hidden_elements_are_not_critical() -> anyhow::Result<()> {
    init();
    let snapshot = DomSnapshot::new(vec![
        ElementSnapshot::new("root", "body").with_rect(Rect::new(0.0, 0.0, 800.0, 600.0)),
        ElementSnapshot::new("menu", "ul")
            .with_parent("root")
            .with_classes(&["menu"])
            .with_rect(Rect::new(0.0, 0.0, 200.0, 300.0))
            .hidden(),
        ElementSnapshot::new("item", "li")
            .with_parent("menu")
            .with_classes(&["item"])
            .with_rect(Rect::new(0.0, 0.0, 200.0, 30.0)),
    ])?;
    let result = extract_critical_css(
        &sheets(&[".menu{display:none} .item{color:red} body{margin:0}"]),
        &snapshot,
        Viewport::new(800.0, 600.0),
        &ExtractOptions::default(),
    )?;
    assert_eq!(result.critical_css, "body{margin:0}");
    assert_eq!(result.deferred_css, ".menu{display:none}\n.item{color:red}");
    Ok(())
}

#[test]
fn test_non_fatal_issues_become_warnings() -> anyhow::Result<()> {
    init();
    let snapshot = DomSnapshot::new(vec![
        ElementSnapshot::new("root", "body").with_rect(Rect::new(0.0, 0.0, 800.0, 600.0)),
        ElementSnapshot::new("ghost", "div").with_parent("root"),
    ])?;
    let result = extract_critical_css(
        &sheets(&[".a{color red} body:-moz-focusring{outline:0} @tailwind base;"]),
        &snapshot,
        Viewport::new(800.0, 600.0),
        &ExtractOptions::default().force_exclude("div >"),
    )?;
    let kinds: Vec<_> = result.warnings.iter().map(|w| w.kind).collect();
    assert_eq!(
        kinds,
        [
            WarningKind::Parse,
            WarningKind::InvalidOverride,
            WarningKind::GeometryMissing,
            WarningKind::UnsupportedSelector,
            WarningKind::UnsupportedAtRule,
        ]
    );
    assert_eq!(result.report[1].included, Inclusion::Both);
    assert_eq!(result.report[2].included, Inclusion::Both);
    Ok(())
}

#[test]
fn test_empty_input_is_fatal() -> anyhow::Result<()> {
    let err = extract_critical_css(&[], &page()?, desktop(), &ExtractOptions::default())
        .unwrap_err();
    assert!(matches!(err, ExtractError::EmptyInput(_)));

    let empty = DomSnapshot::new(Vec::new())?;
    let err = extract_critical_css(
        &sheets(&[".a{x:1}"]),
        &empty,
        desktop(),
        &ExtractOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ExtractError::EmptyInput(_)));
    Ok(())
}

#[test]
fn test_request_document_round_trip() -> anyhow::Result<()> {
    init();
    let request = ExtractionRequest::from_json(
        r#"{
            "stylesheets": [
                {"fileId": "a.css", "cssText": ".hero{color:red}"},
                {"fileId": "b.css", "cssText": "@media print{.hero{color:black}} .below{margin:0}"}
            ],
            "domSnapshot": [
                {"id": 1, "tag": "body", "rect": {"x": 0, "y": 0, "w": 1024, "h": 4000}},
                {"id": 2, "tag": "section", "classes": ["hero"], "parentId": 1,
                 "rect": {"x": 0, "y": 0, "w": 1024, "h": 600}},
                {"id": 3, "tag": "section", "classes": ["below"], "parentId": 1,
                 "rect": {"x": 0, "y": 3000, "w": 1024, "h": 600}}
            ],
            "viewport": {"width": 1024, "height": 768},
            "options": {"ignoreAtRules": ["print"], "loadingStrategy": "media-swap"}
        }"#,
    )?;
    let result = request.run()?;
    assert_eq!(result.critical_css, ".hero{color:red}");
    assert_eq!(result.deferred_css, "@media print{.hero{color:black}}\n.below{margin:0}");
    assert_eq!(result.loading.strategy, LoadingStrategy::MediaSwap);
    assert_eq!(result.loading.critical_bytes, result.critical_css.len());
    assert!(result.loading.has_deferred);
    assert_eq!(result.report[2].file_id, "b.css");

    let report: serde_json::Value = serde_json::from_str(&result.report_json()?)?;
    assert_eq!(report[0]["reason"]["kind"], "matched-critical-element");
    assert_eq!(report[0]["reason"]["elementId"], "2");
    assert_eq!(report[1]["reason"]["kind"], "ignored-at-rule");
    assert_eq!(report[1]["selectorText"], ".hero");
    Ok(())
}

#[test]
fn test_bad_requests() {
    let err = ExtractionRequest::from_json("{\"stylesheets\": 3}").unwrap_err();
    assert!(matches!(err, ExtractError::Request(_)));

    let request = ExtractionRequest::from_json(
        r#"{"stylesheets": [{"fileId": "a", "cssText": ""}],
            "domSnapshot": [{"id": "a", "tag": "div", "parentId": "missing"}],
            "viewport": {"width": 10, "height": 10}}"#,
    )
    .unwrap();
    assert!(matches!(request.run().unwrap_err(), ExtractError::Snapshot(_)));
}
