//! Critical CSS extraction for the foldline engine.
//!
//! # Scope
//!
//! This crate provides:
//! - **Visibility Classifier** - label snapshot elements above the fold
//! - **At-Rule Resolver** - decide `@media`/`@supports`/`@layer` wrappers at the viewport
//! - **Extraction Orchestrator** - partition rules into critical and deferred bundles
//! - **Reference Tracking** - pull in the `@font-face`/`@keyframes` rules critical
//!   declarations name
//! - **Inclusion Report** - per-rule placement with reasons, plus a loading descriptor
//!
//! # Not Implemented
//!
//! - Fetching stylesheets, flattening `@import`, rendering the page
//! - Emitting `<style>`/`<link>` markup for the loading strategy
//!
//! # Example
//!
//! ```
//! use foldline_extract::{ExtractOptions, extract_critical_css};
//! use foldline_extract::css::StylesheetInput;
//! use foldline_extract::dom::{DomSnapshot, ElementSnapshot, Rect, Viewport};
//!
//! let snapshot = DomSnapshot::new(vec![
//!     ElementSnapshot::new("title", "h1")
//!         .with_classes(&["header"])
//!         .with_rect(Rect::new(0.0, 0.0, 800.0, 80.0)),
//! ])
//! .unwrap();
//! let sheets = [StylesheetInput::new("app.css", ".header{color:red} .footer{color:blue}")];
//! let result = extract_critical_css(
//!     &sheets,
//!     &snapshot,
//!     Viewport::new(800.0, 600.0),
//!     &ExtractOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(result.critical_css, ".header{color:red}");
//! assert_eq!(result.deferred_css, ".footer{color:blue}");
//! ```

pub mod classifier;
pub mod error;
pub mod options;
pub mod orchestrator;
pub mod references;
pub mod report;
pub mod resolver;

pub use foldline_common as common;
pub use foldline_css as css;
pub use foldline_dom as dom;

pub use classifier::{CriticalSet, SelectorOverrides, classify};
pub use error::ExtractError;
pub use options::{ExtractOptions, LoadingStrategy};
pub use orchestrator::{Extractor, Partition, RuleDecision};
pub use report::{ExtractionResult, Inclusion, LoadingDescriptor, Reason, ReportEntry};
pub use resolver::{AtRuleResolver, Resolution};

use foldline_common::{Diagnostics, Warning};
use foldline_css::parser::{StylesheetInput, parse_stylesheets};
use foldline_dom::{DomSnapshot, ElementSnapshot, Viewport};
use serde::Deserialize;

/// Run the whole pipeline: parse, classify, partition, serialize, report.
///
/// Identical inputs always produce byte-identical output.
///
/// # Errors
///
/// Returns [`ExtractError::EmptyInput`] when there are no stylesheets or
/// the snapshot has no elements. Nothing else is fatal: every other issue
/// is returned in [`ExtractionResult::warnings`].
pub fn extract_critical_css(
    stylesheets: &[StylesheetInput],
    snapshot: &DomSnapshot,
    viewport: Viewport,
    options: &ExtractOptions,
) -> Result<ExtractionResult, ExtractError> {
    if stylesheets.is_empty() {
        return Err(ExtractError::EmptyInput("no stylesheets"));
    }
    if snapshot.is_empty() {
        return Err(ExtractError::EmptyInput("empty DOM snapshot"));
    }
    log::debug!(
        "extracting critical CSS from {} stylesheets for {} elements at {}x{}",
        stylesheets.len(),
        snapshot.len(),
        viewport.width,
        viewport.height
    );

    let mut diagnostics = Diagnostics::new();

    // STEP 1: Parse every stylesheet with one shared source index counter.
    let (stylesheet, parse_warnings) = parse_stylesheets(stylesheets);
    diagnostics.extend(parse_warnings.into_iter().map(Warning::from));

    // STEP 2: Label the critical elements.
    let overrides = SelectorOverrides::parse(options, &mut diagnostics);
    let critical = classify(snapshot, viewport, &overrides, &mut diagnostics);

    // STEP 3: Partition.
    let partition = Extractor::new(snapshot, &critical, &overrides, viewport, options)
        .extract(&stylesheet, &mut diagnostics);

    // STEP 4: Serialize and report.
    let critical_css = partition.critical_css();
    let deferred_css = partition.deferred_css();
    let loading = LoadingDescriptor::new(options.loading_strategy, &critical_css, &deferred_css);
    Ok(ExtractionResult {
        report: report::build_report(&partition),
        critical_css,
        deferred_css,
        warnings: diagnostics.into_warnings(),
        loading,
    })
}

/// A complete extraction request as one JSON document:
///
/// ```json
/// {
///   "stylesheets": [{ "fileId": "app.css", "cssText": ".a{color:red}" }],
///   "domSnapshot": [{ "id": 1, "tag": "div", "classes": ["a"],
///                     "rect": { "x": 0, "y": 0, "w": 100, "h": 50 } }],
///   "viewport": { "width": 1300, "height": 900 },
///   "options": { "ignoreAtRules": ["print"] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    /// Stylesheets in cascade order, `@import`s already flattened.
    pub stylesheets: Vec<StylesheetInput>,
    /// Rendered elements in document order.
    pub dom_snapshot: Vec<ElementSnapshot>,
    /// The viewport the snapshot was taken at.
    pub viewport: Viewport,
    /// Extraction options.
    #[serde(default)]
    pub options: ExtractOptions,
}

impl ExtractionRequest {
    /// Parse a request document.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Request`] if the document does not match the
    /// request schema.
    pub fn from_json(json: &str) -> Result<Self, ExtractError> {
        serde_json::from_str(json).map_err(ExtractError::Request)
    }

    /// Build the snapshot and run the extraction.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is not a valid tree, or for the
    /// reasons [`extract_critical_css`] fails.
    pub fn run(self) -> Result<ExtractionResult, ExtractError> {
        let snapshot = DomSnapshot::new(self.dom_snapshot)?;
        extract_critical_css(&self.stylesheets, &snapshot, self.viewport, &self.options)
    }
}
