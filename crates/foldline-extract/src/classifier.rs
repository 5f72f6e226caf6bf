//! Visibility Classifier: which elements are above the fold.
//!
//! An element is critical when it is rendered (neither it nor an ancestor
//! has `display: none`), its rect overlaps the viewport with positive area,
//! and no `forceExclude` selector matches it. A `forceInclude` match makes
//! it critical whatever its geometry, and wins over `forceExclude`.

use std::collections::BTreeSet;

use foldline_common::{Diagnostics, WarningKind};
use foldline_css::selector::{MatchResult, Selector, match_selector, parse_selector_list_str};
use foldline_dom::{DomSnapshot, NodeIndex, Viewport};

use crate::options::ExtractOptions;

/// The parsed `forceInclude`/`forceExclude` selectors of one run.
#[derive(Debug, Clone, Default)]
pub struct SelectorOverrides {
    include: Vec<Selector>,
    exclude: Vec<Selector>,
    include_texts: Vec<String>,
}

impl SelectorOverrides {
    /// Parse the override lists of `options`. Entries that are not valid
    /// selector lists are reported and skipped.
    pub fn parse(options: &ExtractOptions, diagnostics: &mut Diagnostics) -> Self {
        let mut overrides = Self::default();
        for entry in &options.force_include {
            if let Some(selectors) = parse_override("forceInclude", entry, diagnostics) {
                overrides.include.extend(selectors);
                overrides.include_texts.push(normalize_whitespace(entry));
            }
        }
        for entry in &options.force_exclude {
            if let Some(selectors) = parse_override("forceExclude", entry, diagnostics) {
                overrides.exclude.extend(selectors);
            }
        }
        overrides
    }

    /// Whether some `forceInclude` selector could match the element.
    #[must_use]
    pub fn includes(&self, element: NodeIndex, snapshot: &DomSnapshot) -> bool {
        self.include
            .iter()
            .any(|s| match_selector(s, element, snapshot).is_match())
    }

    /// Whether some `forceExclude` selector definitely matches the element.
    ///
    /// A `Maybe` match does not exclude: exclusion has to be certain.
    #[must_use]
    pub fn excludes(&self, element: NodeIndex, snapshot: &DomSnapshot) -> bool {
        self.exclude
            .iter()
            .any(|s| match_selector(s, element, snapshot) == MatchResult::Yes)
    }

    /// Whether a rule with the given selector list was named verbatim in
    /// `forceInclude`, either whole or one selector at a time.
    #[must_use]
    pub fn names_rule(&self, selectors: &[Selector]) -> bool {
        if self.include_texts.is_empty() || selectors.is_empty() {
            return false;
        }
        let whole = selectors
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        self.include_texts
            .iter()
            .any(|text| *text == whole || selectors.iter().any(|s| s.text == *text))
    }
}

fn parse_override(
    option: &str,
    entry: &str,
    diagnostics: &mut Diagnostics,
) -> Option<Vec<Selector>> {
    match parse_selector_list_str(entry) {
        Ok(selectors) => Some(selectors),
        Err(err) => {
            diagnostics.warn(
                WarningKind::InvalidOverride,
                None,
                format!("{option} entry '{entry}' ignored: {err}"),
            );
            None
        }
    }
}

/// Collapse whitespace runs to one space and trim, the way selector text is
/// stored on parsed rules.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The elements labelled critical for one run, in document order.
///
/// Built once by [`classify`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CriticalSet {
    elements: BTreeSet<NodeIndex>,
}

impl CriticalSet {
    /// Whether the element is critical.
    #[must_use]
    pub fn contains(&self, element: NodeIndex) -> bool {
        self.elements.contains(&element)
    }

    /// Number of critical elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether no element is critical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Critical elements in document order.
    pub fn iter(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.elements.iter().copied()
    }
}

impl FromIterator<NodeIndex> for CriticalSet {
    fn from_iter<T: IntoIterator<Item = NodeIndex>>(iter: T) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

/// Label every element of `snapshot` critical or not.
///
/// Elements without a rect are non-critical (unless force-included) and get
/// a [`WarningKind::GeometryMissing`] warning.
pub fn classify(
    snapshot: &DomSnapshot,
    viewport: Viewport,
    overrides: &SelectorOverrides,
    diagnostics: &mut Diagnostics,
) -> CriticalSet {
    let fold = viewport.rect();

    let critical: CriticalSet = snapshot
        .indices()
        .filter(|&index| {
            let element = snapshot.element(index);
            let is_hidden = element.display_none
                || snapshot
                    .ancestors(index)
                    .any(|ancestor| snapshot.element(ancestor).display_none);

            if overrides.includes(index, snapshot) {
                return true;
            }
            if is_hidden {
                return false;
            }
            let Some(rect) = element.rect else {
                diagnostics.warn(
                    WarningKind::GeometryMissing,
                    None,
                    format!("element '{}' has no rect; treated as below the fold", element.id),
                );
                return false;
            };
            rect.intersects(&fold) && !overrides.excludes(index, snapshot)
        })
        .collect();

    log::debug!(
        "classified {} of {} elements as critical",
        critical.len(),
        snapshot.len()
    );
    critical
}

#[cfg(test)]
mod tests {
    use foldline_dom::{ElementSnapshot, Rect};

    use super::*;

    fn snapshot() -> DomSnapshot {
        DomSnapshot::new(vec![
            ElementSnapshot::new("root", "body").with_rect(Rect::new(0.0, 0.0, 800.0, 3000.0)),
            ElementSnapshot::new("top", "div")
                .with_parent("root")
                .with_classes(&["top"])
                .with_rect(Rect::new(0.0, 0.0, 800.0, 100.0)),
            ElementSnapshot::new("below", "div")
                .with_parent("root")
                .with_classes(&["below"])
                .with_rect(Rect::new(0.0, 2000.0, 800.0, 100.0)),
        ])
        .unwrap()
    }

    #[test]
    fn test_geometry_decides_by_default() {
        let snapshot = snapshot();
        let mut diagnostics = Diagnostics::new();
        let set = classify(
            &snapshot,
            Viewport::new(800.0, 600.0),
            &SelectorOverrides::default(),
            &mut diagnostics,
        );
        let ids: Vec<_> = set.iter().map(|i| snapshot.element(i).id.as_str()).collect();
        assert_eq!(ids, ["root", "top"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_invalid_override_is_reported() {
        let mut diagnostics = Diagnostics::new();
        let options = ExtractOptions::default().force_include("a >").force_include(".ok");
        let overrides = SelectorOverrides::parse(&options, &mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.warnings()[0].kind, WarningKind::InvalidOverride);
        assert_eq!(overrides.include.len(), 1);
    }

    #[test]
    fn test_names_rule_normalises_whitespace() {
        let mut diagnostics = Diagnostics::new();
        let options = ExtractOptions::default().force_include(".modal   .title");
        let overrides = SelectorOverrides::parse(&options, &mut diagnostics);
        let selectors = parse_selector_list_str(".modal .title, .x").unwrap();
        assert!(overrides.names_rule(&selectors));
        let selectors = parse_selector_list_str(".title").unwrap();
        assert!(!overrides.names_rule(&selectors));
    }
}
