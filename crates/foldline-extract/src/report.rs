//! Inclusion report and run output.

use foldline_common::Warning;
use foldline_css::selector::Specificity;
use foldline_dom::ElementId;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::options::LoadingStrategy;
use crate::orchestrator::Partition;

/// Which bundle(s) a rule went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Inclusion {
    /// The critical bundle only.
    Critical,
    /// The deferred bundle only.
    Deferred,
    /// Both bundles: the engine could not decide.
    Both,
}

impl Inclusion {
    /// Whether the rule is emitted in the critical bundle.
    #[must_use]
    pub const fn in_critical(self) -> bool {
        matches!(self, Self::Critical | Self::Both)
    }

    /// Whether the rule is emitted in the deferred bundle.
    #[must_use]
    pub const fn in_deferred(self) -> bool {
        matches!(self, Self::Deferred | Self::Both)
    }
}

/// Why a rule was placed where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Display)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Reason {
    /// A selector matched a critical element.
    MatchedCriticalElement {
        /// The first critical element, in document order, that matched.
        #[serde(rename = "elementId")]
        element_id: ElementId,
        /// The match relied on a pseudo-class that cannot be decided
        /// statically (`:hover`, ...).
        conservative: bool,
    },
    /// The selector text or a matched element was named in `forceInclude`.
    ForcedInclude,
    /// No selector matched any critical element.
    NoCriticalMatch,
    /// A wrapping `@media`/`@supports` condition is false at the viewport.
    MediaMismatch,
    /// A wrapping at-rule is listed in `ignoreAtRules`.
    IgnoredAtRule,
    /// A wrapping condition cannot be decided statically.
    AmbiguousCondition,
    /// The selector uses a pseudo-class the matcher does not know.
    UnsupportedSelector,
    /// The at-rule is not understood and was kept verbatim.
    UnsupportedAtRule,
    /// A critical declaration names this at-rule.
    Referenced,
    /// No critical declaration names this at-rule.
    Unreferenced,
    /// `@page` only affects printing.
    PagedMedia,
    /// `@layer` order or `@namespace` prefixes that every bundle needs.
    CascadeDefining,
}

/// One line of the inclusion report, per parsed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    /// The rule's position in the concatenated input.
    pub source_index: usize,
    /// The stylesheet the rule came from.
    pub file_id: String,
    /// Selector list, or at-rule header for at-rules.
    pub selector_text: String,
    /// Where the rule went.
    pub included: Inclusion,
    /// Why.
    pub reason: Reason,
    /// Specificity of each selector, `[a, b, c]`. Empty for at-rules.
    pub specificity: Vec<Specificity>,
}

/// One report entry per rule of `partition`, in source order.
#[must_use]
pub fn build_report(partition: &Partition<'_>) -> Vec<ReportEntry> {
    partition
        .decisions()
        .iter()
        .map(|decision| ReportEntry {
            source_index: decision.rule.source_index,
            file_id: decision.rule.file_id.clone(),
            selector_text: decision.rule.selector_text(),
            included: decision.included,
            reason: decision.reason.clone(),
            specificity: decision.rule.selectors.iter().map(|s| s.specificity).collect(),
        })
        .collect()
}

/// How to deliver the two bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingDescriptor {
    /// The strategy the caller asked for.
    pub strategy: LoadingStrategy,
    /// Size of the critical bundle in bytes.
    pub critical_bytes: usize,
    /// Size of the deferred bundle in bytes.
    pub deferred_bytes: usize,
    /// Whether there is a deferred bundle to load at all.
    pub has_deferred: bool,
}

impl LoadingDescriptor {
    /// Describe the two bundles.
    #[must_use]
    pub const fn new(strategy: LoadingStrategy, critical_css: &str, deferred_css: &str) -> Self {
        Self {
            strategy,
            critical_bytes: critical_css.len(),
            deferred_bytes: deferred_css.len(),
            has_deferred: !deferred_css.is_empty(),
        }
    }
}

/// Everything one extraction run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// CSS to inline in the document head.
    pub critical_css: String,
    /// CSS to load after first paint.
    pub deferred_css: String,
    /// One entry per parsed rule, in source order.
    pub report: Vec<ReportEntry>,
    /// Every non-fatal issue, in the order found.
    pub warnings: Vec<Warning>,
    /// Delivery hints.
    pub loading: LoadingDescriptor,
}

impl ExtractionResult {
    /// The report entry of the rule at `source_index`.
    #[must_use]
    pub fn entry(&self, source_index: usize) -> Option<&ReportEntry> {
        self.report
            .binary_search_by_key(&source_index, |e| e.source_index)
            .ok()
            .map(|i| &self.report[i])
    }

    /// The report rendered as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn report_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.report)
    }

    /// The whole result rendered as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serializes_as_tagged_kebab_case() {
        let reason = Reason::MatchedCriticalElement {
            element_id: ElementId::from("hero"),
            conservative: false,
        };
        assert_eq!(
            serde_json::to_string(&reason).unwrap(),
            r#"{"kind":"matched-critical-element","elementId":"hero","conservative":false}"#
        );
        assert_eq!(
            serde_json::to_string(&Reason::PagedMedia).unwrap(),
            r#"{"kind":"paged-media"}"#
        );
        assert_eq!(Reason::NoCriticalMatch.to_string(), "no-critical-match");
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = ReportEntry {
            source_index: 3,
            file_id: "a.css".to_string(),
            selector_text: "#x".to_string(),
            included: Inclusion::Both,
            reason: Reason::AmbiguousCondition,
            specificity: vec![Specificity::new(1, 0, 0)],
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["sourceIndex"], 3);
        assert_eq!(json["included"], "both");
        assert_eq!(json["specificity"], serde_json::json!([[1, 0, 0]]));
    }

    #[test]
    fn test_loading_descriptor() {
        let loading = LoadingDescriptor::new(LoadingStrategy::Defer, ".a{x:1}", "");
        assert_eq!(loading.critical_bytes, 7);
        assert!(!loading.has_deferred);
    }
}
