//! Extraction Orchestrator: partitions the rules of a run.
//!
//! The pipeline runs in three passes over the rules in source order:
//!
//! 1. Resolve every rule's at-rule chain against the viewport.
//! 2. Match each style rule against the critical elements, stopping at the
//!    first element that matches. This pass has no side effects and runs on
//!    the rayon pool when the `parallel` feature is on.
//! 3. Place each rule, then include the `@font-face`, `@keyframes`, ...
//!    rules that the critical declarations reference, until no new
//!    reference appears.
//!
//! The input rules are never modified; the partitions are views over them
//! and keep their source order.

use foldline_common::{Diagnostics, WarningKind};
use foldline_css::parser::{AtRuleKind, Rule, RuleKind, Stylesheet};
use foldline_css::selector::{MatchResult, Selector, match_selector};
use foldline_css::serialize::serialize_rules;
use foldline_dom::{DomSnapshot, NodeIndex, Viewport};

use crate::classifier::{CriticalSet, SelectorOverrides};
use crate::options::ExtractOptions;
use crate::references::{References, is_reference_tracked};
use crate::report::{Inclusion, Reason};
use crate::resolver::{AtRuleResolver, Exclusion, Resolution};

/// Where one rule went, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecision<'a> {
    /// The rule, borrowed from the parsed stylesheet.
    pub rule: &'a Rule,
    /// Which bundle(s) it is emitted in.
    pub included: Inclusion,
    /// Why.
    pub reason: Reason,
}

/// The outcome of one run: a decision per rule, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partition<'a> {
    decisions: Vec<RuleDecision<'a>>,
}

impl<'a> Partition<'a> {
    /// Every decision, in source order.
    #[must_use]
    pub fn decisions(&self) -> &[RuleDecision<'a>] {
        &self.decisions
    }

    /// Rules of the critical bundle, in source order.
    pub fn critical_rules(&self) -> impl Iterator<Item = &'a Rule> + '_ {
        self.decisions
            .iter()
            .filter(|d| d.included.in_critical())
            .map(|d| d.rule)
    }

    /// Rules of the deferred bundle, in source order.
    pub fn deferred_rules(&self) -> impl Iterator<Item = &'a Rule> + '_ {
        self.decisions
            .iter()
            .filter(|d| d.included.in_deferred())
            .map(|d| d.rule)
    }

    /// The critical bundle as CSS text.
    #[must_use]
    pub fn critical_css(&self) -> String {
        serialize_rules(self.critical_rules())
    }

    /// The deferred bundle as CSS text.
    #[must_use]
    pub fn deferred_css(&self) -> String {
        serialize_rules(self.deferred_rules())
    }
}

/// The first critical element a style rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CriticalMatch {
    element: NodeIndex,
    conservative: bool,
}

/// Everything fixed for a run: the snapshot, its critical elements and the
/// caller's options.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'r> {
    snapshot: &'r DomSnapshot,
    critical: &'r CriticalSet,
    overrides: &'r SelectorOverrides,
    viewport: Viewport,
    options: &'r ExtractOptions,
}

impl<'r> Extractor<'r> {
    /// Set up a run.
    #[must_use]
    pub const fn new(
        snapshot: &'r DomSnapshot,
        critical: &'r CriticalSet,
        overrides: &'r SelectorOverrides,
        viewport: Viewport,
        options: &'r ExtractOptions,
    ) -> Self {
        Self {
            snapshot,
            critical,
            overrides,
            viewport,
            options,
        }
    }

    /// Partition the rules of `stylesheet` into critical and deferred.
    pub fn extract<'a>(&self, stylesheet: &'a Stylesheet, diagnostics: &mut Diagnostics) -> Partition<'a> {
        let rules = &stylesheet.rules;

        // STEP 1: Resolve at-rule chains.
        let mut resolver = AtRuleResolver::new(self.viewport, self.options);
        let resolutions: Vec<Resolution> = rules
            .iter()
            .map(|rule| resolver.resolve(&rule.at_rule_chain, rule.source_index, diagnostics))
            .collect();

        // STEP 2: Match style rules against critical elements.
        let matches = self.match_rules(rules, &resolutions);

        // STEP 3: Place every rule that does not wait on a reference.
        let mut placements: Vec<Option<(Inclusion, Reason)>> = rules
            .iter()
            .zip(&resolutions)
            .zip(&matches)
            .map(|((rule, &resolution), &matched)| self.place(rule, resolution, matched, diagnostics))
            .collect();

        // STEP 4: Include referenced at-rules until nothing changes.
        let mut references = References::new();
        for (rule, placement) in rules.iter().zip(&placements) {
            if placement.as_ref().is_some_and(|(included, _)| included.in_critical()) {
                references.collect_rule(rule);
            }
        }
        loop {
            let mut changed = false;
            for (i, rule) in rules.iter().enumerate() {
                if placements[i].is_none() && references.references(rule) {
                    placements[i] = Some((hit(resolutions[i]), Reason::Referenced));
                    references.collect_rule(rule);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let decisions: Vec<RuleDecision<'a>> = rules
            .iter()
            .zip(placements)
            .map(|(rule, placement)| {
                let (included, reason) =
                    placement.unwrap_or((Inclusion::Deferred, Reason::Unreferenced));
                RuleDecision {
                    rule,
                    included,
                    reason,
                }
            })
            .collect();

        log::debug!(
            "partitioned {} rules: {} critical, {} deferred",
            decisions.len(),
            decisions.iter().filter(|d| d.included.in_critical()).count(),
            decisions.iter().filter(|d| d.included.in_deferred()).count(),
        );
        Partition { decisions }
    }

    #[cfg(feature = "parallel")]
    fn match_rules(&self, rules: &[Rule], resolutions: &[Resolution]) -> Vec<Option<CriticalMatch>> {
        use rayon::prelude::*;

        // Indexed collect keeps the input order.
        rules
            .par_iter()
            .zip(resolutions.par_iter())
            .map(|(rule, &resolution)| self.first_critical_match(rule, resolution))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn match_rules(&self, rules: &[Rule], resolutions: &[Resolution]) -> Vec<Option<CriticalMatch>> {
        rules
            .iter()
            .zip(resolutions)
            .map(|(rule, &resolution)| self.first_critical_match(rule, resolution))
            .collect()
    }

    /// Scan critical elements in document order; stop at the first
    /// one any selector of the rule could match.
    fn first_critical_match(&self, rule: &Rule, resolution: Resolution) -> Option<CriticalMatch> {
        if rule.kind != RuleKind::Style || matches!(resolution, Resolution::Excluded(_)) {
            return None;
        }
        self.critical.iter().find_map(|element| {
            let best = rule
                .selectors
                .iter()
                .map(|selector| match_selector(selector, element, self.snapshot))
                .max()
                .unwrap_or(MatchResult::No);
            best.is_match().then_some(CriticalMatch {
                element,
                conservative: best == MatchResult::Maybe,
            })
        })
    }

    /// Decide a rule, or `None` for an at-rule that is included only when
    /// referenced.
    fn place(
        &self,
        rule: &Rule,
        resolution: Resolution,
        matched: Option<CriticalMatch>,
        diagnostics: &mut Diagnostics,
    ) -> Option<(Inclusion, Reason)> {
        if let Resolution::Excluded(exclusion) = resolution {
            let reason = match exclusion {
                Exclusion::IgnoredAtRule => Reason::IgnoredAtRule,
                Exclusion::ConditionFalse => Reason::MediaMismatch,
            };
            return Some((Inclusion::Deferred, reason));
        }
        let Some(frame) = rule.at_rule() else {
            return Some(self.place_style_rule(rule, resolution, matched, diagnostics));
        };
        if is_reference_tracked(rule) {
            return None;
        }
        Some(match (frame.kind, rule.kind) {
            (AtRuleKind::Page, _) => (Inclusion::Deferred, Reason::PagedMedia),
            (AtRuleKind::Layer | AtRuleKind::Namespace, RuleKind::AtStatement) => {
                (Inclusion::Both, Reason::CascadeDefining)
            }
            _ => {
                diagnostics.warn(
                    WarningKind::UnsupportedAtRule,
                    Some(rule.source_index),
                    format!("'{}' is not understood; kept in both bundles", frame.header()),
                );
                (Inclusion::Both, Reason::UnsupportedAtRule)
            }
        })
    }

    fn place_style_rule(
        &self,
        rule: &Rule,
        resolution: Resolution,
        matched: Option<CriticalMatch>,
        diagnostics: &mut Diagnostics,
    ) -> (Inclusion, Reason) {
        let unsupported: Vec<&str> = rule
            .selectors
            .iter()
            .flat_map(Selector::unsupported_pseudo_classes)
            .collect();
        if !unsupported.is_empty() {
            diagnostics.warn(
                WarningKind::UnsupportedSelector,
                Some(rule.source_index),
                format!(
                    "'{}' uses unsupported pseudo-class :{}; kept in both bundles",
                    rule.selector_text(),
                    unsupported.join(", :")
                ),
            );
        }

        if self.overrides.names_rule(&rule.selectors) {
            return (hit(resolution), Reason::ForcedInclude);
        }
        if !unsupported.is_empty() {
            return (Inclusion::Both, Reason::UnsupportedSelector);
        }
        if let Some(matched) = matched {
            let element_id = self.snapshot.element(matched.element).id.clone();
            log::trace!("'{}' matches critical element '{element_id}'", rule.selector_text());
            return (
                hit(resolution),
                Reason::MatchedCriticalElement {
                    element_id,
                    conservative: matched.conservative,
                },
            );
        }
        if resolution == Resolution::Ambiguous && !self.options.prune_unmatched_ambiguous {
            return (Inclusion::Both, Reason::AmbiguousCondition);
        }
        (Inclusion::Deferred, Reason::NoCriticalMatch)
    }
}

/// Where a rule that belongs in the critical bundle goes: a rule under an
/// undecidable condition goes to both.
const fn hit(resolution: Resolution) -> Inclusion {
    match resolution {
        Resolution::Ambiguous => Inclusion::Both,
        _ => Inclusion::Critical,
    }
}

#[cfg(test)]
mod tests {
    use foldline_css::parser::parse;
    use foldline_dom::{ElementSnapshot, Rect};

    use super::*;

    fn run(css: &str, options: &ExtractOptions) -> Vec<(Inclusion, Reason)> {
        let snapshot = DomSnapshot::new(vec![
            ElementSnapshot::new("body", "body").with_rect(Rect::new(0.0, 0.0, 1000.0, 3000.0)),
            ElementSnapshot::new("hero", "div")
                .with_parent("body")
                .with_classes(&["hero"])
                .with_rect(Rect::new(0.0, 0.0, 1000.0, 500.0)),
            ElementSnapshot::new("foot", "div")
                .with_parent("body")
                .with_classes(&["foot"])
                .with_rect(Rect::new(0.0, 2500.0, 1000.0, 500.0)),
        ])
        .unwrap();
        let viewport = Viewport::new(1000.0, 800.0);
        let mut diagnostics = Diagnostics::new();
        let overrides = SelectorOverrides::parse(options, &mut diagnostics);
        let critical = crate::classifier::classify(&snapshot, viewport, &overrides, &mut diagnostics);
        let (sheet, _) = parse(css, "t.css");
        let partition = Extractor::new(&snapshot, &critical, &overrides, viewport, options)
            .extract(&sheet, &mut diagnostics);
        partition
            .decisions()
            .iter()
            .map(|d| (d.included, d.reason.clone()))
            .collect()
    }

    #[test]
    fn test_first_matching_element_is_reported() {
        let decisions = run("div{x:1}", &ExtractOptions::default());
        assert_eq!(
            decisions[0],
            (
                Inclusion::Critical,
                Reason::MatchedCriticalElement {
                    element_id: "hero".into(),
                    conservative: false
                }
            )
        );
    }

    #[test]
    fn test_interactive_pseudo_class_is_conservative() {
        let decisions = run(".hero:hover{x:1}", &ExtractOptions::default());
        assert_eq!(decisions[0].0, Inclusion::Critical);
        assert!(matches!(
            decisions[0].1,
            Reason::MatchedCriticalElement { conservative: true, .. }
        ));
    }

    #[test]
    fn test_unmatched_ambiguous_rule_can_be_pruned() {
        let css = "@media (hover: hover){.foot{x:1}}";
        assert_eq!(
            run(css, &ExtractOptions::default())[0],
            (Inclusion::Both, Reason::AmbiguousCondition)
        );
        let options = ExtractOptions {
            prune_unmatched_ambiguous: true,
            ..ExtractOptions::default()
        };
        assert_eq!(run(css, &options)[0], (Inclusion::Deferred, Reason::NoCriticalMatch));
    }

    #[test]
    fn test_forced_selector_text() {
        let options = ExtractOptions::default().force_include(".modal");
        let decisions = run(".modal{x:1}.foot{y:2}", &options);
        assert_eq!(decisions[0], (Inclusion::Critical, Reason::ForcedInclude));
        assert_eq!(decisions[1], (Inclusion::Deferred, Reason::NoCriticalMatch));
    }

    #[test]
    fn test_at_rule_policies() {
        let decisions = run(
            "@layer a, b; @page{margin:0} @tailwind base; @font-face{font-family:Unused}",
            &ExtractOptions::default(),
        );
        assert_eq!(decisions[0], (Inclusion::Both, Reason::CascadeDefining));
        assert_eq!(decisions[1], (Inclusion::Deferred, Reason::PagedMedia));
        assert_eq!(decisions[2], (Inclusion::Both, Reason::UnsupportedAtRule));
        assert_eq!(decisions[3], (Inclusion::Deferred, Reason::Unreferenced));
    }

    #[test]
    fn test_references_reach_a_fixpoint() {
        let decisions = run(
            "@font-palette-values --brand{font-family:Brand}\
             @font-face{font-family:Brand}\
             .hero{font-palette:--brand}",
            &ExtractOptions::default(),
        );
        assert_eq!(decisions[0], (Inclusion::Critical, Reason::Referenced));
        assert_eq!(decisions[1], (Inclusion::Critical, Reason::Referenced));
    }
}
