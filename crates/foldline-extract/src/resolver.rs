//! Cascade / At-Rule Resolver.
//!
//! Walks a rule's chain of wrapping at-rules outermost first and decides
//! whether the rule can apply at the target viewport. `@media` is evaluated
//! statically, `@supports` and the container-like at-rules cannot be, and
//! `@layer` never changes whether a rule applies.

use std::collections::HashMap;

use foldline_common::{Diagnostics, WarningKind};
use foldline_css::media::{Evaluation, MediaContext, evaluate_supports, required_media_types};
use foldline_css::parser::{AtRuleFrame, AtRuleKind, FrameId};
use foldline_dom::Viewport;

use crate::options::ExtractOptions;

/// Whether the wrappers of a rule let it apply at the target viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Every condition holds.
    Applies,
    /// Some condition cannot be decided statically; none is known false.
    Ambiguous,
    /// The rule never applies at the target viewport.
    Excluded(Exclusion),
}

/// Why a rule was [`Resolution::Excluded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// A frame is named in `ignoreAtRules`.
    IgnoredAtRule,
    /// A `@media` or `@supports` condition is false.
    ConditionFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameOutcome {
    Transparent,
    Known(Evaluation),
    Ignored,
}

/// Resolves at-rule chains for one run, evaluating each at-rule
/// occurrence once.
#[derive(Debug)]
pub struct AtRuleResolver<'a> {
    media: MediaContext,
    options: &'a ExtractOptions,
    outcomes: HashMap<FrameId, FrameOutcome>,
}

impl<'a> AtRuleResolver<'a> {
    /// Create a resolver for the given viewport and options.
    #[must_use]
    pub fn new(viewport: Viewport, options: &'a ExtractOptions) -> Self {
        Self {
            media: MediaContext::screen(viewport),
            options,
            outcomes: HashMap::new(),
        }
    }

    /// [§ 3.1 Conditional group rules](https://www.w3.org/TR/css-conditional-3/#processing)
    ///
    /// "The condition of the rule is true if and only if ... the condition
    /// of every ancestor conditional group rule is true."
    ///
    /// `chain` is outermost first and may include the at-rule the rule
    /// itself is, so that `ignoreAtRules: ["font-face"]` reaches
    /// `@font-face`. Undecidable frames are reported against
    /// `source_index`.
    pub fn resolve(
        &mut self,
        chain: &[AtRuleFrame],
        source_index: usize,
        diagnostics: &mut Diagnostics,
    ) -> Resolution {
        let mut resolution = Resolution::Applies;
        for frame in chain {
            match self.frame_outcome(frame, source_index, diagnostics) {
                FrameOutcome::Ignored => return Resolution::Excluded(Exclusion::IgnoredAtRule),
                FrameOutcome::Known(Evaluation::False) => {
                    return Resolution::Excluded(Exclusion::ConditionFalse);
                }
                FrameOutcome::Known(Evaluation::Unknown) => {
                    diagnostics.warn(
                        WarningKind::AmbiguousCondition,
                        Some(source_index),
                        format!("'{}' cannot be decided statically", frame.header()),
                    );
                    resolution = Resolution::Ambiguous;
                }
                FrameOutcome::Known(Evaluation::True) | FrameOutcome::Transparent => {}
            }
        }
        resolution
    }

    fn frame_outcome(
        &mut self,
        frame: &AtRuleFrame,
        source_index: usize,
        diagnostics: &mut Diagnostics,
    ) -> FrameOutcome {
        if let Some(&outcome) = self.outcomes.get(&frame.id) {
            return outcome;
        }
        let outcome = self.evaluate_frame(frame, source_index, diagnostics);
        let _ = self.outcomes.insert(frame.id, outcome);
        outcome
    }

    fn evaluate_frame(
        &self,
        frame: &AtRuleFrame,
        source_index: usize,
        diagnostics: &mut Diagnostics,
    ) -> FrameOutcome {
        if self.is_ignored(frame) {
            log::trace!("'{}' matches ignoreAtRules", frame.header());
            return FrameOutcome::Ignored;
        }
        match frame.kind {
            AtRuleKind::Media => {
                let evaluation = self.media.evaluate_list(&frame.condition_text);
                if evaluation.malformed {
                    diagnostics.warn(
                        WarningKind::Parse,
                        Some(source_index),
                        format!("malformed media query in '{}' treated as 'not all'", frame.header()),
                    );
                }
                FrameOutcome::Known(evaluation.result)
            }
            AtRuleKind::Supports => FrameOutcome::Known(evaluate_supports(&frame.condition_text)),
            // Depend on the size of a query container or on the document
            // URL, neither of which the snapshot records.
            AtRuleKind::Container | AtRuleKind::Scope | AtRuleKind::Document => {
                FrameOutcome::Known(Evaluation::Unknown)
            }
            _ => FrameOutcome::Transparent,
        }
    }

    /// Whether `ignoreAtRules` names the frame's at-rule, or the media type
    /// every query of an `@media` list requires. Negated queries (`not
    /// print`) and layer or feature names never match.
    fn is_ignored(&self, frame: &AtRuleFrame) -> bool {
        if self.options.ignore_at_rules.is_empty() {
            return false;
        }
        if self.options.ignores(&frame.name) || self.options.ignores(frame.kind.as_ref()) {
            return true;
        }
        if frame.kind != AtRuleKind::Media {
            return false;
        }
        let types = required_media_types(&frame.condition_text);
        !types.is_empty()
            && types
                .iter()
                .all(|media_type| media_type.as_deref().is_some_and(|t| self.options.ignores(t)))
    }
}

#[cfg(test)]
mod tests {
    use foldline_css::parser::parse;

    use super::*;

    fn resolve_first(css: &str, options: &ExtractOptions) -> (Resolution, Diagnostics) {
        let (sheet, _) = parse(css, "t.css");
        let mut diagnostics = Diagnostics::new();
        let mut resolver = AtRuleResolver::new(Viewport::new(1300.0, 900.0), options);
        let rule = &sheet.rules[0];
        let resolution = resolver.resolve(&rule.at_rule_chain, rule.source_index, &mut diagnostics);
        (resolution, diagnostics)
    }

    #[test]
    fn test_top_level_rule_applies() {
        let (resolution, diagnostics) = resolve_first(".a{x:1}", &ExtractOptions::default());
        assert_eq!(resolution, Resolution::Applies);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_media_is_evaluated() {
        let options = ExtractOptions::default();
        let (resolution, _) = resolve_first("@media (min-width:768px){.a{x:1}}", &options);
        assert_eq!(resolution, Resolution::Applies);
        let (resolution, _) = resolve_first("@media print{.a{x:1}}", &options);
        assert_eq!(resolution, Resolution::Excluded(Exclusion::ConditionFalse));
    }

    #[test]
    fn test_false_beats_unknown() {
        let (resolution, diagnostics) = resolve_first(
            "@supports (display:grid){@media (max-width:500px){.a{x:1}}}",
            &ExtractOptions::default(),
        );
        assert_eq!(resolution, Resolution::Excluded(Exclusion::ConditionFalse));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_undecidable_conditions_are_ambiguous() {
        let options = ExtractOptions::default();
        for css in [
            "@media (prefers-color-scheme: dark){.a{x:1}}",
            "@supports (display:grid){.a{x:1}}",
            "@container (min-width: 400px){.a{x:1}}",
        ] {
            let (resolution, diagnostics) = resolve_first(css, &options);
            assert_eq!(resolution, Resolution::Ambiguous, "{css}");
            assert_eq!(diagnostics.warnings()[0].kind, WarningKind::AmbiguousCondition);
            assert_eq!(diagnostics.warnings()[0].rule_source_index, Some(0));
        }
    }

    #[test]
    fn test_layer_is_transparent() {
        let (resolution, _) = resolve_first("@layer base{.a{x:1}}", &ExtractOptions::default());
        assert_eq!(resolution, Resolution::Applies);
    }

    #[test]
    fn test_ignore_by_keyword_or_name() {
        let options = ExtractOptions::default().ignore_at_rule("print");
        let (resolution, _) = resolve_first("@media only print and (color){.a{x:1}}", &options);
        assert_eq!(resolution, Resolution::Excluded(Exclusion::IgnoredAtRule));

        let options = ExtractOptions::default().ignore_at_rule("font-face");
        let (resolution, _) = resolve_first("@font-face{font-family:X}", &options);
        assert_eq!(resolution, Resolution::Excluded(Exclusion::IgnoredAtRule));

        let options = ExtractOptions::default().ignore_at_rule("PRINT");
        let (resolution, _) = resolve_first("@media print, print and (color){.a{x:1}}", &options);
        assert_eq!(resolution, Resolution::Excluded(Exclusion::IgnoredAtRule));

        let options = ExtractOptions::default().ignore_at_rule("supports");
        let (resolution, diagnostics) = resolve_first("@supports (display:grid){.a{x:1}}", &options);
        assert_eq!(resolution, Resolution::Excluded(Exclusion::IgnoredAtRule));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_ignore_skips_negated_types_and_other_identifiers() {
        let options = ExtractOptions::default().ignore_at_rule("print");
        for css in [
            "@media not print{.a{x:1}}",
            "@media screen, print{.a{x:1}}",
            "@layer print{.a{x:1}}",
        ] {
            let (resolution, _) = resolve_first(css, &options);
            assert_eq!(resolution, Resolution::Applies, "{css}");
        }
        let (resolution, _) = resolve_first("@supports (print: print){.a{x:1}}", &options);
        assert_eq!(resolution, Resolution::Ambiguous);
    }

    #[test]
    fn test_malformed_media_warns_and_excludes() {
        let (resolution, diagnostics) =
            resolve_first("@media (min-width: big){.a{x:1}}", &ExtractOptions::default());
        assert_eq!(resolution, Resolution::Excluded(Exclusion::ConditionFalse));
        assert_eq!(diagnostics.warnings()[0].kind, WarningKind::Parse);
    }
}
