//! The rule tree produced by the parser.
//!
//! Rules are flat: a rule nested in `@media` and `@layer` carries the chain
//! of wrapping at-rule frames instead of living inside an at-rule node. The
//! frames keep their occurrence id, so rules that shared a wrapper in the
//! source can be regrouped under one copy of it when serialized.

use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::selector::Selector;

/// [§ 5.3.2 Parse a stylesheet](https://www.w3.org/TR/css-syntax-3/#parse-stylesheet)
///
/// Every rule of one parse, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stylesheet {
    /// Rules ordered by strictly increasing [`Rule::source_index`].
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the stylesheet has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look a rule up by its source index.
    #[must_use]
    pub fn rule(&self, source_index: usize) -> Option<&Rule> {
        self.rules
            .binary_search_by_key(&source_index, |r| r.source_index)
            .ok()
            .map(|i| &self.rules[i])
    }
}

/// What a [`Rule`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum RuleKind {
    /// A qualified rule: selectors and a declaration block.
    Style,
    /// An at-rule whose block is a list of descriptors, e.g. `@font-face`.
    Descriptors,
    /// `@keyframes` and its keyframe blocks.
    Keyframes,
    /// An at-rule whose block is kept as raw text, e.g. `@page`.
    AtBlock,
    /// A block-less at-rule, e.g. `@layer base, theme;`.
    AtStatement,
}

/// [§ 5.4.6 Consume a declaration](https://www.w3.org/TR/css-syntax-3/#consume-declaration)
///
/// A CSS declaration (e.g., `color: red`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// The property name, ASCII-lowercased unless it is a custom property.
    pub property: String,
    /// The value as written, without `!important`.
    pub value: String,
    /// Whether the declaration has `!important`.
    pub important: bool,
}

impl Declaration {
    /// Create a declaration.
    #[must_use]
    pub fn new(property: impl Into<String>, value: impl Into<String>, important: bool) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            important,
        }
    }

    /// Whether this declares a custom property (`--*`).
    #[must_use]
    pub fn is_custom_property(&self) -> bool {
        self.property.starts_with("--")
    }
}

/// [CSS Animations § 3](https://www.w3.org/TR/css-animations-1/#keyframes)
///
/// One keyframe block, e.g. `50% { opacity: 0.5 }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyframe {
    /// The keyframe selector as written, e.g. `from` or `0%, 100%`.
    pub selector: String,
    /// The keyframe's declarations.
    pub declarations: Vec<Declaration>,
}

/// Identity of one at-rule occurrence in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub usize);

/// The at-rules the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AtRuleKind {
    /// `@media`
    Media,
    /// `@supports`
    Supports,
    /// `@layer`
    Layer,
    /// `@container`
    Container,
    /// `@scope`
    Scope,
    /// `@document` / `@-moz-document`
    Document,
    /// `@starting-style`
    StartingStyle,
    /// `@keyframes`
    Keyframes,
    /// `@font-face`
    FontFace,
    /// `@page`
    Page,
    /// `@property`
    Property,
    /// `@counter-style`
    CounterStyle,
    /// `@font-palette-values`
    FontPaletteValues,
    /// `@font-feature-values`
    FontFeatureValues,
    /// `@namespace`
    Namespace,
    /// `@charset`
    Charset,
    /// `@import`
    Import,
    /// Anything else.
    Other,
}

impl AtRuleKind {
    /// Classify an at-keyword name. Vendor prefixes are ignored, so
    /// `-webkit-keyframes` is [`AtRuleKind::Keyframes`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let unprefixed = ["-webkit-", "-moz-", "-ms-", "-o-"]
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix))
            .unwrap_or(&name);
        match unprefixed {
            "media" => Self::Media,
            "supports" => Self::Supports,
            "layer" => Self::Layer,
            "container" => Self::Container,
            "scope" => Self::Scope,
            "document" => Self::Document,
            "starting-style" => Self::StartingStyle,
            "keyframes" => Self::Keyframes,
            "font-face" => Self::FontFace,
            "page" => Self::Page,
            "property" => Self::Property,
            "counter-style" => Self::CounterStyle,
            "font-palette-values" => Self::FontPaletteValues,
            "font-feature-values" => Self::FontFeatureValues,
            "namespace" => Self::Namespace,
            "charset" => Self::Charset,
            "import" => Self::Import,
            _ => Self::Other,
        }
    }

    /// Whether the block of this at-rule holds rules rather than
    /// declarations.
    #[must_use]
    pub const fn is_conditional_group(self) -> bool {
        matches!(
            self,
            Self::Media
                | Self::Supports
                | Self::Layer
                | Self::Container
                | Self::Scope
                | Self::Document
                | Self::StartingStyle
        )
    }
}

/// One at-rule wrapping a rule, e.g. the `@media (min-width: 768px)` of a
/// rule nested inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRuleFrame {
    /// Which occurrence in the source this frame is.
    pub id: FrameId,
    /// What the at-rule is.
    pub kind: AtRuleKind,
    /// The at-keyword as written, lowercased, without `@`, vendor prefix
    /// kept (`-webkit-keyframes`).
    pub name: String,
    /// The prelude as written, e.g. `(min-width: 768px)` or a layer name.
    pub condition_text: String,
}

impl AtRuleFrame {
    /// `@name prelude`, as it opens the at-rule.
    #[must_use]
    pub fn header(&self) -> String {
        if self.condition_text.is_empty() {
            format!("@{}", self.name)
        } else {
            format!("@{} {}", self.name, self.condition_text)
        }
    }
}

/// One rule occurrence.
///
/// For every kind but [`RuleKind::Style`], the innermost frame of
/// `at_rule_chain` is the at-rule itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Position in the concatenated input. Assigned once, never recomputed.
    pub source_index: usize,
    /// The stylesheet the rule came from.
    pub file_id: String,
    /// What the rule is.
    pub kind: RuleKind,
    /// The selector list of a style rule.
    pub selectors: Vec<Selector>,
    /// Declarations of a style rule or of a descriptor at-rule.
    pub declarations: Vec<Declaration>,
    /// Keyframe blocks of `@keyframes`.
    pub keyframes: Vec<Keyframe>,
    /// Wrapping at-rules, outermost first.
    pub at_rule_chain: Vec<AtRuleFrame>,
    /// Raw block contents of a [`RuleKind::AtBlock`].
    pub body: Option<String>,
}

impl Rule {
    /// The at-rule this rule is, for every kind but [`RuleKind::Style`].
    #[must_use]
    pub fn at_rule(&self) -> Option<&AtRuleFrame> {
        match self.kind {
            RuleKind::Style => None,
            _ => self.at_rule_chain.last(),
        }
    }

    /// The frames the rule is nested in, excluding the at-rule it is.
    #[must_use]
    pub fn wrappers(&self) -> &[AtRuleFrame] {
        match self.kind {
            RuleKind::Style => &self.at_rule_chain,
            _ => match self.at_rule_chain.split_last() {
                Some((_, outer)) => outer,
                None => &[],
            },
        }
    }

    /// Whether this is a style rule.
    #[must_use]
    pub fn is_style(&self) -> bool {
        self.kind == RuleKind::Style
    }

    /// Human readable label: the selector list of a style rule, or the
    /// at-rule header (`@font-face`, `@keyframes fade`).
    #[must_use]
    pub fn selector_text(&self) -> String {
        match self.at_rule() {
            None => self
                .selectors
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Some(frame) => frame.header(),
        }
    }

    /// All declarations the rule carries, including keyframe blocks.
    pub fn all_declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations
            .iter()
            .chain(self.keyframes.iter().flat_map(|k| k.declarations.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_rule_kind_ignores_vendor_prefix() {
        assert_eq!(AtRuleKind::from_name("-webkit-keyframes"), AtRuleKind::Keyframes);
        assert_eq!(AtRuleKind::from_name("-moz-document"), AtRuleKind::Document);
        assert_eq!(AtRuleKind::from_name("MEDIA"), AtRuleKind::Media);
        assert_eq!(AtRuleKind::from_name("tailwind"), AtRuleKind::Other);
    }

    #[test]
    fn test_kind_names_are_kebab_case() {
        assert_eq!(AtRuleKind::FontPaletteValues.to_string(), "font-palette-values");
        assert_eq!(RuleKind::AtStatement.as_ref(), "at-statement");
    }
}
