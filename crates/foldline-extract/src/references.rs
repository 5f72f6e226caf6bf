//! Reference tracking for at-rules that have no selector.
//!
//! `@font-face`, `@keyframes` and friends never match an element. They
//! belong in the critical bundle when a critical declaration names them:
//! a `font-family` naming a face, an `animation` naming keyframes, a
//! `var(--x)` using a registered property.

use std::collections::BTreeSet;

use foldline_css::parser::{AtRuleKind, Declaration, Rule};

/// Keywords of the `animation` shorthand that are never a keyframes name.
const ANIMATION_KEYWORDS: &[&str] = &[
    "none",
    "infinite",
    "normal",
    "reverse",
    "alternate",
    "alternate-reverse",
    "forwards",
    "backwards",
    "both",
    "running",
    "paused",
    "ease",
    "ease-in",
    "ease-out",
    "ease-in-out",
    "linear",
    "step-start",
    "step-end",
    "initial",
    "inherit",
    "unset",
    "revert",
    "revert-layer",
];

const FONT_SIZE_KEYWORDS: &[&str] = &[
    "xx-small",
    "x-small",
    "small",
    "medium",
    "large",
    "x-large",
    "xx-large",
    "xxx-large",
    "smaller",
    "larger",
];

/// Whether the rule is an at-rule included only when referenced.
#[must_use]
pub fn is_reference_tracked(rule: &Rule) -> bool {
    rule.at_rule().is_some_and(|frame| {
        matches!(
            frame.kind,
            AtRuleKind::FontFace
                | AtRuleKind::FontFeatureValues
                | AtRuleKind::Keyframes
                | AtRuleKind::CounterStyle
                | AtRuleKind::FontPaletteValues
                | AtRuleKind::Property
        )
    })
}

/// Names referenced by the declarations seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    /// Font family names, lowercased.
    font_families: BTreeSet<String>,
    /// Keyframes names, case-sensitive.
    animations: BTreeSet<String>,
    counter_styles: BTreeSet<String>,
    palettes: BTreeSet<String>,
    custom_properties: BTreeSet<String>,
}

impl References {
    /// Create an empty reference set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the names `declaration` references.
    pub fn collect(&mut self, declaration: &Declaration) {
        let value = declaration.value.as_str();
        if declaration.is_custom_property() {
            let _ = self.custom_properties.insert(declaration.property.clone());
            self.collect_custom_value(value);
        }
        match declaration.property.as_str() {
            "font-family" => {
                for family in split_top_level(value, |c| c == ',') {
                    self.add_font_family(family);
                }
            }
            "font" => {
                let mut families = split_top_level(value, |c| c == ',').into_iter();
                if let Some(first) = families.next() {
                    self.add_font_family(&font_shorthand_family(first));
                }
                for family in families {
                    self.add_font_family(family);
                }
            }
            "animation-name" => {
                for name in split_top_level(value, |c| c == ',') {
                    self.add_animation(name);
                }
            }
            "animation" => {
                for word in split_top_level(value, |c| c == ',' || c.is_whitespace()) {
                    if is_animation_name_candidate(word) {
                        self.add_animation(word);
                    }
                }
            }
            "list-style" | "list-style-type" | "system" | "fallback" => {
                for word in split_top_level(value, char::is_whitespace) {
                    let _ = self.counter_styles.insert(word.to_string());
                }
            }
            "font-palette" => {
                let _ = self.palettes.insert(value.trim().to_string());
            }
            _ => {}
        }
        for name in var_references(value) {
            let _ = self.custom_properties.insert(name.to_string());
        }
    }

    /// A custom property may hold a family list, a `font` or `animation`
    /// value, or a counter-style or palette name, and `var()` can carry it
    /// into any of those properties. Record every reading.
    fn collect_custom_value(&mut self, value: &str) {
        let mut segments = split_top_level(value, |c| c == ',').into_iter();
        if let Some(first) = segments.next() {
            self.add_font_family(first);
            self.add_font_family(&font_shorthand_family(first));
        }
        for segment in segments {
            self.add_font_family(segment);
        }
        for word in split_top_level(value, |c| c == ',' || c.is_whitespace()) {
            if is_animation_name_candidate(word) {
                self.add_animation(word);
            }
            let _ = self.counter_styles.insert(word.to_string());
            let _ = self.palettes.insert(word.to_string());
        }
    }

    /// Record every declaration a rule carries.
    pub fn collect_rule(&mut self, rule: &Rule) {
        for declaration in rule.all_declarations() {
            self.collect(declaration);
        }
    }

    /// Whether the reference-tracked at-rule `rule` is named by a recorded
    /// reference.
    #[must_use]
    pub fn references(&self, rule: &Rule) -> bool {
        let Some(frame) = rule.at_rule() else {
            return false;
        };
        let prelude = frame.condition_text.trim();
        match frame.kind {
            AtRuleKind::FontFace => rule
                .declarations
                .iter()
                .filter(|d| d.property == "font-family")
                .any(|d| self.font_families.contains(&normalize_family(&d.value))),
            AtRuleKind::FontFeatureValues => split_top_level(prelude, |c| c == ',')
                .into_iter()
                .any(|family| self.font_families.contains(&normalize_family(family))),
            AtRuleKind::Keyframes => self.animations.contains(unquote(prelude)),
            AtRuleKind::CounterStyle => self.counter_styles.contains(prelude),
            AtRuleKind::FontPaletteValues => self.palettes.contains(prelude),
            AtRuleKind::Property => self.custom_properties.contains(prelude),
            _ => false,
        }
    }

    fn add_font_family(&mut self, family: &str) {
        let family = normalize_family(family);
        if !family.is_empty() {
            let _ = self.font_families.insert(family);
        }
    }

    fn add_animation(&mut self, name: &str) {
        let name = unquote(name.trim());
        if !name.is_empty() && name != "none" {
            let _ = self.animations.insert(name.to_string());
        }
    }
}

/// [CSS Fonts § 2.1](https://www.w3.org/TR/css-fonts-4/#family-name-syntax)
///
/// "Font family names other than generic families must either be given
/// quoted as strings, or unquoted as a sequence of one or more identifiers."
/// Family names compare case-insensitively.
fn normalize_family(family: &str) -> String {
    unquote(family.trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(b'"'), Some(b'"')) | (Some(b'\''), Some(b'\'')) if text.len() >= 2 => {
            &text[1..text.len() - 1]
        }
        _ => text,
    }
}

/// [CSS Fonts § 2.8](https://www.w3.org/TR/css-fonts-4/#font-prop)
///
/// `[ <font-style> || <font-variant-css2> || <font-weight> || <font-width> ]?
/// <font-size> [ / <line-height> ]? <font-family>#`
///
/// The first family follows the size and optional line height. A bare
/// number is a weight, not a size.
fn font_shorthand_family(first_segment: &str) -> String {
    if let Some(quote) = first_segment.find(['"', '\'']) {
        return first_segment[quote..].to_string();
    }
    let words: Vec<&str> = first_segment.split_whitespace().collect();
    let Some(size) = words.iter().position(|word| is_font_size(word)) else {
        return words.join(" ");
    };
    let mut start = size + 1;
    if words[size].ends_with('/') {
        start += 1;
    } else if let Some(next) = words.get(start).filter(|w| w.starts_with('/')) {
        start += if *next == "/" { 2 } else { 1 };
    }
    words.get(start..).map(|rest| rest.join(" ")).unwrap_or_default()
}

/// `<absolute-size> | <relative-size> | <length-percentage>`, possibly
/// fused with `/<line-height>`.
fn is_font_size(word: &str) -> bool {
    let size = word.split('/').next().unwrap_or(word).to_ascii_lowercase();
    if FONT_SIZE_KEYWORDS.contains(&size.as_str()) {
        return true;
    }
    let numeric = size.starts_with(|c: char| c.is_ascii_digit() || c == '.');
    let bare_number = size.chars().all(|c| c.is_ascii_digit() || c == '.');
    (numeric && (!bare_number || word.contains('/')))
        || ["calc(", "clamp(", "min(", "max("].iter().any(|f| size.starts_with(f))
}

fn is_animation_name_candidate(word: &str) -> bool {
    let numeric = word
        .trim_start_matches(['+', '-'])
        .starts_with(|c: char| c.is_ascii_digit() || c == '.');
    !numeric
        && !word.contains('(')
        && !ANIMATION_KEYWORDS
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(word))
}

/// Names used in `var(--name)` / `var(--name, fallback)` anywhere in
/// `value`, nested fallbacks included.
fn var_references(value: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = value;
    while let Some(start) = find_ascii_case_insensitive(rest, "var(") {
        let after = rest[start + 4..].trim_start();
        let end = after
            .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..end];
        if name.starts_with("--") {
            names.push(name);
        }
        rest = &rest[start + 4..];
    }
    names
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Split at separators outside parentheses and strings, dropping empty
/// pieces.
fn split_top_level(value: &str, is_separator: impl Fn(char) -> bool) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, _) if depth == 0 && is_separator(c) => {
                pieces.push(value[start..i].trim());
                start = i + c.len_utf8();
            }
            (None, _) => {}
        }
    }
    pieces.push(value[start..].trim());
    pieces.retain(|piece| !piece.is_empty());
    pieces
}
