//! Rendering rules back to CSS text.
//!
//! Output is compact and deterministic: `a,b{color:red;margin:0!important}`,
//! one top-level item per line, no trailing newline. Rules that shared an
//! at-rule occurrence in the source and are adjacent in the output are
//! regrouped under one copy of it:
//!
//! ```text
//! @media (min-width:768px){.card{display:flex}.card h2{margin:0}}
//! ```
//!
//! No minification beyond whitespace collapsing is attempted: values,
//! selectors and conditions are emitted as the author wrote them.

use core::fmt::Write;

use crate::parser::{AtRuleFrame, Declaration, Rule, RuleKind, Stylesheet};

/// Serialize every rule of a stylesheet.
#[must_use]
pub fn serialize(stylesheet: &Stylesheet) -> String {
    serialize_rules(&stylesheet.rules)
}

/// Serialize rules in the order given. Callers pass rules sorted by source
/// index.
#[must_use]
pub fn serialize_rules<'a>(rules: impl IntoIterator<Item = &'a Rule>) -> String {
    let mut out = String::new();
    let mut open: Vec<&AtRuleFrame> = Vec::new();

    for rule in rules {
        let wrappers = rule.wrappers();

        // Close the wrappers this rule does not share with the previous one.
        let shared = open
            .iter()
            .zip(wrappers)
            .take_while(|(a, b)| a.id == b.id)
            .count();
        for _ in shared..open.len() {
            out.push('}');
        }
        open.truncate(shared);

        if open.is_empty() && !out.is_empty() {
            out.push('\n');
        }
        for frame in &wrappers[shared..] {
            out.push_str(&frame.header());
            out.push('{');
            open.push(frame);
        }

        write_rule(&mut out, rule);
    }

    for _ in 0..open.len() {
        out.push('}');
    }
    out
}

/// Serialize one rule without its wrappers.
#[must_use]
pub fn serialize_rule(rule: &Rule) -> String {
    let mut out = String::new();
    write_rule(&mut out, rule);
    out
}

fn write_rule(out: &mut String, rule: &Rule) {
    match (rule.kind, rule.at_rule()) {
        (RuleKind::Style, _) | (_, None) => {
            for (i, selector) in rule.selectors.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&selector.text);
            }
            write_block(out, &rule.declarations);
        }
        (RuleKind::Descriptors, Some(frame)) => {
            out.push_str(&frame.header());
            write_block(out, &rule.declarations);
        }
        (RuleKind::Keyframes, Some(frame)) => {
            out.push_str(&frame.header());
            out.push('{');
            for keyframe in &rule.keyframes {
                out.push_str(&keyframe.selector);
                write_block(out, &keyframe.declarations);
            }
            out.push('}');
        }
        (RuleKind::AtBlock, Some(frame)) => {
            out.push_str(&frame.header());
            out.push('{');
            out.push_str(rule.body.as_deref().unwrap_or_default());
            out.push('}');
        }
        (RuleKind::AtStatement, Some(frame)) => {
            out.push_str(&frame.header());
            out.push(';');
        }
    }
}

fn write_block(out: &mut String, declarations: &[Declaration]) {
    out.push('{');
    for (i, declaration) in declarations.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        let _ = write!(out, "{}:{}", declaration.property, declaration.value);
        if declaration.important {
            out.push_str("!important");
        }
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn roundtrip(css: &str) -> String {
        let (sheet, _) = parse(css, "test.css");
        serialize(&sheet)
    }

    #[test]
    fn test_compact_style_rules() {
        assert_eq!(
            roundtrip(".a, .b > p {\n  color : red;\n  margin: 0 auto !important;\n}"),
            ".a,.b > p{color:red;margin:0 auto!important}"
        );
    }

    #[test]
    fn test_wrappers_are_regrouped() {
        assert_eq!(
            roundtrip("@media (min-width:768px){.a{x:1}.b{y:2}} .c{z:3}"),
            "@media (min-width:768px){.a{x:1}.b{y:2}}\n.c{z:3}"
        );
    }

    #[test]
    fn test_separate_occurrences_stay_separate() {
        assert_eq!(
            roundtrip("@media print{.a{x:1}}@media print{.b{y:2}}"),
            "@media print{.a{x:1}}\n@media print{.b{y:2}}"
        );
    }
}
