//! CSS parser module.

/// The rule tree.
pub mod ast;
/// CSS parser implementation per [§ 5 Parsing](https://www.w3.org/TR/css-syntax-3/#parsing).
pub mod parser;

pub use ast::{
    AtRuleFrame, AtRuleKind, Declaration, FrameId, Keyframe, Rule, RuleKind, Stylesheet,
};
pub use parser::{ParseWarning, StylesheetInput, parse, parse_stylesheets};
